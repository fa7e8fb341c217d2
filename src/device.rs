//! Public Facade (C6): enumeration, initialization by serial, modality
//! getters, firmware/serial introspection, and the video sync handshake.
//!
//! `init`/`reset` are called from a controlling thread; the getters may be
//! called from any thread concurrently with the acquisition worker.

use crate::acquisition::AcquisitionWorker;
use crate::clock::{ClockAligner, VideoFrameSource};
use crate::config::AcquisitionConfig;
use crate::error::{Result, SensorError};
use crate::hid::{self, HidTransport};
use crate::protocol::SL_USB_VENDOR;
use crate::registry::SampleRegistry;
use crate::types::{CamTempSample, DeviceIdentity, DeviceInfo, EnvSample, ImuSample, MagSample};
use hidapi::HidApi;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// State held while the worker is running; torn down by `reset()`.
struct Active {
    worker: AcquisitionWorker,
    registry: Arc<SampleRegistry>,
    aligner: Arc<Mutex<ClockAligner>>,
}

/// Entry point for the sensor-acquisition subsystem. Starts uninitialized;
/// `init` opens the device and spawns the acquisition worker, `reset` tears
/// it back down. Dropping the facade calls `reset`.
pub struct SensorHub {
    identity: Option<DeviceIdentity>,
    serial: i32,
    active: Option<Active>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self {
            identity: None,
            serial: -1,
            active: None,
        }
    }

    /// Enumerate devices matching the Stereolabs vendor ID, returning their
    /// serials in discovery order.
    pub fn enumerate() -> Result<Vec<DeviceInfo>> {
        let api = HidApi::new().map_err(SensorError::Hid)?;
        let infos = hid::enumerate_vendor(&api, SL_USB_VENDOR);
        if infos.is_empty() {
            return Err(SensorError::Enumeration);
        }
        Ok(infos
            .into_iter()
            .map(|d| DeviceInfo {
                serial: d
                    .serial_number()
                    .and_then(|s| s.parse::<i32>().ok())
                    .unwrap_or(-1),
                identity: DeviceIdentity {
                    product_id: d.product_id(),
                    firmware_version: d.release_number(),
                },
            })
            .collect())
    }

    /// Open the device with the given `serial` (or the first enumerated
    /// device when `serial == -1`), enable the stream, and spawn the
    /// acquisition worker. Returns `false` on open failure, matching the
    /// facade's boolean `init` contract.
    pub fn init(&mut self, serial: i32) -> bool {
        self.init_with_config(serial, AcquisitionConfig::default())
            .is_ok()
    }

    pub fn init_with_config(&mut self, serial: i32, config: AcquisitionConfig) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }

        let api = HidApi::new().map_err(SensorError::Hid)?;
        let serial_str = if serial == -1 {
            None
        } else {
            Some(serial.to_string())
        };

        let product = api
            .device_list()
            .find(|d| {
                d.vendor_id() == SL_USB_VENDOR
                    && serial_str
                        .as_deref()
                        .map(|s| d.serial_number() == Some(s))
                        .unwrap_or(true)
            })
            .ok_or(SensorError::Open)?;

        let identity = DeviceIdentity {
            product_id: product.product_id(),
            firmware_version: product.release_number(),
        };

        let hid = HidTransport::open(&api, SL_USB_VENDOR, product.product_id(), serial_str.as_deref())?;

        let registry = Arc::new(SampleRegistry::new());
        let aligner = Arc::new(Mutex::new(ClockAligner::new(config)));

        let worker = AcquisitionWorker::start(hid, identity, config, registry.clone(), aligner.clone())?;

        self.identity = Some(identity);
        self.serial = serial;
        self.active = Some(Active {
            worker,
            registry,
            aligner,
        });

        Ok(())
    }

    pub fn firmware_version(&self) -> Option<(u8, u8)> {
        self.identity.map(|i| i.firmware_major_minor())
    }

    pub fn serial_number(&self) -> i32 {
        self.serial
    }

    pub fn last_imu(&self, timeout: Duration) -> Option<ImuSample> {
        self.active.as_ref()?.registry.imu.poll(timeout)
    }

    pub fn last_mag(&self, timeout: Duration) -> Option<MagSample> {
        self.active.as_ref()?.registry.mag.poll(timeout)
    }

    pub fn last_env(&self, timeout: Duration) -> Option<EnvSample> {
        self.active.as_ref()?.registry.env.poll(timeout)
    }

    pub fn last_cam_temp(&self, timeout: Duration) -> Option<CamTempSample> {
        self.active.as_ref()?.registry.cam_temp.poll(timeout)
    }

    /// Hand the aligner a read-only reference to the paired video
    /// collaborator, seeding `sync_offset_ns` with `initial_sync_offset_ns`.
    /// A no-op if the facade is not yet initialized.
    pub fn enable_sync(&self, source: Arc<dyn VideoFrameSource>, initial_sync_offset_ns: i64) {
        if let Some(active) = &self.active {
            let mut aligner = active.aligner.lock().unwrap();
            aligner.set_video_source(source, initial_sync_offset_ns);
        }
    }

    /// Stop the worker and release the HID handle. Idempotent: calling
    /// `reset` on an already-uninitialized facade is a no-op.
    pub fn reset(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.worker.stop();
        }
        self.identity = None;
        self.serial = -1;
    }
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SensorHub {
    fn drop(&mut self) {
        self.reset();
    }
}
