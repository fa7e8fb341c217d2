//! Acquisition Loop (C5): the dedicated worker thread that drives
//! C1 -> C2 -> C3 -> C4 at the device's streaming rate, issuing periodic
//! liveness pings and observing the stop flag between reads.

use crate::clock::ClockAligner;
use crate::config::AcquisitionConfig;
use crate::error::DecodeError;
use crate::hid::SensorTransport;
use crate::protocol::{self, REPORT_SIZE};
use crate::registry::SampleRegistry;
use crate::types::{DeviceIdentity, Validity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Spawns and owns the acquisition worker thread.
pub struct AcquisitionWorker {
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl AcquisitionWorker {
    /// Start the worker: enables the stream, then loops reading, decoding,
    /// aligning, and publishing samples until `stop()` is called. Generic
    /// over `SensorTransport` so tests can drive the full C1->C4 pipeline
    /// against a scripted mock instead of a physical device.
    pub fn start<T: SensorTransport + 'static>(
        mut hid: T,
        identity: DeviceIdentity,
        config: AcquisitionConfig,
        registry: Arc<SampleRegistry>,
        aligner: Arc<std::sync::Mutex<ClockAligner>>,
    ) -> crate::error::Result<Self> {
        hid.enable_stream(true)
            .unwrap_or_else(|e| log::warn!("enable_stream failed: {}", e));

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("sensor-acquisition".into())
            .spawn(move || {
                acquisition_loop(hid, identity, config, registry, aligner, stop_clone);
            })
            .map_err(|e| crate::error::SensorError::Transport(format!("spawn failed: {}", e)))?;

        Ok(Self {
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Signal the worker to stop and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for AcquisitionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquisition_loop<T: SensorTransport>(
    mut hid: T,
    identity: DeviceIdentity,
    config: AcquisitionConfig,
    registry: Arc<SampleRegistry>,
    aligner: Arc<std::sync::Mutex<ClockAligner>>,
    stop_flag: Arc<AtomicBool>,
) {
    log::info!("acquisition worker started");
    let mut iteration: u32 = 0;
    let timeout_ms = config.read_timeout.as_millis() as i32;

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }

        iteration = iteration.wrapping_add(1);
        if iteration % config.ping_interval == 0 {
            if let Err(e) = hid.ping() {
                log::warn!("liveness ping failed: {}", e);
            }
        }

        let mut buf = [0u8; REPORT_SIZE];
        let n = match hid.read_sample(&mut buf, timeout_ms) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("read_sample failed: {}", e);
                continue;
            }
        };

        if n < protocol::SENSOR_RECORD_LEN {
            log::warn!("short read ({} bytes), switching to blocking mode", n);
            if let Err(e) = hid.set_blocking_mode(true) {
                log::warn!("set_blocking_mode failed: {}", e);
            }
            continue;
        }

        let raw = match protocol::decode(&buf[..n]) {
            Ok(raw) => raw,
            Err(DecodeError::BadId(id)) => {
                log::warn!("unexpected report id 0x{:02x}, switching to blocking mode", id);
                if let Err(e) = hid.set_blocking_mode(true) {
                    log::warn!("set_blocking_mode failed: {}", e);
                }
                continue;
            }
            Err(DecodeError::ShortRead { need, got }) => {
                log::warn!(
                    "short record ({} of {} bytes), switching to blocking mode",
                    got, need
                );
                if let Err(e) = hid.set_blocking_mode(true) {
                    log::warn!("set_blocking_mode failed: {}", e);
                }
                continue;
            }
        };

        let aligned_ns = {
            let mut aligner = aligner.lock().unwrap();
            aligner.observe(
                raw.timestamp,
                host_now_ns(),
                !raw.imu_valid(),
                raw.frame_sync != 0,
                raw.frame_sync_count,
                raw.sync_capable(),
            )
        };

        let aligned_ns = match aligned_ns {
            Some(ns) => ns,
            None => continue, // bootstrap sample, never published
        };

        registry.imu.publish(protocol::scale_imu(&raw, aligned_ns));

        if raw.mag_validity() == Validity::New {
            registry.mag.publish(protocol::scale_mag(&raw, aligned_ns));
        }

        if raw.env_validity() == Validity::New {
            registry
                .env
                .publish(protocol::scale_env(&raw, &identity, aligned_ns));

            if raw.camera_temps_valid() {
                registry
                    .cam_temp
                    .publish(protocol::scale_cam_temp(&raw, aligned_ns));
            }
        }
    }

    if let Err(e) = hid.enable_stream(false) {
        log::warn!("enable_stream(false) failed: {}", e);
    }
    log::info!("acquisition worker stopped");
}

/// Host monotonic clock reading, in nanoseconds since an arbitrary epoch.
/// Only deltas and relative comparisons are meaningful.
fn host_now_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}
