//! HID transport (C1): open/close by serial, feature-report send/receive,
//! and the interrupt-report read loop's blocking/non-blocking toggle.
//!
//! A thin wrapper that turns `hidapi`'s report-level calls into the handful
//! of device operations the acquisition loop needs, with a uniform error
//! mapping.

use crate::error::{Result, SensorError};
use crate::protocol::{self, REPORT_SIZE};
use hidapi::{HidApi, HidDevice};

/// The handful of device operations the acquisition loop (C5) needs from
/// C1, abstracted so the loop can run against a mock in tests without a
/// physical device attached. `HidTransport` is the only production
/// implementation; see `tests/` for the mock used by the seed scenarios
/// in the original spec's §8.
pub trait SensorTransport: Send {
    fn enable_stream(&self, enable: bool) -> Result<()>;
    fn ping(&self) -> Result<()>;
    fn read_sample(&mut self, buf: &mut [u8; REPORT_SIZE], timeout_ms: i32) -> Result<usize>;
    fn set_blocking_mode(&mut self, blocking: bool) -> Result<()>;
}

/// Wraps a single opened HID handle for the sensor interrupt/feature
/// reports. Owned exclusively by the acquisition worker once streaming
/// starts (see `acquisition.rs`).
pub struct HidTransport {
    device: HidDevice,
    blocking: bool,
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        // hidapi devices default to blocking reads; the acquisition loop
        // immediately switches to the 500ms read_timeout() below.
        Self {
            device,
            blocking: true,
        }
    }

    /// Open the first device matching `vendor`/`product`, optionally
    /// filtered by `serial` (`None` picks the first match).
    pub fn open(api: &HidApi, vendor: u16, product: u16, serial: Option<&str>) -> Result<Self> {
        let device = match serial {
            Some(serial) => api.open_serial(vendor, product, serial)?,
            None => {
                let info = api
                    .device_list()
                    .find(|d| d.vendor_id() == vendor && d.product_id() == product)
                    .ok_or(SensorError::Open)?;
                api.open_path(info.path())?
            }
        };
        Ok(Self::new(device))
    }

    /// Enable or disable the sensor stream via feature report `[0x02, en]`.
    /// A failure here is a warning, not fatal — acquisition continues.
    pub fn enable_stream(&self, enable: bool) -> Result<()> {
        let cmd = protocol::build_stream_enable_cmd(enable);
        self.device
            .send_feature_report(&cmd)
            .map_err(|e| SensorError::Transport(format!("enable_stream: {}", e)))
    }

    /// Send a liveness ping (`[0x21, 0xF2]`) to keep the device streaming.
    /// A failure here is a warning, not fatal.
    pub fn ping(&self) -> Result<()> {
        let cmd = protocol::build_ping_cmd();
        self.device
            .send_feature_report(&cmd)
            .map_err(|e| SensorError::Transport(format!("ping: {}", e)))
    }

    /// Read one interrupt report with the given millisecond timeout.
    /// Returns the number of bytes read (0 on timeout).
    pub fn read_sample(&self, buf: &mut [u8; REPORT_SIZE], timeout_ms: i32) -> Result<usize> {
        self.device
            .read_timeout(buf, timeout_ms)
            .map_err(|e| SensorError::Transport(format!("read_timeout: {}", e)))
    }

    /// Switch the handle to blocking mode. Used after a short read or a
    /// report-ID mismatch, per the error policy in §7.
    pub fn set_blocking_mode(&mut self, blocking: bool) -> Result<()> {
        if self.blocking == blocking {
            return Ok(());
        }
        self.device
            .set_blocking_mode(blocking)
            .map_err(|e| SensorError::Transport(format!("set_blocking_mode: {}", e)))?;
        self.blocking = blocking;
        Ok(())
    }
}

impl SensorTransport for HidTransport {
    fn enable_stream(&self, enable: bool) -> Result<()> {
        HidTransport::enable_stream(self, enable)
    }

    fn ping(&self) -> Result<()> {
        HidTransport::ping(self)
    }

    fn read_sample(&mut self, buf: &mut [u8; REPORT_SIZE], timeout_ms: i32) -> Result<usize> {
        HidTransport::read_sample(self, buf, timeout_ms)
    }

    fn set_blocking_mode(&mut self, blocking: bool) -> Result<()> {
        HidTransport::set_blocking_mode(self, blocking)
    }
}

/// Enumerate devices matching `vendor`, yielding hidapi's raw metadata.
/// Used by the facade to populate the serial→identity map at `enumerate()`.
pub fn enumerate_vendor(api: &HidApi, vendor: u16) -> Vec<&hidapi::DeviceInfo> {
    api.device_list().filter(|d| d.vendor_id() == vendor).collect()
}
