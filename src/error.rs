use std::fmt;

/// Errors surfaced by the sensor-acquisition subsystem.
///
/// Transport and protocol errors never propagate out of the acquisition
/// worker (see `acquisition.rs`) — they are logged and recovered locally.
/// Only `Enumeration` and `Open` are surfaced to facade callers; a missed
/// poll deadline is represented as `None` at the facade boundary rather
/// than as this error type, but `Timeout` is kept here for the FFI surface.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("no devices enumerated")]
    Enumeration,

    #[error("device with requested serial not found or busy")]
    Open,

    #[error("feature report transaction failed: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out waiting for a fresh sample")]
    Timeout,

    #[error("acquisition worker stopped")]
    Stopped,
}

/// Errors from decoding a raw HID report into a `RawRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("bad report id: expected 0x05, got 0x{0:02x}")]
    BadId(u8),

    #[error("short read: need at least {need} bytes, got {got}")]
    ShortRead { need: usize, got: usize },
}

/// Result type alias for sensor-stream operations.
pub type Result<T> = std::result::Result<T, SensorError>;

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &SensorError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
