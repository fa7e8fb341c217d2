//! Real-time IMU/magnetometer/environmental/camera-temperature acquisition
//! and host/device clock synchronization for a stereo camera's HID sensor
//! stream.
//!
//! Provides:
//! - A HID transport and report codec for the 64-byte sensor record.
//! - A clock aligner mapping MCU ticks onto the host monotonic clock, with
//!   drift estimation and offset re-alignment against a paired video stream.
//! - A latest-sample registry handing each modality's freshest value to
//!   pollers with bounded timeout.
//! - A public facade tying the above together behind enumerate/init/reset.
//! - A C FFI for integration with non-Rust consumers.
//!
//! ## Quick start
//! ```no_run
//! use sl_sensor_stream::SensorHub;
//! use std::time::Duration;
//!
//! let mut hub = SensorHub::new();
//! assert!(hub.init(-1));
//!
//! if let Some(sample) = hub.last_imu(Duration::from_micros(10_000)) {
//!     println!("accel: {:?}", sample.accel);
//! }
//!
//! hub.reset();
//! ```

pub mod acquisition;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod ffi;
pub mod hid;
pub mod protocol;
pub mod registry;
pub mod types;

pub use config::AcquisitionConfig;
pub use device::SensorHub;
pub use error::{Result, SensorError};
pub use types::*;
