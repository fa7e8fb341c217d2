//! C FFI layer for the sensor-acquisition facade.
//!
//! Provides an opaque handle-based API for C/C++ consumers. The generated
//! header is written to `include/sl_sensor_stream.h` by cbindgen.

use crate::clock::VideoFrameSource;
use crate::device::SensorHub;
use crate::error::LastError;
use std::ffi::c_int;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static LAST_ERROR: LastError = LastError::new();

/// Opaque facade handle for C consumers.
pub struct ShHub(SensorHub);

/// IMU sample in C-compatible layout.
#[repr(C)]
pub struct ShImuSample {
    pub timestamp_ns: u64,
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
    pub temperature_c: f64,
    pub sync: bool,
    pub valid: bool,
}

/// Magnetometer sample in C-compatible layout.
#[repr(C)]
pub struct ShMagSample {
    pub timestamp_ns: u64,
    pub field: [f64; 3],
    pub valid: bool,
}

/// Environmental sample in C-compatible layout.
#[repr(C)]
pub struct ShEnvSample {
    pub timestamp_ns: u64,
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_rh: f64,
    pub valid: bool,
}

/// Camera-die temperature sample in C-compatible layout.
#[repr(C)]
pub struct ShCamTempSample {
    pub timestamp_ns: u64,
    pub left_c: f64,
    pub right_c: f64,
    pub valid: bool,
}

/// A video-frame source backed by a single atomic timestamp, settable from
/// C via `sh_video_source_set_timestamp_ns`.
pub struct ShVideoSource(AtomicU64);

impl VideoFrameSource for ShVideoSource {
    fn last_frame_timestamp_ns(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Opaque handle to a C-owned video-frame source.
pub struct ShVideoSourceHandle(Arc<ShVideoSource>);

/// Create a new facade in the uninitialized state.
#[no_mangle]
pub extern "C" fn sh_hub_new() -> *mut ShHub {
    Box::into_raw(Box::new(ShHub(SensorHub::new())))
}

/// Initialize the facade with the device matching `serial` (or the first
/// enumerated device when `serial == -1`). Returns `true` on success.
///
/// # Safety
/// `hub` must be a valid pointer returned by `sh_hub_new`.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_init(hub: *mut ShHub, serial: c_int) -> bool {
    if hub.is_null() {
        return false;
    }
    match (*hub)
        .0
        .init_with_config(serial, crate::config::AcquisitionConfig::default())
    {
        Ok(()) => true,
        Err(e) => {
            LAST_ERROR.set(&e);
            false
        }
    }
}

/// Firmware major/minor, packed as `major << 8 | minor`. Returns -1 if
/// uninitialized.
///
/// # Safety
/// `hub` must be a valid pointer returned by `sh_hub_new`.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_firmware_version(hub: *const ShHub) -> c_int {
    if hub.is_null() {
        return -1;
    }
    match (*hub).0.firmware_version() {
        Some((major, minor)) => ((major as c_int) << 8) | minor as c_int,
        None => -1,
    }
}

/// # Safety
/// `hub` must be a valid pointer returned by `sh_hub_new`.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_serial_number(hub: *const ShHub) -> c_int {
    if hub.is_null() {
        return -1;
    }
    (*hub).0.serial_number()
}

/// Poll the latest IMU sample, waiting up to `timeout_us` microseconds.
/// Returns `true` and writes `out` on success, `false` on timeout.
///
/// # Safety
/// `hub` and `out` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_last_imu(
    hub: *const ShHub,
    timeout_us: u64,
    out: *mut ShImuSample,
) -> bool {
    if hub.is_null() || out.is_null() {
        return false;
    }
    match (*hub).0.last_imu(Duration::from_micros(timeout_us)) {
        Some(s) => {
            out.write(ShImuSample {
                timestamp_ns: s.timestamp_ns,
                accel: [s.accel.x, s.accel.y, s.accel.z],
                gyro: [s.gyro.x, s.gyro.y, s.gyro.z],
                temperature_c: s.temperature_c,
                sync: s.sync,
                valid: s.valid,
            });
            true
        }
        None => false,
    }
}

/// # Safety
/// `hub` and `out` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_last_mag(
    hub: *const ShHub,
    timeout_us: u64,
    out: *mut ShMagSample,
) -> bool {
    if hub.is_null() || out.is_null() {
        return false;
    }
    match (*hub).0.last_mag(Duration::from_micros(timeout_us)) {
        Some(s) => {
            out.write(ShMagSample {
                timestamp_ns: s.timestamp_ns,
                field: [s.field.x, s.field.y, s.field.z],
                valid: s.valid,
            });
            true
        }
        None => false,
    }
}

/// # Safety
/// `hub` and `out` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_last_env(
    hub: *const ShHub,
    timeout_us: u64,
    out: *mut ShEnvSample,
) -> bool {
    if hub.is_null() || out.is_null() {
        return false;
    }
    match (*hub).0.last_env(Duration::from_micros(timeout_us)) {
        Some(s) => {
            out.write(ShEnvSample {
                timestamp_ns: s.timestamp_ns,
                temperature_c: s.temperature_c,
                pressure_hpa: s.pressure_hpa,
                humidity_rh: s.humidity_rh,
                valid: s.valid,
            });
            true
        }
        None => false,
    }
}

/// # Safety
/// `hub` and `out` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_last_cam_temp(
    hub: *const ShHub,
    timeout_us: u64,
    out: *mut ShCamTempSample,
) -> bool {
    if hub.is_null() || out.is_null() {
        return false;
    }
    match (*hub).0.last_cam_temp(Duration::from_micros(timeout_us)) {
        Some(s) => {
            out.write(ShCamTempSample {
                timestamp_ns: s.timestamp_ns,
                left_c: s.left_c,
                right_c: s.right_c,
                valid: s.valid,
            });
            true
        }
        None => false,
    }
}

/// Create a video-frame source for the paired video collaborator to drive
/// via `sh_video_source_set_timestamp_ns`.
#[no_mangle]
pub extern "C" fn sh_video_source_new() -> *mut ShVideoSourceHandle {
    Box::into_raw(Box::new(ShVideoSourceHandle(Arc::new(ShVideoSource(
        AtomicU64::new(0),
    )))))
}

/// # Safety
/// `handle` must be a valid pointer returned by `sh_video_source_new`.
#[no_mangle]
pub unsafe extern "C" fn sh_video_source_set_timestamp_ns(
    handle: *const ShVideoSourceHandle,
    timestamp_ns: u64,
) {
    if handle.is_null() {
        return;
    }
    (*handle).0 .0.store(timestamp_ns, Ordering::Relaxed);
}

/// # Safety
/// `handle` must be a pointer returned by `sh_video_source_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_video_source_free(handle: *mut ShVideoSourceHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Hand the facade a reference to the video collaborator, seeding the
/// initial sync offset.
///
/// # Safety
/// `hub` and `video` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_enable_sync(
    hub: *mut ShHub,
    video: *const ShVideoSourceHandle,
    initial_sync_offset_ns: i64,
) {
    if hub.is_null() || video.is_null() {
        return;
    }
    let source: Arc<dyn VideoFrameSource> = (*video).0.clone();
    (*hub).0.enable_sync(source, initial_sync_offset_ns);
}

/// Stop the acquisition worker and release the HID handle. Idempotent.
///
/// # Safety
/// `hub` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_reset(hub: *mut ShHub) {
    if !hub.is_null() {
        (*hub).0.reset();
    }
}

/// Free a facade created by `sh_hub_new`, resetting it first.
///
/// # Safety
/// `hub` must be a pointer returned by `sh_hub_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn sh_hub_free(hub: *mut ShHub) {
    if !hub.is_null() {
        drop(Box::from_raw(hub));
    }
}

/// Get the last error message. Returns NULL if no error.
#[no_mangle]
pub extern "C" fn sh_last_error() -> *const std::ffi::c_char {
    LAST_ERROR.as_ptr()
}
