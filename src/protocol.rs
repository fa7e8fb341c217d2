//! Wire-level constants and the sensor-report codec (C2), plus the HID
//! command buffers C1 sends (enable/disable stream, ping).
//!
//! The 64-byte interrupt report is treated as an opaque little-endian byte
//! buffer and read field-by-field at fixed offsets — never overlaid with a
//! `#[repr(C)]` struct — to avoid alignment and strict-aliasing hazards on
//! a buffer that arrives from the OS HID backend with no alignment
//! guarantee.

use crate::error::DecodeError;
use crate::types::{CamTempSample, DeviceIdentity, EnvSample, ImuSample, MagSample, Validity, Vec3};

// -- USB identifiers --
/// Stereolabs vendor ID.
pub const SL_USB_VENDOR: u16 = 0x2B03;

// -- HID report IDs --
pub const REPORT_ID_STREAM_STATUS: u8 = 0x02;
pub const REPORT_ID_SENSOR_DATA: u8 = 0x05;
pub const REPORT_ID_REQUEST_SET: u8 = 0x21;

/// Command byte for `REPORT_ID_REQUEST_SET`: keep the stream alive.
pub const CMD_PING: u8 = 0xF2;

/// Full HID report size, in bytes.
pub const REPORT_SIZE: usize = 64;

/// Number of bytes of `REPORT_SIZE` that carry meaningful sensor fields;
/// the remainder is manufacturer padding.
pub const SENSOR_RECORD_LEN: usize = 44;

// -- Scaling constants (§6) --

/// Nanoseconds per MCU tick.
pub const TS_SCALE: f64 = 39.0625;

/// Accelerometer LSB scale, m/s^2 per count (±8g full-scale, 16-bit signed).
pub const ACC_SCALE: f64 = 0.0023956055;

/// Gyroscope LSB scale, degrees/second per count (±2000 dps, 16-bit signed).
pub const GYRO_SCALE: f64 = 0.061035156;

/// Magnetometer LSB scale, microtesla per count.
pub const MAG_SCALE: f64 = 0.3;

/// IMU/camera-die temperature LSB scale, degrees Celsius per count.
pub const TEMP_SCALE: f64 = 0.01;

/// Pressure LSB scale for firmware < 3.9, hPa per count.
pub const PRESS_SCALE_OLD: f64 = 0.02384185791;
/// Pressure LSB scale for firmware >= 3.9, hPa per count.
pub const PRESS_SCALE_NEW: f64 = 0.01;

/// Humidity LSB scale for firmware < 3.9, %RH per count.
pub const HUMID_SCALE_OLD: f64 = 0.004470348358;
/// Humidity LSB scale for firmware >= 3.9, %RH per count.
pub const HUMID_SCALE_NEW: f64 = 0.01;

/// Sentinel for "no camera-die temperature reading".
pub const TEMP_NOT_VALID: i16 = 0x7FFF;

/// Firmware version at which pressure/humidity scaling changes.
pub const ENV_SCALE_FW_MAJOR: u8 = 3;
pub const ENV_SCALE_FW_MINOR: u8 = 9;

fn le_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn le_i16(buf: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([buf[off], buf[off + 1]])
}

/// A decoded but unscaled sensor record, field-for-field as it appears on
/// the wire (minus the report ID byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub frame_sync: u8,
    pub frame_sync_count: u32,
    pub imu_not_valid: u8,
    pub timestamp: u32,
    pub g: [i16; 3],
    pub a: [i16; 3],
    pub imu_temp: i16,
    pub mag_valid: u8,
    pub m: [i16; 3],
    pub env_valid: u8,
    pub temp: i16,
    pub press: i16,
    pub humid: i16,
    pub temp_cam_left: i16,
    pub temp_cam_right: i16,
    pub sync_capabilities: u8,
}

impl RawRecord {
    /// MCU free-running timestamp, scaled to nanoseconds. Callers widen the
    /// *delta* between consecutive raw tick counts before scaling (see
    /// `clock.rs`) so that a 32-bit tick wraparound mid-stream is handled
    /// correctly; this helper is for the absolute, single-sample value.
    pub fn mcu_timestamp_ns(&self) -> u64 {
        (self.timestamp as f64 * TS_SCALE).round() as u64
    }

    pub fn imu_valid(&self) -> bool {
        self.imu_not_valid == 0
    }

    pub fn mag_validity(&self) -> Validity {
        Validity::from_u8(self.mag_valid)
    }

    pub fn env_validity(&self) -> Validity {
        Validity::from_u8(self.env_valid)
    }

    pub fn sync_capable(&self) -> bool {
        self.sync_capabilities != 0
    }

    pub fn camera_temps_valid(&self) -> bool {
        self.temp_cam_left != TEMP_NOT_VALID && self.temp_cam_right != TEMP_NOT_VALID
    }
}

/// Parse a received HID report into a `RawRecord`. Applies no scaling.
///
/// Fails if the report ID (byte 0) isn't `REPORT_ID_SENSOR_DATA`, or if
/// fewer than `SENSOR_RECORD_LEN` bytes were received.
pub fn decode(buf: &[u8]) -> Result<RawRecord, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::ShortRead {
            need: SENSOR_RECORD_LEN,
            got: 0,
        });
    }
    if buf[0] != REPORT_ID_SENSOR_DATA {
        return Err(DecodeError::BadId(buf[0]));
    }
    if buf.len() < SENSOR_RECORD_LEN {
        return Err(DecodeError::ShortRead {
            need: SENSOR_RECORD_LEN,
            got: buf.len(),
        });
    }

    Ok(RawRecord {
        frame_sync: buf[1],
        frame_sync_count: le_u32(buf, 2),
        imu_not_valid: buf[6],
        timestamp: le_u32(buf, 7),
        g: [le_i16(buf, 11), le_i16(buf, 13), le_i16(buf, 15)],
        a: [le_i16(buf, 17), le_i16(buf, 19), le_i16(buf, 21)],
        imu_temp: le_i16(buf, 23),
        mag_valid: buf[25],
        m: [le_i16(buf, 26), le_i16(buf, 28), le_i16(buf, 30)],
        env_valid: buf[32],
        temp: le_i16(buf, 33),
        press: le_i16(buf, 35),
        humid: le_i16(buf, 37),
        temp_cam_left: le_i16(buf, 39),
        temp_cam_right: le_i16(buf, 41),
        sync_capabilities: buf[43],
    })
}

/// Encode a `RawRecord` back into a `SENSOR_RECORD_LEN`-byte buffer. Used by
/// tests and by mock transports that synthesize device traffic.
pub fn encode(r: &RawRecord) -> [u8; SENSOR_RECORD_LEN] {
    let mut buf = [0u8; SENSOR_RECORD_LEN];
    buf[0] = REPORT_ID_SENSOR_DATA;
    buf[1] = r.frame_sync;
    buf[2..6].copy_from_slice(&r.frame_sync_count.to_le_bytes());
    buf[6] = r.imu_not_valid;
    buf[7..11].copy_from_slice(&r.timestamp.to_le_bytes());
    buf[11..13].copy_from_slice(&r.g[0].to_le_bytes());
    buf[13..15].copy_from_slice(&r.g[1].to_le_bytes());
    buf[15..17].copy_from_slice(&r.g[2].to_le_bytes());
    buf[17..19].copy_from_slice(&r.a[0].to_le_bytes());
    buf[19..21].copy_from_slice(&r.a[1].to_le_bytes());
    buf[21..23].copy_from_slice(&r.a[2].to_le_bytes());
    buf[23..25].copy_from_slice(&r.imu_temp.to_le_bytes());
    buf[25] = r.mag_valid;
    buf[26..28].copy_from_slice(&r.m[0].to_le_bytes());
    buf[28..30].copy_from_slice(&r.m[1].to_le_bytes());
    buf[30..32].copy_from_slice(&r.m[2].to_le_bytes());
    buf[32] = r.env_valid;
    buf[33..35].copy_from_slice(&r.temp.to_le_bytes());
    buf[35..37].copy_from_slice(&r.press.to_le_bytes());
    buf[37..39].copy_from_slice(&r.humid.to_le_bytes());
    buf[39..41].copy_from_slice(&r.temp_cam_left.to_le_bytes());
    buf[41..43].copy_from_slice(&r.temp_cam_right.to_le_bytes());
    buf[43] = r.sync_capabilities;
    buf
}

/// Build the 2-byte feature report payload that enables or disables the
/// sensor stream: `[0x02, enable?1:0]`.
pub fn build_stream_enable_cmd(enable: bool) -> [u8; 2] {
    [REPORT_ID_STREAM_STATUS, enable as u8]
}

/// Build the 2-byte feature report payload for a liveness ping:
/// `[0x21, 0xF2]`.
pub fn build_ping_cmd() -> [u8; 2] {
    [REPORT_ID_REQUEST_SET, CMD_PING]
}

/// Apply `ACC_SCALE`/`GYRO_SCALE`/`TEMP_SCALE` to produce the IMU sample
/// the acquisition loop publishes. Preserves the original `valid` semantics
/// (`imu_not_valid == 0`) rather than the firmware's apparent cross-wiring
/// of `mag_valid` into the IMU validity field — see DESIGN.md.
pub fn scale_imu(raw: &RawRecord, timestamp_ns: u64) -> ImuSample {
    ImuSample {
        timestamp_ns,
        accel: Vec3::new(
            raw.a[0] as f64 * ACC_SCALE,
            raw.a[1] as f64 * ACC_SCALE,
            raw.a[2] as f64 * ACC_SCALE,
        ),
        gyro: Vec3::new(
            raw.g[0] as f64 * GYRO_SCALE,
            raw.g[1] as f64 * GYRO_SCALE,
            raw.g[2] as f64 * GYRO_SCALE,
        ),
        temperature_c: raw.imu_temp as f64 * TEMP_SCALE,
        sync: raw.frame_sync != 0,
        valid: raw.imu_valid(),
    }
}

/// Apply `MAG_SCALE`. Caller gates on `raw.mag_validity() == Validity::New`.
pub fn scale_mag(raw: &RawRecord, timestamp_ns: u64) -> MagSample {
    MagSample {
        timestamp_ns,
        field: Vec3::new(
            raw.m[0] as f64 * MAG_SCALE,
            raw.m[1] as f64 * MAG_SCALE,
            raw.m[2] as f64 * MAG_SCALE,
        ),
        valid: true,
    }
}

/// Apply pressure/humidity scaling selected by the firmware-version
/// predicate (`fw >= 3.9`). Caller gates on `raw.env_validity() == New`.
pub fn scale_env(raw: &RawRecord, identity: &DeviceIdentity, timestamp_ns: u64) -> EnvSample {
    let new_scales = identity.firmware_at_least(ENV_SCALE_FW_MAJOR, ENV_SCALE_FW_MINOR);
    let press_scale = if new_scales { PRESS_SCALE_NEW } else { PRESS_SCALE_OLD };
    let humid_scale = if new_scales { HUMID_SCALE_NEW } else { HUMID_SCALE_OLD };

    EnvSample {
        timestamp_ns,
        temperature_c: raw.temp as f64 * TEMP_SCALE,
        pressure_hpa: raw.press as f64 * press_scale,
        humidity_rh: raw.humid as f64 * humid_scale,
        valid: true,
    }
}

/// Apply `TEMP_SCALE` to the camera-die temperatures. Caller gates on
/// `raw.env_validity() == New && raw.camera_temps_valid()`.
pub fn scale_cam_temp(raw: &RawRecord, timestamp_ns: u64) -> CamTempSample {
    CamTempSample {
        timestamp_ns,
        left_c: raw.temp_cam_left as f64 * TEMP_SCALE,
        right_c: raw.temp_cam_right as f64 * TEMP_SCALE,
        valid: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> RawRecord {
        RawRecord {
            frame_sync: 1,
            frame_sync_count: 42,
            imu_not_valid: 0,
            timestamp: 1_000_000,
            g: [100, -200, 300],
            a: [1000, -2000, 3000],
            imu_temp: 2500,
            mag_valid: 1,
            m: [10, 20, 30],
            env_valid: 1,
            temp: 2200,
            press: 10130,
            humid: 4500,
            temp_cam_left: 3000,
            temp_cam_right: 3100,
            sync_capabilities: 1,
        }
    }

    #[test]
    fn round_trip() {
        let r = sample_record();
        let buf = encode(&r);
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded, r);
    }

    #[test]
    fn bad_report_id() {
        let mut buf = encode(&sample_record());
        buf[0] = 0x07;
        assert_eq!(decode(&buf), Err(DecodeError::BadId(0x07)));
    }

    #[test]
    fn short_read() {
        let buf = encode(&sample_record());
        let err = decode(&buf[..10]).unwrap_err();
        assert!(matches!(err, DecodeError::ShortRead { .. }));
    }

    #[test]
    fn camera_temp_sentinel() {
        let mut r = sample_record();
        r.temp_cam_left = TEMP_NOT_VALID;
        assert!(!r.camera_temps_valid());
        r.temp_cam_left = 3000;
        assert!(r.camera_temps_valid());
        r.temp_cam_right = TEMP_NOT_VALID;
        assert!(!r.camera_temps_valid());
    }

    #[test]
    fn mcu_timestamp_scaling() {
        let r = sample_record();
        // 1_000_000 ticks * 39.0625 ns/tick = 39_062_500 ns
        assert_eq!(r.mcu_timestamp_ns(), 39_062_500);
    }

    #[test]
    fn env_scale_selected_by_firmware() {
        let r = sample_record();
        let old_fw = DeviceIdentity {
            product_id: 0,
            firmware_version: 0x0308, // 3.8
        };
        let new_fw = DeviceIdentity {
            product_id: 0,
            firmware_version: 0x030A, // 3.10
        };
        let old_sample = scale_env(&r, &old_fw, 0);
        let new_sample = scale_env(&r, &new_fw, 0);
        assert!((old_sample.pressure_hpa - r.press as f64 * PRESS_SCALE_OLD).abs() < 1e-9);
        assert!((new_sample.pressure_hpa - r.press as f64 * PRESS_SCALE_NEW).abs() < 1e-9);
    }

    #[test]
    fn imu_valid_ignores_mag_cross_assignment() {
        let mut r = sample_record();
        r.imu_not_valid = 0;
        r.mag_valid = 0; // Validity::Old, would taint a cross-wired valid flag
        let imu = scale_imu(&r, 0);
        assert!(imu.valid);
    }
}
