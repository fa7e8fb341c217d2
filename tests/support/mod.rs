//! Scripted `SensorTransport` for driving the acquisition pipeline (C1-C4)
//! end-to-end without a physical device attached.

use sl_sensor_stream::hid::SensorTransport;
use sl_sensor_stream::protocol::{self, RawRecord, REPORT_SIZE};
use sl_sensor_stream::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared handle onto a `MockTransport`'s call counters, clonable so a test
/// can inspect them after the transport has been moved into the worker
/// thread.
#[derive(Clone, Default)]
pub struct MockStats {
    pub enable_calls: Arc<Mutex<Vec<bool>>>,
    pub ping_count: Arc<AtomicU32>,
}

pub struct MockTransport {
    frames: VecDeque<[u8; REPORT_SIZE]>,
    stats: MockStats,
}

impl MockTransport {
    pub fn new(records: Vec<RawRecord>) -> (Self, MockStats) {
        let stats = MockStats::default();
        let frames = records.iter().map(frame_from_record).collect();
        (
            Self {
                frames,
                stats: stats.clone(),
            },
            stats,
        )
    }
}

fn frame_from_record(r: &RawRecord) -> [u8; REPORT_SIZE] {
    let mut buf = [0u8; REPORT_SIZE];
    let encoded = protocol::encode(r);
    buf[..encoded.len()].copy_from_slice(&encoded);
    buf
}

impl SensorTransport for MockTransport {
    fn enable_stream(&self, enable: bool) -> Result<()> {
        self.stats.enable_calls.lock().unwrap().push(enable);
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        self.stats.ping_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_sample(&mut self, buf: &mut [u8; REPORT_SIZE], _timeout_ms: i32) -> Result<usize> {
        match self.frames.pop_front() {
            Some(frame) => {
                *buf = frame;
                Ok(REPORT_SIZE)
            }
            // Once the script is exhausted the loop keeps polling until the
            // test calls stop(); a short sleep keeps it from busy-spinning.
            None => {
                std::thread::sleep(Duration::from_millis(2));
                Ok(0)
            }
        }
    }

    fn set_blocking_mode(&mut self, _blocking: bool) -> Result<()> {
        Ok(())
    }
}

/// A `RawRecord` with every field zeroed except what the builder methods
/// below set, matching the "default valid IMU sample, nothing else new"
/// baseline used across the seed scenarios.
pub fn base_record(ticks: u32) -> RawRecord {
    RawRecord {
        frame_sync: 0,
        frame_sync_count: 0,
        imu_not_valid: 0,
        timestamp: ticks,
        g: [0, 0, 0],
        a: [0, 0, 0],
        imu_temp: 0,
        mag_valid: 0,
        m: [0, 0, 0],
        env_valid: 0,
        temp: 0,
        press: 0,
        humid: 0,
        temp_cam_left: 0,
        temp_cam_right: 0,
        sync_capabilities: 0,
    }
}
