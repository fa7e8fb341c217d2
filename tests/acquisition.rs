//! End-to-end seed scenarios (original spec §8) driven through the
//! acquisition worker (C5) against a scripted `MockTransport`, exercising
//! the full C1->C2->C3->C4 pipeline without a physical device.

mod support;

use sl_sensor_stream::acquisition::AcquisitionWorker;
use sl_sensor_stream::clock::ClockAligner;
use sl_sensor_stream::config::AcquisitionConfig;
use sl_sensor_stream::registry::SampleRegistry;
use sl_sensor_stream::types::{DeviceIdentity, Validity};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{base_record, MockTransport};

fn identity() -> DeviceIdentity {
    DeviceIdentity {
        product_id: 0x1234,
        firmware_version: 0x0309, // 3.9
    }
}

fn spawn(records: Vec<sl_sensor_stream::protocol::RawRecord>) -> (AcquisitionWorker, Arc<SampleRegistry>, support::MockStats) {
    let (transport, stats) = MockTransport::new(records);
    let registry = Arc::new(SampleRegistry::new());
    let aligner = Arc::new(Mutex::new(ClockAligner::new(AcquisitionConfig::default())));
    let worker = AcquisitionWorker::start(
        transport,
        identity(),
        AcquisitionConfig::default(),
        registry.clone(),
        aligner,
    )
    .expect("worker spawn");
    (worker, registry, stats)
}

#[test]
fn modality_gating() {
    // §8 scenario 4: mag invalid, env new, imu valid, camera temps present
    // -> IMU/Env/CamTemp become fresh, Mag does not.
    let mut bootstrap = base_record(1_000_000);
    bootstrap.sync_capabilities = 0;

    let mut sample = base_record(1_025_600);
    sample.mag_valid = Validity::Invalid as u8;
    sample.env_valid = Validity::New as u8;
    sample.temp_cam_left = 2000;
    sample.temp_cam_right = 2100;

    let (mut worker, registry, _stats) = spawn(vec![bootstrap, sample]);

    let imu = registry.imu.poll(Duration::from_millis(200));
    let env = registry.env.poll(Duration::from_millis(200));
    let cam = registry.cam_temp.poll(Duration::from_millis(200));
    let mag = registry.mag.poll(Duration::from_millis(20));

    assert!(imu.is_some());
    assert!(imu.unwrap().valid);
    assert!(env.is_some());
    assert!(cam.is_some());
    assert!(mag.is_none());

    worker.stop();
}

#[test]
fn camera_temp_suppressed_on_sentinel() {
    let bootstrap = base_record(1_000_000);
    let mut sample = base_record(1_025_600);
    sample.env_valid = Validity::New as u8;
    sample.temp_cam_left = 0x7FFF; // TEMP_NOT_VALID
    sample.temp_cam_right = 2100;

    let (mut worker, registry, _stats) = spawn(vec![bootstrap, sample]);

    let env = registry.env.poll(Duration::from_millis(200));
    assert!(env.is_some());
    let cam = registry.cam_temp.poll(Duration::from_millis(20));
    assert!(cam.is_none());

    worker.stop();
}

#[test]
fn bootstrap_sample_never_published() {
    let bootstrap = base_record(1_000_000);
    let (mut worker, registry, _stats) = spawn(vec![bootstrap]);

    // Only the bootstrap sample was ever fed; nothing should ever publish.
    let imu = registry.imu.poll(Duration::from_millis(50));
    assert!(imu.is_none());

    worker.stop();
}

#[test]
fn imu_timestamps_are_monotone_non_decreasing() {
    let mut records = vec![base_record(1_000_000)]; // bootstrap
    for i in 1..=20u32 {
        records.push(base_record(1_000_000 + i * 25_600));
    }
    let (mut worker, registry, _stats) = spawn(records);

    let mut last = 0u64;
    let mut seen = 0;
    while seen < 20 {
        if let Some(sample) = registry.imu.poll(Duration::from_millis(200)) {
            assert!(sample.timestamp_ns >= last);
            last = sample.timestamp_ns;
            seen += 1;
        } else {
            break;
        }
    }
    assert_eq!(seen, 20);

    worker.stop();
}

#[test]
fn stop_disables_stream_exactly_once_and_join_completes() {
    let records = vec![base_record(1_000_000), base_record(1_025_600)];
    let (mut worker, _registry, stats) = spawn(records);

    // Let the worker publish at least once before stopping.
    std::thread::sleep(Duration::from_millis(20));
    worker.stop();

    let calls = stats.enable_calls.lock().unwrap();
    // enable_stream(true) once at start, enable_stream(false) once at stop.
    assert_eq!(calls.as_slice(), &[true, false]);
}

#[test]
fn stop_is_idempotent() {
    let (mut worker, _registry, _stats) = spawn(vec![base_record(1_000_000)]);
    worker.stop();
    worker.stop(); // must not panic or double-join
}

#[test]
fn poll_times_out_with_no_publisher() {
    let registry = SampleRegistry::new();
    let start = std::time::Instant::now();
    let result = registry.imu.poll(Duration::from_millis(5));
    assert!(result.is_none());
    assert!(start.elapsed() >= Duration::from_millis(5));
}
