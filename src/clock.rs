//! Clock Aligner (C3): maps device-MCU ticks onto the host monotonic clock,
//! estimates and compounds frequency drift against the host clock, and
//! absorbs periodic offset corrections from a paired video collaborator.
//!
//! The aligner is deliberately clock-source-agnostic: callers supply every
//! timestamp reading (`host_now_ns`) rather than the aligner reading a
//! clock itself, so the epoch/elapsed split lives in the acquisition loop
//! and the aligner's update logic stays a pure function of its inputs,
//! directly unit-testable.

use crate::config::AcquisitionConfig;
use std::sync::Arc;

use crate::protocol::TS_SCALE;

/// Read-only observable exposed by the paired video-capture collaborator.
/// The aligner only ever reads `last_frame_timestamp_ns` — ownership stays
/// one-way (video → aligner), per the design notes' "two separate one-way
/// read channels" guidance, avoiding a mutual-ownership cycle between this
/// crate and the video component.
pub trait VideoFrameSource: Send + Sync {
    /// Host-aligned timestamp, in nanoseconds, of the video collaborator's
    /// most recently captured frame.
    fn last_frame_timestamp_ns(&self) -> u64;
}

/// MCU-ticks→host-nanoseconds mapping, drift estimator, and video-offset
/// absorber. Owned exclusively by the acquisition worker (§5: "Aligner
/// state: accessed only by the worker — no external concurrency").
pub struct ClockAligner {
    config: AcquisitionConfig,

    first_sample: bool,
    start_host_ns: u64,
    last_ticks: u32,
    last_mcu_ns: u64,
    rel_mcu_ns: u64,
    ntp_scale: f64,
    sync_offset_ns: i64,

    last_frame_sync_count: u32,
    host_ts: Vec<u64>,
    mcu_ts: Vec<u64>,
    ntp_adjust_count: u32,

    offset_accum: f64,
    offset_accum_count: u32,

    video_source: Option<Arc<dyn VideoFrameSource>>,
}

impl ClockAligner {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self {
            config,
            first_sample: true,
            start_host_ns: 0,
            last_ticks: 0,
            last_mcu_ns: 0,
            rel_mcu_ns: 0,
            ntp_scale: 1.0,
            sync_offset_ns: 0,
            last_frame_sync_count: 0,
            host_ts: Vec::with_capacity(config.drift_window),
            mcu_ts: Vec::with_capacity(config.drift_window),
            ntp_adjust_count: 0,
            offset_accum: 0.0,
            offset_accum_count: 0,
            video_source: None,
        }
    }

    /// Hand the aligner a read-only reference to the paired video
    /// collaborator. `initial_sync_offset_ns` seeds `sync_offset_ns` once,
    /// matching the facade's `enable_sync` handshake (§4.3).
    pub fn set_video_source(&mut self, source: Arc<dyn VideoFrameSource>, initial_sync_offset_ns: i64) {
        self.sync_offset_ns = initial_sync_offset_ns;
        self.video_source = Some(source);
    }

    pub fn ntp_scale(&self) -> f64 {
        self.ntp_scale
    }

    pub fn sync_offset_ns(&self) -> i64 {
        self.sync_offset_ns
    }

    /// Feed one sample's MCU ticks and the host-clock reading taken at the
    /// moment it was received. Returns the host-aligned timestamp to
    /// publish, or `None` on the bootstrap sample (never published, §4.3).
    ///
    /// `imu_not_valid`, `frame_sync`, `frame_sync_count`, and
    /// `sync_capable` are the corresponding fields of the decoded record.
    pub fn observe(
        &mut self,
        ticks: u32,
        host_now_ns: u64,
        imu_not_valid: bool,
        frame_sync: bool,
        frame_sync_count: u32,
        sync_capable: bool,
    ) -> Option<u64> {
        if self.first_sample {
            if imu_not_valid {
                // Bootstrap requires a valid IMU sample to anchor the clock.
                return None;
            }
            self.start_host_ns = host_now_ns;
            self.last_ticks = ticks;
            self.last_mcu_ns = scale_ticks(ticks);
            self.last_frame_sync_count = frame_sync_count;
            self.first_sample = false;
            return None;
        }

        // MCU ticks are a wrapping 32-bit counter; compute the delta in the
        // narrow wrapping domain before widening to nanoseconds, so a wrap
        // mid-stream still yields the correct (small, positive) delta.
        let delta_ticks = ticks.wrapping_sub(self.last_ticks);
        let delta_raw_ns = (delta_ticks as u64 as f64 * TS_SCALE).round() as u64;
        self.last_ticks = ticks;
        self.last_mcu_ns = scale_ticks(ticks);

        self.rel_mcu_ns = self
            .rel_mcu_ns
            .wrapping_add((delta_raw_ns as f64 * self.ntp_scale).round() as u64);

        let aligned_ns = (self.start_host_ns as i128 - self.sync_offset_ns as i128
            + self.rel_mcu_ns as i128)
            .max(0) as u64;

        if sync_capable {
            let is_sync_edge = self.last_frame_sync_count != 0
                && (frame_sync || frame_sync_count > self.last_frame_sync_count);

            if is_sync_edge {
                self.host_ts.push(host_now_ns);
                self.mcu_ts.push(aligned_ns);

                if self.host_ts.len() >= self.config.drift_window {
                    self.run_drift_update(aligned_ns);
                }
            }
        }
        self.last_frame_sync_count = frame_sync_count;

        Some(aligned_ns)
    }

    fn run_drift_update(&mut self, aligned_ns: u64) {
        let window = self.config.drift_window;
        let first_index = if self.ntp_adjust_count <= self.config.ntp_adjust_ct {
            25
        } else {
            5
        };
        let first_index = first_index.min(window - 1);
        let last = window - 1;

        let host_first = self.host_ts[first_index] as f64;
        let host_last = self.host_ts[last] as f64;
        let mcu_first = self.mcu_ts[first_index] as f64;
        let mcu_last = self.mcu_ts[last] as f64;

        let denom = mcu_last - mcu_first;
        if denom != 0.0 {
            let (lo, hi) = self.config.scale_clamp;
            let scale = ((host_last - host_first) / denom).clamp(lo, hi);
            self.ntp_scale = (self.ntp_scale * scale).clamp(lo, hi);

            if let Some(video) = self.video_source.clone() {
                let video_ts = video.last_frame_timestamp_ns();
                self.offset_accum += aligned_ns as f64 - video_ts as f64;
                self.offset_accum_count += 1;

                if self.offset_accum_count >= self.config.offset_samples {
                    let avg = self.offset_accum / self.offset_accum_count as f64;
                    self.sync_offset_ns += avg.round() as i64;
                    self.offset_accum = 0.0;
                    self.offset_accum_count = 0;
                }
            }
        }

        self.host_ts.clear();
        self.mcu_ts.clear();
        self.ntp_adjust_count += 1;
    }
}

fn scale_ticks(ticks: u32) -> u64 {
    (ticks as f64 * TS_SCALE).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedVideo(std::sync::atomic::AtomicU64);
    impl VideoFrameSource for FixedVideo {
        fn last_frame_timestamp_ns(&self) -> u64 {
            self.0.load(std::sync::atomic::Ordering::Relaxed)
        }
    }

    #[test]
    fn bootstrap_sample_is_never_published() {
        let mut aligner = ClockAligner::new(AcquisitionConfig::default());
        let result = aligner.observe(1_000_000, 5_000_000_000, false, false, 0, false);
        assert!(result.is_none());
    }

    #[test]
    fn bootstrap_drops_invalid_imu_samples() {
        let mut aligner = ClockAligner::new(AcquisitionConfig::default());
        assert!(aligner.observe(1_000_000, 1, true, false, 0, false).is_none());
        // Still bootstrapping: the next valid sample anchors the clock.
        assert!(aligner.observe(1_025_600, 2, false, false, 0, false).is_none());
        let aligned = aligner.observe(1_051_200, 3, false, false, 0, false).unwrap();
        assert_eq!(aligned, 2 + 1_000_000);
    }

    #[test]
    fn bootstrap_timing_scenario() {
        // Δticks = 25_600 -> 25_600 * 39.0625ns = 1_000_000ns = 1ms.
        let mut aligner = ClockAligner::new(AcquisitionConfig::default());
        let host_epoch = 10_000_000_000u64;

        assert!(aligner
            .observe(1_000_000, host_epoch, false, false, 0, false)
            .is_none());

        let second = aligner
            .observe(1_025_600, host_epoch, false, false, 0, false)
            .unwrap();
        assert_eq!(second, host_epoch + 1_000_000);

        let third = aligner
            .observe(1_051_200, host_epoch, false, false, 0, false)
            .unwrap();
        assert_eq!(third, host_epoch + 2_000_000);
    }

    // A sync edge requires `last_frame_sync_count != 0`, so the very first
    // post-bootstrap sample can never register as one. Every test below
    // feeds one throwaway sample right after bootstrap to prime that field
    // before counting edges.
    fn prime(aligner: &mut ClockAligner) {
        aligner.observe(0, 0, false, false, 0, true); // bootstrap
        aligner.observe(0, 0, false, false, 1, true); // primes last_frame_sync_count
    }

    #[test]
    fn drift_update_requires_full_window() {
        let mut aligner = ClockAligner::new(AcquisitionConfig::default());
        prime(&mut aligner);
        for i in 1..=49u32 {
            aligner.observe(i * 1000, i as u64 * 1000, false, true, i + 1, true);
        }
        // Only 49 sync edges buffered so far (window is 50) -> untouched.
        assert_eq!(aligner.ntp_scale(), 1.0);
    }

    #[test]
    fn drift_correction_applies_ratio() {
        let mut aligner = ClockAligner::new(AcquisitionConfig::default());
        prime(&mut aligner);

        // 50 sync edges: host advances 10% faster than the MCU-derived
        // aligned timestamp (host_ns = mcu_ns * 1.1).
        for i in 1..=50u32 {
            let mcu_ns_equiv = (i as f64 * 1000.0) / TS_SCALE; // ticks s.t. scale_ticks ~ i*1000
            let ticks = mcu_ns_equiv.round() as u32;
            let host_ns = (i as u64) * 1100;
            aligner.observe(ticks, host_ns, false, true, i + 1, true);
        }

        assert!((aligner.ntp_scale() - 1.1).abs() < 0.01);

        // Next 50 edges at a 1:1 ratio: compounding with scale=1.0 leaves
        // ntp_scale unchanged.
        let base_host = 50u64 * 1100;
        for i in 1..=50u32 {
            let mcu_ns_equiv = ((50 + i) as f64 * 1000.0) / TS_SCALE;
            let ticks = mcu_ns_equiv.round() as u32;
            let host_ns = base_host + (i as u64) * (1100.0 / 1.1).round() as u64;
            aligner.observe(ticks, host_ns, false, true, 50 + i + 1, true);
        }
        assert!((aligner.ntp_scale() - 1.1).abs() < 0.02);
    }

    #[test]
    fn drift_ratio_is_clamped() {
        let mut aligner = ClockAligner::new(AcquisitionConfig::default());
        prime(&mut aligner);

        for i in 1..=50u32 {
            let mcu_ns_equiv = (i as f64 * 1000.0) / TS_SCALE;
            let ticks = mcu_ns_equiv.round() as u32;
            let host_ns = (i as u64) * 2000; // 2x ratio, should clamp to 1.2
            aligner.observe(ticks, host_ns, false, true, i + 1, true);
        }

        assert!((aligner.ntp_scale() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn sync_offset_updates_after_three_drift_passes() {
        let mut aligner = ClockAligner::new(AcquisitionConfig::default());
        let video = Arc::new(FixedVideo(std::sync::atomic::AtomicU64::new(0)));
        aligner.set_video_source(video, 0);

        prime(&mut aligner);
        for pass in 0..3u32 {
            for i in 1..=50u32 {
                let n = pass * 50 + i;
                let ticks = ((n as f64 * 1000.0) / TS_SCALE).round() as u32;
                let host_ns = (n as u64) * 1000;
                aligner.observe(ticks, host_ns, false, true, n + 1, true);
            }
        }
        // Video stayed at timestamp 0 while aligned_ns grew, so the
        // running offset should now be non-zero.
        assert_ne!(aligner.sync_offset_ns(), 0);
    }
}
