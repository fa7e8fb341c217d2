//! In-process tunable bundle for the acquisition pipeline (§6).
//!
//! There is no configuration-file layer — the original spec is explicit
//! that this subsystem persists no state and reads no config files — but
//! the tunables themselves are still a plain, overridable Rust value rather
//! than baked-in constants, so callers with different hardware revisions
//! can adjust them without forking the crate.

use std::time::Duration;

/// Tunable parameters for the acquisition worker and clock aligner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionConfig {
    /// Iterations between liveness pings (~1s at 400Hz).
    pub ping_interval: u32,
    /// Interrupt-read timeout.
    pub read_timeout: Duration,
    /// Sync-edge pairs buffered before a drift update runs.
    pub drift_window: usize,
    /// Bootstrap-pass threshold selecting the drift-window's discard index.
    pub ntp_adjust_ct: u32,
    /// Inclusive clamp applied to the per-update and compounded drift scale.
    pub scale_clamp: (f64, f64),
    /// Drift updates accumulated before a sync-offset re-alignment.
    pub offset_samples: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            ping_interval: 400,
            read_timeout: Duration::from_millis(500),
            drift_window: 50,
            ntp_adjust_ct: 3,
            scale_clamp: (0.8, 1.2),
            offset_samples: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_tunables() {
        let c = AcquisitionConfig::default();
        assert_eq!(c.ping_interval, 400);
        assert_eq!(c.read_timeout, Duration::from_millis(500));
        assert_eq!(c.drift_window, 50);
        assert_eq!(c.ntp_adjust_ct, 3);
        assert_eq!(c.scale_clamp, (0.8, 1.2));
        assert_eq!(c.offset_samples, 3);
    }
}
