//! Latest-Sample Registry (C4): a per-modality single-slot "newest value"
//! store with bounded-timeout polling.
//!
//! Each cell is a `crossbeam_channel::bounded(1)` rather than a hand-rolled
//! mutex + condvar: a publish drains any stale, unread value before sending
//! the new one, so the channel only ever holds the freshest sample, and
//! `recv_timeout` gives pollers the bounded wait for free.

use crate::types::{CamTempSample, EnvSample, ImuSample, MagSample};
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

/// Single-slot "freshest value" cell for one modality.
pub struct LatestCell<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> LatestCell<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    /// Overwrite the slot with `value`, discarding whatever was there
    /// (even if a consumer hadn't read it yet).
    pub fn publish(&self, value: T) {
        let _ = self.rx.try_recv();
        // The slot is now empty (or was already), so this send cannot
        // block: capacity is exactly 1 and we just drained it.
        let _ = self.tx.try_send(value);
    }

    /// Wait up to `timeout` for a fresh value. Returns `None` on timeout.
    /// Never returns the same value twice: a successful poll removes it
    /// from the slot.
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl<T> Default for LatestCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The four independent modality cells the acquisition worker publishes
/// into and the facade polls from.
pub struct SampleRegistry {
    pub imu: LatestCell<ImuSample>,
    pub mag: LatestCell<MagSample>,
    pub env: LatestCell<EnvSample>,
    pub cam_temp: LatestCell<CamTempSample>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self {
            imu: LatestCell::new(),
            mag: LatestCell::new(),
            env: LatestCell::new(),
            cam_temp: LatestCell::new(),
        }
    }
}

impl Default for SampleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_times_out_when_empty() {
        let cell: LatestCell<u32> = LatestCell::new();
        assert_eq!(cell.poll(Duration::from_millis(1)), None);
    }

    #[test]
    fn poll_returns_published_value_once() {
        let cell = LatestCell::new();
        cell.publish(42u32);
        assert_eq!(cell.poll(Duration::from_millis(10)), Some(42));
        assert_eq!(cell.poll(Duration::from_millis(1)), None);
    }

    #[test]
    fn publish_overwrites_unread_value() {
        let cell = LatestCell::new();
        cell.publish(1u32);
        cell.publish(2u32);
        // Only the newest value is retained; the stale 1 is discarded.
        assert_eq!(cell.poll(Duration::from_millis(10)), Some(2));
        assert_eq!(cell.poll(Duration::from_millis(1)), None);
    }

    #[test]
    fn modalities_are_independent() {
        let registry = SampleRegistry::new();
        registry.env.publish(EnvSample {
            timestamp_ns: 1,
            temperature_c: 20.0,
            pressure_hpa: 1000.0,
            humidity_rh: 40.0,
            valid: true,
        });
        // Env became fresh; mag was untouched and still times out.
        assert!(registry.env.poll(Duration::from_millis(10)).is_some());
        assert!(registry.mag.poll(Duration::from_millis(1)).is_none());
    }
}
