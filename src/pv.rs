//! PV surplus estimator with variance-based cloud detection.
//!
//! Grounded on the teacher's `driver/pv.rs` excess-power computation
//! (generalized here from a single Victron D-Bus reading to an
//! ingress-fed rolling window) and on the variance-based cloud detector in
//! `original_source/load_manager.py`. Variance uses the unbiased (n-1)
//! estimator, unlike the Python original's population variance.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CLOUD_DETECTION_VARIANCE_THRESHOLD_W2, CLOUD_DETECTION_WINDOW_S, MIN_CLOUD_SAMPLES,
    PV_STALE_TIMEOUT_S,
};

/// A single PV surplus observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PvSample {
    pub surplus_w: f64,
    pub t: f64,
}

/// Rolling PV surplus state: latest reading plus a bounded history used for
/// cloud detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvData {
    pub surplus_w: f64,
    /// Monotonic seconds of the last update; 0 means never updated.
    pub last_update: f64,
    history: VecDeque<PvSample>,
}

impl Default for PvData {
    fn default() -> Self {
        Self {
            surplus_w: 0.0,
            last_update: 0.0,
            history: VecDeque::new(),
        }
    }
}

impl PvData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a raw grid-import-power reading. Positive means importing from
    /// the grid; negative means exporting (surplus). `surplus_w =
    /// max(0, -raw_w)`.
    pub fn apply_grid_import_w(&mut self, raw_w: f64, now: f64) {
        let surplus = (-raw_w).max(0.0);
        self.surplus_w = surplus;
        self.last_update = now;
        self.history.push_back(PvSample { surplus_w: surplus, t: now });
        self.evict_before(now - CLOUD_DETECTION_WINDOW_S);
    }

    fn evict_before(&mut self, cutoff: f64) {
        while let Some(front) = self.history.front() {
            if front.t < cutoff {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn history(&self) -> &VecDeque<PvSample> {
        &self.history
    }

    pub fn is_stale(&self, now: f64) -> bool {
        self.last_update == 0.0 || now - self.last_update > PV_STALE_TIMEOUT_S
    }

    /// Unbiased (n-1) sample variance of the window's surplus values.
    /// Returns `None` if it cannot be computed (fewer than 2 samples).
    fn sample_variance(&self) -> Option<f64> {
        let n = self.history.len();
        if n < 2 {
            return None;
        }
        let mean: f64 = self.history.iter().map(|s| s.surplus_w).sum::<f64>() / n as f64;
        let sum_sq_dev: f64 = self
            .history
            .iter()
            .map(|s| (s.surplus_w - mean).powi(2))
            .sum();
        Some(sum_sq_dev / (n as f64 - 1.0))
    }

    pub fn is_cloudy(&self) -> bool {
        if self.history.len() < MIN_CLOUD_SAMPLES {
            return false;
        }
        match self.sample_variance() {
            Some(variance) => variance > CLOUD_DETECTION_VARIANCE_THRESHOLD_W2,
            None => false,
        }
    }

    fn conservative_estimate_w(&self) -> f64 {
        self.history
            .iter()
            .map(|s| s.surplus_w)
            .fold(f64::INFINITY, f64::min)
            .max(0.0)
    }

    fn nominal_estimate_w(&self) -> f64 {
        self.surplus_w.max(0.0)
    }

    /// Decision per the estimator design: stale => 0; cloudy => window
    /// minimum; else => latest nominal reading. Result is a nonnegative
    /// current (A).
    pub fn available_current_a(&self, now: f64, watts_per_amp: f64) -> f64 {
        if self.is_stale(now) {
            return 0.0;
        }
        let watts = if self.is_cloudy() {
            self.conservative_estimate_w()
        } else {
            self.nominal_estimate_w()
        };
        (watts / watts_per_amp).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATTS_PER_AMP: f64 = 230.0;

    #[test]
    fn stale_with_no_updates_ever() {
        let pv = PvData::new();
        assert!(pv.is_stale(1000.0));
        assert_eq!(pv.available_current_a(1000.0, WATTS_PER_AMP), 0.0);
    }

    #[test]
    fn nominal_estimate_used_when_not_cloudy() {
        let mut pv = PvData::new();
        pv.apply_grid_import_w(-7000.0, 0.0);
        assert!(!pv.is_cloudy());
        let amps = pv.available_current_a(0.0, WATTS_PER_AMP);
        assert!((amps - 30.434).abs() < 0.01, "amps was {amps}");
    }

    #[test]
    fn cloudy_window_falls_back_to_minimum() {
        let mut pv = PvData::new();
        // Matches scenario 4: high-variance window.
        for (i, w) in [2000.0, 2500.0, 1000.0, 2800.0, 500.0, 3000.0]
            .into_iter()
            .enumerate()
        {
            pv.apply_grid_import_w(-w, i as f64 * 10.0);
        }
        assert!(pv.is_cloudy());
        let amps = pv.available_current_a(50.0, WATTS_PER_AMP);
        assert!((amps - 500.0 / WATTS_PER_AMP).abs() < 0.01);
    }

    #[test]
    fn samples_outside_window_are_evicted() {
        let mut pv = PvData::new();
        pv.apply_grid_import_w(-1000.0, 0.0);
        pv.apply_grid_import_w(-1000.0, 30.0);
        pv.apply_grid_import_w(-1000.0, 61.0);
        assert_eq!(pv.history().len(), 2);
    }

    #[test]
    fn stale_after_timeout_since_last_update() {
        let mut pv = PvData::new();
        pv.apply_grid_import_w(-1000.0, 0.0);
        assert!(!pv.is_stale(59.0));
        assert!(pv.is_stale(61.0));
    }

    #[test]
    fn variance_is_none_below_two_samples() {
        let mut pv = PvData::new();
        pv.apply_grid_import_w(-1000.0, 0.0);
        assert_eq!(pv.sample_variance(), None);
        assert!(!pv.is_cloudy());
    }
}
