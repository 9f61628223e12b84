//! Named constants for the allocation engine, tracker, and estimator.
//!
//! Mirrors `original_source/const.py`: the values the Python add-on keeps as
//! module-level magic numbers are kept here as typed `pub const` items instead
//! so call sites read `MIN_STATION_CURRENT_A` rather than a bare `6.0`.

/// Minimum current (A) a station may be allocated while still charging.
/// Below this the station is paused instead (see Step 4 of `allocation.rs`).
pub const MIN_STATION_CURRENT_A: f64 = 6.0;

/// Maximum increase (A) in a station's allocation allowed in a single tick,
/// once that station has already received a non-zero allocation at least
/// once. A station's very first ramp from zero is exempt from this cap.
pub const MAX_RAMP_UP_STEP_A: f64 = 4.0;

/// Width (s) of the PV surplus rolling sample window used for cloud
/// detection.
pub const CLOUD_DETECTION_WINDOW_S: f64 = 60.0;

/// Sample variance (W^2) of the PV window above which the estimator
/// considers the feed cloudy and falls back to the conservative (minimum)
/// estimate instead of the nominal (latest) one.
pub const CLOUD_DETECTION_VARIANCE_THRESHOLD_W2: f64 = 500.0;

/// Seconds since the last PV update after which the feed is considered
/// stale and surplus is treated as zero.
pub const PV_STALE_TIMEOUT_S: f64 = 60.0;

/// Tolerance (A) below which a difference between a station's actual draw
/// and its allocation is treated as measurement jitter rather than real
/// under-draw, used throughout the overbooking-reclaim step.
pub const ACTUAL_TOLERANCE_A: f64 = 1.0;

/// Current (A) left on a reclaiming station above its actual draw, so a
/// station that donates slack keeps a small buffer rather than being pinned
/// exactly to its instantaneous measurement.
pub const SLACK_BUFFER_A: f64 = 0.5;

/// Number of passes the overbooking-reclaim step performs per tick.
pub const OVERBOOKING_ITERATIONS: usize = 3;

/// Headroom (A) below `total_current_limit_a` the emergency scale-down step
/// protects: it engages once aggregate actual draw exceeds
/// `total_current_limit_a - SAFETY_MARGIN_A`.
pub const SAFETY_MARGIN_A: f64 = 2.0;

/// Default total current limit (A) used when a budget config omits one.
pub const DEFAULT_TOTAL_CURRENT_LIMIT_A: u32 = 32;

/// Default mains voltage (V) used when a budget config omits one.
pub const DEFAULT_VOLTAGE_V: u32 = 230;

/// Minimum number of PV samples in the rolling window required before the
/// cloud detector will report anything other than "not cloudy".
pub const MIN_CLOUD_SAMPLES: usize = 3;

/// Multiple of `measurement_interval_s` a station may go without a telemetry
/// update before the tracker considers it stale and demotes it to Offline.
/// The spec requires only ">= measurement_interval"; a small multiple (3x)
/// is the implementation's documented choice (see `DESIGN.md`).
pub const LIVENESS_WINDOW_MULTIPLIER: f64 = 3.0;

/// Default hysteresis threshold (A), used when neither config nor persisted
/// state supplies one.
pub const DEFAULT_HYSTERESIS_THRESHOLD_A: f64 = 2.0;

/// Default hysteresis delay (s) a charging station is held at the minimum
/// current before being dropped to zero.
pub const DEFAULT_HYSTERESIS_DELAY_S: f64 = 60.0;

/// Default ramp-up delay (s) between successive allocation increases.
pub const DEFAULT_RAMP_UP_DELAY_S: f64 = 30.0;

/// Default measurement interval (s) between ticks.
pub const DEFAULT_MEASUREMENT_INTERVAL_S: f64 = 10.0;

/// Bounds accepted by `set_hysteresis_threshold`.
pub const HYSTERESIS_THRESHOLD_MIN_A: f64 = 0.0;
pub const HYSTERESIS_THRESHOLD_MAX_A: f64 = 20.0;

/// Bounds accepted by `set_ramp_up_delay`.
pub const RAMP_UP_DELAY_MIN_S: f64 = 0.0;
pub const RAMP_UP_DELAY_MAX_S: f64 = 300.0;
