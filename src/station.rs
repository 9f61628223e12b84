//! Per-station state machine, liveness tracking, and eligibility rules.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::LIVENESS_WINDOW_MULTIPLIER;

/// Immutable per-station identity. The core treats address tokens as opaque
/// strings; only the command dispatcher's transport implementation
/// interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: String,
    pub name: String,
    /// Opaque address token(s) a transport uses to reach the charger and
    /// read its telemetry (e.g. an MQTT topic prefix or a REST base URL).
    pub address: String,
}

/// Lifecycle state of a station, derived from raw telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationState {
    Offline,
    NotConnected,
    Idle,
    Charging,
    Paused,
    Error,
}

impl StationState {
    /// Map a raw status string per the recognized table. Case-insensitive,
    /// exact match; anything unrecognized maps to `Offline`.
    pub fn from_status_str(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "active" | "sleeping" => StationState::Idle,
            "charging" => StationState::Charging,
            "disabled" => StationState::Paused,
            "not connected" => StationState::NotConnected,
            "error" => StationState::Error,
            _ => StationState::Offline,
        }
    }

    /// The string published on the operator status surface (§6.3).
    pub fn status_str(&self) -> &'static str {
        match self {
            StationState::Error => "error",
            StationState::Offline => "offline",
            _ => "running",
        }
    }
}

/// Live per-station record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationStatus {
    pub actual_current_a: f64,
    pub state: StationState,
    pub vehicle_connected: bool,
    pub last_seen: f64,
    /// Rounded-integer amps of the last setpoint actually dispatched.
    /// `None` before the first command is ever sent to this station.
    pub last_setpoint_sent_a: Option<i64>,
    /// Output of the previous tick's allocation pipeline for this station.
    pub last_allocation_a: f64,
    pub last_ramp_up_at: f64,
    pub pause_pending_since: Option<f64>,
    /// Accepted and bookkept per §4.B, never consumed by the allocation
    /// engine. Surfaced for observability only.
    pub session_energy_wh: Option<f64>,
}

impl StationStatus {
    fn new(now: f64) -> Self {
        Self {
            actual_current_a: 0.0,
            state: StationState::Offline,
            vehicle_connected: false,
            last_seen: now,
            last_setpoint_sent_a: None,
            last_allocation_a: 0.0,
            last_ramp_up_at: now,
            pause_pending_since: None,
            session_energy_wh: None,
        }
    }

    /// Eligible for allocation this tick iff connected and in a state the
    /// pipeline may charge.
    pub fn is_eligible(&self) -> bool {
        self.vehicle_connected
            && matches!(
                self.state,
                StationState::Idle | StationState::Charging | StationState::Paused
            )
    }
}

/// Holds the full known station set and applies telemetry/liveness updates.
/// Created at startup from configuration, torn down only at shutdown.
pub struct StationTracker {
    configs: HashMap<String, StationConfig>,
    statuses: HashMap<String, StationStatus>,
}

impl StationTracker {
    pub fn new(configs: Vec<StationConfig>, now: f64) -> Self {
        let mut statuses = HashMap::with_capacity(configs.len());
        let mut by_id = HashMap::with_capacity(configs.len());
        for cfg in configs {
            statuses.insert(cfg.id.clone(), StationStatus::new(now));
            by_id.insert(cfg.id.clone(), cfg);
        }
        Self {
            configs: by_id,
            statuses,
        }
    }

    pub fn config(&self, id: &str) -> Option<&StationConfig> {
        self.configs.get(id)
    }

    pub fn status(&self, id: &str) -> Option<&StationStatus> {
        self.statuses.get(id)
    }

    pub fn all_ids(&self) -> impl Iterator<Item = &String> {
        self.configs.keys()
    }

    pub fn statuses(&self) -> &HashMap<String, StationStatus> {
        &self.statuses
    }

    pub fn statuses_mut(&mut self) -> &mut HashMap<String, StationStatus> {
        &mut self.statuses
    }

    /// Stations eligible for allocation this tick, per §4.C.
    pub fn active_stations(&self) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|(_, status)| status.is_eligible())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Apply a current-draw reading, updating `last_seen`.
    pub fn apply_actual_current(&mut self, id: &str, amps: f64, now: f64) {
        if let Some(status) = self.statuses.get_mut(id) {
            status.actual_current_a = amps.max(0.0);
            status.last_seen = now;
        }
    }

    /// Apply a status-string reading, updating `last_seen`.
    pub fn apply_status(&mut self, id: &str, raw_status: &str, now: f64) {
        if let Some(status) = self.statuses.get_mut(id) {
            let new_state = StationState::from_status_str(raw_status);
            if status.state == StationState::Charging && new_state != StationState::Charging {
                status.pause_pending_since = None;
            }
            status.state = new_state;
            status.last_seen = now;
        }
    }

    /// Apply a vehicle-connected reading, updating `last_seen`.
    pub fn apply_vehicle_connected(&mut self, id: &str, connected: bool, now: f64) {
        if let Some(status) = self.statuses.get_mut(id) {
            status.vehicle_connected = connected;
            status.last_seen = now;
        }
    }

    /// Bookkeeping-only field, never consumed by the allocation engine.
    pub fn apply_session_energy(&mut self, id: &str, wh: f64, now: f64) {
        if let Some(status) = self.statuses.get_mut(id) {
            status.session_energy_wh = Some(wh);
            status.last_seen = now;
        }
    }

    /// Bookkeeping-only field (pilot current), updates `last_seen` like any
    /// other accepted sample per §4.B.
    pub fn apply_pilot_current(&mut self, id: &str, _amps: f64, now: f64) {
        if let Some(status) = self.statuses.get_mut(id) {
            status.last_seen = now;
        }
    }

    /// Demote any station that has gone silent past its liveness window to
    /// `Offline`. Called once at the top of each tick, before allocation.
    pub fn check_liveness(&mut self, now: f64, measurement_interval_s: f64) {
        let window = measurement_interval_s * LIVENESS_WINDOW_MULTIPLIER;
        for status in self.statuses.values_mut() {
            if status.state != StationState::Offline && now - status.last_seen > window {
                status.state = StationState::Offline;
            }
        }
    }
}
