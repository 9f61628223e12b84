//! Mode/parameter controller (§4.H).
//!
//! Mode, the enable flag, and the tunables are mutated from the operator
//! surface (a different task than the control loop) and read once per tick
//! by the engine. Modeled as a single record behind a `tokio::sync::watch`
//! channel, following the teacher's `watch::Sender<DriverState>` pattern in
//! `driver/runtime.rs` -- the control loop borrows a snapshot via
//! `borrow()`, never blocking on the operator task.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::config::{Config, Mode, Tunables};
use crate::constants::{
    HYSTERESIS_THRESHOLD_MAX_A, HYSTERESIS_THRESHOLD_MIN_A, RAMP_UP_DELAY_MAX_S,
    RAMP_UP_DELAY_MIN_S,
};
use crate::error::{LoadCtlError, Result};
use crate::logging::get_logger;
use crate::persistence::PersistenceManager;

/// The slice of configuration the engine reads once per tick.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub mode: Mode,
    pub enable_charging: bool,
    pub tunables: Tunables,
}

impl ControllerState {
    fn from_config(config: &Config) -> Self {
        Self {
            mode: config.mode,
            enable_charging: config.enable_charging,
            tunables: config.tunables.clone(),
        }
    }
}

/// Operator-facing setters. Accepted changes are validated, applied,
/// persisted, and visible to the control loop no later than its next tick.
pub struct ModeController {
    tx: watch::Sender<ControllerState>,
    persistence: Arc<Mutex<PersistenceManager>>,
}

impl ModeController {
    /// Build a controller seeded from `config`, with any persisted
    /// overrides (mode, hysteresis_threshold_a, ramp_up_delay_s) applied on
    /// top per §6.5.
    pub fn new(config: &Config, persistence: Arc<Mutex<PersistenceManager>>) -> Self {
        let mut state = ControllerState::from_config(config);
        {
            // Uncontended at startup: the controller is the first owner of
            // this handle, so a non-blocking lock always succeeds here.
            if let Ok(persisted) = persistence.try_lock() {
                if let Some(mode) = persisted.get_mode() {
                    state.mode = mode;
                }
                if let Some(threshold) = persisted.get_hysteresis_threshold_a() {
                    state.tunables.hysteresis_threshold_a = threshold;
                }
                if let Some(delay) = persisted.get_ramp_up_delay_s() {
                    state.tunables.ramp_up_delay_s = delay;
                }
            }
        }
        let (tx, _rx) = watch::channel(state);
        Self { tx, persistence }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ControllerState {
        self.tx.borrow().clone()
    }

    pub async fn set_mode(&self, raw: &str) -> Result<Mode> {
        let logger = get_logger("controller");
        let mode = match Mode::parse(raw) {
            Ok(m) => m,
            Err(e) => {
                logger.warn(&format!("rejected mode change: {e}"));
                return Err(e);
            }
        };
        self.tx.send_modify(|s| s.mode = mode);
        let mut persistence = self.persistence.lock().await;
        persistence.set_mode(mode);
        persistence.save()?;
        logger.info(&format!("mode set to {}", mode.as_str()));
        Ok(mode)
    }

    pub async fn set_enable_charging(&self, enabled: bool) {
        self.tx.send_modify(|s| s.enable_charging = enabled);
        get_logger("controller").info(&format!("enable_charging set to {enabled}"));
    }

    pub async fn set_hysteresis_threshold(&self, amps: f64) -> Result<()> {
        let logger = get_logger("controller");
        if !(HYSTERESIS_THRESHOLD_MIN_A..=HYSTERESIS_THRESHOLD_MAX_A).contains(&amps) {
            let e = LoadCtlError::validation(
                "hysteresis_threshold_a",
                &format!(
                    "must be between {HYSTERESIS_THRESHOLD_MIN_A} and {HYSTERESIS_THRESHOLD_MAX_A}"
                ),
            );
            logger.warn(&format!("rejected tunable change: {e}"));
            return Err(e);
        }
        self.tx.send_modify(|s| s.tunables.hysteresis_threshold_a = amps);
        let mut persistence = self.persistence.lock().await;
        persistence.set_hysteresis_threshold_a(amps);
        persistence.save()?;
        logger.info(&format!("hysteresis_threshold_a set to {amps}"));
        Ok(())
    }

    pub async fn set_ramp_up_delay(&self, seconds: f64) -> Result<()> {
        let logger = get_logger("controller");
        if !(RAMP_UP_DELAY_MIN_S..=RAMP_UP_DELAY_MAX_S).contains(&seconds) {
            let e = LoadCtlError::validation(
                "ramp_up_delay_s",
                &format!("must be between {RAMP_UP_DELAY_MIN_S} and {RAMP_UP_DELAY_MAX_S}"),
            );
            logger.warn(&format!("rejected tunable change: {e}"));
            return Err(e);
        }
        self.tx.send_modify(|s| s.tunables.ramp_up_delay_s = seconds);
        let mut persistence = self.persistence.lock().await;
        persistence.set_ramp_up_delay_s(seconds);
        persistence.save()?;
        logger.info(&format!("ramp_up_delay_s set to {seconds}"));
        Ok(())
    }
}
