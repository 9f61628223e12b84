//! Durable key-value persistence for mode and tunables (§6.5).
//!
//! Atomically written: a temp file is written next to the destination and
//! renamed into place, so a crash mid-write can never leave a half-written
//! state file, matching `original_source/persistence.py`'s `os.replace`
//! pattern (improved here over the teacher's plain `std::fs::write`, noted
//! in `DESIGN.md`). Corrupt or missing state falls back to defaults with a
//! warning, never a fatal error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::error::Result;
use crate::logging::{get_logger, StructuredLogger};

/// The fields carried by the key-value store, per §6.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentState {
    pub mode: Option<String>,
    pub hysteresis_threshold_a: Option<f64>,
    pub ramp_up_delay_s: Option<f64>,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            mode: None,
            hysteresis_threshold_a: None,
            ramp_up_delay_s: None,
        }
    }
}

pub struct PersistenceManager {
    file_path: PathBuf,
    state: PersistentState,
    logger: StructuredLogger,
}

impl PersistenceManager {
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: PathBuf::from(file_path),
            state: PersistentState::default(),
            logger: get_logger("persistence"),
        }
    }

    /// Load from disk. Missing or corrupt state is not an error: it falls
    /// back to defaults with a warning logged, per §7.
    pub fn load(&mut self) -> Result<()> {
        if !self.file_path.exists() {
            self.logger
                .info("no persistent state file found, using defaults");
            return Ok(());
        }

        let contents = match std::fs::read_to_string(&self.file_path) {
            Ok(c) => c,
            Err(e) => {
                self.logger
                    .warn(&format!("failed to read persistent state, using defaults: {e}"));
                return Ok(());
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => {
                self.state = state;
                self.logger.info("loaded persistent state from disk");
            }
            Err(e) => {
                self.logger.warn(&format!(
                    "persistent state file is corrupt, using defaults: {e}"
                ));
            }
        }
        Ok(())
    }

    /// Write the current state atomically: write to a sibling `.tmp` path,
    /// then rename over the destination.
    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.state)?;
        let tmp_path = Self::tmp_path(&self.file_path);
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.file_path)?;
        self.logger.debug("saved persistent state to disk");
        Ok(())
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    pub fn get_mode(&self) -> Option<Mode> {
        self.state
            .mode
            .as_deref()
            .and_then(|raw| Mode::parse(raw).ok())
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.state.mode = Some(mode.as_str().to_string());
    }

    pub fn get_hysteresis_threshold_a(&self) -> Option<f64> {
        self.state.hysteresis_threshold_a
    }

    pub fn set_hysteresis_threshold_a(&mut self, amps: f64) {
        self.state.hysteresis_threshold_a = Some(amps);
    }

    pub fn get_ramp_up_delay_s(&self) -> Option<f64> {
        self.state.ramp_up_delay_s
    }

    pub fn set_ramp_up_delay_s(&mut self, seconds: f64) {
        self.state.ramp_up_delay_s = Some(seconds);
    }
}
