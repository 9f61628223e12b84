//! Command dispatcher: debounces setpoints and emits station commands.
//!
//! Behind a `StationTransport` trait, mirroring the teacher's
//! `driver/modbus_like.rs` `ModbusLike` boundary -- a small object-safe
//! async trait isolating the core from the concrete transport. Ships a
//! `LoggingTransport` that logs and records every command, suitable for
//! tests and as the default runtime transport absent a real backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::logging::get_logger;
use crate::station::StationTracker;

/// The three logical commands of §6.2, plus the `Enable` companion to
/// `SetCurrent` that §4.F's prose implies alongside the rounded setpoint
/// (reconciled against §6.2's three-command count in `DESIGN.md`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationCommand {
    SetCurrent(i64),
    Enable,
    Pause,
    Release,
}

/// Transport boundary the core depends on. A real deployment plugs in an
/// MQTT/REST implementation here; the core never depends on the concrete
/// transport.
#[async_trait]
pub trait StationTransport: Send + Sync {
    async fn send(&self, station_id: &str, command: StationCommand) -> Result<()>;
}

/// Default transport: logs and records every command it is asked to send.
/// Used in tests and as the runtime default absent a real backend.
#[derive(Default)]
pub struct LoggingTransport {
    sent: Mutex<Vec<(String, StationCommand)>>,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_commands(&self) -> Vec<(String, StationCommand)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl StationTransport for LoggingTransport {
    async fn send(&self, station_id: &str, command: StationCommand) -> Result<()> {
        get_logger("dispatcher").info(&format!("{station_id} <- {command:?}"));
        self.sent.lock().unwrap().push((station_id.to_string(), command));
        Ok(())
    }
}

/// Translates an allocation vector into outgoing commands, suppressing
/// redundant sends per §4.F and §P7.
pub struct CommandDispatcher {
    transport: Box<dyn StationTransport>,
}

impl CommandDispatcher {
    pub fn new(transport: Box<dyn StationTransport>) -> Self {
        Self { transport }
    }

    /// Dispatch one tick's allocation. `tracker` is mutated to record
    /// `last_setpoint_sent_a` for the debounce check. All station commands
    /// are issued before this call returns, matching the "issued before the
    /// tick publishes its summary" ordering of §4.F.
    pub async fn dispatch(&self, tracker: &mut StationTracker, alloc: &HashMap<String, f64>) {
        for (id, amps) in alloc {
            let rounded = amps.round() as i64;
            let already_sent = tracker.status(id).and_then(|s| s.last_setpoint_sent_a);
            if already_sent == Some(rounded) {
                continue;
            }

            let result = if rounded < crate::constants::MIN_STATION_CURRENT_A as i64 {
                self.transport.send(id, StationCommand::Pause).await
            } else {
                let set_result = self
                    .transport
                    .send(id, StationCommand::SetCurrent(rounded))
                    .await;
                if set_result.is_ok() {
                    self.transport.send(id, StationCommand::Enable).await
                } else {
                    set_result
                }
            };

            if let Err(e) = result {
                get_logger("dispatcher").warn(&format!("failed to dispatch to {id}: {e}"));
                continue;
            }

            if let Some(status) = tracker.statuses_mut().get_mut(id) {
                status.last_setpoint_sent_a = Some(rounded);
            }
        }
    }

    /// Release every known station regardless of debounce state, per the
    /// shutdown sequence of §4.F/§5.
    pub async fn release_all(&self, tracker: &StationTracker) {
        for id in tracker.all_ids() {
            if let Err(e) = self.transport.send(id, StationCommand::Release).await {
                get_logger("dispatcher").warn(&format!("failed to release {id}: {e}"));
            }
        }
    }

    /// Emit a pause command for every known station, used on the
    /// enable-flag disabled transition (§4.G step 1), clearing debounce
    /// state so re-enabling always re-sends a fresh setpoint.
    pub async fn pause_all(&self, tracker: &mut StationTracker) {
        let ids: Vec<String> = tracker.all_ids().cloned().collect();
        for id in ids {
            if let Err(e) = self.transport.send(&id, StationCommand::Pause).await {
                get_logger("dispatcher").warn(&format!("failed to pause {id}: {e}"));
                continue;
            }
            if let Some(status) = tracker.statuses_mut().get_mut(&id) {
                status.last_setpoint_sent_a = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::StationConfig;
    use std::sync::Arc;

    fn tracker_with(id: &str) -> StationTracker {
        StationTracker::new(
            vec![StationConfig {
                id: id.to_string(),
                name: id.to_string(),
                address: "addr".to_string(),
            }],
            0.0,
        )
    }

    #[tokio::test]
    async fn debounce_suppresses_repeat_setpoint() {
        let transport = Arc::new(LoggingTransport::new());
        let dispatcher = CommandDispatcher::new(Box::new(LoggingTransportHandle(transport.clone())));
        let mut tracker = tracker_with("s1");

        let mut alloc = HashMap::new();
        alloc.insert("s1".to_string(), 16.0);
        dispatcher.dispatch(&mut tracker, &alloc).await;
        dispatcher.dispatch(&mut tracker, &alloc).await;

        let sent = transport.sent_commands();
        let set_current_count = sent
            .iter()
            .filter(|(_, c)| matches!(c, StationCommand::SetCurrent(_)))
            .count();
        assert_eq!(set_current_count, 1, "second identical send must be suppressed");
    }

    #[tokio::test]
    async fn below_min_current_emits_pause() {
        let transport = Arc::new(LoggingTransport::new());
        let dispatcher = CommandDispatcher::new(Box::new(LoggingTransportHandle(transport.clone())));
        let mut tracker = tracker_with("s1");

        let mut alloc = HashMap::new();
        alloc.insert("s1".to_string(), 0.0);
        dispatcher.dispatch(&mut tracker, &alloc).await;

        let sent = transport.sent_commands();
        assert!(sent.iter().any(|(_, c)| *c == StationCommand::Pause));
    }

    #[tokio::test]
    async fn release_all_ignores_debounce_state() {
        let transport = Arc::new(LoggingTransport::new());
        let dispatcher = CommandDispatcher::new(Box::new(LoggingTransportHandle(transport.clone())));
        let tracker = tracker_with("s1");

        dispatcher.release_all(&tracker).await;
        dispatcher.release_all(&tracker).await;

        let sent = transport.sent_commands();
        let release_count = sent
            .iter()
            .filter(|(_, c)| *c == StationCommand::Release)
            .count();
        assert_eq!(release_count, 2, "release must never be debounced");
    }

    struct LoggingTransportHandle(Arc<LoggingTransport>);

    #[async_trait]
    impl StationTransport for LoggingTransportHandle {
        async fn send(&self, station_id: &str, command: StationCommand) -> Result<()> {
            self.0.send(station_id, command).await
        }
    }
}
