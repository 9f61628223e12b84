//! Control loop: orchestrates ingress -> allocation -> dispatch each tick
//! (§4.G), grounded on the teacher's `driver/runtime.rs` /
//! `driver/runtime_arc.rs` pattern -- a `tokio::time::interval`-driven loop
//! owning the mutable core state directly, publishing a `watch` snapshot of
//! the latest tick summary for the HTTP surface to read without blocking
//! the tick.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::allocation::{self, AllocationResult};
use crate::clock::Clock;
use crate::config::{BudgetConfig, Mode};
use crate::controller::ControllerState;
use crate::dispatcher::CommandDispatcher;
use crate::ingress::{self, TelemetryReceiver};
use crate::logging::get_logger;
use crate::pv::PvData;
use crate::station::StationTracker;

/// Per-station fields published on the operator surface (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSummary {
    pub setpoint_a: Option<i64>,
    pub allocated_a: f64,
    pub actual_current_a: f64,
    pub state: String,
    pub status: &'static str,
}

/// The tick summary published after every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSummary {
    pub mode: Mode,
    pub total_allocated_a: f64,
    pub stations: HashMap<String, StationSummary>,
    pub tick: u64,
}

pub struct ControlLoop {
    tracker: StationTracker,
    pv: PvData,
    budget: BudgetConfig,
    controller_rx: watch::Receiver<ControllerState>,
    telemetry_rx: TelemetryReceiver,
    dispatcher: CommandDispatcher,
    clock: Arc<dyn Clock>,
    summary_tx: watch::Sender<TickSummary>,
    was_enabled: bool,
    tick_count: u64,
}

impl ControlLoop {
    pub fn new(
        tracker: StationTracker,
        budget: BudgetConfig,
        controller_rx: watch::Receiver<ControllerState>,
        telemetry_rx: TelemetryReceiver,
        dispatcher: CommandDispatcher,
        clock: Arc<dyn Clock>,
    ) -> (Self, watch::Receiver<TickSummary>) {
        let initial = TickSummary {
            mode: controller_rx.borrow().mode,
            total_allocated_a: 0.0,
            stations: HashMap::new(),
            tick: 0,
        };
        let (summary_tx, summary_rx) = watch::channel(initial);
        let control_loop = Self {
            tracker,
            pv: PvData::new(),
            budget,
            controller_rx,
            telemetry_rx,
            dispatcher,
            clock,
            summary_tx,
            was_enabled: true,
            tick_count: 0,
        };
        (control_loop, summary_rx)
    }

    pub fn pv_mut(&mut self) -> &mut PvData {
        &mut self.pv
    }

    pub fn tracker(&self) -> &StationTracker {
        &self.tracker
    }

    /// Run one tick: ingress, allocation, dispatch, publish. Per §7, any
    /// error here is caught at the loop level, not here -- `tick` itself is
    /// infallible once started, mirroring the invariant that a station
    /// parse failure or transport timeout never aborts the tick.
    pub async fn tick(&mut self) {
        let now = self.clock.now();
        let snapshot = self.controller_rx.borrow().clone();
        let logger = get_logger("control_loop");

        if !snapshot.enable_charging {
            if self.was_enabled {
                logger.info("charging disabled; pausing all stations");
                self.dispatcher.pause_all(&mut self.tracker).await;
            }
            self.was_enabled = false;
            self.publish_summary(snapshot.mode, &AllocationResult {
                alloc: HashMap::new(),
                total_allocated_a: 0.0,
                mode: snapshot.mode,
            });
            return;
        }
        self.was_enabled = true;

        ingress::drain(&mut self.telemetry_rx, &mut self.tracker, &mut self.pv, now);
        self.tracker
            .check_liveness(now, snapshot.tunables.measurement_interval_s);

        let active = self.tracker.active_stations();
        let result = allocation::compute(
            &mut self.tracker,
            &active,
            &self.budget,
            snapshot.mode,
            &self.pv,
            &snapshot.tunables,
            now,
        );

        self.dispatcher.dispatch(&mut self.tracker, &result.alloc).await;
        self.publish_summary(snapshot.mode, &result);
    }

    fn publish_summary(&mut self, mode: Mode, result: &AllocationResult) {
        self.tick_count += 1;
        let mut stations = HashMap::new();
        for id in self.tracker.all_ids() {
            if let Some(status) = self.tracker.status(id) {
                stations.insert(
                    id.clone(),
                    StationSummary {
                        setpoint_a: status.last_setpoint_sent_a,
                        allocated_a: result.alloc.get(id).copied().unwrap_or(0.0),
                        actual_current_a: status.actual_current_a,
                        state: format!("{:?}", status.state),
                        status: status.state.status_str(),
                    },
                );
            }
        }
        let _ = self.summary_tx.send(TickSummary {
            mode,
            total_allocated_a: result.total_allocated_a.round(),
            stations,
            tick: self.tick_count,
        });
    }

    /// Run forever at `measurement_interval_s` cadence until the supplied
    /// shutdown signal resolves, then release every known station.
    pub async fn run(mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let interval_s = self.controller_rx.borrow().tunables.measurement_interval_s;
        let mut ticker = interval(Duration::from_secs_f64(interval_s.max(0.1)));
        let logger = get_logger("control_loop");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = &mut shutdown => {
                    logger.info("shutdown signal received; releasing all stations");
                    self.dispatcher.release_all(&self.tracker).await;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::config::Tunables;
    use crate::dispatcher::{LoggingTransport, StationCommand};
    use crate::ingress;
    use crate::station::StationConfig;

    fn setup() -> (ControlLoop, Arc<LoggingTransport>, watch::Sender<ControllerState>) {
        let configs = vec![StationConfig {
            id: "s1".to_string(),
            name: "Station 1".to_string(),
            address: "addr".to_string(),
        }];
        let tracker = StationTracker::new(configs, 0.0);
        let budget = BudgetConfig {
            total_current_limit_a: 32,
            voltage_v: 230,
            phases: 1,
        };
        let state = ControllerState {
            mode: Mode::PvPlusGrid,
            enable_charging: true,
            tunables: Tunables::default(),
        };
        let (controller_tx, controller_rx) = watch::channel(state);
        let (_telemetry_tx, telemetry_rx) = ingress::channel();
        let transport = Arc::new(LoggingTransport::new());
        let dispatcher = CommandDispatcher::new(Box::new(TestTransport(transport.clone())));
        let clock = Arc::new(TestClock::new(0.0));

        let (control_loop, _summary_rx) = ControlLoop::new(
            tracker,
            budget,
            controller_rx,
            telemetry_rx,
            dispatcher,
            clock,
        );
        (control_loop, transport, controller_tx)
    }

    struct TestTransport(Arc<LoggingTransport>);

    #[async_trait::async_trait]
    impl crate::dispatcher::StationTransport for TestTransport {
        async fn send(
            &self,
            station_id: &str,
            command: StationCommand,
        ) -> crate::error::Result<()> {
            self.0.send(station_id, command).await
        }
    }

    #[tokio::test]
    async fn disabled_charging_pauses_once_on_transition() {
        let (mut control_loop, transport, controller_tx) = setup();
        controller_tx.send_modify(|s| s.enable_charging = false);

        control_loop.tick().await;
        control_loop.tick().await;

        let pauses = transport
            .sent_commands()
            .into_iter()
            .filter(|(_, c)| *c == StationCommand::Pause)
            .count();
        assert_eq!(pauses, 1, "pause-all must fire once on the transition, not every tick");
    }

    #[tokio::test]
    async fn enabled_tick_with_connected_station_dispatches_setpoint() {
        let (mut control_loop, transport, _controller_tx) = setup();
        control_loop
            .tracker
            .apply_vehicle_connected("s1", true, 0.0);
        control_loop.tracker.apply_status("s1", "charging", 0.0);

        control_loop.tick().await;

        let sent = transport.sent_commands();
        assert!(sent.iter().any(|(id, c)| id == "s1"
            && matches!(c, StationCommand::SetCurrent(_))));
    }
}
