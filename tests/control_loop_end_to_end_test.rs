//! Drives a full tick through the public API: ingress event -> control loop
//! tick -> dispatched command -> published summary, the way the real binary
//! wires things together in `main.rs`.

use std::sync::Arc;

use pvloadctl::clock::TestClock;
use pvloadctl::config::{BudgetConfig, Mode, Tunables};
use pvloadctl::control_loop::ControlLoop;
use pvloadctl::controller::ControllerState;
use pvloadctl::dispatcher::{CommandDispatcher, LoggingTransport, StationCommand};
use pvloadctl::ingress::{self, TelemetryEvent};
use pvloadctl::station::{StationConfig, StationTracker};
use tokio::sync::watch;

#[tokio::test]
async fn a_connected_charging_station_receives_a_setpoint_from_pv_surplus() {
    let configs = vec![StationConfig {
        id: "wallbox-1".to_string(),
        name: "Driveway".to_string(),
        address: "mqtt/wallbox-1".to_string(),
    }];
    let tracker = StationTracker::new(configs, 0.0);
    let budget = BudgetConfig {
        total_current_limit_a: 32,
        voltage_v: 230,
        phases: 1,
    };
    let state = ControllerState {
        mode: Mode::PvOnly,
        enable_charging: true,
        tunables: Tunables::default(),
    };
    let (_controller_tx, controller_rx) = watch::channel(state);
    let (telemetry_tx, telemetry_rx) = ingress::channel();
    let transport = Arc::new(LoggingTransport::new());
    let dispatcher = CommandDispatcher::new(Box::new(TestTransport(transport.clone())));
    let clock = Arc::new(TestClock::new(0.0));

    let (mut control_loop, mut summary_rx) = ControlLoop::new(
        tracker,
        budget,
        controller_rx,
        telemetry_rx,
        dispatcher,
        clock,
    );

    telemetry_tx
        .send(TelemetryEvent::Station {
            station_id: "wallbox-1".to_string(),
            sample_key: "vehicle_connected".to_string(),
            payload: "on".to_string(),
        })
        .unwrap();
    telemetry_tx
        .send(TelemetryEvent::Station {
            station_id: "wallbox-1".to_string(),
            sample_key: "status".to_string(),
            payload: "charging".to_string(),
        })
        .unwrap();
    telemetry_tx
        .send(TelemetryEvent::Pv {
            grid_import_power_w: "-7000".to_string(),
        })
        .unwrap();

    control_loop.tick().await;

    let sent = transport.sent_commands();
    assert!(sent
        .iter()
        .any(|(id, c)| id == "wallbox-1" && matches!(c, StationCommand::SetCurrent(a) if *a >= 29 && *a <= 31)));

    let summary = summary_rx.borrow_and_update().clone();
    assert_eq!(summary.tick, 1);
    let station_summary = summary.stations.get("wallbox-1").unwrap();
    assert!(station_summary.allocated_a > 29.0);
}

struct TestTransport(Arc<LoggingTransport>);

#[async_trait::async_trait]
impl pvloadctl::dispatcher::StationTransport for TestTransport {
    async fn send(
        &self,
        station_id: &str,
        command: StationCommand,
    ) -> pvloadctl::error::Result<()> {
        self.0.send(station_id, command).await
    }
}
