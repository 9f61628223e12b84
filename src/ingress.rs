//! Telemetry ingress: converts raw readings into typed events applied to
//! the station tracker and PV estimator (§4.B).
//!
//! A real deployment would feed this from an MQTT broker or a home
//! automation REST poll (`original_source` ships both); this crate only
//! specifies and implements the contract those transports would drive: an
//! mpsc channel of `TelemetryEvent` drained at the top of each tick.

use tokio::sync::mpsc;

use crate::logging::get_logger;
use crate::pv::PvData;
use crate::station::StationTracker;

/// Recognized per-station sample keys, per §6.1.
#[derive(Debug, Clone)]
pub enum StationSampleKey {
    ActualCurrentA,
    PilotCurrentA,
    Status,
    VehicleConnected,
    SessionEnergyWh,
}

impl StationSampleKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "actual_current_a" => Some(Self::ActualCurrentA),
            "pilot_current_a" => Some(Self::PilotCurrentA),
            "status" => Some(Self::Status),
            "vehicle_connected" => Some(Self::VehicleConnected),
            "session_energy_wh" => Some(Self::SessionEnergyWh),
            _ => None,
        }
    }
}

/// A single inbound telemetry event, as a real transport would decode it
/// off the wire.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    Station {
        station_id: String,
        sample_key: String,
        payload: String,
    },
    Pv {
        grid_import_power_w: String,
    },
}

/// Sender half used by a transport implementation to push raw readings
/// into the control loop.
pub type TelemetrySender = mpsc::UnboundedSender<TelemetryEvent>;
pub type TelemetryReceiver = mpsc::UnboundedReceiver<TelemetryEvent>;

pub fn channel() -> (TelemetrySender, TelemetryReceiver) {
    mpsc::unbounded_channel()
}

/// Apply one station telemetry event. Parse failures are logged and
/// discarded without mutating state, per §4.B/§7.
pub fn apply_station_event(
    tracker: &mut StationTracker,
    station_id: &str,
    sample_key: &str,
    payload: &str,
    now: f64,
) {
    let logger = get_logger("ingress");
    let Some(key) = StationSampleKey::parse(sample_key) else {
        logger.warn(&format!("unrecognized sample key '{sample_key}' for {station_id}"));
        return;
    };

    if tracker.config(station_id).is_none() {
        logger.warn(&format!("telemetry for unknown station '{station_id}'"));
        return;
    }

    match key {
        StationSampleKey::ActualCurrentA => match payload.trim().parse::<f64>() {
            Ok(amps) => tracker.apply_actual_current(station_id, amps, now),
            Err(_) => logger.warn(&format!(
                "discarding malformed actual_current_a payload '{payload}' for {station_id}"
            )),
        },
        StationSampleKey::PilotCurrentA => match payload.trim().parse::<f64>() {
            Ok(amps) => tracker.apply_pilot_current(station_id, amps, now),
            Err(_) => logger.warn(&format!(
                "discarding malformed pilot_current_a payload '{payload}' for {station_id}"
            )),
        },
        StationSampleKey::Status => tracker.apply_status(station_id, payload, now),
        StationSampleKey::VehicleConnected => {
            let connected = match payload.trim().to_ascii_lowercase().as_str() {
                "on" => Some(true),
                "off" => Some(false),
                _ => None,
            };
            match connected {
                Some(c) => tracker.apply_vehicle_connected(station_id, c, now),
                None => logger.warn(&format!(
                    "discarding malformed vehicle_connected payload '{payload}' for {station_id}"
                )),
            }
        }
        StationSampleKey::SessionEnergyWh => match payload.trim().parse::<f64>() {
            Ok(wh) => tracker.apply_session_energy(station_id, wh, now),
            Err(_) => logger.warn(&format!(
                "discarding malformed session_energy_wh payload '{payload}' for {station_id}"
            )),
        },
    }
}

/// Apply one PV telemetry event.
pub fn apply_pv_event(pv: &mut PvData, grid_import_power_w: &str, now: f64) {
    match grid_import_power_w.trim().parse::<f64>() {
        Ok(raw_w) => pv.apply_grid_import_w(raw_w, now),
        Err(_) => get_logger("ingress").warn(&format!(
            "discarding malformed grid_import_power_w payload '{grid_import_power_w}'"
        )),
    }
}

/// Drain every currently-queued event and apply it. Called once at the top
/// of each tick so the engine sees a consistent snapshot.
pub fn drain(receiver: &mut TelemetryReceiver, tracker: &mut StationTracker, pv: &mut PvData, now: f64) {
    while let Ok(event) = receiver.try_recv() {
        match event {
            TelemetryEvent::Station {
                station_id,
                sample_key,
                payload,
            } => apply_station_event(tracker, &station_id, &sample_key, &payload, now),
            TelemetryEvent::Pv {
                grid_import_power_w,
            } => apply_pv_event(pv, &grid_import_power_w, now),
        }
    }
}
