//! End-to-end allocation scenarios from the specification's worked examples:
//! single-station plentiful sun, equal share, overbooking reclaim, a cloud
//! episode, emergency scale-down, and resume hysteresis. Each drives
//! `allocation::compute` directly against a tracker seeded the way a real
//! tick would see it, rather than asserting on internal pipeline steps.

use pvloadctl::allocation::compute;
use pvloadctl::config::{BudgetConfig, Mode, Tunables};
use pvloadctl::pv::PvData;
use pvloadctl::station::{StationConfig, StationState, StationTracker};

fn budget(limit: u32) -> BudgetConfig {
    BudgetConfig {
        total_current_limit_a: limit,
        voltage_v: 230,
        phases: 1,
    }
}

fn tracker_with_stations(ids: &[&str]) -> StationTracker {
    let configs: Vec<StationConfig> = ids
        .iter()
        .map(|id| StationConfig {
            id: (*id).to_string(),
            name: (*id).to_string(),
            address: format!("addr/{id}"),
        })
        .collect();
    let mut tracker = StationTracker::new(configs, 0.0);
    for id in ids {
        tracker.apply_vehicle_connected(id, true, 0.0);
        tracker.apply_status(id, "charging", 0.0);
    }
    tracker
}

#[test]
fn single_station_plentiful_sun_allocates_30a() {
    let mut tracker = tracker_with_stations(&["s1"]);
    tracker.apply_actual_current("s1", 0.0, 0.0);

    let mut pv = PvData::new();
    pv.apply_grid_import_w(-7000.0, 0.0);

    let result = compute(
        &mut tracker,
        &["s1".to_string()],
        &budget(32),
        Mode::PvOnly,
        &pv,
        &Tunables::default(),
        0.0,
    );

    assert!((result.alloc["s1"] - 30.0).abs() < 0.1);
    assert_eq!(result.mode, Mode::PvOnly);
}

#[test]
fn two_stations_converge_to_equal_share_under_grid_cap() {
    let mut tracker = tracker_with_stations(&["s1", "s2"]);
    tracker.apply_actual_current("s1", 16.0, 0.0);
    tracker.apply_actual_current("s2", 16.0, 0.0);

    let mut pv = PvData::new();
    pv.apply_grid_import_w(-15000.0, 0.0); // 65.2A, clamped to the 32A limit

    let result = compute(
        &mut tracker,
        &["s1".to_string(), "s2".to_string()],
        &budget(32),
        Mode::PvOnly,
        &pv,
        &Tunables::default(),
        0.0,
    );

    assert!((result.alloc["s1"] - 16.0).abs() < 1.0);
    assert!((result.alloc["s2"] - 16.0).abs() < 1.0);
    assert!(result.total_allocated_a <= 32.0 + 0.01);
}

#[test]
fn overbooking_reclaim_moves_slack_from_under_drawing_station() {
    let mut tracker = tracker_with_stations(&["s1", "s2"]);
    tracker.apply_actual_current("s1", 6.0, 0.0);
    tracker.apply_actual_current("s2", 16.0, 0.0);
    tracker.statuses_mut().get_mut("s1").unwrap().last_allocation_a = 30.0;
    tracker.statuses_mut().get_mut("s2").unwrap().last_allocation_a = 30.0;

    let result = compute(
        &mut tracker,
        &["s1".to_string(), "s2".to_string()],
        &budget(32),
        Mode::PvPlusGrid,
        &PvData::new(),
        &Tunables::default(),
        0.0,
    );

    assert!((result.alloc["s1"] - 6.5).abs() < 0.2);
    assert!((result.alloc["s2"] - 25.5).abs() < 0.2);
    assert!(result.total_allocated_a <= 32.0 + 0.01);
}

#[test]
fn cloud_episode_holds_at_minimum_then_drops_to_zero() {
    let mut tracker = tracker_with_stations(&["s1"]);
    tracker.apply_actual_current("s1", 0.0, 0.0);

    let mut pv = PvData::new();
    for (i, w) in [2000.0, 2500.0, 1000.0, 2800.0, 500.0, 3000.0]
        .into_iter()
        .enumerate()
    {
        pv.apply_grid_import_w(-w, i as f64 * 10.0);
    }
    assert!(pv.is_cloudy());

    let tunables = Tunables::default();
    let first = compute(
        &mut tracker,
        &["s1".to_string()],
        &budget(32),
        Mode::PvOnly,
        &pv,
        &tunables,
        50.0,
    );
    assert_eq!(first.alloc["s1"], 6.0, "held at MIN_STATION_CURRENT while pause-pending");

    let later = 50.0 + tunables.hysteresis_delay_s + 1.0;
    let second = compute(
        &mut tracker,
        &["s1".to_string()],
        &budget(32),
        Mode::PvOnly,
        &pv,
        &tunables,
        later,
    );
    assert_eq!(second.alloc["s1"], 0.0, "dropped to zero once the debounce window elapses");
}

#[test]
fn emergency_scale_down_protects_the_safety_margin() {
    let mut tracker = tracker_with_stations(&["s1", "s2"]);
    // Actual draw exactly matches the equal share, so Step 3's reclaim does
    // not fire and Step 6's scale-down is exercised in isolation.
    tracker.apply_actual_current("s1", 16.0, 0.0);
    tracker.apply_actual_current("s2", 16.0, 0.0);
    tracker.statuses_mut().get_mut("s1").unwrap().last_allocation_a = 16.0;
    tracker.statuses_mut().get_mut("s2").unwrap().last_allocation_a = 16.0;

    let result = compute(
        &mut tracker,
        &["s1".to_string(), "s2".to_string()],
        &budget(32),
        Mode::PvPlusGrid,
        &PvData::new(),
        &Tunables::default(),
        0.0,
    );

    // total_actual (32) exceeds limit - SAFETY_MARGIN_A (30): both scale by 30/32.
    assert!((result.alloc["s1"] - 15.0).abs() < 0.1);
    assert!((result.alloc["s2"] - 15.0).abs() < 0.1);
}

#[test]
fn resume_hysteresis_blocks_then_allows_resume() {
    let mut tracker = tracker_with_stations(&["s1"]);
    tracker.statuses_mut().get_mut("s1").unwrap().state = StationState::Paused;
    tracker.apply_actual_current("s1", 0.0, 0.0);

    let mut tunables = Tunables::default();
    tunables.hysteresis_threshold_a = 2.0;

    // Raw allocation is forced to 7A via PV budget; 7 < MIN(6) + threshold(2) = 8.
    let mut pv = PvData::new();
    pv.apply_grid_import_w(-(7.0 * 230.0), 0.0);
    let blocked = compute(
        &mut tracker,
        &["s1".to_string()],
        &budget(32),
        Mode::PvOnly,
        &pv,
        &tunables,
        0.0,
    );
    assert_eq!(blocked.alloc["s1"], 0.0);

    // Next tick raw allocation is 9A >= 8: resume hysteresis no longer blocks,
    // though the ramp limiter still governs the increase from the previous 0.
    tracker.statuses_mut().get_mut("s1").unwrap().state = StationState::Paused;
    let mut pv2 = PvData::new();
    pv2.apply_grid_import_w(-(9.0 * 230.0), 100.0);
    let resumed = compute(
        &mut tracker,
        &["s1".to_string()],
        &budget(32),
        Mode::PvOnly,
        &pv2,
        &tunables,
        100.0,
    );
    assert!(resumed.alloc["s1"] > 0.0, "resume must be allowed once raw alloc clears the threshold");
}
