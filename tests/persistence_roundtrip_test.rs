//! Persisted mode/tunables survive a simulated restart: write through a
//! `ModeController`, drop it, and build a fresh one from the same file.

use std::sync::Arc;

use pvloadctl::config::{Config, Mode};
use pvloadctl::controller::ModeController;
use pvloadctl::persistence::PersistenceManager;
use tokio::sync::Mutex;

fn persistence_at(path: &std::path::Path) -> Arc<Mutex<PersistenceManager>> {
    Arc::new(Mutex::new(PersistenceManager::new(path.to_str().unwrap())))
}

#[tokio::test]
async fn mode_survives_a_simulated_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let config = Config::default();

    let controller = ModeController::new(&config, persistence_at(&path));
    controller.set_mode("pv_plus_grid").await.unwrap();
    assert_eq!(controller.snapshot().mode, Mode::PvPlusGrid);
    drop(controller);

    // Restart: a fresh controller loads the same persisted file.
    let mut reloaded_manager = PersistenceManager::new(path.to_str().unwrap());
    reloaded_manager.load().unwrap();
    let persistence = Arc::new(Mutex::new(reloaded_manager));
    let restarted = ModeController::new(&config, persistence);

    assert_eq!(
        restarted.snapshot().mode,
        Mode::PvPlusGrid,
        "mode must round-trip across a restart"
    );
}

#[tokio::test]
async fn tunables_round_trip_across_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let config = Config::default();

    let controller = ModeController::new(&config, persistence_at(&path));
    controller.set_hysteresis_threshold(4.5).await.unwrap();
    controller.set_ramp_up_delay(120.0).await.unwrap();
    drop(controller);

    let mut reloaded_manager = PersistenceManager::new(path.to_str().unwrap());
    reloaded_manager.load().unwrap();
    let persistence = Arc::new(Mutex::new(reloaded_manager));
    let restarted = ModeController::new(&config, persistence);

    let snapshot = restarted.snapshot();
    assert_eq!(snapshot.tunables.hysteresis_threshold_a, 4.5);
    assert_eq!(snapshot.tunables.ramp_up_delay_s, 120.0);
}
