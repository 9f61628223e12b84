//! The allocation engine: a deterministic six-step pipeline producing a
//! per-station current setpoint each tick.
//!
//! Pure over its input snapshot -- no I/O, no sleeping -- so it is run
//! identically whether driven by the live control loop or by a test
//! fixture with an injected `now`. Mutates only the per-station ramp/pause
//! bookkeeping fields it owns (`last_allocation_a`, `last_ramp_up_at`,
//! `pause_pending_since`); everything else about a tick's snapshot is read,
//! not written.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{BudgetConfig, Mode, Tunables};
use crate::constants::{
    ACTUAL_TOLERANCE_A, MAX_RAMP_UP_STEP_A, MIN_STATION_CURRENT_A, OVERBOOKING_ITERATIONS,
    SAFETY_MARGIN_A, SLACK_BUFFER_A,
};
use crate::pv::PvData;
use crate::station::{StationState, StationTracker};

/// Output of one tick of the allocation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    pub alloc: HashMap<String, f64>,
    pub total_allocated_a: f64,
    pub mode: Mode,
}

/// Run the pipeline for the given active station set.
///
/// `tracker` is mutated in place: each active station's `last_allocation_a`,
/// `last_ramp_up_at`, and `pause_pending_since` are updated to reflect this
/// tick's decision.
pub fn compute(
    tracker: &mut StationTracker,
    active: &[String],
    budget: &BudgetConfig,
    mode: Mode,
    pv: &PvData,
    tunables: &Tunables,
    now: f64,
) -> AllocationResult {
    let limit = f64::from(budget.total_current_limit_a);

    // Step 1 -- budget.
    let raw_budget = match mode {
        Mode::PvOnly => pv.available_current_a(now, budget.watts_per_amp()),
        Mode::PvPlusGrid => limit,
    };
    let tick_budget = raw_budget.clamp(0.0, limit);

    if active.is_empty() {
        return AllocationResult {
            alloc: HashMap::new(),
            total_allocated_a: 0.0,
            mode,
        };
    }

    // Step 2 -- equal share.
    let share = tick_budget / active.len() as f64;
    let mut alloc: HashMap<String, f64> = active.iter().map(|id| (id.clone(), share)).collect();

    // Step 3 -- overbooking reclaim, iterative.
    for _ in 0..OVERBOOKING_ITERATIONS {
        let mut slack = 0.0_f64;
        let mut hungry: Vec<String> = Vec::new();

        for id in active {
            let actual = tracker.status(id).map(|s| s.actual_current_a).unwrap_or(0.0);
            let current_alloc = alloc[id];
            let is_underdrawing = actual > 0.0 && actual < current_alloc - ACTUAL_TOLERANCE_A;
            if is_underdrawing {
                let unused = current_alloc - actual - SLACK_BUFFER_A;
                if unused > 0.0 {
                    slack += unused;
                    alloc.insert(id.clone(), actual + SLACK_BUFFER_A);
                }
            } else {
                hungry.push(id.clone());
            }
        }

        if slack > 0.0 && !hungry.is_empty() {
            let bonus = slack / hungry.len() as f64;
            for id in &hungry {
                *alloc.get_mut(id).unwrap() += bonus;
            }
        }
    }

    // Step 4 -- per-station constraints with pause hysteresis.
    for id in active {
        let current = alloc[id].min(limit);
        let mut new_alloc = current;

        let state = tracker.status(id).map(|s| s.state);
        let pause_pending_since = tracker.status(id).and_then(|s| s.pause_pending_since);

        if current < MIN_STATION_CURRENT_A {
            if state == Some(StationState::Charging) {
                match pause_pending_since {
                    None => {
                        if let Some(status) = tracker.statuses_mut().get_mut(id) {
                            status.pause_pending_since = Some(now);
                        }
                        new_alloc = MIN_STATION_CURRENT_A;
                    }
                    Some(started) if now - started < tunables.hysteresis_delay_s => {
                        new_alloc = MIN_STATION_CURRENT_A;
                    }
                    Some(_) => {
                        new_alloc = 0.0;
                        if let Some(status) = tracker.statuses_mut().get_mut(id) {
                            status.pause_pending_since = None;
                        }
                    }
                }
            } else {
                new_alloc = 0.0;
            }
        } else {
            if let Some(status) = tracker.statuses_mut().get_mut(id) {
                status.pause_pending_since = None;
            }
            if state == Some(StationState::Paused)
                && current < MIN_STATION_CURRENT_A + tunables.hysteresis_threshold_a
            {
                new_alloc = 0.0;
            }
        }

        alloc.insert(id.clone(), new_alloc);
    }

    // Step 5 -- ramp control.
    for id in active {
        let Some(status) = tracker.status(id) else {
            continue;
        };
        let last_allocation = status.last_allocation_a;
        let last_ramp_up_at = status.last_ramp_up_at;
        let desired = alloc[id];

        let applied = if desired <= last_allocation {
            desired
        } else if last_allocation == 0.0 {
            // First-ever ramp from zero is unrestricted.
            if let Some(status) = tracker.statuses_mut().get_mut(id) {
                status.last_ramp_up_at = now;
            }
            desired
        } else if now - last_ramp_up_at < tunables.ramp_up_delay_s {
            last_allocation
        } else {
            if let Some(status) = tracker.statuses_mut().get_mut(id) {
                status.last_ramp_up_at = now;
            }
            desired.min(last_allocation + MAX_RAMP_UP_STEP_A)
        };

        alloc.insert(id.clone(), applied);
    }

    // Step 6 -- emergency scale-down.
    let total_actual: f64 = active
        .iter()
        .map(|id| tracker.status(id).map(|s| s.actual_current_a).unwrap_or(0.0))
        .sum();
    if total_actual > limit - SAFETY_MARGIN_A && total_actual > 0.0 {
        let scale = (limit - SAFETY_MARGIN_A) / total_actual;
        for id in active {
            *alloc.get_mut(id).unwrap() *= scale;
        }
    }

    // Record this tick's allocation for next tick's ramp comparisons.
    for id in active {
        if let Some(status) = tracker.statuses_mut().get_mut(id) {
            status.last_allocation_a = alloc[id];
        }
    }

    let total_allocated_a: f64 = alloc.values().sum();
    AllocationResult {
        alloc,
        total_allocated_a,
        mode,
    }
}
