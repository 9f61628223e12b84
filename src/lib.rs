//! # pvloadctl
//!
//! A photovoltaic-aware load manager that divides a shared electrical
//! current budget among multiple EV charging stations. Reads instantaneous
//! solar surplus and per-station draw, and on a fixed tick computes and
//! dispatches a per-station current setpoint while keeping aggregate draw
//! under a hard limit, preferring solar surplus, avoiding oscillation, and
//! self-correcting when chargers under-draw their allocation.
//!
//! ## Architecture
//!
//! - `clock`: monotonic time source, injectable for tests
//! - `constants`: named magic numbers shared across the pipeline
//! - `station`: per-station state machine, liveness, eligibility
//! - `pv`: PV surplus estimator with variance-based cloud detection
//! - `allocation`: the six-step allocation engine
//! - `dispatcher`: debounced command dispatch
//! - `ingress`: telemetry parsing and application
//! - `control_loop`: orchestrates ingress -> allocation -> dispatch per tick
//! - `controller`: operator-driven mode/tunable changes
//! - `config`: YAML configuration loading and validation
//! - `persistence`: atomic key-value state across restarts
//! - `logging`: structured logging
//! - `web_axum`: HTTP operator surface
//! - `error`: typed error handling

pub mod allocation;
pub mod clock;
pub mod config;
pub mod constants;
pub mod control_loop;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod ingress;
pub mod logging;
pub mod persistence;
pub mod pv;
pub mod station;
#[cfg(feature = "web")]
pub mod web_axum;

pub use config::Config;
pub use control_loop::ControlLoop;
pub use error::{LoadCtlError, Result};
