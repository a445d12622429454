//! Decision core for home-care agency operations: caregiver matching and scheduling, electronic
//! visit verification, and billing.
//!
//! Evaluators are pure functions over caller-supplied snapshots. The only write paths are the
//! shift transitions in [`evv`] and invoice commits in [`billing`], both routed through the
//! repository traits in [`repository`].

pub mod billing;
pub mod config;
pub mod domain;
pub mod error;
pub mod evv;
pub mod matching;
pub mod repository;
pub mod scheduling;
pub mod telemetry;

#[cfg(test)]
mod fixtures;

pub use config::{AppConfig, EngineConfig};
pub use error::AppError;
