//! PV yield simulator.
//!
//! Replays historical weather through models of a multi-inverter PV
//! installation and reports monthly and annual AC energy per array.

pub mod config;
pub mod devices;
pub mod domain;
pub mod error;
pub mod irradiance;
pub mod pipeline;
pub mod report;
pub mod simulation;
pub mod solar;
pub mod telemetry;
pub mod weather;

pub use error::PipelineError;
