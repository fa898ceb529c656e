//! # Array Simulation Module
//!
//! Turns prepared weather into AC power for each configured array.
//!
//! ## Components
//!
//! - **YieldSimulator**: per-array state machine, irradiance to POA, cell
//!   temperature, DC, AC and losses
//! - **SimulationInput**: hourly weather with aligned sun positions, shared by
//!   all arrays of a run
//! - **Runner**: concurrent execution of all arrays with a failure policy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pv_yield::devices::StandardDeviceModel;
//! use pv_yield::simulation::{SimulationInput, YieldSimulator};
//! # fn demo(array: &pv_yield::domain::ArrayConfig, input: &SimulationInput) {
//! let result = YieldSimulator::new(array, &StandardDeviceModel, input).run();
//! # }
//! ```

pub mod runner;
pub mod simulator;

pub use runner::*;
pub use simulator::*;
