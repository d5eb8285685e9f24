//! Irrigation decision engine: recommendation, tank and soil monitoring, the
//! pump state machine, the activity log and weather lookups.

pub mod activity;
pub mod catalog;
pub mod decision;
pub mod irrigation;
pub mod pump;
pub mod runtime;
pub mod sensor;
pub mod tank;
pub mod weather;

pub use irrigation::{EngineEvent, EngineStatus, Irrigation, IrrigationError};
