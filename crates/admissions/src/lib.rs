//! Admission lifecycle engine: application state machine, role policy, seat ledger, and the
//! HTTP surface over them.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
