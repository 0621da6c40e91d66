//! Credit scoring, offer matching, and loan request lifecycle for the SARRAL
//! peer-to-peer micro-lending app.

pub mod config;
pub mod error;
pub mod lending;
pub mod telemetry;
