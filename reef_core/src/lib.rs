#![forbid(unsafe_code)]

//! Core domain model and business logic for the reef dosing tracker.
//!
//! This crate provides:
//! - Domain types (parameters, measurements, raw store rows)
//! - Record ingestion and the ordered measurement log
//! - Measurement sources (remote HTTP store, local JSONL file)
//! - Session state with stale-refresh protection
//! - Dosing estimator, status classification and salt mixer

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod ingest;
pub mod log;
pub mod source;
pub mod session;
pub mod status;
pub mod dosing;
pub mod mixer;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use log::MeasurementLog;
pub use source::{AnySource, HttpSource, JsonlSource, MeasurementSource};
pub use session::{RefreshOutcome, Session};
pub use status::{classify, Ranges, Status};
pub use dosing::{estimate, DoseInputError, DoseRequest, DosingParams, DosingPlan};
pub use mixer::{mix_salt, SaltMix};
