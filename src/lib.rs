//! Coupon cycle & level classification
//!
//! Assigns each loyalty record a cycle and level from its coupon card count,
//! then filters, searches and groups the classified records.
//!
//! This library provides:
//! - `classifier`: band schemes and the cycle/level function
//! - `ingest`: delimited-file reading and schema validation
//! - `pipeline`: classification, range filter, search and aggregation
//! - `export` / `report`: CSV, workbook and markdown output
//!
//! Binary:
//! - `coupon-levels`: command-line front end

pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod report;

pub use classifier::BandScheme;
pub use error::{PipelineError, SchemeError, ValueError};
pub use pipeline::{run_pipeline, PipelineOutput, Session};
