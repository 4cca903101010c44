//! Data pipeline for caseload reporting.
//!
//! Responsible for reading the raw time-tracking and accounting exports,
//! normalizing them into clean typed rows plus failure reports, joining the
//! two tables into per-district metrics and per-student cases, and writing
//! the CSV outputs and the markdown report.

pub mod aggregator;
pub mod analysis;
pub mod cases;
pub mod export;
pub mod finance_normalizer;
pub mod reader;
pub mod report;
pub mod time_normalizer;

pub use caseload_core as core;
