//! Core domain types and rules for caseload reporting.
//!
//! Note parsing, district matching, task and service vocabularies, contractor
//! rates, the school calendar, and derived-metric math all live here so the
//! data pipeline and the CLI share one set of rules. Apart from the settings
//! layer everything in this crate is pure and filesystem-free.

pub mod calendar;
pub mod error;
pub mod formatting;
pub mod matching;
pub mod metrics;
pub mod models;
pub mod note;
pub mod rates;
pub mod settings;
pub mod vocab;
