//! Batch document generation: DOCX templates filled from tabular data,
//! optionally converted to PDF and emailed, run as pausable background jobs.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
