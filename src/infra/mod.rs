//! Infrastructure adapters and runtime bootstrap.

pub mod archive;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod mail;
pub mod telemetry;
