//! Domain layer types and invariants.

pub mod dataset;
pub mod error;
pub mod mapping;
pub mod naming;
pub mod types;
