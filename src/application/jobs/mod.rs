//! Background document jobs.

mod error;
mod inflight;
mod model;
mod pause;
mod registry;
mod repository;
mod request;
mod runner;

pub use error::{JobError, ValidationCode, ValidationError};
pub use inflight::{InFlightError, InFlightRuns, RunGuard};
pub use model::{
    EmailSummary, GenerateOutput, GeneratedFile, JobOutput, JobRecord, SendOutput,
};
pub use pause::PauseSignal;
pub use registry::{JobRegistry, JobServices, RegistrySettings};
pub use repository::{InMemoryJobRepository, JobRepoError, JobRepository};
pub use request::{JobOptions, JobRequest};
