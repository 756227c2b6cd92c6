//! The batch core: templates, row resolution, conversion, mail and jobs.

pub mod convert;
pub mod error;
pub mod jobs;
pub mod mail;
pub mod resolve;
pub mod template;
