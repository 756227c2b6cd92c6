//! Concrete mail transports.

mod local_client;
mod smtp;

pub use local_client::LocalClientMailer;
pub use smtp::{SmtpMailer, content_type_for};
