//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

pub use docbatch_api_types::{DeliveryStatus, JobKind, JobStatus};

/// Which mail strategy a job delivers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTransport {
    #[default]
    Smtp,
    LocalClient,
}

impl MailTransport {
    pub fn as_str(self) -> &'static str {
        match self {
            MailTransport::Smtp => "smtp",
            MailTransport::LocalClient => "local_client",
        }
    }
}

impl TryFrom<&str> for MailTransport {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "smtp" => Ok(MailTransport::Smtp),
            "local_client" | "local" | "outlook" => Ok(MailTransport::LocalClient),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_aliases_parse() {
        assert_eq!(MailTransport::try_from("smtp"), Ok(MailTransport::Smtp));
        assert_eq!(
            MailTransport::try_from("outlook"),
            Ok(MailTransport::LocalClient)
        );
        assert!(MailTransport::try_from("pigeon").is_err());
    }
}
