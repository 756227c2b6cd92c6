use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::debug;

use crate::{
    application::mail::{MailError, Mailer, OutgoingMail},
    config::{SmtpSettings, SmtpTls},
    infra::error::InfraError,
};

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Network delivery through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, InfraError> {
        let from: Mailbox = settings.from.parse().map_err(|err| {
            InfraError::configuration(format!("mail.smtp.from `{}`: {err}", settings.from))
        })?;

        let builder = match settings.tls {
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|err| InfraError::configuration(format!("mail.smtp.host: {err}")))?,
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|err| InfraError::configuration(format!("mail.smtp.host: {err}")))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        };

        let mut builder = builder.port(settings.port).timeout(Some(SMTP_TIMEOUT));
        if let Some(username) = &settings.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                settings.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, MailError> {
        let to: Mailbox = mail
            .recipient
            .parse()
            .map_err(|err| MailError::InvalidMessage(format!("recipient `{}`: {err}", mail.recipient)))?;

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
        for attachment in &mail.attachments {
            let content_type = ContentType::parse(content_type_for(&attachment.filename))
                .map_err(|err| MailError::InvalidMessage(err.to_string()))?;
            parts = parts.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.content.to_vec(), content_type),
            );
        }

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .multipart(parts)
            .map_err(|err| MailError::InvalidMessage(err.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn transport(&self) -> &str {
        "smtp"
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = self.build_message(mail)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|err| MailError::Rejected(err.to_string()))?;
        debug!(
            target = "infra::mail::smtp",
            recipient = %mail.recipient,
            code = %response.code(),
            "message accepted by relay"
        );
        Ok(())
    }
}

/// MIME type for an attachment name.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}
