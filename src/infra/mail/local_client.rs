//! Delivery through the desktop mail client (Outlook automation via
//! PowerShell). Windows only; elsewhere every send fails with a capability
//! error.

use std::{path::Path, process::Stdio, time::Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::application::mail::{MailError, Mailer, OutgoingMail};

#[derive(Debug, Clone)]
pub struct LocalClientMailer {
    program: String,
    from: Option<String>,
}

impl LocalClientMailer {
    pub fn new(program: impl Into<String>, from: Option<String>) -> Self {
        Self {
            program: program.into(),
            from,
        }
    }

    pub fn is_supported() -> bool {
        cfg!(windows)
    }

    fn script(&self, mail: &OutgoingMail, attachments: &[&Path]) -> String {
        let mut script = String::from(
            "$ErrorActionPreference = 'Stop'\n\
             $outlook = New-Object -ComObject Outlook.Application\n\
             $mail = $outlook.CreateItem(0)\n",
        );
        script.push_str(&format!("$mail.To = {}\n", ps_quote(&mail.recipient)));
        script.push_str(&format!("$mail.Subject = {}\n", ps_quote(&mail.subject)));
        script.push_str(&format!("$mail.Body = {}\n", ps_quote(&mail.body)));
        if let Some(from) = &self.from {
            script.push_str(&format!("$mail.SentOnBehalfOfName = {}\n", ps_quote(from)));
        }
        for path in attachments {
            script.push_str(&format!(
                "[void]$mail.Attachments.Add({})\n",
                ps_quote(&path.to_string_lossy())
            ));
        }
        script.push_str("$mail.Send()\n");
        script
    }
}

#[async_trait]
impl Mailer for LocalClientMailer {
    fn transport(&self) -> &str {
        "local_client"
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if !Self::is_supported() {
            return Err(MailError::Unsupported(
                "local mail client automation requires Windows with Outlook".to_string(),
            ));
        }

        let started_at = Instant::now();
        let scratch = tempfile::tempdir()?;
        let mut paths = Vec::with_capacity(mail.attachments.len());
        for attachment in &mail.attachments {
            let path = scratch.path().join(&attachment.filename);
            tokio::fs::write(&path, &attachment.content).await?;
            paths.push(path);
        }
        let borrowed: Vec<&Path> = paths.iter().map(|path| path.as_path()).collect();
        let script = self.script(mail, &borrowed);

        let child = Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                MailError::NotConfigured(format!("cannot start `{}`: {err}", self.program))
            })?;

        let output = feed_and_wait(child, script).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "infra::mail::local_client",
                recipient = %mail.recipient,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                stderr = %stderr,
                "mail client automation failed"
            );
            return Err(MailError::Rejected(stderr));
        }

        debug!(
            target = "infra::mail::local_client",
            recipient = %mail.recipient,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "message handed to mail client"
        );
        Ok(())
    }
}

async fn feed_and_wait(
    mut child: tokio::process::Child,
    script: String,
) -> Result<std::process::Output, MailError> {
    use tokio::io::AsyncWriteExt;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(script.as_bytes()).await?;
        stdin.shutdown().await?;
    }
    Ok(child.wait_with_output().await?)
}

/// Single-quoted PowerShell literal.
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::application::mail::Attachment;

    fn mail() -> OutgoingMail {
        OutgoingMail {
            recipient: "ana@example.com".into(),
            subject: "Declaração d'Ana".into(),
            body: "Segue.".into(),
            attachments: vec![Attachment {
                filename: "001_ana.pdf".into(),
                content: Bytes::from_static(b"%PDF-1.4"),
            }],
        }
    }

    #[test]
    fn script_quotes_values() {
        let mailer = LocalClientMailer::new("powershell", Some("secretaria@example.com".into()));
        let script = mailer.script(&mail(), &[Path::new("C:/tmp/001_ana.pdf")]);
        assert!(script.contains("$mail.Subject = 'Declaração d''Ana'"));
        assert!(script.contains("$mail.SentOnBehalfOfName = 'secretaria@example.com'"));
        assert!(script.contains("[void]$mail.Attachments.Add('C:/tmp/001_ana.pdf')"));
        assert!(script.ends_with("$mail.Send()\n"));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn unsupported_platforms_fail_immediately() {
        let mailer = LocalClientMailer::new("powershell", None);
        assert!(matches!(
            mailer.send(&mail()).await,
            Err(MailError::Unsupported(_))
        ));
    }
}
