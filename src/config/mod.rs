//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::{naming::NameTemplate, types::MailTransport};

pub use cli::{
    CliArgs, Command, GenerateArgs, JobArgs, LoggingOverrides, PlaceholdersArgs, RunOverrides,
    SendArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "docbatch";
const ENV_PREFIX: &str = "DOCBATCH";
const DEFAULT_JOB_TTL_SECS: u64 = 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_NAME_TEMPLATE: &str = "{index:03}_{primary}.docx";
pub const DEFAULT_FALLBACK_PRIMARY: &str = "documento";
const DEFAULT_LIST_SEPARATOR: &str = ", ";
const DEFAULT_LIST_CONJUNCTION: &str = "e";
const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_LOCAL_CLIENT_PROGRAM: &str = "powershell";
const DEFAULT_MAIL_SUBJECT: &str = "Documento";
const DEFAULT_MAIL_BODY: &str = "Segue em anexo o documento.";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub jobs: JobsSettings,
    pub naming: NamingSettings,
    pub conversion: ConversionSettings,
    pub mail: MailSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct NamingSettings {
    pub name_template: NameTemplate,
    pub fallback_primary: String,
    pub max_value_chars: Option<usize>,
    pub list_separator: String,
    pub list_conjunction: String,
}

#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub timeout: Duration,
    /// Tried in order; an empty list disables conversion.
    pub backends: Vec<BackendSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub transport: MailTransport,
    pub smtp: Option<SmtpSettings>,
    pub local_client: LocalClientSettings,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub tls: SmtpTls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    Starttls,
    Wrapper,
    None,
}

#[derive(Debug, Clone)]
pub struct LocalClientSettings {
    pub program: String,
    pub from: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_logging_overrides(cli.command.logging());
    if let Some(overrides) = cli.command.overrides() {
        raw.apply_run_overrides(overrides);
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    jobs: RawJobsSettings,
    naming: RawNamingSettings,
    conversion: RawConversionSettings,
    mail: RawMailSettings,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_run_overrides(&mut self, overrides: &RunOverrides) {
        self.apply_logging_overrides(&overrides.logging);
        if let Some(transport) = overrides.mail_transport.as_ref() {
            self.mail.transport = Some(transport.clone());
        }
        if let Some(host) = overrides.smtp_host.as_ref() {
            self.mail.smtp.host = Some(host.clone());
        }
        if let Some(port) = overrides.smtp_port {
            self.mail.smtp.port = Some(port);
        }
        if let Some(from) = overrides.mail_from.as_ref() {
            self.mail.smtp.from = Some(from.clone());
            self.mail.local_client.from = Some(from.clone());
        }
        if let Some(seconds) = overrides.conversion_timeout_seconds {
            self.conversion.timeout_seconds = Some(seconds);
        }
        if let Some(millis) = overrides.jobs_poll_interval_ms {
            self.jobs.poll_interval_ms = Some(millis);
        }
        if let Some(max) = overrides.max_value_chars {
            self.naming.max_value_chars = Some(max);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            jobs,
            naming,
            conversion,
            mail,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            jobs: build_jobs_settings(jobs)?,
            naming: build_naming_settings(naming)?,
            conversion: build_conversion_settings(conversion)?,
            mail: build_mail_settings(mail)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let ttl = positive_secs(jobs.ttl_seconds, DEFAULT_JOB_TTL_SECS, "jobs.ttl_seconds")?;
    let sweep_interval = positive_secs(
        jobs.sweep_interval_seconds,
        DEFAULT_SWEEP_INTERVAL_SECS,
        "jobs.sweep_interval_seconds",
    )?;

    let poll_ms = jobs.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if poll_ms == 0 {
        return Err(LoadError::invalid(
            "jobs.poll_interval_ms",
            "must be greater than zero",
        ));
    }

    Ok(JobsSettings {
        ttl,
        sweep_interval,
        poll_interval: Duration::from_millis(poll_ms),
    })
}

fn build_naming_settings(naming: RawNamingSettings) -> Result<NamingSettings, LoadError> {
    let template = naming
        .name_template
        .unwrap_or_else(|| DEFAULT_NAME_TEMPLATE.to_string());
    let name_template = NameTemplate::parse(&template)
        .map_err(|err| LoadError::invalid("naming.name_template", err.to_string()))?;

    let fallback_primary = naming
        .fallback_primary
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_FALLBACK_PRIMARY.to_string());

    if naming.max_value_chars == Some(0) {
        return Err(LoadError::invalid(
            "naming.max_value_chars",
            "must be greater than zero when set",
        ));
    }

    Ok(NamingSettings {
        name_template,
        fallback_primary,
        max_value_chars: naming.max_value_chars,
        list_separator: naming
            .list_separator
            .unwrap_or_else(|| DEFAULT_LIST_SEPARATOR.to_string()),
        list_conjunction: naming
            .list_conjunction
            .unwrap_or_else(|| DEFAULT_LIST_CONJUNCTION.to_string()),
    })
}

fn build_conversion_settings(
    conversion: RawConversionSettings,
) -> Result<ConversionSettings, LoadError> {
    let timeout = positive_secs(
        conversion.timeout_seconds,
        DEFAULT_CONVERSION_TIMEOUT_SECS,
        "conversion.timeout_seconds",
    )?;

    let backends = match conversion.backends {
        None => default_backends(),
        Some(raw) => raw
            .into_iter()
            .map(build_backend)
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(ConversionSettings { timeout, backends })
}

fn build_backend(raw: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let program = raw
        .program
        .filter(|program| !program.as_os_str().is_empty())
        .ok_or_else(|| LoadError::invalid("conversion.backends.program", "path must not be empty"))?;
    let name = raw
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| program.to_string_lossy().into_owned());
    let args = raw.args.unwrap_or_else(|| vec!["{input}".to_string(), "{output}".to_string()]);
    if !args.iter().any(|arg| arg.contains("{input}")) {
        return Err(LoadError::invalid(
            "conversion.backends.args",
            format!("backend `{name}` never receives `{{input}}`"),
        ));
    }

    Ok(BackendSettings {
        name,
        program,
        args,
    })
}

/// LibreOffice headless, then `docx2pdf`.
pub fn default_backends() -> Vec<BackendSettings> {
    vec![
        BackendSettings {
            name: "libreoffice".to_string(),
            program: PathBuf::from("soffice"),
            args: strings(&[
                "--headless",
                "--convert-to",
                "pdf",
                "--outdir",
                "{outdir}",
                "{input}",
            ]),
        },
        BackendSettings {
            name: "docx2pdf".to_string(),
            program: PathBuf::from("docx2pdf"),
            args: strings(&["{input}", "{output}"]),
        },
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn build_mail_settings(mail: RawMailSettings) -> Result<MailSettings, LoadError> {
    let transport = match mail.transport.as_deref().map(str::trim) {
        None | Some("") => MailTransport::default(),
        Some(value) => MailTransport::try_from(value).map_err(|_| {
            LoadError::invalid(
                "mail.transport",
                format!("unknown transport `{value}` (expected smtp or local_client)"),
            )
        })?,
    };

    let smtp = build_smtp_settings(mail.smtp)?;

    let local_client = LocalClientSettings {
        program: mail
            .local_client
            .program
            .filter(|program| !program.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCAL_CLIENT_PROGRAM.to_string()),
        from: non_blank(mail.local_client.from),
    };

    Ok(MailSettings {
        transport,
        smtp,
        local_client,
        subject: mail
            .subject
            .unwrap_or_else(|| DEFAULT_MAIL_SUBJECT.to_string()),
        body: mail.body.unwrap_or_else(|| DEFAULT_MAIL_BODY.to_string()),
    })
}

/// `None` when no host is configured; a host without a sender is an error.
fn build_smtp_settings(smtp: RawSmtpSettings) -> Result<Option<SmtpSettings>, LoadError> {
    let Some(host) = non_blank(smtp.host) else {
        return Ok(None);
    };

    let from = non_blank(smtp.from).ok_or_else(|| {
        LoadError::invalid("mail.smtp.from", "required when mail.smtp.host is set")
    })?;

    let port = smtp.port.unwrap_or(DEFAULT_SMTP_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "mail.smtp.port",
            "port must be greater than zero",
        ));
    }

    let tls = match smtp.tls.as_deref().map(str::trim) {
        None | Some("") | Some("starttls") => SmtpTls::Starttls,
        Some("wrapper") | Some("tls") => SmtpTls::Wrapper,
        Some("none") => SmtpTls::None,
        Some(other) => {
            return Err(LoadError::invalid(
                "mail.smtp.tls",
                format!("unknown mode `{other}` (expected starttls, wrapper or none)"),
            ));
        }
    };

    Ok(Some(SmtpSettings {
        host,
        port,
        username: non_blank(smtp.username),
        password: smtp.password,
        from,
        tls,
    }))
}

fn positive_secs(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        seconds => Ok(Duration::from_secs(seconds)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNamingSettings {
    name_template: Option<String>,
    fallback_primary: Option<String>,
    max_value_chars: Option<usize>,
    list_separator: Option<String>,
    list_conjunction: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConversionSettings {
    timeout_seconds: Option<u64>,
    backends: Option<Vec<RawBackendSettings>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    name: Option<String>,
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    transport: Option<String>,
    smtp: RawSmtpSettings,
    local_client: RawLocalClientSettings,
    subject: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSmtpSettings {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    from: Option<String>,
    tls: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLocalClientSettings {
    program: Option<String>,
    from: Option<String>,
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
