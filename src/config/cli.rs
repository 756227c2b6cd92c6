use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the docbatch binary.
#[derive(Debug, Parser)]
#[command(
    name = "docbatch",
    version,
    about = "Batch document generation from DOCX templates"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DOCBATCH_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render one document per dataset row, optionally converting and emailing them.
    Generate(Box<GenerateArgs>),
    /// Convert every row and email the result to the addresses in a column.
    Send(Box<SendArgs>),
    /// List the placeholders a template contains.
    Placeholders(PlaceholdersArgs),
}

impl Command {
    pub fn logging(&self) -> &LoggingOverrides {
        match self {
            Command::Generate(args) => &args.job.overrides.logging,
            Command::Send(args) => &args.job.overrides.logging,
            Command::Placeholders(args) => &args.logging,
        }
    }

    pub fn overrides(&self) -> Option<&RunOverrides> {
        match self {
            Command::Generate(args) => Some(&args.job.overrides),
            Command::Send(args) => Some(&args.job.overrides),
            Command::Placeholders(_) => None,
        }
    }
}

/// Inputs shared by `generate` and `send`.
#[derive(Debug, Args, Clone)]
pub struct JobArgs {
    /// DOCX template containing `{{placeholder}}` tokens.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub template: PathBuf,

    /// Dataset with a header row: delimited text (`.csv`, `.tsv`, `.txt`) or
    /// a workbook (`.xlsx`, `.xls`, `.ods`). One document per row.
    #[arg(long = "data", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub data: PathBuf,

    /// TOML file with `[[mapping]]` entries (placeholder, column, prefix, group).
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub mapping: PathBuf,

    /// Directory the result files are written into.
    #[arg(long = "out", value_name = "DIR", default_value = "out", value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Column whose value feeds `{primary}` in file names.
    #[arg(long = "primary-column", value_name = "COLUMN")]
    pub primary_column: Option<String>,

    /// Output file name template, e.g. `{index:03}_{primary}.docx`.
    #[arg(long = "name-template", value_name = "TEMPLATE")]
    pub name_template: Option<String>,

    /// Email subject for this run.
    #[arg(long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Email body for this run.
    #[arg(long, value_name = "TEXT")]
    pub body: Option<String>,

    #[command(flatten)]
    pub overrides: RunOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Also produce PDF copies of every document.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub convert: bool,

    /// Email the PDF copies to the addresses found in this column.
    #[arg(long = "email-column", value_name = "COLUMN")]
    pub email_column: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SendArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Column holding recipient addresses.
    #[arg(long = "email-column", value_name = "COLUMN")]
    pub email_column: String,
}

#[derive(Debug, Args, Clone)]
pub struct PlaceholdersArgs {
    /// DOCX template to inspect.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub template: PathBuf,

    /// Print one name per line instead of a summary.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub plain: bool,

    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the mail transport (smtp|local_client).
    #[arg(long = "mail-transport", value_name = "TRANSPORT")]
    pub mail_transport: Option<String>,

    /// Override the SMTP relay host.
    #[arg(long = "smtp-host", value_name = "HOST")]
    pub smtp_host: Option<String>,

    /// Override the SMTP relay port.
    #[arg(long = "smtp-port", value_name = "PORT")]
    pub smtp_port: Option<u16>,

    /// Override the sender address.
    #[arg(long = "mail-from", value_name = "ADDRESS")]
    pub mail_from: Option<String>,

    /// Override the per-document conversion timeout.
    #[arg(long = "conversion-timeout-seconds", value_name = "SECONDS")]
    pub conversion_timeout_seconds: Option<u64>,

    /// Override how often job progress is polled.
    #[arg(long = "jobs-poll-interval-ms", value_name = "MILLIS")]
    pub jobs_poll_interval_ms: Option<u64>,

    /// Override the cap on placeholder value length.
    #[arg(long = "naming-max-value-chars", value_name = "CHARS")]
    pub max_value_chars: Option<usize>,
}
