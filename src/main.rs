use std::{path::Path, process, sync::Arc, time::Instant};

use bytes::Bytes;
use docbatch::{
    application::{
        convert::{ConversionChain, Converter},
        error::{AppError, ErrorReport},
        jobs::{
            JobOptions, JobOutput, JobRegistry, JobRequest, JobServices, RegistrySettings,
        },
        mail::{Mailer, MessageTemplate, UnconfiguredMailer},
        resolve::ResolveOptions,
        template::TemplatePackage,
    },
    config::{self, JobArgs, MailSettings, Settings},
    domain::types::{JobKind, JobStatus, MailTransport},
    infra::{
        convert::CommandConverter,
        dataset::{load_dataset, load_mapping},
        mail::{LocalClientMailer, SmtpMailer},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const DOCUMENTS_ARCHIVE: &str = "documents.zip";
const CONVERTED_ARCHIVE: &str = "converted.zip";
const DELIVERY_REPORT: &str = "delivery_report.csv";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("cli", error);
    if dispatcher::has_been_set() {
        error!(source = report.source, error = %report.render(), "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(source = report.source, error = %report.render(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        config::Command::Generate(args) => {
            let args = *args;
            let options = JobOptions {
                convert: args.convert,
                send_email: args.email_column.is_some(),
                email_column: args.email_column,
                ..job_options(&args.job)
            };
            run_job(settings, JobKind::Generate, args.job, options).await
        }
        config::Command::Send(args) => {
            let args = *args;
            let options = JobOptions {
                convert: true,
                send_email: true,
                email_column: Some(args.email_column),
                ..job_options(&args.job)
            };
            run_job(settings, JobKind::Send, args.job, options).await
        }
        config::Command::Placeholders(args) => run_placeholders(&args.template, args.plain).await,
    }
}

fn job_options(args: &JobArgs) -> JobOptions {
    JobOptions {
        primary_column: args.primary_column.clone(),
        name_template: args.name_template.clone(),
        subject: args.subject.clone(),
        body: args.body.clone(),
        ..JobOptions::default()
    }
}

async fn run_placeholders(template: &Path, plain: bool) -> Result<(), AppError> {
    let bytes = read_input(template).await?;
    let package = TemplatePackage::load(&bytes)?;

    info!(
        target = "docbatch::placeholders",
        template = %template.display(),
        count = package.placeholders().len(),
        "template inspected"
    );

    if plain {
        for name in package.placeholders() {
            println!("{name}");
        }
    } else if package.placeholders().is_empty() {
        println!("{}: no placeholders found", template.display());
    } else {
        println!("{}:", template.display());
        for (position, name) in package.placeholders().iter().enumerate() {
            println!("  {:>3}. {{{{{name}}}}}", position + 1);
        }
    }
    Ok(())
}

async fn run_job(
    settings: Settings,
    kind: JobKind,
    args: JobArgs,
    options: JobOptions,
) -> Result<(), AppError> {
    let started_at = Instant::now();
    let template = Bytes::from(read_input(&args.template).await?);
    let dataset = load_dataset(&args.data).await?;
    let mapping = load_mapping(&args.mapping).await?;

    let registry = JobRegistry::in_memory(
        build_services(&settings)?,
        RegistrySettings {
            ttl: settings.jobs.ttl,
            sweep_interval: settings.jobs.sweep_interval,
        },
    );
    let sweeper = registry.spawn_sweeper();

    let created = registry.create(JobRequest {
        kind,
        template,
        dataset,
        mapping,
        options,
    })?;
    info!(
        target = "docbatch::job",
        job_id = %created.job_id,
        kind = kind.as_str(),
        total = created.total,
        "job submitted"
    );

    let mut interval = tokio::time::interval(settings.jobs.poll_interval);
    interval.tick().await; // Skip the first immediate tick
    let view = loop {
        interval.tick().await;
        let view = registry.status(created.job_id)?;
        info!(
            target = "docbatch::job",
            job_id = %view.id,
            status = view.status.as_str(),
            current = view.current,
            total = view.total,
            email_sent = view.email_sent,
            email_failed = view.email_failed,
            message = %view.message,
            "job progress"
        );
        if view.status.is_terminal() {
            break view;
        }
    };
    sweeper.abort();

    if view.status == JobStatus::Error {
        return Err(AppError::unexpected(
            view.error.unwrap_or_else(|| "job failed".to_string()),
        ));
    }
    for note in &view.warnings {
        warn!(target = "docbatch::job", job_id = %view.id, note = %note, "row warning");
    }

    let output = registry.result(created.job_id)?;
    write_output(&args.out, &output).await?;

    info!(
        target = "docbatch::job",
        job_id = %view.id,
        out = %args.out.display(),
        warnings = view.warnings.len(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "job finished"
    );
    Ok(())
}

fn build_services(settings: &Settings) -> Result<JobServices, AppError> {
    let converters: Vec<Arc<dyn Converter>> = settings
        .conversion
        .backends
        .iter()
        .map(|backend| {
            Arc::new(CommandConverter::new(
                backend.name.clone(),
                backend.program.clone(),
                backend.args.clone(),
                settings.conversion.timeout,
            )) as Arc<dyn Converter>
        })
        .collect();

    Ok(JobServices {
        conversion: ConversionChain::new(converters),
        mailer: build_mailer(&settings.mail)?,
        message: MessageTemplate {
            subject: settings.mail.subject.clone(),
            body: settings.mail.body.clone(),
        },
        resolve: ResolveOptions {
            max_value_chars: settings.naming.max_value_chars,
            list_separator: settings.naming.list_separator.clone(),
            list_conjunction: settings.naming.list_conjunction.clone(),
        },
        name_template: settings.naming.name_template.clone(),
        fallback_primary: settings.naming.fallback_primary.clone(),
    })
}

fn build_mailer(mail: &MailSettings) -> Result<Arc<dyn Mailer>, AppError> {
    let mailer: Arc<dyn Mailer> = match (mail.transport, mail.smtp.as_ref()) {
        (MailTransport::Smtp, Some(smtp)) => Arc::new(SmtpMailer::new(smtp)?),
        (MailTransport::Smtp, None) => {
            Arc::new(UnconfiguredMailer::new("mail.smtp.host is not configured"))
        }
        (MailTransport::LocalClient, _) => Arc::new(LocalClientMailer::new(
            mail.local_client.program.clone(),
            mail.local_client.from.clone(),
        )),
    };
    Ok(mailer)
}

async fn write_output(out: &Path, output: &JobOutput) -> Result<(), AppError> {
    tokio::fs::create_dir_all(out).await.map_err(io_error(out))?;

    match output {
        JobOutput::Generate(generate) => {
            write_file(&out.join(DOCUMENTS_ARCHIVE), &generate.documents).await?;
            if let Some(converted) = &generate.converted {
                write_file(&out.join(CONVERTED_ARCHIVE), converted).await?;
            }
            if let Some(email) = &generate.email {
                write_file(&out.join(DELIVERY_REPORT), &email.report.to_csv()?).await?;
                info!(
                    target = "docbatch::job",
                    sent = email.sent,
                    failed = email.failed,
                    "emails dispatched"
                );
            }
            info!(
                target = "docbatch::job",
                documents = generate.files.len(),
                any_converted = generate.any_converted,
                "documents written"
            );
        }
        JobOutput::Send(send) => {
            write_file(&out.join(DELIVERY_REPORT), &send.report_csv).await?;
            info!(
                target = "docbatch::job",
                sent = send.sent,
                failed = send.failed,
                "emails dispatched"
            );
        }
    }
    Ok(())
}

async fn read_input(path: &Path) -> Result<Vec<u8>, AppError> {
    tokio::fs::read(path).await.map_err(io_error(path))
}

async fn write_file(path: &Path, content: &[u8]) -> Result<(), AppError> {
    tokio::fs::write(path, content).await.map_err(io_error(path))
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> AppError + '_ {
    move |err| AppError::unexpected(format!("{}: {err}", path.display()))
}
