//! Sequential per-job pipeline: resolve, render, convert, queue, dispatch.

use std::{sync::Arc, time::Instant};

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        convert::ConversionResult,
        mail::{
            DeliveryReport, EmailDispatcher, EmailQueue, MessageTemplate, ReportError,
            parse_recipients,
        },
        resolve::RowResolver,
        template::TemplateError,
    },
    domain::{
        naming::{CONVERTED_EXTENSION, NamingContext, UniqueNames, with_extension},
        types::JobKind,
    },
    infra::archive::{ArchiveBuilder, ArchiveError},
};

use super::{
    model::{EmailSummary, GenerateOutput, GeneratedFile, JobOutput, JobRecord, SendOutput},
    pause::PauseSignal,
    registry::JobServices,
    repository::JobRepository,
    request::ValidatedJob,
};

const METRIC_ROWS_PROCESSED: &str = "docbatch_rows_processed_total";

#[derive(Debug, Error)]
pub(crate) enum RunError {
    #[error("template rendering failed: {0}")]
    Template(#[from] TemplateError),
    #[error("archive assembly failed: {0}")]
    Archive(#[from] ArchiveError),
    #[error("delivery report failed: {0}")]
    Report(#[from] ReportError),
}

pub(crate) struct JobRunner {
    id: Uuid,
    job: ValidatedJob,
    repo: Arc<dyn JobRepository>,
    services: Arc<JobServices>,
    pause: PauseSignal,
}

impl JobRunner {
    pub(crate) fn new(
        id: Uuid,
        job: ValidatedJob,
        repo: Arc<dyn JobRepository>,
        services: Arc<JobServices>,
        pause: PauseSignal,
    ) -> Self {
        Self {
            id,
            job,
            repo,
            services,
            pause,
        }
    }

    /// Runs to completion and records the terminal state. Returns `Ok` when
    /// the job finished or was evicted mid-run.
    pub(crate) async fn run(self) -> Result<(), RunError> {
        let started_at = Instant::now();
        let kind = self.job.kind;
        let total = self.job.dataset.len();
        info!(
            target = "application::jobs::runner",
            job_id = %self.id,
            kind = kind.as_str(),
            rows = total,
            convert = self.job.convert,
            email = self.job.email_column.is_some(),
            "job started"
        );

        let resolver = RowResolver::new(
            self.job.mapping.clone(),
            self.job.template.placeholders().iter().cloned(),
            self.services.resolve.clone(),
        );
        let naming = NamingContext {
            template: &self.job.name_template,
            primary_column: &self.job.primary_column,
            fallback_primary: &self.services.fallback_primary,
        };
        let email_column = self.job.email_column.as_deref();

        let mut documents = (kind == JobKind::Generate).then(ArchiveBuilder::new);
        let mut converted =
            (kind == JobKind::Generate && self.job.convert).then(ArchiveBuilder::new);
        let mut document_names = UniqueNames::new();
        let mut converted_names = UniqueNames::new();
        let mut queue = EmailQueue::new();
        let mut files = Vec::with_capacity(total);
        let mut any_converted = false;

        for (index, row) in self.job.dataset.rows().iter().enumerate() {
            let number = index + 1;
            if !self.checkpoint().await {
                return Ok(());
            }
            self.update(|record| {
                record.set_message(format!("processing row {number} of {total}"))
            });

            let resolved = resolver.resolve(row);
            for value in resolved.suppressed() {
                self.note(format!(
                    "row {number}: repeated value for `{}` left empty in its group",
                    value.placeholder
                ));
            }

            let rendered = self.job.template.render(&resolved.values)?;
            let document_name = document_names.claim(&naming.document_name(row, index));
            if let Some(archive) = documents.as_mut() {
                archive.add_file(&document_name, &rendered.bytes)?;
            }

            let recipients = email_column
                .map(|column| parse_recipients(row.value(column)))
                .unwrap_or_default();
            if email_column.is_some() && recipients.is_empty() {
                self.note(format!("row {number} ({document_name}): no recipient address found"));
            }

            let mut converted_name = None;
            if self.job.convert {
                match self.services.conversion.convert(&rendered.bytes).await {
                    ConversionResult::Converted { bytes, backend } => {
                        let name = converted_names
                            .claim(&with_extension(&document_name, CONVERTED_EXTENSION));
                        if let Some(archive) = converted.as_mut() {
                            archive.add_file(&name, &bytes)?;
                        }
                        for recipient in &recipients {
                            queue.push(recipient, &name, bytes.clone());
                        }
                        debug!(
                            target = "application::jobs::runner",
                            job_id = %self.id,
                            row = number,
                            backend = %backend,
                            recipients = recipients.len(),
                            "row converted"
                        );
                        any_converted = true;
                        converted_name = Some(name);
                    }
                    failed => {
                        let reason = failed.failure_summary().unwrap_or_default();
                        let skipped = if recipients.is_empty() {
                            String::new()
                        } else {
                            format!("; email skipped for {} recipient(s)", recipients.len())
                        };
                        self.note(format!(
                            "row {number} ({document_name}): conversion failed ({reason}){skipped}"
                        ));
                    }
                }
            }

            files.push(GeneratedFile {
                row: number,
                document: document_name,
                converted: converted_name,
                substitutions: rendered.substitutions,
            });
            counter!(METRIC_ROWS_PROCESSED, "kind" => kind.as_str()).increment(1);
            let tracked = self.update(|record| {
                record.advance(number, format!("processed row {number} of {total}"))
            });
            if !tracked {
                return Ok(());
            }
        }

        if !self.checkpoint().await {
            return Ok(());
        }

        let delivery = match email_column {
            Some(_) => Some(self.dispatch(queue).await),
            None => None,
        };

        let output = match kind {
            JobKind::Generate => JobOutput::Generate(GenerateOutput {
                documents: documents.unwrap_or_default().finish()?,
                converted: match converted {
                    Some(archive) if any_converted => Some(archive.finish()?),
                    _ => None,
                },
                any_converted,
                files,
                email: delivery.map(|(sent, failed, report)| EmailSummary {
                    sent,
                    failed,
                    report,
                }),
            }),
            JobKind::Send => {
                let (sent, failed, report) = delivery.unwrap_or_default();
                let report_csv = report.to_csv()?;
                JobOutput::Send(SendOutput {
                    sent,
                    failed,
                    report,
                    report_csv,
                })
            }
        };

        let mut output = Some(output);
        let mut warnings = 0;
        self.update(|record| {
            let Some(output) = output.take() else {
                return false;
            };
            warnings = record.warnings.len();
            let message = if warnings == 0 {
                "done".to_string()
            } else {
                format!("done with {warnings} warning(s)")
            };
            record.finish(output, message)
        });

        info!(
            target = "application::jobs::runner",
            job_id = %self.id,
            kind = kind.as_str(),
            rows = total,
            warnings,
            any_converted,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "job finished"
        );
        Ok(())
    }

    async fn dispatch(&self, queue: EmailQueue) -> (usize, usize, DeliveryReport) {
        let message = MessageTemplate {
            subject: self
                .job
                .subject
                .clone()
                .unwrap_or_else(|| self.services.message.subject.clone()),
            body: self
                .job
                .body
                .clone()
                .unwrap_or_else(|| self.services.message.body.clone()),
        };
        let dispatcher = EmailDispatcher::new(Arc::clone(&self.services.mailer), message);
        let repo = Arc::clone(&self.repo);
        let id = self.id;

        let outcome = dispatcher
            .dispatch(queue, move |progress| {
                repo.update(id, &mut |record: &mut JobRecord| {
                    record.set_email_progress(progress.total, progress.sent, progress.failed)
                        | record.set_message(format!(
                            "sending email {} of {}",
                            progress.processed, progress.total
                        ))
                });
            })
            .await;

        (outcome.sent, outcome.failed, DeliveryReport::new(outcome.results))
    }

    /// Pause point. Returns `false` once the job has been evicted.
    async fn checkpoint(&self) -> bool {
        if self.pause.is_paused() {
            debug!(
                target = "application::jobs::runner",
                job_id = %self.id,
                "runner waiting for resume"
            );
        }
        self.pause.wait_until_resumed().await;

        let tracked = self.repo.get(self.id).is_some();
        if !tracked {
            info!(
                target = "application::jobs::runner",
                job_id = %self.id,
                "job evicted while running; runner stopping"
            );
        }
        tracked
    }

    fn update(&self, mut apply: impl FnMut(&mut JobRecord) -> bool) -> bool {
        self.repo.update(self.id, &mut apply).is_some()
    }

    fn note(&self, note: String) {
        warn!(
            target = "application::jobs::runner",
            job_id = %self.id,
            note = %note,
            "row degraded"
        );
        self.update(|record| record.push_warning(note.clone()));
    }
}
