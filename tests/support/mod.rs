//! Fakes and fixtures shared by the job integration tests.

#![allow(dead_code)]

use std::{
    io::{Cursor, Read},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use docbatch::{
    application::{
        convert::{ConversionChain, ConvertError, Converter},
        jobs::{JobOptions, JobRegistry, JobRequest, JobServices, RegistrySettings},
        mail::{MailError, Mailer, MessageTemplate, OutgoingMail},
        resolve::ResolveOptions,
    },
    domain::{
        dataset::Dataset,
        mapping::MappingEntry,
        naming::NameTemplate,
        types::JobKind,
    },
    infra::archive::ArchiveBuilder,
};
use docbatch_api_types::JobStatusView;
use tokio::sync::Semaphore;
use uuid::Uuid;
use zip::ZipArchive;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake";

/// Minimal `.docx` whose body holds one paragraph per entry.
pub fn docx(paragraphs: &[&str]) -> Bytes {
    let body: String = paragraphs
        .iter()
        .map(|text| format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>"))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut builder = ArchiveBuilder::new();
    builder
        .add_file("[Content_Types].xml", b"<Types/>")
        .expect("content types");
    builder
        .add_file("word/document.xml", document.as_bytes())
        .expect("document");
    builder.finish().expect("finish")
}

pub fn dataset(headers: &[&str], rows: &[&[&str]]) -> Dataset {
    Dataset::new(
        headers.iter().copied(),
        rows.iter()
            .map(|row| row.iter().map(|value| value.to_string()).collect())
            .collect::<Vec<Vec<String>>>(),
    )
}

pub fn mapping(pairs: &[(&str, &str)]) -> Vec<MappingEntry> {
    pairs
        .iter()
        .map(|(placeholder, column)| MappingEntry::new(*placeholder, *column))
        .collect()
}

pub fn request(kind: JobKind, dataset: Dataset, mapping: Vec<MappingEntry>, options: JobOptions) -> JobRequest {
    JobRequest {
        kind,
        template: docx(&["Ola {{nome}}", "Escola: {{escola}}"]),
        dataset,
        mapping,
        options,
    }
}

pub fn services(converters: Vec<Arc<dyn Converter>>, mailer: Arc<dyn Mailer>) -> JobServices {
    JobServices {
        conversion: ConversionChain::new(converters),
        mailer,
        message: MessageTemplate {
            subject: "Documento".to_string(),
            body: "Segue em anexo.".to_string(),
        },
        resolve: ResolveOptions::default(),
        name_template: NameTemplate::parse("{index:03}_{primary}.docx").expect("template"),
        fallback_primary: "documento".to_string(),
    }
}

pub fn registry(converters: Vec<Arc<dyn Converter>>, mailer: Arc<dyn Mailer>) -> JobRegistry {
    JobRegistry::in_memory(services(converters, mailer), RegistrySettings::default())
}

/// Polls until `ready` holds, failing the test after five (virtual or real)
/// seconds.
pub async fn wait_for(
    registry: &JobRegistry,
    id: Uuid,
    ready: impl Fn(&JobStatusView) -> bool,
) -> JobStatusView {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = registry.status(id).expect("job exists");
            if ready(&view) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    polled.expect("job reached the expected state in time")
}

/// Waits until the job's runner task has released its run slot.
pub async fn wait_runner_gone(registry: &JobRegistry, id: Uuid) {
    let gone = tokio::time::timeout(Duration::from_secs(5), async {
        while registry.has_runner(id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    gone.expect("runner stopped in time");
}

pub async fn wait_terminal(registry: &JobRegistry, id: Uuid) -> JobStatusView {
    wait_for(registry, id, |view| view.status.is_terminal()).await
}

pub fn zip_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    (0..archive.len())
        .map(|index| archive.by_index(index).expect("entry").name().to_string())
        .collect()
}

pub fn zip_bytes(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    let mut file = archive.by_name(name).expect("entry");
    let mut content = Vec::new();
    file.read_to_end(&mut content).expect("read entry");
    content
}

pub fn zip_text(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    let mut file = archive.by_name(name).expect("entry");
    let mut text = String::new();
    file.read_to_string(&mut text).expect("read entry");
    text
}

/// Converter returning a fixed PDF, optionally gated so each call waits for
/// a permit.
pub struct FakeConverter {
    name: &'static str,
    output: Result<Vec<u8>, String>,
    gate: Option<Arc<Semaphore>>,
    panics: bool,
    calls: AtomicUsize,
}

impl FakeConverter {
    pub fn pdf(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: Ok(FAKE_PDF.to_vec()),
            gate: None,
            panics: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: Err(reason.to_string()),
            gate: None,
            panics: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(name: &'static str, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: Ok(FAKE_PDF.to_vec()),
            gate: Some(gate),
            panics: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Panics on every call, after waiting for a permit when gated.
    pub fn panicking(name: &'static str, gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            output: Ok(FAKE_PDF.to_vec()),
            gate,
            panics: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for FakeConverter {
    fn name(&self) -> &str {
        self.name
    }

    async fn convert(&self, _document: &[u8]) -> Result<Vec<u8>, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        if self.panics {
            panic!("{} crashed", self.name);
        }
        self.output.clone().map_err(ConvertError::Failed)
    }
}

/// Mailer that records every message and rejects listed recipients.
#[derive(Default)]
pub struct RecordingMailer {
    reject: Vec<String>,
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(recipients: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            reject: recipients.iter().map(|value| value.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    fn transport(&self) -> &str {
        "recording"
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.reject.iter().any(|address| address == &mail.recipient) {
            return Err(MailError::Rejected("mailbox unavailable".to_string()));
        }
        self.sent.lock().expect("lock").push(mail.clone());
        Ok(())
    }
}
