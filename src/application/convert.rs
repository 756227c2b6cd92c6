//! Ordered fallback over fixed-layout (PDF) conversion backends.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, warn};

const METRIC_CONVERSION_MS: &str = "docbatch_conversion_ms";
const METRIC_CONVERSION_FAILURES: &str = "docbatch_conversion_failures_total";

pub const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("conversion failed: {0}")]
    Failed(String),
    #[error("conversion timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One conversion capability: document bytes in, fixed-layout bytes out.
#[async_trait]
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;

    async fn convert(&self, document: &[u8]) -> Result<Vec<u8>, ConvertError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionAttempt {
    pub backend: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum ConversionResult {
    Converted { bytes: Bytes, backend: String },
    Failed { attempts: Vec<ConversionAttempt> },
}

impl ConversionResult {
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            ConversionResult::Converted { bytes, .. } => Some(bytes),
            ConversionResult::Failed { .. } => None,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionResult::Converted { .. })
    }

    /// `backend: reason` pairs joined for a warning note.
    pub fn failure_summary(&self) -> Option<String> {
        match self {
            ConversionResult::Converted { .. } => None,
            ConversionResult::Failed { attempts } if attempts.is_empty() => {
                Some("no conversion backend configured".to_string())
            }
            ConversionResult::Failed { attempts } => Some(
                attempts
                    .iter()
                    .map(|attempt| format!("{}: {}", attempt.backend, attempt.reason))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        }
    }
}

/// Backends tried in order; the first output that verifies wins.
#[derive(Clone, Default)]
pub struct ConversionChain {
    converters: Vec<Arc<dyn Converter>>,
}

impl ConversionChain {
    pub fn new(converters: Vec<Arc<dyn Converter>>) -> Self {
        Self { converters }
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    pub fn backends(&self) -> Vec<String> {
        self.converters
            .iter()
            .map(|converter| converter.name().to_string())
            .collect()
    }

    pub async fn convert(&self, document: &[u8]) -> ConversionResult {
        let mut attempts = Vec::new();

        for converter in &self.converters {
            let started_at = Instant::now();
            let backend = converter.name().to_string();
            let outcome = converter.convert(document).await;
            let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
            histogram!(METRIC_CONVERSION_MS, "backend" => backend.clone()).record(elapsed_ms);

            let reason = match outcome {
                Ok(bytes) if is_pdf(&bytes) => {
                    debug!(
                        target = "application::convert",
                        backend = %backend,
                        elapsed_ms = elapsed_ms as u64,
                        output_bytes = bytes.len(),
                        "document converted"
                    );
                    return ConversionResult::Converted {
                        bytes: Bytes::from(bytes),
                        backend,
                    };
                }
                Ok(bytes) => format!("output failed verification ({} bytes)", bytes.len()),
                Err(err) => err.to_string(),
            };

            warn!(
                target = "application::convert",
                backend = %backend,
                elapsed_ms = elapsed_ms as u64,
                error = %reason,
                "conversion backend failed; trying next"
            );
            attempts.push(ConversionAttempt { backend, reason });
        }

        counter!(METRIC_CONVERSION_FAILURES).increment(1);
        ConversionResult::Failed { attempts }
    }
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}
