use thiserror::Error;
use zip::result::ZipError;

use crate::infra::archive::ArchiveError;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is not a readable document package: {0}")]
    Package(#[from] ZipError),
    #[error("template package has no `{part}` part")]
    MissingPart { part: &'static str },
    #[error("template part `{part}` is not valid UTF-8")]
    Encoding { part: String },
    #[error("failed to read template part: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write rendered document: {0}")]
    Archive(#[from] ArchiveError),
}
