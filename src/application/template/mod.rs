//! Template repair, placeholder discovery and rendering.

mod error;
mod package;
mod placeholders;
mod render;
mod sanitize;

pub use error::TemplateError;
pub use package::{DOCUMENT_PART, RenderedDocument, TemplatePackage};
pub use placeholders::extract_placeholders;
pub use render::{SubstitutionStats, escape_value, preserve_edge_whitespace, substitute};
pub use sanitize::{sanitize_markup, strip_markup};

#[cfg(test)]
pub(crate) use package::fixtures;
