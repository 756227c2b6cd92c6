//! A loaded `.docx` template: every part kept in archive order, text parts
//! sanitized once at load time.

use std::{
    collections::{BTreeMap, HashSet},
    io::{Cursor, Read},
};

use bytes::Bytes;
use zip::{CompressionMethod, ZipArchive};

use crate::infra::archive::ArchiveBuilder;

use super::{
    error::TemplateError,
    placeholders::collect_placeholders,
    render::{SubstitutionStats, substitute},
    sanitize::sanitize_markup,
};

pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Clone)]
enum PartData {
    Directory,
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Part {
    name: String,
    compression: CompressionMethod,
    data: PartData,
}

/// One rendered document plus per-placeholder substitution counts.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Bytes,
    pub substitutions: SubstitutionStats,
}

#[derive(Debug, Clone)]
pub struct TemplatePackage {
    parts: Vec<Part>,
    placeholders: Vec<String>,
    known: HashSet<String>,
}

impl TemplatePackage {
    pub fn load(bytes: &[u8]) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_string();
            let compression = file.compression();

            let data = if file.is_dir() {
                PartData::Directory
            } else {
                let mut raw = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
                file.read_to_end(&mut raw)?;
                if is_text_part(&name) {
                    let xml = String::from_utf8(raw)
                        .map_err(|_| TemplateError::Encoding { part: name.clone() })?;
                    PartData::Text(sanitize_markup(&xml))
                } else {
                    PartData::Binary(raw)
                }
            };

            parts.push(Part {
                name,
                compression,
                data,
            });
        }

        if !parts.iter().any(|part| part.name == DOCUMENT_PART) {
            return Err(TemplateError::MissingPart {
                part: DOCUMENT_PART,
            });
        }

        let placeholders = scan_placeholders(&parts);
        let known = placeholders.iter().cloned().collect();
        Ok(Self {
            parts,
            placeholders,
            known,
        })
    }

    /// Distinct placeholder names, main body first, then the remaining
    /// text parts in archive order.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn contains(&self, placeholder: &str) -> bool {
        self.known.contains(placeholder)
    }

    /// Substitute `values` into every text part and repackage. Output depends
    /// only on the template and the values.
    pub fn render(
        &self,
        values: &BTreeMap<String, String>,
    ) -> Result<RenderedDocument, TemplateError> {
        let mut builder = ArchiveBuilder::new();
        let mut substitutions = SubstitutionStats::new();

        for part in &self.parts {
            match &part.data {
                PartData::Directory => builder.add_directory(&part.name)?,
                PartData::Binary(raw) => builder.add_file_with(&part.name, raw, part.compression)?,
                PartData::Text(xml) => {
                    let rendered = substitute(xml, values, &self.known, &mut substitutions);
                    builder.add_file_with(&part.name, rendered.as_bytes(), part.compression)?;
                }
            }
        }

        Ok(RenderedDocument {
            bytes: builder.finish()?,
            substitutions,
        })
    }
}

fn is_text_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    if file.contains('/') || !file.ends_with(".xml") {
        return false;
    }
    file == "document.xml"
        || file == "footnotes.xml"
        || file == "endnotes.xml"
        || file.starts_with("header")
        || file.starts_with("footer")
}

fn scan_placeholders(parts: &[Part]) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    let body = parts.iter().filter(|part| part.name == DOCUMENT_PART);
    let rest = parts.iter().filter(|part| part.name != DOCUMENT_PART);
    for part in body.chain(rest) {
        if let PartData::Text(xml) = &part.data {
            collect_placeholders(xml, &mut names, &mut seen);
        }
    }
    names
}
