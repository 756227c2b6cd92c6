//! Deterministic zip writing shared by the template package and job results.
//!
//! Entry timestamps are pinned to the zip epoch so identical inputs always
//! produce byte-identical archives.

use std::io::{Cursor, Write};

use bytes::Bytes;
use thiserror::Error;
use zip::{CompressionMethod, DateTime, ZipWriter, result::ZipError, write::SimpleFileOptions};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds an in-memory zip archive entry by entry, in insertion order.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<(), ArchiveError> {
        self.add_file_with(name, data, CompressionMethod::Deflated)
    }

    pub fn add_file_with(
        &mut self,
        name: &str,
        data: &[u8],
        compression: CompressionMethod,
    ) -> Result<(), ArchiveError> {
        self.writer.start_file(name, options(compression))?;
        self.writer.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    pub fn add_directory(&mut self, name: &str) -> Result<(), ArchiveError> {
        self.writer
            .add_directory(name, options(CompressionMethod::Stored))?;
        self.entries += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn finish(self) -> Result<Bytes, ArchiveError> {
        let cursor = self.writer.finish()?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

fn options(compression: CompressionMethod) -> SimpleFileOptions {
    let compression = match compression {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    };
    SimpleFileOptions::default()
        .compression_method(compression)
        .last_modified_time(DateTime::default())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use zip::ZipArchive;

    use super::*;

    fn build() -> Bytes {
        let mut builder = ArchiveBuilder::new();
        builder.add_file("a.txt", b"alpha").expect("add a");
        builder.add_directory("nested/").expect("dir");
        builder
            .add_file_with("nested/b.bin", b"beta", CompressionMethod::Stored)
            .expect("add b");
        assert_eq!(builder.len(), 3);
        builder.finish().expect("finish")
    }

    #[test]
    fn archives_are_byte_identical_across_builds() {
        assert_eq!(build(), build());
    }

    #[test]
    fn entries_keep_insertion_order_and_content() {
        let bytes = build();
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).expect("open");
        assert_eq!(archive.len(), 3);
        let mut first = archive.by_index(0).expect("entry 0");
        assert_eq!(first.name(), "a.txt");
        let mut content = String::new();
        first.read_to_string(&mut content).expect("read");
        assert_eq!(content, "alpha");
    }
}
