//! Batch Aggregation - Pass-Through Or Archive
//!
//! A one-item batch hands back its artifact untouched. Larger batches collect
//! every successful artifact and finalize a single archive once all items
//! have been attempted.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::config::Mode;
use crate::pipeline::OutputArtifact;

pub const ARCHIVE_MIME_TYPE: &str = "application/zip";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Archive writer consumed by the aggregator: ordered (name, bytes) pairs in,
/// one archive buffer out.
pub trait ArchiveWriter: Send + Sync {
    fn write_archive(&self, entries: &[(&str, &[u8])]) -> Result<Vec<u8>, ArchiveError>;
}

/// Deflate-compressed zip with fixed entry timestamps, so identical inputs
/// produce identical archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiveWriter;

impl ArchiveWriter for ZipArchiveWriter {
    fn write_archive(&self, entries: &[(&str, &[u8])]) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for (name, bytes) in entries {
            zip.start_file(*name, options)?;
            zip.write_all(bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Collects artifacts for one batch.
pub struct BatchAggregator<'w> {
    mode: Mode,
    item_count: usize,
    writer: &'w dyn ArchiveWriter,
    artifacts: Vec<OutputArtifact>,
}

impl<'w> BatchAggregator<'w> {
    pub fn new(mode: Mode, item_count: usize, writer: &'w dyn ArchiveWriter) -> Self {
        Self {
            mode,
            item_count,
            writer,
            artifacts: Vec::new(),
        }
    }

    pub fn push(&mut self, artifact: OutputArtifact) {
        debug!(file = %artifact.filename, size = artifact.bytes.len(), "artifact collected");
        self.artifacts.push(artifact);
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Produce the batch output. `None` when a single-item batch failed or
    /// the batch was empty.
    pub fn finish(mut self) -> Result<Option<OutputArtifact>, ArchiveError> {
        match self.item_count {
            0 => Ok(None),
            1 => Ok(self.artifacts.pop()),
            _ => {
                let mut used = HashSet::new();
                let names: Vec<String> = self
                    .artifacts
                    .iter()
                    .map(|a| unique_name(&mut used, &a.filename))
                    .collect();
                let entries: Vec<(&str, &[u8])> = names
                    .iter()
                    .zip(&self.artifacts)
                    .map(|(name, a)| (name.as_str(), a.bytes.as_slice()))
                    .collect();

                let bytes = self.writer.write_archive(&entries)?;
                info!(
                    archive = self.mode.archive_name(),
                    entries = entries.len(),
                    size = bytes.len(),
                    "archive finalized"
                );
                Ok(Some(OutputArtifact {
                    filename: self.mode.archive_name().to_string(),
                    bytes,
                    mime_type: ARCHIVE_MIME_TYPE.to_string(),
                }))
            }
        }
    }
}

/// `name.ext`, then `name-2.ext`, `name-3.ext`, ... for repeats.
fn unique_name(used: &mut HashSet<String>, filename: &str) -> String {
    if used.insert(filename.to_string()) {
        return filename.to_string();
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (filename, String::new()),
    };
    (2..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| used.insert(candidate.clone()))
        .unwrap_or_else(|| filename.to_string())
}
