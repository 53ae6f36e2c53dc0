//! Input Validation - Rule/Validator Separation
//!
//! Rules classify a candidate. The validator accepts a candidate if any rule
//! recognizes it and silently drops the rest.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Broad family of an accepted input, used to pick a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Raster,
    Vector,
}

/// A file offered for conversion, before validation.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.map(str::to_string),
            bytes,
        }
    }

    /// Read a candidate from disk. No mime type is declared for local files,
    /// so acceptance falls to the extension rule.
    pub fn from_path(path: &Path) -> Result<Self, std::io::Error> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, mime_type: None, bytes })
    }
}

/// An accepted input. Bytes are shared so a run can hand them to the
/// blocking pool without copying.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub kind: SourceKind,
    pub bytes: Arc<[u8]>,
}

/// Acceptance rule trait - recognizes a candidate or passes
pub trait AcceptanceRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, candidate: &FileCandidate) -> Option<SourceKind>;
}

// --- Concrete Rules ---

pub struct MimeTypeRule;

impl AcceptanceRule for MimeTypeRule {
    fn name(&self) -> &'static str { "mime_type" }

    fn classify(&self, candidate: &FileCandidate) -> Option<SourceKind> {
        let mime = candidate.mime_type.as_deref()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/png" | "image/jpeg" | "image/jpg" => Some(SourceKind::Raster),
            "image/svg+xml" => Some(SourceKind::Vector),
            _ => None,
        }
    }
}

pub struct ExtensionRule;

impl AcceptanceRule for ExtensionRule {
    fn name(&self) -> &'static str { "extension" }

    fn classify(&self, candidate: &FileCandidate) -> Option<SourceKind> {
        let (_, ext) = candidate.name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => Some(SourceKind::Raster),
            "svg" => Some(SourceKind::Vector),
            _ => None,
        }
    }
}

/// Validator runs the rules in order; the first match wins.
pub struct FileValidator {
    rules: Vec<Box<dyn AcceptanceRule>>,
}

impl FileValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(MimeTypeRule), Box::new(ExtensionRule)],
        }
    }

    pub fn classify(&self, candidate: &FileCandidate) -> Option<SourceKind> {
        self.rules.iter().find_map(|rule| {
            let kind = rule.classify(candidate)?;
            debug!(file = %candidate.name, rule = rule.name(), ?kind, "accepted");
            Some(kind)
        })
    }

    pub fn accepts(&self, candidate: &FileCandidate) -> bool {
        self.classify(candidate).is_some()
    }

    /// Keep accepted candidates in their original order.
    pub fn filter(&self, candidates: Vec<FileCandidate>) -> Vec<InputFile> {
        candidates
            .into_iter()
            .filter_map(|candidate| match self.classify(&candidate) {
                Some(kind) => Some(InputFile {
                    name: candidate.name,
                    kind,
                    bytes: Arc::from(candidate.bytes),
                }),
                None => {
                    debug!(file = %candidate.name, "unsupported format, dropped");
                    None
                }
            })
            .collect()
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new()
    }
}
