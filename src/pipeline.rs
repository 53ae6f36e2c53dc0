//! Conversion Pipeline - Sequential Batch Orchestrator
//!
//! One item at a time: decode → rasterize → encode → (ICO) container build.
//! Item failures are recorded on the item and never stop the batch. Only an
//! archive failure fails the run as a whole.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::{info, instrument, warn};

use crate::archive::{ArchiveError, ArchiveWriter, BatchAggregator, ZipArchiveWriter};
use crate::config::{BatchConfig, Mode};
use crate::decode::{ImageDecoder, StandardDecoder};
use crate::ico::build_icon_container;
use crate::raster::{RasterEncoder, RasterFormat, RasterSurface, StandardEncoder};
use crate::report::ArtifactSummary;
use crate::validation::{FileCandidate, FileValidator, InputFile};

/// Failure of a single item. Recorded on the item, never propagated past
/// the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Icon build failed: {0}")]
    ContainerBuild(String),
}

/// Failure of a whole batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("A batch is already running")]
    Busy,

    #[error("Archive could not be finalized: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Invalid status transition {from:?} -> {to:?}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    #[error("No item at index {0}")]
    ItemMissing(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ready,
    Working,
    Done,
    Error,
}

impl ItemStatus {
    /// Ready → Working → Done | Error. Nothing else.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Ready, ItemStatus::Working)
                | (ItemStatus::Working, ItemStatus::Done)
                | (ItemStatus::Working, ItemStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionItem {
    pub name: String,
    pub status: ItemStatus,
    pub detail: Option<String>,
}

impl ConversionItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Ready,
            detail: None,
        }
    }

    fn advance(&mut self, next: ItemStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.advance(ItemStatus::Working)?;
        self.detail = None;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), PipelineError> {
        self.advance(ItemStatus::Done)
    }

    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), PipelineError> {
        self.advance(ItemStatus::Error)?;
        self.detail = Some(detail.into());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Receives every item status change of a run.
pub trait BatchObserver {
    fn item_changed(&self, index: usize, item: &ConversionItem);
}

impl<F> BatchObserver for F
where
    F: Fn(usize, &ConversionItem),
{
    fn item_changed(&self, index: usize, item: &ConversionItem) {
        self(index, item)
    }
}

pub struct NoopObserver;

impl BatchObserver for NoopObserver {
    fn item_changed(&self, _: usize, _: &ConversionItem) {}
}

#[derive(Debug, Clone)]
pub struct ItemResult {
    pub item: ConversionItem,
    pub artifact: Option<ArtifactSummary>,
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// The artifact for a one-item batch, or the archive for larger ones.
    pub output: Option<OutputArtifact>,
    pub results: Vec<ItemResult>,
}

impl BatchOutcome {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.item.status == ItemStatus::Error).count()
    }
}

#[derive(Default)]
struct Queue {
    files: Vec<InputFile>,
    items: Vec<ConversionItem>,
}

/// Clears the busy flag on every exit path of a run or submit.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, PipelineError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| PipelineError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The conversion orchestrator - single entry point for batch runs
pub struct ConversionOrchestrator {
    validator: FileValidator,
    decoder: Arc<dyn ImageDecoder>,
    encoder: Arc<dyn RasterEncoder>,
    archive_writer: Box<dyn ArchiveWriter>,
    queue: Mutex<Queue>,
    busy: AtomicBool,
}

impl ConversionOrchestrator {
    pub fn new(
        decoder: Arc<dyn ImageDecoder>,
        encoder: Arc<dyn RasterEncoder>,
        archive_writer: Box<dyn ArchiveWriter>,
    ) -> Self {
        Self {
            validator: FileValidator::new(),
            decoder,
            encoder,
            archive_writer,
            queue: Mutex::new(Queue::default()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate `candidates` and replace the queue with the accepted ones.
    /// Returns the number accepted.
    ///
    /// Holds the busy flag while replacing the queue, so a submit and a run
    /// never overlap.
    pub fn submit(&self, candidates: Vec<FileCandidate>) -> Result<usize, PipelineError> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        let files = self.validator.filter(candidates);
        let items = files.iter().map(|f| ConversionItem::new(&f.name)).collect();

        let mut queue = self.queue.lock();
        *queue = Queue { files, items };
        info!(accepted = queue.files.len(), "queue replaced");
        Ok(queue.files.len())
    }

    /// Read-only view of the queue.
    pub fn snapshot(&self) -> Vec<ConversionItem> {
        self.queue.lock().items.clone()
    }

    pub async fn run(&self, config: BatchConfig) -> Result<BatchOutcome, PipelineError> {
        self.run_observed(config, &NoopObserver).await
    }

    /// Run every queued item in order under one fixed configuration.
    pub async fn run_observed(
        &self,
        config: BatchConfig,
        observer: &dyn BatchObserver,
    ) -> Result<BatchOutcome, PipelineError> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let files = {
            let mut guard = self.queue.lock();
            let queue = &mut *guard;
            queue.items = queue.files.iter().map(|f| ConversionItem::new(&f.name)).collect();
            queue.files.clone()
        };
        info!(mode = %config.mode, items = files.len(), "batch started");

        let mut aggregator =
            BatchAggregator::new(config.mode, files.len(), &*self.archive_writer);
        let mut summaries = Vec::with_capacity(files.len());

        for (index, file) in files.into_iter().enumerate() {
            self.transition(index, observer, ConversionItem::start)?;

            match self.convert(file, &config).await {
                Ok(artifact) => {
                    summaries.push(Some(ArtifactSummary::of(&artifact)));
                    aggregator.push(artifact);
                    self.transition(index, observer, ConversionItem::complete)?;
                }
                Err(e) => {
                    warn!(index, error = %e, "item failed");
                    summaries.push(None);
                    self.transition(index, observer, |item| item.fail(e.to_string()))?;
                }
            }
        }

        let converted = aggregator.len();
        let output = aggregator.finish()?;

        let results: Vec<ItemResult> = self
            .snapshot()
            .into_iter()
            .zip(summaries)
            .map(|(item, artifact)| ItemResult { item, artifact })
            .collect();
        info!(
            converted,
            failed = results.len() - converted,
            output = output.as_ref().map(|o| o.filename.as_str()),
            "batch finished"
        );

        Ok(BatchOutcome { output, results })
    }

    /// Apply a transition under the lock, then notify outside it.
    fn transition<F>(
        &self,
        index: usize,
        observer: &dyn BatchObserver,
        apply: F,
    ) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut ConversionItem) -> Result<(), PipelineError>,
    {
        let item = {
            let mut queue = self.queue.lock();
            let item = queue.items.get_mut(index).ok_or(PipelineError::ItemMissing(index))?;
            apply(item)?;
            item.clone()
        };
        observer.item_changed(index, &item);
        Ok(())
    }

    #[instrument(skip_all, fields(file = %file.name))]
    async fn convert(
        &self,
        file: InputFile,
        config: &BatchConfig,
    ) -> Result<OutputArtifact, ItemError> {
        let filename = format!("{}.{}", base_name(&file.name), config.mode.extension());

        let decoder = Arc::clone(&self.decoder);
        let source = spawn_blocking(move || decoder.decode(&file))
            .await
            .map_err(|e| ItemError::Decode(format!("Decoder stopped: {e}")))??;

        let (width, height) = match config.mode {
            Mode::Webp => (source.width(), source.height()),
            Mode::Ico => (config.icon_size.pixels(), config.icon_size.pixels()),
        };
        let surface = RasterSurface::render(&source, width, height);
        drop(source);
        let surface = surface?;

        let (format, quality) = match config.mode {
            Mode::Webp => (RasterFormat::WebP, Some(config.quality.get())),
            Mode::Ico => (RasterFormat::Png, None),
        };
        let encoder = Arc::clone(&self.encoder);
        let encoded = spawn_blocking(move || encoder.encode(&surface, format, quality))
            .await
            .map_err(|e| ItemError::Encode(format!("Encoder stopped: {e}")))??;

        let bytes = match config.mode {
            Mode::Webp => encoded,
            Mode::Ico => build_icon_container(&encoded, config.icon_size)?,
        };

        Ok(OutputArtifact {
            filename,
            bytes,
            mime_type: config.mode.mime_type().to_string(),
        })
    }
}

impl Default for ConversionOrchestrator {
    fn default() -> Self {
        Self::new(
            Arc::new(StandardDecoder),
            Arc::new(StandardEncoder),
            Box::new(ZipArchiveWriter),
        )
    }
}

/// File name without its final extension.
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
