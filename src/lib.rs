//! WebIco Core - Batch WebP / ICO Conversion Engine
//!
//! # Guarantees
//! 1. Exactly one item per accepted input, in acceptance order
//! 2. Items move Ready → Working → Done | Error, never backwards
//! 3. One item's failure never stops the batch
//! 4. Items run strictly one at a time
//! 5. The ICO header is bit-exact
//! 6. Identical input and configuration give identical bytes

pub mod archive;
pub mod config;
pub mod decode;
pub mod hashing;
pub mod ico;
pub mod pipeline;
pub mod raster;
pub mod report;
pub mod validation;

pub use archive::{ArchiveError, ArchiveWriter, BatchAggregator, ZipArchiveWriter};
pub use config::{BatchConfig, ConfigError, IconSize, Mode, Quality};
pub use decode::{ImageDecoder, SourceImage, StandardDecoder};
pub use hashing::{report_digest, sha256_hex};
pub use ico::build_icon_container;
pub use pipeline::{
    BatchObserver, BatchOutcome, ConversionItem, ConversionOrchestrator, ItemError, ItemStatus,
    OutputArtifact, PipelineError,
};
pub use raster::{RasterEncoder, RasterFormat, RasterSurface, StandardEncoder};
pub use report::{ArtifactSummary, BatchReport};
pub use validation::{FileCandidate, FileValidator, InputFile, SourceKind};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
