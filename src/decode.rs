//! Source Decoding
//!
//! Turns accepted input bytes into a drawable with resolved pixel
//! dimensions. Vector sizing is fail-soft: markup that cannot be read for
//! its root attributes falls back to [`DEFAULT_VECTOR_SIZE`]. Content that
//! cannot be drawn is a decode failure.

use image::DynamicImage;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use resvg::usvg;
use tracing::debug;

use crate::pipeline::ItemError;
use crate::validation::{InputFile, SourceKind};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicI64, Ordering};

#[cfg(feature = "test-hooks")]
static LIVE_SOURCES: AtomicI64 = AtomicI64::new(0);

/// Number of decoded sources not yet released.
#[cfg(feature = "test-hooks")]
pub fn live_source_count() -> i64 {
    LIVE_SOURCES.load(Ordering::SeqCst)
}

/// Width and height used when a vector source declares no usable size.
pub const DEFAULT_VECTOR_SIZE: (u32, u32) = (256, 256);

pub enum Drawable {
    Raster(DynamicImage),
    Vector(usvg::Tree),
}

/// A decoded source ready to be drawn onto a surface.
///
/// Dropping it releases the decoded pixels or vector tree.
pub struct SourceImage {
    drawable: Drawable,
    width: u32,
    height: u32,
}

impl SourceImage {
    pub fn new(drawable: Drawable, width: u32, height: u32) -> Self {
        #[cfg(feature = "test-hooks")]
        LIVE_SOURCES.fetch_add(1, Ordering::SeqCst);

        Self {
            drawable,
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn drawable(&self) -> &Drawable {
        &self.drawable
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for SourceImage {
    fn drop(&mut self) {
        #[cfg(feature = "test-hooks")]
        LIVE_SOURCES.fetch_sub(1, Ordering::SeqCst);

        debug!(width = self.width, height = self.height, "source released");
    }
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.drawable {
            Drawable::Raster(_) => "raster",
            Drawable::Vector(_) => "vector",
        };
        f.debug_struct("SourceImage")
            .field("kind", &kind)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Decode primitive consumed by the orchestrator.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, file: &InputFile) -> Result<SourceImage, ItemError>;
}

/// Decodes PNG/JPEG with `image` and SVG with `usvg`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoder;

impl ImageDecoder for StandardDecoder {
    fn decode(&self, file: &InputFile) -> Result<SourceImage, ItemError> {
        match file.kind {
            SourceKind::Raster => decode_raster(&file.bytes),
            SourceKind::Vector => decode_vector(&file.bytes),
        }
    }
}

fn decode_raster(data: &[u8]) -> Result<SourceImage, ItemError> {
    let img = image::load_from_memory(data)
        .map_err(|e| ItemError::Decode(format!("Unreadable image: {e}")))?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(ItemError::Decode("Image has no pixels".to_string()));
    }
    Ok(SourceImage::new(Drawable::Raster(img), width, height))
}

fn decode_vector(data: &[u8]) -> Result<SourceImage, ItemError> {
    let (width, height) = resolve_svg_size(data);
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|e| ItemError::Decode(format!("Unreadable SVG: {e}")))?;
    Ok(SourceImage::new(Drawable::Vector(tree), width, height))
}

/// Resolve the pixel size of an SVG document.
///
/// Precedence: numeric `width` + `height` on the root element, then the
/// last two components of a four-number `viewBox`, then 256x256.
pub fn resolve_svg_size(data: &[u8]) -> (u32, u32) {
    let Some(root) = read_root_size(data) else {
        debug!("svg markup unreadable, using default size");
        return DEFAULT_VECTOR_SIZE;
    };

    if let (Some(w), Some(h)) = (root.width, root.height) {
        return (to_pixels(w), to_pixels(h));
    }
    if let Some((w, h)) = root.view_box {
        return (to_pixels(w), to_pixels(h));
    }
    DEFAULT_VECTOR_SIZE
}

#[derive(Debug, Default)]
struct RootSize {
    width: Option<f64>,
    height: Option<f64>,
    view_box: Option<(f64, f64)>,
}

/// Read the sizing attributes of the root element. `None` when the document
/// is not well-formed.
fn read_root_size(data: &[u8]) -> Option<RootSize> {
    let mut reader = Reader::from_reader(data);
    let mut root = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if root.is_none() => {
                root = Some(root_attributes(&e)?);
            }
            Ok(Event::Eof) => return root,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}

fn root_attributes(element: &BytesStart<'_>) -> Option<RootSize> {
    let mut size = RootSize::default();
    for attr in element.attributes() {
        let attr = attr.ok()?;
        let Ok(value) = std::str::from_utf8(&attr.value) else {
            continue;
        };
        match attr.key.local_name().as_ref() {
            b"width" => size.width = parse_length(value),
            b"height" => size.height = parse_length(value),
            b"viewBox" => size.view_box = parse_view_box(value),
            _ => {}
        }
    }
    Some(size)
}

/// A plain positive number, optionally in `px`.
fn parse_length(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim_end();
    parse_positive(number)
}

fn parse_view_box(raw: &str) -> Option<(f64, f64)> {
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 4 {
        return None;
    }
    parts[0].parse::<f64>().ok().filter(|v| v.is_finite())?;
    parts[1].parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some((parse_positive(parts[2])?, parse_positive(parts[3])?))
}

fn parse_positive(raw: &str) -> Option<f64> {
    let value: f64 = raw.parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

fn to_pixels(value: f64) -> u32 {
    (value.round() as u32).max(1)
}
