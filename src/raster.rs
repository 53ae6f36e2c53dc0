//! Rasterization and raster encoding.

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};

use crate::config::DEFAULT_QUALITY;
use crate::decode::{Drawable, SourceImage};
use crate::pipeline::ItemError;

/// Largest width or height a surface may have (WebP's format limit).
pub const MAX_SURFACE_DIMENSION: u32 = 16383;

/// Largest pixel count a surface may have (256 MiB of RGBA).
pub const MAX_SURFACE_PIXELS: u64 = 1 << 26;

/// Off-screen RGBA buffer (straight alpha) of an exact target size.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    /// Allocate a transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self, ItemError> {
        if width == 0 || height == 0 {
            return Err(ItemError::Encode(format!("Empty surface {width}x{height}")));
        }
        if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
            return Err(ItemError::Encode(format!(
                "Surface {width}x{height} exceeds {MAX_SURFACE_DIMENSION}px"
            )));
        }
        if u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS {
            return Err(ItemError::Encode(format!(
                "Surface {width}x{height} exceeds {MAX_SURFACE_PIXELS} pixels"
            )));
        }
        Ok(Self { pixels: RgbaImage::new(width, height) })
    }

    /// Allocate a surface and draw `source` stretched to fill it.
    pub fn render(source: &SourceImage, width: u32, height: u32) -> Result<Self, ItemError> {
        let mut surface = Self::new(width, height)?;
        surface.draw(source)?;
        Ok(surface)
    }

    /// Draw `source` scaled to the full surface bounds. Aspect ratio is not
    /// preserved.
    pub fn draw(&mut self, source: &SourceImage) -> Result<(), ItemError> {
        let (width, height) = self.pixels.dimensions();
        match source.drawable() {
            Drawable::Raster(img) => {
                let rgba = img.to_rgba8();
                let scaled = if rgba.dimensions() == (width, height) {
                    rgba
                } else {
                    imageops::resize(&rgba, width, height, FilterType::Triangle)
                };
                imageops::replace(&mut self.pixels, &scaled, 0, 0);
            }
            Drawable::Vector(tree) => {
                let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
                    ItemError::Encode(format!("Could not allocate {width}x{height} pixmap"))
                })?;
                let size = tree.size();
                let transform = Transform::from_scale(
                    width as f32 / size.width(),
                    height as f32 / size.height(),
                );
                resvg::render(tree, transform, &mut pixmap.as_mut());

                // tiny-skia stores premultiplied alpha
                for (dst, src) in self.pixels.pixels_mut().zip(pixmap.pixels()) {
                    let c = src.demultiply();
                    *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
                }
            }
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// Lossless; quality is ignored.
    Png,
    /// Lossy; quality in 0..=1.
    WebP,
}

impl RasterFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::WebP => "image/webp",
        }
    }
}

/// Raster-to-bytes primitive consumed by the orchestrator.
pub trait RasterEncoder: Send + Sync {
    fn encode(
        &self,
        surface: &RasterSurface,
        format: RasterFormat,
        quality: Option<f32>,
    ) -> Result<Vec<u8>, ItemError>;
}

/// PNG through `image`, lossy WebP through libwebp.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardEncoder;

impl RasterEncoder for StandardEncoder {
    fn encode(
        &self,
        surface: &RasterSurface,
        format: RasterFormat,
        quality: Option<f32>,
    ) -> Result<Vec<u8>, ItemError> {
        let bytes = match format {
            RasterFormat::Png => encode_png(surface)?,
            RasterFormat::WebP => {
                let quality = quality.unwrap_or(DEFAULT_QUALITY).clamp(0.0, 1.0);
                encode_webp(surface, quality)?
            }
        };

        if bytes.is_empty() {
            return Err(ItemError::Encode(format!(
                "{} export produced no data",
                format.mime_type()
            )));
        }
        Ok(bytes)
    }
}

fn encode_png(surface: &RasterSurface) -> Result<Vec<u8>, ItemError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            surface.as_raw(),
            surface.width(),
            surface.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| ItemError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(buffer)
}

fn encode_webp(surface: &RasterSurface, quality: f32) -> Result<Vec<u8>, ItemError> {
    let encoder = webp::Encoder::from_rgba(surface.as_raw(), surface.width(), surface.height());
    let memory = encoder
        .encode_simple(false, quality * 100.0)
        .map_err(|e| ItemError::Encode(format!("WebP encoding failed: {e:?}")))?;
    Ok(memory.to_vec())
}
