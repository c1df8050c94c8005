/// Raster types flowing through the generator
///
/// This module handles:
/// - The `PixelSource` capability every input image exposes
/// - The owned RGBA8 buffer used for readbacks and outputs
/// - Loading and saving rasters through the `image` crate (io.rs)

pub mod io;

use std::borrow::Cow;

use crate::error::{GeneratorError, Result};

pub use io::load;

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Anything that can hand out tightly packed, row-major RGBA8 pixels
///
/// The pipeline only ever talks to this trait, never to a concrete image type.
pub trait PixelSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn rgba_pixels(&self) -> Cow<'_, [u8]>;
}

/// Owned RGBA8 raster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaRaster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// The finished normal map
pub type NormalMap = RgbaRaster;

impl RgbaRaster {
    /// Wrap an existing RGBA8 buffer, checking its length against the dimensions
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        validate_dimensions(width, height, pixels.len())?;
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Raster filled with a single RGBA color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let pixels = rgba.iter().copied().cycle().take(count * BYTES_PER_PIXEL).collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Raster built from a per-pixel function of (x, y)
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Copy any pixel source into an owned raster
    pub fn from_source(source: &dyn PixelSource) -> Result<Self> {
        Self::from_pixels(source.width(), source.height(), source.rgba_pixels().into_owned())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    /// RGBA of pixel (x, y). Panics when out of bounds, like slice indexing.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    /// RGBA of pixel (x, y) with coordinates clamped into the raster
    pub fn pixel_clamped(&self, x: i64, y: i64) -> [u8; 4] {
        let cx = x.clamp(0, i64::from(self.width) - 1) as u32;
        let cy = y.clamp(0, i64::from(self.height) - 1) as u32;
        self.pixel(cx, cy)
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.pixels[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Iterate over one channel (0 = R .. 3 = A) in row-major order
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = u8> + '_ {
        self.pixels.chunks_exact(BYTES_PER_PIXEL).map(move |px| px[channel])
    }

    /// Convert into an `image` buffer for encoding or further processing
    pub fn to_image(&self) -> image::RgbaImage {
        // Dimensions and length are validated on construction
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height))
    }
}

impl PixelSource for RgbaRaster {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn rgba_pixels(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.pixels)
    }
}

impl PixelSource for image::RgbaImage {
    fn width(&self) -> u32 {
        self.width()
    }

    fn height(&self) -> u32 {
        self.height()
    }

    fn rgba_pixels(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_raw())
    }
}

impl PixelSource for image::DynamicImage {
    fn width(&self) -> u32 {
        image::GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        image::GenericImageView::height(self)
    }

    fn rgba_pixels(&self) -> Cow<'_, [u8]> {
        match self {
            image::DynamicImage::ImageRgba8(rgba) => Cow::Borrowed(rgba.as_raw()),
            other => Cow::Owned(other.to_rgba8().into_raw()),
        }
    }
}

/// Check that a source is non-empty and its buffer matches its dimensions
pub fn validate_source(source: &dyn PixelSource) -> Result<()> {
    validate_dimensions(source.width(), source.height(), source.rgba_pixels().len())
}

fn validate_dimensions(width: u32, height: u32, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(GeneratorError::InvalidImage(format!(
            "image must have non-zero dimensions, got {width}x{height}"
        )));
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| GeneratorError::InvalidImage(format!("{width}x{height} is too large")))?;
    if len != expected {
        return Err(GeneratorError::InvalidImage(format!(
            "{width}x{height} RGBA8 image needs {expected} bytes, got {len}"
        )));
    }
    Ok(())
}
