/// CPU implementation of the pass chain
///
/// Runs the same `[base, blur_h, blur_v]` frame as the wgpu backend, pass by
/// pass through 8-bit surfaces, using the stage functions in `crate::stages`.
/// Useful on headless machines without an adapter and for deterministic tests.

use super::backend::{BasePass, FrameUniforms, RasterBackend};
use crate::error::{GeneratorError, Result};
use crate::raster::RgbaRaster;
use crate::stages::blur::blur_pass;
use crate::stages::normal::normal_pass;
use crate::stages::BlurAxis;

/// Same ceiling most desktop GPUs report for 2D textures
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

#[derive(Debug, Clone)]
pub struct SoftwareBackend {
    input: Option<RgbaRaster>,
    surface: Option<RgbaRaster>,
    width: u32,
    height: u32,
    max_dimension: u32,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::with_max_dimension(DEFAULT_MAX_DIMENSION)
    }

    /// Backend that refuses surfaces wider or taller than `max_dimension`
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            input: None,
            surface: None,
            width: 0,
            height: 0,
            max_dimension,
        }
    }
}

impl RasterBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) && self.surface.is_some() {
            return Ok(());
        }
        if width == 0 || height == 0 || width > self.max_dimension || height > self.max_dimension {
            return Err(GeneratorError::BackendInit(format!(
                "cannot allocate a {width}x{height} surface (limit {max}x{max})",
                max = self.max_dimension
            )));
        }

        self.width = width;
        self.height = height;
        // Cleared to transparent black, like a fresh render target
        self.surface = Some(RgbaRaster::filled(width, height, [0, 0, 0, 0]));
        self.input = None;
        tracing::debug!("Resized software surface to {}x{}", width, height);
        Ok(())
    }

    fn upload(&mut self, raster: &RgbaRaster) -> Result<()> {
        if self.surface.is_none() {
            return Err(GeneratorError::BackendInit("surface not allocated".to_string()));
        }
        if raster.dimensions() != (self.width, self.height) {
            return Err(GeneratorError::InvalidImage(format!(
                "upload of {}x{} into a {}x{} surface",
                raster.width(),
                raster.height(),
                self.width,
                self.height
            )));
        }
        self.input = Some(raster.clone());
        Ok(())
    }

    fn render_frame(&mut self, base: BasePass, uniforms: &FrameUniforms) -> Result<()> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| GeneratorError::BackendInit("no input texture bound".to_string()))?;

        let base_output = match base {
            BasePass::Copy => input.clone(),
            BasePass::Normal => normal_pass(input, &uniforms.normal),
        };
        let horizontal = blur_pass(&base_output, BlurAxis::Horizontal, uniforms.blur_h);
        let vertical = blur_pass(&horizontal, BlurAxis::Vertical, uniforms.blur_v);

        self.surface = Some(vertical);
        Ok(())
    }

    fn read_back(&mut self) -> Result<RgbaRaster> {
        self.surface
            .clone()
            .ok_or_else(|| GeneratorError::BackendInit("surface not allocated".to_string()))
    }
}
