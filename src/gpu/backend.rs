/// The rasterization backend seen by the render pipeline
///
/// A backend owns one offscreen surface plus whatever chained surfaces its
/// passes need, a bound input texture and per-pass uniform state. Every
/// frame runs the same fixed chain: a base pass, a horizontal blur and a
/// vertical blur.

use crate::error::Result;
use crate::raster::RgbaRaster;
use crate::stages::NormalParams;

/// First pass of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasePass {
    /// Pass the input texture through unchanged
    Copy,
    /// Compute normals from the input texture's R channel
    Normal,
}

/// Uniform values for one frame of the pass chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    /// Horizontal blur radius in UV units (0 disables the pass)
    pub blur_h: f32,
    /// Vertical blur radius in UV units (0 disables the pass)
    pub blur_v: f32,
    /// Only read by `BasePass::Normal`
    pub normal: NormalParams,
}

pub trait RasterBackend {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Current surface size, (0, 0) before the first resize
    fn surface_size(&self) -> (u32, u32);

    /// Size the offscreen surface and chained pass surfaces.
    /// Requesting the current size must be a no-op.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Upload pixels into the input binding; dimensions must match the surface
    fn upload(&mut self, raster: &RgbaRaster) -> Result<()>;

    /// Run `[base, blur_h, blur_v]` into the offscreen surface
    fn render_frame(&mut self, base: BasePass, uniforms: &FrameUniforms) -> Result<()>;

    /// Blocking copy of the offscreen surface into CPU memory
    fn read_back(&mut self) -> Result<RgbaRaster>;
}
