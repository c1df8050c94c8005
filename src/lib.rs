//! GPU-accelerated normal map generation from height/bump images
//!
//! The transform runs in two stages:
//! 1. Blur the input with a separable Gaussian and binarize it into a
//!    bilevel pseudo-height mask
//! 2. Take Sobel or Scharr gradients of the mask and pack the resulting
//!    tangent-space normals into RGBA8
//!
//! Module layout:
//! - `generator` - caller-facing `Generator` and `SharedGenerator`
//! - `pipeline` - stage sequencing over a rasterization backend
//! - `gpu` - the backend trait, wgpu and software backends, WGSL shaders
//! - `stages` - blur, threshold and normal math
//! - `raster` - pixel sources, the owned RGBA8 raster, image I/O
//! - `state` - configuration and pipeline stage tracking
//! - `error` - shared error type

pub mod error;
pub mod generator;
pub mod gpu;
pub mod pipeline;
pub mod raster;
pub mod stages;
pub mod state;

pub use error::{GeneratorError, Result};
pub use generator::{Generator, SharedGenerator};
pub use gpu::{RasterBackend, SoftwareBackend, WgpuBackend};
pub use pipeline::RenderPipeline;
pub use raster::{NormalMap, PixelSource, RgbaRaster};
pub use state::{resolve, Algorithm, Config, HeightInversion, Invert, PartialConfig, PipelineStage};
