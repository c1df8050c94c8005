/// Rasterization backends for the normal map pass chain
///
/// Architecture:
/// - `backend.rs` - the `RasterBackend` contract the render pipeline drives
/// - `shaders.rs` - WGSL shader source code
/// - `wgpu_backend.rs` - GPU implementation (device, surfaces, passes, readback)
/// - `software.rs` - CPU implementation of the same passes
///
/// Every frame runs a fixed chain of three passes: a base pass (copy or
/// normal), a horizontal blur and a vertical blur.

pub mod backend;
pub mod shaders;
pub mod software;
pub mod wgpu_backend;

pub use backend::{BasePass, FrameUniforms, RasterBackend};
pub use software::SoftwareBackend;
pub use wgpu_backend::WgpuBackend;
