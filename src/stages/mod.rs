/// The three image stages of the height-to-normal transform
///
/// - `blur.rs` - radius normalization and the separable Gaussian
/// - `threshold.rs` - bilevel pseudo-height mask
/// - `normal.rs` - Sobel/Scharr gradients, depth scaling and packing
///
/// The GPU backend runs blur and normal as WGSL passes; the functions here
/// are the CPU versions used by the software backend and the tests.

pub mod blur;
pub mod normal;
pub mod threshold;

pub use blur::{blur_radius_h, blur_radius_v, BlurAxis};
pub use normal::{compute_normals, NormalParams};
pub use threshold::{binarize, BilevelMask};
