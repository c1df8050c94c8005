/// Gradient-based normal computation
///
/// For every pixel of the bilevel mask a 3x3 gradient (Sobel or Scharr) is
/// taken over the R channel, turned into the normal `(-Gx, -Gy, dz)`,
/// normalized and packed into RGBA8. Borders replicate the edge pixels.
///
/// This is the CPU rendition of `fs_normal` in `gpu::shaders`; the two are
/// kept numerically in step so the software backend can stand in for a GPU.

use cgmath::{InnerSpace, Vector3};

use super::threshold::BilevelMask;
use crate::error::{GeneratorError, Result};
use crate::raster::{NormalMap, RgbaRaster};
use crate::state::{Algorithm, Config, HeightInversion};

/// Scalars the normal pass needs, derived once from a `Config`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalParams {
    pub algorithm: Algorithm,
    pub dz: f32,
    pub invert_r: f32,
    pub invert_g: f32,
    pub invert_h: f32,
    pub height_inversion: HeightInversion,
}

impl From<&Config> for NormalParams {
    fn from(config: &Config) -> Self {
        Self {
            algorithm: config.algorithm,
            dz: config.depth_scale(),
            invert_r: config.invert_r.sign(),
            invert_g: config.invert_g.sign(),
            invert_h: config.invert_h.sign(),
            height_inversion: config.height_inversion,
        }
    }
}

/// Outer and center weights of the smoothing axis of a 3x3 kernel
pub fn kernel_weights(algorithm: Algorithm) -> (f32, f32) {
    match algorithm {
        Algorithm::Sobel => (1.0, 2.0),
        Algorithm::Scharr => (3.0, 10.0),
    }
}

/// `(Gx, Gy)` of the R channel at (x, y), rows growing downward, in byte units
pub fn gradient(heights: &RgbaRaster, x: u32, y: u32, algorithm: Algorithm) -> (f32, f32) {
    let (outer, center) = kernel_weights(algorithm);
    let (x, y) = (i64::from(x), i64::from(y));
    let h = |dx: i64, dy: i64| f32::from(heights.pixel_clamped(x + dx, y + dy)[0]);

    let (tl, t, tr) = (h(-1, -1), h(0, -1), h(1, -1));
    let (l, r) = (h(-1, 0), h(1, 0));
    let (bl, b, br) = (h(-1, 1), h(0, 1), h(1, 1));

    let gx = (outer * tr + center * r + outer * br) - (outer * tl + center * l + outer * bl);
    let gy = (outer * bl + center * b + outer * br) - (outer * tl + center * t + outer * tr);
    (gx, gy)
}

/// Unit normal for a gradient, with channel inversion applied
pub fn normal_from_gradient(gx: f32, gy: f32, params: &NormalParams) -> Vector3<f32> {
    let height_sign = match params.height_inversion {
        HeightInversion::Gradient => params.invert_h,
        HeightInversion::Depth => 1.0,
    };
    let n = unit_vector(
        -gx * params.invert_r * height_sign,
        -gy * params.invert_g * height_sign,
        params.dz,
    );

    match params.height_inversion {
        HeightInversion::Gradient => n,
        HeightInversion::Depth => Vector3::new(n.x, n.y, n.z * params.invert_h),
    }
}

/// Normalize without overflowing on extreme depth scales
///
/// `dz` can reach `f32::MAX` or infinity for valid strength/level pairs, so the
/// squares are taken in f64 and an infinite Z collapses to straight up/down.
fn unit_vector(x: f32, y: f32, z: f32) -> Vector3<f32> {
    if z.is_infinite() {
        return Vector3::new(0.0, 0.0, z.signum());
    }
    let n = Vector3::new(f64::from(x), f64::from(y), f64::from(z)).normalize();
    Vector3::new(n.x as f32, n.y as f32, n.z as f32)
}

/// Map a component in [-1, 1] to [0, 255]
pub fn pack(n: f32) -> u8 {
    ((n + 1.0) / 2.0 * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Full normal pass over `mask`, which must be `width` x `height`
pub fn compute_normals(
    mask: &BilevelMask,
    width: u32,
    height: u32,
    params: &NormalParams,
) -> Result<NormalMap> {
    if mask.dimensions() != (width, height) {
        return Err(GeneratorError::InvalidImage(format!(
            "mask is {}x{} but the output is declared {}x{}",
            mask.width(),
            mask.height(),
            width,
            height
        )));
    }

    Ok(normal_pass(mask.as_raster(), params))
}

/// Normal pass over any raster, reading heights from its R channel
pub fn normal_pass(heights: &RgbaRaster, params: &NormalParams) -> NormalMap {
    let (width, height) = heights.dimensions();
    RgbaRaster::from_fn(width, height, |x, y| {
        let (gx, gy) = gradient(heights, x, y, params.algorithm);
        let n = normal_from_gradient(gx, gy, params);
        [pack(n.x), pack(n.y), pack(n.z), 255]
    })
}
