/// Separable blur pre-pass
///
/// The blur radius is expressed in texture (UV) units and divided by the
/// image dimension, so the same `blur` value smooths a 256px and a 4096px
/// height map by a visually similar amount. The divisor 5 is an empirical
/// scale factor.
///
/// The WGSL blur in `gpu::shaders` and `blur_pass` below implement the same
/// 9-tap Gaussian: taps at `k * radius` for k in -4..=4, linear filtering,
/// clamp-to-edge addressing.

use crate::raster::RgbaRaster;

/// Empirical scale between the configured blur and the per-tap offset
pub const BLUR_DIVISOR: f32 = 5.0;

/// Gaussian weights for taps -4..=4 (sum to 1)
pub const BLUR_WEIGHTS: [f32; 9] = [
    0.051, 0.0918, 0.12245, 0.1531, 0.1633, 0.1531, 0.12245, 0.0918, 0.051,
];

/// Direction of one blur pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

impl BlurAxis {
    /// Unit step in texture space
    pub fn direction(self) -> [f32; 2] {
        match self {
            BlurAxis::Horizontal => [1.0, 0.0],
            BlurAxis::Vertical => [0.0, 1.0],
        }
    }
}

/// Horizontal radius: `|blur| / width / 5`
pub fn blur_radius_h(blur: f32, width: u32) -> f32 {
    blur.abs() / width as f32 / BLUR_DIVISOR
}

/// Vertical radius: `|blur| / height / 5`
pub fn blur_radius_v(blur: f32, height: u32) -> f32 {
    blur.abs() / height as f32 / BLUR_DIVISOR
}

/// One 1D blur pass over `input`, `radius` in UV units along `axis`
///
/// A zero radius returns the input untouched.
pub fn blur_pass(input: &RgbaRaster, axis: BlurAxis, radius: f32) -> RgbaRaster {
    if radius == 0.0 {
        return input.clone();
    }

    let (width, height) = input.dimensions();
    // Offset per tap in texels along the blur axis
    let extent = match axis {
        BlurAxis::Horizontal => width,
        BlurAxis::Vertical => height,
    };
    let step = radius * extent as f32;

    RgbaRaster::from_fn(width, height, |x, y| {
        let mut sum = [0.0f32; 4];
        for (i, weight) in BLUR_WEIGHTS.iter().enumerate() {
            let k = i as f32 - 4.0;
            let texel = sample_linear(input, axis, x, y, k * step);
            for c in 0..4 {
                sum[c] += weight * texel[c];
            }
        }
        sum.map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
    })
}

/// Horizontal then vertical pass
pub fn separable_blur(input: &RgbaRaster, radius_h: f32, radius_v: f32) -> RgbaRaster {
    let horizontal = blur_pass(input, BlurAxis::Horizontal, radius_h);
    blur_pass(&horizontal, BlurAxis::Vertical, radius_v)
}

/// Bilinear sample along one axis at `offset` texels from pixel (x, y), normalized to 0..1
fn sample_linear(input: &RgbaRaster, axis: BlurAxis, x: u32, y: u32, offset: f32) -> [f32; 4] {
    let (coord, fixed, extent) = match axis {
        BlurAxis::Horizontal => (x as f32 + offset, y, input.width()),
        BlurAxis::Vertical => (y as f32 + offset, x, input.height()),
    };
    // Anything past the border samples the edge texel anyway
    let coord = coord.clamp(-1.0, extent as f32);
    let base = coord.floor();
    let frac = coord - base;
    let i0 = base as i64;

    let fetch = |i: i64| match axis {
        BlurAxis::Horizontal => input.pixel_clamped(i, i64::from(fixed)),
        BlurAxis::Vertical => input.pixel_clamped(i64::from(fixed), i),
    };
    let a = fetch(i0);
    let b = fetch(i0 + 1);

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let va = f32::from(a[c]) / 255.0;
        let vb = f32::from(b[c]) / 255.0;
        out[c] = va + (vb - va) * frac;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f32 = BLUR_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_radius_zero_for_zero_blur() {
        assert_eq!(blur_radius_h(0.0, 640), 0.0);
        assert_eq!(blur_radius_v(0.0, 480), 0.0);
    }

    #[test]
    fn test_radius_linear_and_monotonic_in_magnitude() {
        let width = 512;
        let unit = blur_radius_h(1.0, width);
        let mut previous = 0.0;
        for blur in [1.0f32, 2.0, 6.0, 14.0, 100.0] {
            let radius = blur_radius_h(blur, width);
            assert!(radius > previous);
            assert!((radius - unit * blur).abs() <= radius * 1e-6);
            previous = radius;
        }
    }

    #[test]
    fn test_radius_ignores_sign() {
        assert_eq!(blur_radius_h(-6.0, 300), blur_radius_h(6.0, 300));
        assert_eq!(blur_radius_v(-14.0, 200), blur_radius_v(14.0, 200));
        assert!((blur_radius_h(-6.0, 300) - 0.004).abs() < 1e-7);
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let input = RgbaRaster::from_fn(7, 5, |x, y| [(x * 30) as u8, (y * 50) as u8, 17, 200]);
        assert_eq!(separable_blur(&input, 0.0, 0.0), input);
    }

    #[test]
    fn test_uniform_image_is_unchanged() {
        let input = RgbaRaster::filled(9, 9, [120, 60, 30, 255]);
        let radius = blur_radius_h(-6.0, 9);
        assert_eq!(separable_blur(&input, radius, radius), input);
    }

    #[test]
    fn test_blur_softens_a_step() {
        let input = RgbaRaster::from_fn(32, 4, |x, _| {
            if x < 16 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        });
        let blurred = blur_pass(&input, BlurAxis::Horizontal, blur_radius_h(10.0, 32));

        // Far from the edge nothing changes, next to it values land in between
        assert_eq!(blurred.pixel(0, 0)[0], 0);
        assert_eq!(blurred.pixel(31, 0)[0], 255);
        let near_edge = blurred.pixel(15, 0)[0];
        assert!(near_edge > 0 && near_edge < 255, "got {near_edge}");
        // A horizontal blur leaves rows identical
        assert_eq!(blurred.pixel(15, 0), blurred.pixel(15, 3));
    }

    #[test]
    fn test_huge_radius_samples_the_borders() {
        let input = RgbaRaster::from_fn(6, 3, |x, _| if x < 3 { [0; 4] } else { [255; 4] });
        let radius = blur_radius_h(1e30, 6);
        let blurred = separable_blur(&input, radius, blur_radius_v(-1e30, 3));

        assert_eq!(blurred.dimensions(), (6, 3));
        // Every off-center tap lands on one of the two edge columns
        assert_eq!(blurred.pixel(0, 0), blurred.pixel(2, 1));
        assert_eq!(blurred.pixel(3, 0), blurred.pixel(5, 2));
        assert!(blurred.pixel(0, 0)[0] > 0);
        assert!(blurred.pixel(5, 0)[0] < 255);
    }
}
