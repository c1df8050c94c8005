/// Binarization of the blurred pre-pass into a bilevel pseudo-height mask
///
/// The rule is a hard, unweighted luminance sum: `R + G + B < 100` becomes
/// white, everything else black, alpha forced opaque. Dark areas of the
/// height map therefore end up as the raised (white) parts of the mask.

use crate::error::{GeneratorError, Result};
use crate::raster::{RgbaRaster, BYTES_PER_PIXEL};

/// Channel sum below which a pixel turns white
pub const THRESHOLD: u16 = 100;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// RGBA8 raster whose pixels are all pure black or pure white
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BilevelMask(RgbaRaster);

impl BilevelMask {
    /// Adopt a raster that is already bilevel
    pub fn from_raster(raster: RgbaRaster) -> Result<Self> {
        if raster
            .pixels()
            .chunks_exact(BYTES_PER_PIXEL)
            .all(|px| px == WHITE || px == BLACK)
        {
            Ok(Self(raster))
        } else {
            Err(GeneratorError::InvalidImage(
                "mask contains pixels other than pure black or white".to_string(),
            ))
        }
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn as_raster(&self) -> &RgbaRaster {
        &self.0
    }

    pub fn into_raster(self) -> RgbaRaster {
        self.0
    }
}

/// Flatten a readback onto an opaque white background
///
/// Transparent regions of the blurred render read as white, matching a
/// canvas that was cleared to white before the render was drawn onto it.
pub fn composite_over_white(raster: &mut RgbaRaster) {
    for px in raster.pixels_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
        let alpha = u32::from(px[3]);
        for c in &mut px[..3] {
            let blended = u32::from(*c) * alpha + 255 * (255 - alpha);
            *c = ((blended + 127) / 255) as u8;
        }
        px[3] = 255;
    }
}

/// Binarize a single pixel
pub fn threshold_pixel(px: [u8; 4]) -> [u8; 4] {
    let sum = u16::from(px[0]) + u16::from(px[1]) + u16::from(px[2]);
    if sum < THRESHOLD {
        WHITE
    } else {
        BLACK
    }
}

/// Binarize in place
pub fn binarize_in_place(raster: &mut RgbaRaster) {
    for px in raster.pixels_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
        let out = threshold_pixel([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&out);
    }
}

/// Binarize into a new mask of identical dimensions
pub fn binarize(raster: &RgbaRaster) -> BilevelMask {
    let mut out = raster.clone();
    binarize_in_place(&mut out);
    BilevelMask(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(level: u8) -> RgbaRaster {
        RgbaRaster::filled(8, 6, [level, level, level, 255])
    }

    #[test]
    fn test_boundary_gray_33_turns_white() {
        let mask = binarize(&gray(33));
        assert!(mask.as_raster().pixels().chunks_exact(4).all(|px| px == WHITE));
    }

    #[test]
    fn test_boundary_gray_34_turns_black() {
        let mask = binarize(&gray(34));
        assert!(mask.as_raster().pixels().chunks_exact(4).all(|px| px == BLACK));
    }

    #[test]
    fn test_sum_is_unweighted() {
        assert_eq!(threshold_pixel([99, 0, 0, 0]), WHITE);
        assert_eq!(threshold_pixel([0, 0, 100, 0]), BLACK);
        assert_eq!(threshold_pixel([50, 49, 0, 17]), WHITE);
    }

    #[test]
    fn test_alpha_is_forced_opaque() {
        let mask = binarize(&RgbaRaster::filled(2, 2, [10, 10, 10, 0]));
        assert!(mask.as_raster().channel(3).all(|a| a == 255));
    }

    #[test]
    fn test_output_is_bilevel_with_same_dimensions() {
        let input = RgbaRaster::from_fn(16, 9, |x, y| [(x * 16) as u8, (y * 28) as u8, 3, 255]);
        let mask = binarize(&input);

        assert_eq!(mask.dimensions(), input.dimensions());
        assert!(BilevelMask::from_raster(mask.clone().into_raster()).is_ok());
    }

    #[test]
    fn test_reapplying_threshold() {
        let input = RgbaRaster::from_fn(16, 9, |x, y| [(x * 16) as u8, (y * 28) as u8, 3, 255]);
        let once = binarize(&input);
        let twice = binarize(once.as_raster());
        let thrice = binarize(twice.as_raster());

        // White sums to 765 and black to 0, so a second application swaps them
        for (a, b) in once.as_raster().pixels().chunks_exact(4).zip(twice.as_raster().pixels().chunks_exact(4)) {
            assert_eq!(a[0], 255 - b[0]);
        }
        assert_eq!(thrice, once);
    }

    #[test]
    fn test_in_place_matches_copy() {
        let input = RgbaRaster::from_fn(5, 5, |x, y| [(x * 20) as u8, (y * 20) as u8, 20, 128]);
        let mut in_place = input.clone();
        binarize_in_place(&mut in_place);
        assert_eq!(&in_place, binarize(&input).as_raster());
    }

    #[test]
    fn test_from_raster_rejects_gray() {
        assert!(BilevelMask::from_raster(gray(128)).is_err());
        assert!(BilevelMask::from_raster(gray(0)).is_ok());
    }

    #[test]
    fn test_composite_over_white() {
        let mut raster = RgbaRaster::from_pixels(3, 1, vec![
            0, 0, 0, 0, // transparent
            0, 0, 0, 255, // opaque black
            100, 100, 100, 128, // half covered gray
        ])
        .unwrap();
        composite_over_white(&mut raster);

        assert_eq!(raster.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(raster.pixel(1, 0), [0, 0, 0, 255]);
        let mixed = raster.pixel(2, 0);
        assert!(mixed[0] > 100 && mixed[0] < 255);
        assert_eq!(mixed[3], 255);
    }
}
