/// Render pipeline driving the height-to-normal transform
///
/// The pipeline owns a `RasterBackend` (and with it the offscreen surface,
/// shader programs and uniform state) and walks one call through the stages:
/// - Blurring: copy the input and blur it in two separable passes
/// - Thresholding: read back, flatten over white, binarize into a mask
/// - ComputingNormals: run the normal pass over the uploaded mask
///
/// Only the surface survives between calls; every call starts from `Idle`
/// and ends there, errors included.

use crate::error::{GeneratorError, Result};
use crate::gpu::{BasePass, FrameUniforms, RasterBackend};
use crate::raster::{validate_source, NormalMap, PixelSource, RgbaRaster};
use crate::stages::threshold::composite_over_white;
use crate::stages::{binarize, blur_radius_h, blur_radius_v, NormalParams};
use crate::state::{Config, PipelineStage};

pub struct RenderPipeline<B: RasterBackend> {
    backend: B,
    stage: PipelineStage,
}

impl<B: RasterBackend> RenderPipeline<B> {
    pub fn new(backend: B) -> Self {
        tracing::info!("Render pipeline using {} backend", backend.name());
        Self {
            backend,
            stage: PipelineStage::Idle,
        }
    }

    /// Turn `image` into a normal map with the fully resolved `config`
    pub fn run(&mut self, image: &dyn PixelSource, config: &Config) -> Result<NormalMap> {
        let result = self.run_stages(image, config);
        if let Err(e) = &result {
            tracing::warn!("Normal map generation failed during {}: {}", self.stage, e);
        }
        self.stage = PipelineStage::Idle;
        result
    }

    fn run_stages(&mut self, image: &dyn PixelSource, config: &Config) -> Result<NormalMap> {
        validate_source(image)?;
        config.validate()?;

        let (width, height) = (image.width(), image.height());
        let input = RgbaRaster::from_source(image)?;
        let normal = NormalParams::from(config);

        self.backend.resize(width, height)?;
        self.backend.upload(&input)?;

        self.advance();
        let copy_frame = FrameUniforms {
            blur_h: blur_radius_h(config.blur, width),
            blur_v: blur_radius_v(config.blur, height),
            normal,
        };
        tracing::debug!(
            "Blur radii {:.5} x {:.5} (UV) for {}x{}",
            copy_frame.blur_h,
            copy_frame.blur_v,
            width,
            height
        );
        self.backend.render_frame(BasePass::Copy, &copy_frame)?;

        self.advance();
        let mut blurred = self.backend.read_back()?;
        composite_over_white(&mut blurred);
        let mask = binarize(&blurred);
        self.backend.upload(mask.as_raster())?;

        self.advance();
        let normal_frame = FrameUniforms {
            blur_h: 0.0,
            blur_v: 0.0,
            normal,
        };
        self.backend.render_frame(BasePass::Normal, &normal_frame)?;
        let output = self.backend.read_back()?;

        if output.dimensions() != (width, height) {
            return Err(GeneratorError::BackendInit(format!(
                "{} backend returned {}x{} for a {}x{} input",
                self.backend.name(),
                output.width(),
                output.height(),
                width,
                height
            )));
        }

        self.advance();
        tracing::info!("Generated {}x{} normal map ({})", width, height, config.algorithm);
        Ok(output)
    }

    fn advance(&mut self) {
        self.stage = self.stage.next();
        tracing::debug!("Pipeline stage: {}", self.stage);
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.backend.surface_size()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareBackend;
    use crate::state::{resolve, Algorithm, Invert, PartialConfig};

    fn pipeline() -> RenderPipeline<SoftwareBackend> {
        RenderPipeline::new(SoftwareBackend::new())
    }

    fn unblurred() -> Config {
        resolve(&Config::default(), &PartialConfig::new().blur(0.0)).unwrap()
    }

    /// White background with a black square covering x, y in 5..11
    fn dark_square() -> RgbaRaster {
        RgbaRaster::from_fn(16, 16, |x, y| {
            if (5..11).contains(&x) && (5..11).contains(&y) {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
    }

    /// Dark left half, light right half
    fn split(width: u32, height: u32) -> RgbaRaster {
        RgbaRaster::from_fn(width, height, |x, _| {
            if x < width / 2 {
                [20, 20, 20, 255]
            } else {
                [230, 230, 230, 255]
            }
        })
    }

    /// Backend whose readbacks always fail
    struct BrokenReadback(SoftwareBackend);

    impl RasterBackend for BrokenReadback {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn surface_size(&self) -> (u32, u32) {
            self.0.surface_size()
        }

        fn resize(&mut self, width: u32, height: u32) -> Result<()> {
            self.0.resize(width, height)
        }

        fn upload(&mut self, raster: &RgbaRaster) -> Result<()> {
            self.0.upload(raster)
        }

        fn render_frame(&mut self, base: BasePass, uniforms: &FrameUniforms) -> Result<()> {
            self.0.render_frame(base, uniforms)
        }

        fn read_back(&mut self) -> Result<RgbaRaster> {
            Err(GeneratorError::BackendInit("buffer mapping failed".to_string()))
        }
    }

    #[test]
    fn test_output_matches_input_dimensions() {
        let mut pipeline = pipeline();
        let image = RgbaRaster::from_fn(37, 11, |x, y| [(x * 7) as u8, (y * 20) as u8, 0, 255]);
        let output = pipeline.run(&image, &Config::default()).unwrap();

        assert_eq!(output.dimensions(), (37, 11));
        assert!(output.channel(3).all(|a| a == 255));
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
        assert_eq!(pipeline.surface_size(), (37, 11));
    }

    #[test]
    fn test_dark_blob_is_raised() {
        let mut pipeline = pipeline();
        let output = pipeline.run(&dark_square(), &unblurred()).unwrap();

        // Dark input becomes the high part of the mask
        assert_eq!(output.pixel(8, 8), [128, 128, 255, 255]);
        assert_eq!(output.pixel(0, 0), [128, 128, 255, 255]);
        // Slopes face away from the center
        assert!(output.pixel(4, 8)[0] < 128);
        assert!(output.pixel(11, 8)[0] > 128);
        assert!(output.pixel(8, 4)[1] < 128);
        assert!(output.pixel(8, 11)[1] > 128);
    }

    #[test]
    fn test_flipping_invert_r_mirrors_red() {
        let mut pipeline = pipeline();
        let image = dark_square();
        let plain = pipeline.run(&image, &Config::default()).unwrap();
        let flipped_config = resolve(
            &Config::default(),
            &PartialConfig::new().invert_r(Invert::Invert),
        )
        .unwrap();
        let flipped = pipeline.run(&image, &flipped_config).unwrap();

        for (a, b) in plain.pixels().chunks_exact(4).zip(flipped.pixels().chunks_exact(4)) {
            assert!(b[0] == 255 - a[0] || (a[0] == 128 && b[0] == 128));
            assert_eq!(a[1..], b[1..]);
        }
    }

    #[test]
    fn test_scharr_is_steeper_than_sobel() {
        let mut pipeline = pipeline();
        let image = split(10, 4);
        let sobel = pipeline.run(&image, &unblurred()).unwrap();
        let scharr_config = resolve(
            &unblurred(),
            &PartialConfig::new().algorithm(Algorithm::Scharr),
        )
        .unwrap();
        let scharr = pipeline.run(&image, &scharr_config).unwrap();

        // The raised (dark) half ends at column 4
        assert!(sobel.pixel(4, 2)[0] > 128);
        assert!(scharr.pixel(4, 2)[0] > sobel.pixel(4, 2)[0]);
        assert_eq!(scharr.pixel(4, 2)[1], 128);
    }

    #[test]
    fn test_blurred_edge_selects_same_column_for_both_kernels() {
        let mut pipeline = pipeline();
        let image = split(24, 6);
        let mut edge_columns = Vec::new();

        for algorithm in [Algorithm::Sobel, Algorithm::Scharr] {
            let overrides = PartialConfig::new().algorithm(algorithm);
            let config = resolve(&Config::default(), &overrides).unwrap();
            assert_eq!(config.blur, -6.0);
            let output = pipeline.run(&image, &config).unwrap();

            assert!(output.channel(1).all(|g| g == 128), "{algorithm}");

            let deviation = |x: u32| i32::from(output.pixel(x, 3)[0]) - 128;
            let strongest = (0..24).max_by_key(|&x| (deviation(x).abs(), -(x as i32))).unwrap();
            // The blur moves the mask edge into the dark half
            assert!(strongest < 12, "{algorithm} edge at {strongest}");
            // Only the two columns straddling the mask edge tilt
            for x in 0..24 {
                if x != strongest && x != strongest + 1 {
                    assert_eq!(deviation(x), 0, "{algorithm} column {x}");
                }
            }
            assert_eq!(deviation(strongest), deviation(strongest + 1));
            edge_columns.push((strongest, deviation(strongest)));
        }

        let (sobel, scharr) = (edge_columns[0], edge_columns[1]);
        assert_eq!(sobel.0, scharr.0);
        // Raised dark half: both tilt toward +X, Scharr further
        assert!(sobel.1 > 0 && scharr.1 > sobel.1);
    }

    #[test]
    fn test_huge_blur_still_produces_a_map() {
        let mut pipeline = pipeline();
        let config = resolve(&Config::default(), &PartialConfig::new().blur(1e30)).unwrap();
        let output = pipeline
            .run(&RgbaRaster::filled(4, 4, [10, 10, 10, 255]), &config)
            .unwrap();

        assert!(output.pixels().chunks_exact(4).all(|px| px == [128, 128, 255, 255]));
    }

    #[test]
    fn test_surface_is_reused_across_sizes() {
        let mut pipeline = pipeline();
        let config = Config::default();
        let first = pipeline.run(&split(8, 8), &config).unwrap();
        let other = pipeline.run(&split(5, 3), &config).unwrap();
        let again = pipeline.run(&split(8, 8), &config).unwrap();

        assert_eq!(other.dimensions(), (5, 3));
        assert_eq!(first, again);
    }

    #[test]
    fn test_empty_image_is_rejected_before_backend_work() {
        let mut pipeline = pipeline();
        let image = image::RgbaImage::new(0, 4);
        let err = pipeline.run(&image, &Config::default()).unwrap_err();

        assert!(matches!(err, GeneratorError::InvalidImage(_)));
        assert_eq!(pipeline.surface_size(), (0, 0));
        assert_eq!(pipeline.stage(), PipelineStage::Idle);
    }

    #[test]
    fn test_hand_built_config_is_validated() {
        let mut pipeline = pipeline();
        let config = Config {
            strength: 0.0,
            ..Config::default()
        };
        let err = pipeline.run(&split(4, 4), &config).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidConfig(_)));
    }

    #[test]
    fn test_stage_returns_to_idle_after_backend_error() {
        let mut pipeline = RenderPipeline::new(BrokenReadback(SoftwareBackend::new()));
        let err = pipeline.run(&split(4, 4), &Config::default()).unwrap_err();

        assert!(matches!(err, GeneratorError::BackendInit(_)));
        assert!(pipeline.stage().is_idle());
    }

    #[test]
    fn test_oversized_surface_fails_backend_init() {
        let mut pipeline = RenderPipeline::new(SoftwareBackend::with_max_dimension(8));
        let err = pipeline.run(&split(9, 2), &Config::default()).unwrap_err();
        assert!(matches!(err, GeneratorError::BackendInit(_)));
    }
}
