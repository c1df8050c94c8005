/// Caller-facing entry point
///
/// A `Generator` owns one render pipeline plus the default `Config` that
/// call-site overrides are merged into. There is no process-wide instance:
/// whoever needs normal maps creates (and owns) a generator.

use std::sync::{Arc, Mutex};

use crate::error::{GeneratorError, Result};
use crate::gpu::{RasterBackend, SoftwareBackend, WgpuBackend};
use crate::pipeline::RenderPipeline;
use crate::raster::{NormalMap, PixelSource, RgbaRaster};
use crate::state::{resolve, Config, PartialConfig};

pub struct Generator<B: RasterBackend = WgpuBackend> {
    pipeline: RenderPipeline<B>,
    defaults: Config,
}

impl Generator<WgpuBackend> {
    /// Generator on the first available GPU adapter, blocking on device setup
    pub fn new() -> Result<Self> {
        Ok(Self::with_backend(WgpuBackend::new_blocking()?))
    }

    pub async fn new_async() -> Result<Self> {
        Ok(Self::with_backend(WgpuBackend::new().await?))
    }
}

impl Generator<SoftwareBackend> {
    /// Generator that runs every pass on the CPU
    pub fn software() -> Self {
        Self::with_backend(SoftwareBackend::new())
    }
}

impl<B: RasterBackend> Generator<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            pipeline: RenderPipeline::new(backend),
            defaults: Config::default(),
        }
    }

    /// Replace the defaults used when a call passes no overrides
    pub fn with_defaults(mut self, defaults: Config) -> Result<Self> {
        defaults.validate()?;
        self.defaults = defaults;
        Ok(self)
    }

    pub fn defaults(&self) -> &Config {
        &self.defaults
    }

    pub fn pipeline(&self) -> &RenderPipeline<B> {
        &self.pipeline
    }

    /// Merge `overrides` into the defaults and run the full transform
    pub fn generate_from_image(
        &mut self,
        image: &dyn PixelSource,
        overrides: Option<&PartialConfig>,
    ) -> Result<NormalMap> {
        let config = match overrides {
            Some(overrides) => resolve(&self.defaults, overrides)?,
            None => self.defaults,
        };
        self.pipeline.run(image, &config)
    }
}

/// A generator shared between callers, one run in flight at a time
pub struct SharedGenerator<B: RasterBackend = WgpuBackend> {
    inner: Arc<Mutex<Generator<B>>>,
}

impl<B: RasterBackend> Clone for SharedGenerator<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: RasterBackend> SharedGenerator<B> {
    pub fn new(generator: Generator<B>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(generator)),
        }
    }

    /// Blocks until any run in progress has finished
    pub fn generate(
        &self,
        image: &dyn PixelSource,
        overrides: Option<&PartialConfig>,
    ) -> Result<NormalMap> {
        let mut generator = self
            .inner
            .lock()
            .map_err(|_| GeneratorError::BackendInit("generator lock poisoned".to_string()))?;
        generator.generate_from_image(image, overrides)
    }
}

impl<B: RasterBackend + Send + 'static> SharedGenerator<B> {
    /// Run on tokio's blocking pool so the readback waits never stall the runtime
    pub async fn generate_async(
        &self,
        image: RgbaRaster,
        overrides: Option<PartialConfig>,
    ) -> Result<NormalMap> {
        let shared = self.clone();
        tokio::task::spawn_blocking(move || shared.generate(&image, overrides.as_ref()))
            .await
            .map_err(|e| GeneratorError::BackendInit(format!("Task join error: {}", e)))?
    }
}
