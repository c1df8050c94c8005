/// Loading height maps from disk and saving normal maps back out
///
/// Any format the `image` crate can decode is accepted as input. Output format
/// follows the file extension (PNG is the sensible choice for normal maps).

use std::path::Path;

use super::RgbaRaster;
use crate::error::Result;

/// Decode an image file into an RGBA8 raster
pub fn load(path: impl AsRef<Path>) -> Result<RgbaRaster> {
    let path = path.as_ref();
    let image = image::open(path)?;
    let raster = RgbaRaster::from_source(&image)?;
    tracing::debug!(
        "Loaded {} ({}x{})",
        path.display(),
        raster.width(),
        raster.height()
    );
    Ok(raster)
}

impl RgbaRaster {
    /// Encode the raster to a file, format chosen by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.to_image().save(path)?;
        tracing::debug!("Saved {}x{} raster to {}", self.width, self.height, path.display());
        Ok(())
    }
}
