/// Error types shared by every stage of the generator
///
/// All failures are deterministic configuration or environment errors,
/// so nothing in the pipeline retries.

use thiserror::Error;

/// Everything that can go wrong while turning a height map into a normal map
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Out-of-range or malformed configuration field
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Zero or mismatched image dimensions, or a short pixel buffer
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The rasterization backend could not provide a device, shader or surface
    #[error("backend initialization failed: {0}")]
    BackendInit(String),

    /// Decoding or encoding an image file failed
    #[error("image I/O error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
