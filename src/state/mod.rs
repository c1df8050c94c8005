/// Generator state module
///
/// This module holds the data that drives a run:
/// - Generator parameters and override merging (config.rs)
/// - The per-call stage machine (stage.rs)

pub mod config;
pub mod stage;

pub use config::{resolve, Algorithm, Config, HeightInversion, Invert, PartialConfig};
pub use stage::PipelineStage;
