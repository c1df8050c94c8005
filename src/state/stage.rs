/// Per-call progress of a render pipeline
///
/// A run walks `Idle -> Blurring -> Thresholding -> ComputingNormals -> Idle`
/// strictly in order. Nothing survives between calls except the backend's
/// surface and shader programs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStage {
    #[default]
    Idle,
    Blurring,
    Thresholding,
    ComputingNormals,
}

impl PipelineStage {
    /// The stage that follows this one in a run
    pub fn next(self) -> Self {
        match self {
            PipelineStage::Idle => PipelineStage::Blurring,
            PipelineStage::Blurring => PipelineStage::Thresholding,
            PipelineStage::Thresholding => PipelineStage::ComputingNormals,
            PipelineStage::ComputingNormals => PipelineStage::Idle,
        }
    }

    pub fn is_idle(self) -> bool {
        self == PipelineStage::Idle
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Blurring => "blurring",
            PipelineStage::Thresholding => "thresholding",
            PipelineStage::ComputingNormals => "computing normals",
        };
        f.write_str(name)
    }
}
