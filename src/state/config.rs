/// Generator parameters for height-to-normal conversion
///
/// A `Config` is the fully-populated parameter set used by one pipeline run.
/// Callers usually only care about a couple of fields, so they pass a
/// `PartialConfig` that gets merged field-by-field onto the generator's
/// defaults by `resolve`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, Result};

/// Gradient kernel used by the normal pass
///
/// Serialized as a lowercase name. Deserializes from a name or a legacy id.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all(serialize = "lowercase"), try_from = "AlgorithmRepr")]
pub enum Algorithm {
    /// 3x3 Sobel operator (weights 1, 2, 1)
    #[default]
    Sobel,
    /// 3x3 Scharr operator (weights 3, 10, 3)
    Scharr,
}

impl Algorithm {
    /// Legacy numeric id, also the value the shader switches on
    pub fn id(self) -> u32 {
        match self {
            Algorithm::Sobel => 1,
            Algorithm::Scharr => 0,
        }
    }
}

/// Legacy numeric ids: Sobel = 1, Scharr = 0
impl TryFrom<i32> for Algorithm {
    type Error = GeneratorError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Algorithm::Sobel),
            0 => Ok(Algorithm::Scharr),
            other => Err(GeneratorError::InvalidConfig(format!(
                "unknown algorithm id {other} (expected 1 = sobel or 0 = scharr)"
            ))),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AlgorithmRepr {
    Id(i32),
    Name(String),
}

impl TryFrom<AlgorithmRepr> for Algorithm {
    type Error = GeneratorError;

    fn try_from(repr: AlgorithmRepr) -> Result<Self> {
        match repr {
            AlgorithmRepr::Id(id) => Algorithm::try_from(id),
            AlgorithmRepr::Name(name) => name.parse(),
        }
    }
}

impl FromStr for Algorithm {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sobel" => Ok(Algorithm::Sobel),
            "scharr" => Ok(Algorithm::Scharr),
            other => Err(GeneratorError::InvalidConfig(format!(
                "unknown algorithm '{other}' (expected sobel or scharr)"
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Sobel => f.write_str("sobel"),
            Algorithm::Scharr => f.write_str("scharr"),
        }
    }
}

/// Per-channel sign flag, serialized as `1` or `-1`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "i32", into = "i32")]
pub enum Invert {
    #[default]
    NoInvert,
    Invert,
}

impl Invert {
    /// Multiplier applied to the channel before packing
    pub fn sign(self) -> f32 {
        match self {
            Invert::NoInvert => 1.0,
            Invert::Invert => -1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Invert::NoInvert => Invert::Invert,
            Invert::Invert => Invert::NoInvert,
        }
    }
}

impl TryFrom<i32> for Invert {
    type Error = GeneratorError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Invert::NoInvert),
            -1 => Ok(Invert::Invert),
            other => Err(GeneratorError::InvalidConfig(format!(
                "invert flag must be 1 or -1, got {other}"
            ))),
        }
    }
}

impl From<Invert> for i32 {
    fn from(value: Invert) -> Self {
        match value {
            Invert::NoInvert => 1,
            Invert::Invert => -1,
        }
    }
}

/// Where the `invert_h` flag acts in the normal pass
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeightInversion {
    /// Flip the height field itself: both gradients change sign before normalization
    #[default]
    Gradient,
    /// Flip the normalized Z component right before packing
    Depth,
}

/// Fully-populated generator parameters
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Inverse linear depth scale (> 0). Smaller values exaggerate relief.
    pub strength: f32,

    /// Exponential depth falloff, enters the depth scale as `2^level`
    pub level: f32,

    /// Blur amount for the pre-pass. Only the magnitude is used.
    pub blur: f32,

    /// Gradient kernel used by the normal pass
    #[serde(alias = "type")]
    pub algorithm: Algorithm,

    /// Flip the X (red) component
    pub invert_r: Invert,

    /// Flip the Y (green) component
    pub invert_g: Invert,

    /// Flip the height direction
    pub invert_h: Invert,

    /// Placement of `invert_h`
    #[serde(default)]
    pub height_inversion: HeightInversion,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strength: 0.13,
            level: 5.6,
            blur: -6.0,
            algorithm: Algorithm::Sobel,
            invert_r: Invert::NoInvert,
            invert_g: Invert::NoInvert,
            invert_h: Invert::NoInvert,
            height_inversion: HeightInversion::Gradient,
        }
    }
}

impl Config {
    /// Check the numeric invariants the enums can't express
    pub fn validate(&self) -> Result<()> {
        if !self.strength.is_finite() || self.strength <= 0.0 {
            return Err(GeneratorError::InvalidConfig(format!(
                "strength must be a positive finite number, got {}",
                self.strength
            )));
        }
        if !self.level.is_finite() {
            return Err(GeneratorError::InvalidConfig(format!(
                "level must be finite, got {}",
                self.level
            )));
        }
        if !self.blur.is_finite() {
            return Err(GeneratorError::InvalidConfig(format!(
                "blur must be finite, got {}",
                self.blur
            )));
        }
        Ok(())
    }

    /// Depth scale `dz = (1 / strength) * (1 + 2^level)`
    ///
    /// Larger values flatten the map, smaller values exaggerate relief. Extreme
    /// but valid inputs can overflow to infinity, which the normal pass treats
    /// as a perfectly flat map.
    pub fn depth_scale(&self) -> f32 {
        let strength = f64::from(self.strength);
        let level = f64::from(self.level);
        ((1.0 / strength) * (1.0 + 2f64.powf(level))) as f32
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse and validate from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| GeneratorError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Call-site override: every field is optional
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<f32>,
    #[serde(alias = "type", skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert_r: Option<Invert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert_g: Option<Invert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invert_h: Option<Invert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_inversion: Option<HeightInversion>,
}

impl PartialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn level(mut self, level: f32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn blur(mut self, blur: f32) -> Self {
        self.blur = Some(blur);
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn invert_r(mut self, invert: Invert) -> Self {
        self.invert_r = Some(invert);
        self
    }

    pub fn invert_g(mut self, invert: Invert) -> Self {
        self.invert_g = Some(invert);
        self
    }

    pub fn invert_h(mut self, invert: Invert) -> Self {
        self.invert_h = Some(invert);
        self
    }

    pub fn height_inversion(mut self, mode: HeightInversion) -> Self {
        self.height_inversion = Some(mode);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse from JSON. Unknown fields and out-of-range flags are config errors.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GeneratorError::InvalidConfig(e.to_string()))
    }
}

/// Merge `overrides` onto `base` field by field and validate the result
pub fn resolve(base: &Config, overrides: &PartialConfig) -> Result<Config> {
    let config = Config {
        strength: overrides.strength.unwrap_or(base.strength),
        level: overrides.level.unwrap_or(base.level),
        blur: overrides.blur.unwrap_or(base.blur),
        algorithm: overrides.algorithm.unwrap_or(base.algorithm),
        invert_r: overrides.invert_r.unwrap_or(base.invert_r),
        invert_g: overrides.invert_g.unwrap_or(base.invert_g),
        invert_h: overrides.invert_h.unwrap_or(base.invert_h),
        height_inversion: overrides.height_inversion.unwrap_or(base.height_inversion),
    };
    config.validate()?;
    Ok(config)
}
