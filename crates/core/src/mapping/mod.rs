use serde::{Deserialize, Serialize};

use crate::config::AnalyzerConfig;

/// Inner shadow radius before the blur is added.
const INNER_SHADOW_BASE: f32 = 15.0;
/// Outer shadow radius before the scaled blur is added.
const OUTER_SHADOW_BASE: f32 = 30.0;
const OUTER_SHADOW_BLUR_GAIN: f32 = 1.5;

/// Visual parameters for the bass-driven glow around the cover art.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlowParams {
    /// Blur radius, clamped to the configured range.
    pub blur: f32,
    /// Uniform scale factor, at least 1.
    pub scale: f32,
    pub inner_radius: f32,
    pub outer_radius: f32,
}

/// Maps a smoothed bass level onto [`GlowParams`] through clamped affine
/// functions.
#[derive(Debug, Clone)]
pub struct GlowMapping {
    config: AnalyzerConfig,
}

impl GlowMapping {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn blur(&self, level: f32) -> f32 {
        (level / self.config.blur_divisor)
            .round()
            .clamp(self.config.blur_min, self.config.blur_max)
    }

    pub fn scale(&self, level: f32) -> f32 {
        let max_boost = self.config.scale_max_boost;
        1.0 + (level / self.config.scale_divisor).clamp(0.0, max_boost)
    }

    pub fn map(&self, level: f32) -> GlowParams {
        let blur = self.blur(level);
        GlowParams {
            blur,
            scale: self.scale(level),
            inner_radius: INNER_SHADOW_BASE + blur,
            outer_radius: OUTER_SHADOW_BASE + blur * OUTER_SHADOW_BLUR_GAIN,
        }
    }
}

impl Default for GlowMapping {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
