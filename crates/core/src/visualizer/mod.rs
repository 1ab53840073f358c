//! Per-frame spectrum sampling and bass smoothing.
//!
//! [`FrequencyAnalyzer::tick`] is meant to be called once per display
//! refresh by whatever drives frames; it never schedules itself.

use serde::{Deserialize, Serialize};

use crate::{
    analysis::SpectrumSource,
    config::AnalyzerConfig,
    mapping::{GlowMapping, GlowParams},
};

/// Output of one analyzer tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerFrame {
    /// Byte magnitudes in bin order. Empty when no analysis is available.
    pub spectrum: Vec<u8>,
    /// Smoothed bass level carried across frames.
    pub smoothed_bass_average: f32,
    /// Glow parameters, absent when the frame carried no spectrum.
    pub glow: Option<GlowParams>,
}

impl AnalyzerFrame {
    pub fn is_cleared(&self) -> bool {
        self.spectrum.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FrequencyAnalyzer {
    config: AnalyzerConfig,
    mapping: GlowMapping,
    smoothed: f32,
    spectrum: Vec<u8>,
}

impl FrequencyAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            mapping: GlowMapping::new(config.clone()),
            config,
            smoothed: 0.0,
            spectrum: Vec::new(),
        }
    }

    pub fn smoothed_bass_average(&self) -> f32 {
        self.smoothed
    }

    /// Samples `source` and derives the frame. Without a source, or if the
    /// source fails, the frame is cleared and the smoothed level is kept.
    pub fn tick(&mut self, source: Option<&mut dyn SpectrumSource>) -> AnalyzerFrame {
        let Some(source) = source else {
            return self.cleared_frame();
        };

        self.spectrum.resize(source.bin_count(), 0);
        if let Err(err) = source.fill_byte_spectrum(&mut self.spectrum) {
            tracing::warn!(%err, "spectrum unavailable for this frame");
            return self.cleared_frame();
        }

        let spectrum = std::mem::take(&mut self.spectrum);
        let frame = self.ingest(&spectrum);
        self.spectrum = spectrum;
        frame
    }

    /// Runs the smoothing and mapping steps over an injected spectrum.
    pub fn ingest(&mut self, spectrum: &[u8]) -> AnalyzerFrame {
        if spectrum.is_empty() {
            return self.cleared_frame();
        }

        let bins = self.config.bass_bins.min(spectrum.len());
        let sum: u32 = spectrum[..bins].iter().map(|&v| u32::from(v)).sum();
        let bass_average = sum as f32 / bins as f32;
        self.smoothed += (bass_average - self.smoothed) * self.config.smoothing_factor;

        AnalyzerFrame {
            spectrum: spectrum.to_vec(),
            smoothed_bass_average: self.smoothed,
            glow: Some(self.mapping.map(self.smoothed)),
        }
    }

    fn cleared_frame(&self) -> AnalyzerFrame {
        AnalyzerFrame {
            spectrum: Vec::new(),
            smoothed_bass_average: self.smoothed,
            glow: None,
        }
    }
}

impl Default for FrequencyAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
