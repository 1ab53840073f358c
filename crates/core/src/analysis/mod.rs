use std::{collections::VecDeque, f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::AudioConfig, Result};

/// Anything that can hand out one frame of byte spectrum magnitudes.
pub trait SpectrumSource {
    /// Number of magnitudes in a frame.
    fn bin_count(&self) -> usize;

    /// Fills `out` (of length [`bin_count`](Self::bin_count)) with the
    /// current magnitudes.
    fn fill_byte_spectrum(&mut self, out: &mut [u8]) -> Result<()>;
}

/// Fixed spectrum, handy for feeding the analyzer by hand.
impl SpectrumSource for Vec<u8> {
    fn bin_count(&self) -> usize {
        self.len()
    }

    fn fill_byte_spectrum(&mut self, out: &mut [u8]) -> Result<()> {
        out.copy_from_slice(&self[..out.len()]);
        Ok(())
    }
}

/// Software analyser tapped onto the media output.
///
/// Keeps the most recent `fft_size` samples, windows them with a Blackman
/// window and converts the smoothed magnitudes into bytes over the
/// configured decibel range. Output has `fft_size / 2` bins.
pub struct AnalysisGraph {
    config: AudioConfig,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
    window: Vec<f32>,
    fft: FftResources,
}

impl AnalysisGraph {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;

        let size = config.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            config: config.clone(),
            samples: std::iter::repeat(0.0).take(size).collect(),
            smoothed: vec![0.0; size / 2],
            window: (0..size).map(|i| blackman_value(i, size)).collect(),
            fft,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Appends mono samples, discarding the oldest beyond the window.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let size = self.config.fft_size;
        let keep = &samples[samples.len().saturating_sub(size)..];
        for &sample in keep {
            if self.samples.len() == size {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    /// Clears buffered audio and smoothing history.
    pub fn reset(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }

    fn update_smoothed(&mut self) -> Result<()> {
        let size = self.config.fft_size;
        for (index, (sample, weight)) in self.samples.iter().zip(&self.window).enumerate() {
            self.fft.input[index] = sample * weight;
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let tau = self.config.smoothing_time_constant;
        let scale = 1.0 / size as f32;
        for (previous, bin) in self.smoothed.iter_mut().zip(&self.fft.spectrum) {
            let magnitude = bin.norm() * scale;
            *previous = tau * *previous + (1.0 - tau) * magnitude;
        }
        Ok(())
    }
}

impl SpectrumSource for AnalysisGraph {
    fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    fn fill_byte_spectrum(&mut self, out: &mut [u8]) -> Result<()> {
        self.update_smoothed()?;

        let min_db = self.config.min_decibels;
        let range = self.config.max_decibels - min_db;
        for (byte, magnitude) in out.iter_mut().zip(&self.smoothed) {
            *byte = magnitude_to_byte(*magnitude, min_db, range);
        }
        Ok(())
    }
}

fn magnitude_to_byte(magnitude: f32, min_db: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (255.0 / range) * (db - min_db);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let x = index as f32 / len as f32;
    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for AnalysisGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisGraph")
            .field("fft_size", &self.config.fft_size)
            .field("smoothing", &self.config.smoothing_time_constant)
            .field("buffered", &self.samples.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> AnalysisGraph {
        AnalysisGraph::new(&AudioConfig::default()).unwrap()
    }

    fn tone(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / 48_000.0).sin())
            .collect()
    }

    #[test]
    fn default_window_yields_128_bins() {
        assert_eq!(graph().bin_count(), 128);
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut graph = graph();
        let mut out = vec![7u8; graph.bin_count()];
        graph.fill_byte_spectrum(&mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_near_its_bin() {
        let mut config = AudioConfig::default();
        config.smoothing_time_constant = 0.0;
        let mut graph = AnalysisGraph::new(&config).unwrap();

        // 48 kHz / 256 = 187.5 Hz per bin; bin 10 sits at 1875 Hz.
        graph.push_samples(&tone(1875.0, 0.001, 1024));
        let mut out = vec![0u8; graph.bin_count()];
        graph.fill_byte_spectrum(&mut out).unwrap();

        let max = *out.iter().max().unwrap();
        assert_eq!(out[10], max);
        assert!(out[10] > out[9] && out[10] > out[11]);
        assert_eq!(out[60], 0);
    }

    #[test]
    fn smoothing_blends_with_previous_frames() {
        let mut graph = graph();
        graph.push_samples(&tone(1875.0, 0.001, 256));
        let mut first = vec![0u8; 128];
        graph.fill_byte_spectrum(&mut first).unwrap();
        let mut second = vec![0u8; 128];
        graph.fill_byte_spectrum(&mut second).unwrap();

        assert!(second[10] > first[10]);
    }

    #[test]
    fn reset_clears_history() {
        let mut graph = graph();
        graph.push_samples(&tone(1875.0, 1.0, 256));
        graph.reset();
        let mut out = vec![0u8; 128];
        graph.fill_byte_spectrum(&mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_invalid_window() {
        let mut config = AudioConfig::default();
        config.fft_size = 100;
        assert!(AnalysisGraph::new(&config).is_err());
    }
}
