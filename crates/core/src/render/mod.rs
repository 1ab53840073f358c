use crate::{mapping::GlowParams, visualizer::AnalyzerFrame};

/// Gap between two bars, in canvas units.
const BAR_GAP: f32 = 1.0;
/// Bars are drawn wider than their share of the canvas; the tail is cut off.
const BAR_WIDTH_GAIN: f32 = 1.4;

/// Receives spectrum magnitudes for a bar chart.
pub trait BarChartTarget {
    fn draw_bars(&mut self, magnitudes: &[u8]);
    fn clear(&mut self);
}

/// Receives glow parameters for the cover art.
pub trait GlowTarget {
    fn apply_glow(&mut self, glow: &GlowParams);
}

/// One bar in canvas coordinates, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub width: f32,
    pub height: f32,
}

/// Lays out `magnitudes` as bars across a `width` x `height` canvas.
pub fn layout_bars(magnitudes: &[u8], width: f32, height: f32) -> Vec<Bar> {
    if magnitudes.is_empty() {
        return Vec::new();
    }

    let bar_width = width / magnitudes.len() as f32 * BAR_WIDTH_GAIN;
    let mut x = 0.0;
    magnitudes
        .iter()
        .map(|&magnitude| {
            let bar = Bar {
                x,
                width: bar_width,
                height: f32::from(magnitude) / 255.0 * height,
            };
            x += bar_width + BAR_GAP;
            bar
        })
        .collect()
}

/// Fans analyzer frames out to the registered render targets.
#[derive(Default)]
pub struct RenderGraph {
    bars: Vec<Box<dyn BarChartTarget>>,
    glows: Vec<Box<dyn GlowTarget>>,
    last_glow: Option<GlowParams>,
    frames: u64,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bars(&mut self, target: impl BarChartTarget + 'static) {
        self.bars.push(Box::new(target));
    }

    pub fn register_glow(&mut self, target: impl GlowTarget + 'static) {
        self.glows.push(Box::new(target));
    }

    /// Last glow pushed to the targets.
    pub fn last_glow(&self) -> Option<&GlowParams> {
        self.last_glow.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Pushes one frame. Cleared frames clear the bar charts and leave the
    /// glow as it was.
    pub fn apply_frame(&mut self, frame: &AnalyzerFrame) {
        self.frames += 1;

        if frame.is_cleared() {
            self.bars.iter_mut().for_each(|target| target.clear());
        } else {
            for target in &mut self.bars {
                target.draw_bars(&frame.spectrum);
            }
        }

        if let Some(glow) = &frame.glow {
            for target in &mut self.glows {
                target.apply_glow(glow);
            }
            self.last_glow = Some(*glow);
        }
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("bars", &self.bars.len())
            .field("glows", &self.glows.len())
            .field("last_glow", &self.last_glow)
            .field("frames", &self.frames)
            .finish()
    }
}

/// Renders the spectrum as rows of block characters.
#[derive(Debug, Clone)]
pub struct TextBars {
    columns: usize,
    rows: usize,
    lines: Vec<String>,
}

impl TextBars {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl BarChartTarget for TextBars {
    fn draw_bars(&mut self, magnitudes: &[u8]) {
        let chunk = magnitudes.len().div_ceil(self.columns).max(1);
        let heights: Vec<usize> = magnitudes
            .chunks(chunk)
            .map(|group| {
                let peak = group.iter().copied().max().unwrap_or(0);
                (usize::from(peak) * self.rows).div_ceil(255)
            })
            .collect();

        self.lines = (0..self.rows)
            .rev()
            .map(|row| {
                heights
                    .iter()
                    .map(|&height| if height > row { '█' } else { ' ' })
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect();
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::visualizer::FrequencyAnalyzer;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl BarChartTarget for Recorder {
        fn draw_bars(&mut self, magnitudes: &[u8]) {
            self.0.borrow_mut().push(format!("bars:{}", magnitudes.len()));
        }

        fn clear(&mut self) {
            self.0.borrow_mut().push("clear".to_string());
        }
    }

    impl GlowTarget for Recorder {
        fn apply_glow(&mut self, glow: &GlowParams) {
            self.0.borrow_mut().push(format!("glow:{}", glow.blur));
        }
    }

    #[test]
    fn layout_matches_canvas_geometry() {
        let bars = layout_bars(&[255, 0, 51], 300.0, 100.0);

        assert_eq!(bars.len(), 3);
        assert!((bars[0].width - 140.0).abs() < 1e-4);
        assert_eq!(bars[0].height, 100.0);
        assert_eq!(bars[1].height, 0.0);
        assert!((bars[1].x - 141.0).abs() < 1e-4);
        assert!((bars[2].height - 20.0).abs() < 1e-4);
        assert!(layout_bars(&[], 10.0, 10.0).is_empty());
    }

    #[test]
    fn frames_reach_every_target() {
        let log = Recorder::default();
        let mut graph = RenderGraph::new();
        graph.register_bars(log.clone());
        graph.register_glow(log.clone());

        let mut analyzer = FrequencyAnalyzer::default();
        graph.apply_frame(&analyzer.ingest(&[90u8; 16]));
        graph.apply_frame(&analyzer.tick(None));

        assert_eq!(
            log.0.borrow().as_slice(),
            &["bars:16", "glow:8", "clear"]
        );
        assert_eq!(graph.frames(), 2);
        assert_eq!(graph.last_glow().unwrap().blur, 8.0);
    }

    #[test]
    fn text_bars_draw_columns_bottom_up() {
        let mut bars = TextBars::new(4, 2);
        bars.draw_bars(&[255, 255, 0, 0, 100, 100, 0, 0]);

        assert_eq!(bars.lines(), &["█".to_string(), "█ █".to_string()]);
        bars.clear();
        assert!(bars.render().is_empty());
    }
}
