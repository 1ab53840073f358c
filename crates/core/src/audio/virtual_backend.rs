use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;

use crate::{timeline::PlaybackClock, PlayerError, Result};

use super::{MediaBackend, MediaEvent, PlayTicket};

const DEFAULT_DURATION: f64 = 180.0;
const TONE_HZ: f64 = 110.0;
const MAX_BUFFERED_SAMPLES: usize = 8_192;

/// Command issued to the backend, recorded in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Load(String),
    Play(PlayTicket),
    Pause,
    Seek(f64),
    Volume(f32),
    Rate(f32),
    OpenTap,
}

/// Clock-driven stand-in for a media element.
///
/// Nothing is decoded: each source has a nominal duration, time only moves
/// when [`advance`](Self::advance) is called, and the analysis tap receives
/// a synthesised bass tone scaled by the volume while playing and silence
/// otherwise.
#[derive(Debug)]
pub struct VirtualBackend {
    sample_rate: u32,
    default_duration: f64,
    durations: HashMap<String, f64>,
    failing: HashSet<String>,
    play_blocked: bool,
    tap_fails: bool,
    source: Option<String>,
    clock: PlaybackClock,
    duration: f64,
    playing: bool,
    volume: f32,
    rate: f32,
    tap_open: bool,
    phase: f64,
    events: Vec<MediaEvent>,
    samples: Vec<f32>,
    commands: Vec<BackendCommand>,
}

impl VirtualBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            default_duration: DEFAULT_DURATION,
            durations: HashMap::new(),
            failing: HashSet::new(),
            play_blocked: false,
            tap_fails: false,
            source: None,
            clock: PlaybackClock::default(),
            duration: f64::NAN,
            playing: false,
            volume: 1.0,
            rate: 1.0,
            tap_open: false,
            phase: 0.0,
            events: Vec::new(),
            samples: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = seconds;
        self
    }

    pub fn set_duration(&mut self, uri: impl Into<String>, seconds: f64) {
        self.durations.insert(uri.into(), seconds);
    }

    /// Makes every load of `uri` fail with a media error.
    pub fn fail_source(&mut self, uri: impl Into<String>) {
        self.failing.insert(uri.into());
    }

    /// Simulates an autoplay policy rejecting `play()`.
    pub fn set_play_blocked(&mut self, blocked: bool) {
        self.play_blocked = blocked;
    }

    pub fn fail_analysis_tap(&mut self) {
        self.tap_fails = true;
    }

    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_time(&self) -> f64 {
        self.clock.time_seconds
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Moves media time forward by `seconds` of wall time.
    pub fn advance(&mut self, seconds: f64) {
        if seconds <= 0.0 {
            return;
        }
        if !self.playing {
            if self.tap_open {
                self.synthesise(seconds, 0.0);
            }
            return;
        }

        self.clock.advance(seconds * f64::from(self.rate));
        let ended = self.duration.is_finite() && self.clock.time_seconds >= self.duration;
        if ended {
            self.clock.set(self.duration);
            self.playing = false;
        }

        self.events.push(MediaEvent::TimeUpdate {
            current: self.clock.time_seconds,
            duration: self.duration,
        });
        if ended {
            self.events.push(MediaEvent::Ended);
        }

        if self.tap_open {
            self.synthesise(seconds, 0.5 * f64::from(self.volume));
        }
    }

    /// Feeds the tap; a stopped element still outputs silence.
    fn synthesise(&mut self, seconds: f64, amplitude: f64) {
        let count = ((seconds * f64::from(self.sample_rate)) as usize).min(MAX_BUFFERED_SAMPLES);
        let step = TAU * TONE_HZ / f64::from(self.sample_rate);
        for _ in 0..count {
            self.samples.push((amplitude * self.phase.sin()) as f32);
            self.phase = (self.phase + step) % TAU;
        }
        if self.samples.len() > MAX_BUFFERED_SAMPLES {
            let overflow = self.samples.len() - MAX_BUFFERED_SAMPLES;
            self.samples.drain(0..overflow);
        }
    }

    /// Rejects queued successful play outcomes, as a media element does
    /// when a pending `play()` is interrupted.
    fn interrupt_pending_plays(&mut self, reason: &str) {
        for event in &mut self.events {
            if let MediaEvent::PlayResolved { outcome, .. } = event {
                if outcome.is_ok() {
                    *outcome = Err(reason.to_string());
                }
            }
        }
    }
}

impl MediaBackend for VirtualBackend {
    fn load_source(&mut self, uri: &str) {
        self.commands.push(BackendCommand::Load(uri.to_string()));
        self.interrupt_pending_plays("play() interrupted by a new load request");
        self.source = Some(uri.to_string());
        self.clock.reset();
        self.playing = false;

        if self.failing.contains(uri) {
            self.duration = f64::NAN;
            self.events.push(MediaEvent::Error {
                reason: format!("failed to load `{uri}`"),
            });
        } else {
            self.duration = self
                .durations
                .get(uri)
                .copied()
                .unwrap_or(self.default_duration);
            self.events.push(MediaEvent::MetadataLoaded {
                duration: self.duration,
            });
        }
    }

    fn request_play(&mut self, ticket: PlayTicket) {
        self.commands.push(BackendCommand::Play(ticket));
        let outcome = match self.source.as_deref() {
            None => Err("no supported source was found".to_string()),
            Some(uri) if self.failing.contains(uri) => {
                Err("the element has no supported sources".to_string())
            }
            Some(_) if self.play_blocked => {
                Err("play() request blocked by autoplay policy".to_string())
            }
            Some(_) => {
                self.playing = true;
                Ok(())
            }
        };
        self.events.push(MediaEvent::PlayResolved { ticket, outcome });
    }

    fn pause(&mut self) {
        self.commands.push(BackendCommand::Pause);
        self.interrupt_pending_plays("play() interrupted by a call to pause()");
        self.playing = false;
    }

    fn set_position(&mut self, seconds: f64) {
        self.commands.push(BackendCommand::Seek(seconds));
        let upper = if self.duration.is_finite() {
            self.duration
        } else {
            f64::MAX
        };
        self.clock.set(seconds.min(upper));
    }

    fn set_volume(&mut self, volume: f32) {
        self.commands.push(BackendCommand::Volume(volume));
        self.volume = volume;
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlayerError::InvalidRate(rate));
        }
        self.commands.push(BackendCommand::Rate(rate));
        self.rate = rate;
        Ok(())
    }

    fn open_analysis_tap(&mut self) -> Result<()> {
        if self.tap_fails {
            return Err(PlayerError::AnalysisUnavailable);
        }
        self.commands.push(BackendCommand::OpenTap);
        self.tap_open = true;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<MediaEvent> {
        std::mem::take(&mut self.events)
    }

    fn drain_samples(&mut self, out: &mut Vec<f32>) {
        out.append(&mut self.samples);
    }
}
