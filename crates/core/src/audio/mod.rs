//! Adapter over the platform media element.
//!
//! [`AudioEngine`] turns imperative commands into calls on a
//! [`MediaBackend`] and turns the backend's queued notifications into
//! [`MediaEvent`]s that subscribers and the player consume.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AnalysisGraph, SpectrumSource},
    config::AudioConfig,
    timeline::{known_duration, PlaybackPosition},
    Result,
};

mod virtual_backend;

pub use virtual_backend::{BackendCommand, VirtualBackend};

/// Identifies one `play()` request. A ticket is stale once the source was
/// replaced or a newer request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayTicket {
    pub source_generation: u64,
    pub request: u64,
}

/// Notifications surfaced by the media backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// Position update while playing. `duration` may be NaN or 0 when
    /// still unknown.
    TimeUpdate { current: f64, duration: f64 },
    /// The current source reached its end.
    Ended,
    /// The media element failed to fetch or decode the source.
    Error { reason: String },
    /// Duration of the current source became known.
    MetadataLoaded { duration: f64 },
    /// Asynchronous completion of a `play()` request.
    PlayResolved {
        ticket: PlayTicket,
        outcome: std::result::Result<(), String>,
    },
}

/// Where to seek to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Fraction of the duration, e.g. a click position on the seek bar.
    Fraction(f64),
    Seconds(f64),
}

/// Platform playback primitive driven by [`AudioEngine`].
pub trait MediaBackend {
    /// Replaces the source and rewinds to 0 without starting playback.
    fn load_source(&mut self, uri: &str);

    /// Starts playback. The outcome must be reported later as
    /// [`MediaEvent::PlayResolved`] carrying `ticket`.
    fn request_play(&mut self, ticket: PlayTicket);

    fn pause(&mut self);

    fn set_position(&mut self, seconds: f64);

    fn set_volume(&mut self, volume: f32);

    /// The platform may refuse rates it does not support.
    fn set_rate(&mut self, rate: f32) -> Result<()>;

    /// Routes the output through an analysis tap. Called at most once.
    fn open_analysis_tap(&mut self) -> Result<()>;

    /// Drains notifications queued since the last call.
    fn poll_events(&mut self) -> Vec<MediaEvent>;

    /// Moves decoded output samples produced since the last call into `out`.
    fn drain_samples(&mut self, _out: &mut Vec<f32>) {}
}

/// Handle returned by [`AudioEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&MediaEvent)>;

/// High level audio engine façade.
pub struct AudioEngine<B> {
    backend: B,
    config: AudioConfig,
    graph: Option<AnalysisGraph>,
    position: PlaybackPosition,
    volume: f32,
    rate: f32,
    source_generation: u64,
    next_request: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    sample_buffer: Vec<f32>,
}

impl<B: MediaBackend> AudioEngine<B> {
    pub fn new(backend: B, config: AudioConfig) -> Self {
        Self {
            backend,
            config,
            graph: None,
            position: PlaybackPosition::default(),
            volume: 1.0,
            rate: 1.0,
            source_generation: 0,
            next_request: 0,
            listeners: Vec::new(),
            next_subscription: 0,
            sample_buffer: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn position(&self) -> PlaybackPosition {
        self.position
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn source_generation(&self) -> u64 {
        self.source_generation
    }

    /// Builds the analysis graph on first use. Must be called from inside a
    /// user-gesture handler; calling it again is a no-op.
    pub fn ensure_ready(&mut self) -> Result<()> {
        if self.graph.is_some() {
            return Ok(());
        }

        let graph = AnalysisGraph::new(&self.config)?;
        self.backend.open_analysis_tap()?;
        self.graph = Some(graph);
        tracing::info!(fft_size = self.config.fft_size, "analysis graph initialised");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.graph.is_some()
    }

    /// Spectrum source for the analyzer loop, if the graph exists.
    pub fn spectrum_source(&mut self) -> Option<&mut dyn SpectrumSource> {
        self.graph
            .as_mut()
            .map(|graph| graph as &mut dyn SpectrumSource)
    }

    /// Replaces the active source and rewinds. Outstanding play tickets
    /// become stale and anything the old source queued but nobody polled
    /// yet is dropped.
    pub fn set_source(&mut self, uri: &str) {
        let stale = self.backend.poll_events();
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "dropping events from replaced source");
        }
        self.sample_buffer.clear();
        self.backend.drain_samples(&mut self.sample_buffer);
        self.sample_buffer.clear();

        self.source_generation += 1;
        self.position = PlaybackPosition::default();
        if let Some(graph) = self.graph.as_mut() {
            graph.reset();
        }
        self.backend.load_source(uri);
    }

    /// Requests playback. The result arrives through [`poll`](Self::poll).
    pub fn play(&mut self) -> PlayTicket {
        self.next_request += 1;
        let ticket = PlayTicket {
            source_generation: self.source_generation,
            request: self.next_request,
        };
        self.backend.request_play(ticket);
        ticket
    }

    pub fn pause(&mut self) {
        self.backend.pause();
    }

    /// Seeks, clamping into `[0, duration]`. Fractional seeks are ignored
    /// while the duration is unknown. Returns the applied position.
    pub fn seek(&mut self, target: SeekTarget) -> Option<f64> {
        let duration = known_duration(self.position.duration);
        let seconds = match (target, duration) {
            (SeekTarget::Fraction(fraction), Some(duration)) if fraction.is_finite() => {
                fraction * duration
            }
            (SeekTarget::Fraction(_), _) => return None,
            (SeekTarget::Seconds(seconds), _) if seconds.is_nan() => return None,
            (SeekTarget::Seconds(seconds), _) => seconds,
        };

        let seconds = match duration {
            Some(duration) => seconds.clamp(0.0, duration),
            None if seconds.is_finite() => seconds.max(0.0),
            None => return None,
        };
        self.position.current = seconds;
        self.backend.set_position(seconds);
        Some(seconds)
    }

    /// Sets the output volume, clamped into `[0, 1]`.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let volume = if volume.is_nan() {
            self.volume
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume = volume;
        self.backend.set_volume(volume);
        volume
    }

    /// Passes the rate through; the backend decides what it accepts.
    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.backend.set_rate(rate)?;
        self.rate = rate;
        Ok(())
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&MediaEvent) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Drains backend notifications, feeds the analysis tap, notifies
    /// subscribers and returns the events in arrival order.
    pub fn poll(&mut self) -> Vec<MediaEvent> {
        self.sample_buffer.clear();
        self.backend.drain_samples(&mut self.sample_buffer);
        if let Some(graph) = self.graph.as_mut() {
            graph.push_samples(&self.sample_buffer);
        }

        let events = self.backend.poll_events();
        for event in &events {
            match event {
                MediaEvent::TimeUpdate { current, duration } => {
                    self.position.current = *current;
                    if known_duration(*duration).is_some() {
                        self.position.duration = *duration;
                    }
                }
                MediaEvent::MetadataLoaded { duration } => {
                    self.position.duration = *duration;
                }
                _ => {}
            }
            for (_, listener) in &mut self.listeners {
                listener(event);
            }
        }
        events
    }
}

impl<B> fmt::Debug for AudioEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("ready", &self.graph.is_some())
            .field("position", &self.position)
            .field("volume", &self.volume)
            .field("rate", &self.rate)
            .field("source_generation", &self.source_generation)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
