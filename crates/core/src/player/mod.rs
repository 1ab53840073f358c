//! Playback state machine.
//!
//! The player owns the playlist and the flags, drives the [`AudioEngine`]
//! and reacts to the events it reports. Every transition on an empty
//! playlist is a silent no-op.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    audio::{AudioEngine, MediaBackend, MediaEvent, PlayTicket, SeekTarget},
    config::{AppConfig, PlayerConfig},
    playlist::{NewTrack, Playlist, Track},
    selector::{select_next, wrap_index, Direction},
    PlayerError, Result,
};

/// Flags and position of the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Always within the playlist bounds when the playlist is non-empty.
    pub current_index: Option<usize>,
    /// Whether the user wants audio to be running.
    pub is_playing: bool,
    pub is_shuffle: bool,
    pub is_repeat: bool,
    pub volume: f32,
    pub rate: f32,
}

impl PlaybackState {
    fn new(config: &PlayerConfig) -> Self {
        Self {
            current_index: None,
            is_playing: false,
            is_shuffle: false,
            is_repeat: false,
            volume: config.default_volume.clamp(0.0, 1.0),
            rate: config.default_rate,
        }
    }
}

/// Coarse state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Empty,
    Paused,
    Playing,
}

/// What a call to [`Player::play`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayRequest {
    /// The playlist is empty.
    NothingToPlay,
    AlreadyPlaying,
    /// Waiting for the backend; may be a request issued earlier.
    Pending(PlayTicket),
}

pub struct Player<B, R = StdRng> {
    playlist: Playlist,
    state: PlaybackState,
    engine: AudioEngine<B>,
    rng: R,
    config: PlayerConfig,
    pending: Option<PlayTicket>,
    active: bool,
    last_error: Option<PlayerError>,
}

impl<B: MediaBackend> Player<B, StdRng> {
    pub fn new(backend: B, config: &AppConfig) -> Self {
        Self::with_rng(backend, config, StdRng::from_entropy())
    }
}

impl<B: MediaBackend, R: Rng> Player<B, R> {
    /// Creates a player with an explicit random source, e.g. a seeded
    /// `StdRng` for reproducible shuffles.
    pub fn with_rng(backend: B, config: &AppConfig, rng: R) -> Self {
        let state = PlaybackState::new(&config.player);
        let mut engine = AudioEngine::new(backend, config.audio.clone());
        engine.set_volume(state.volume);
        if let Err(err) = engine.set_rate(state.rate) {
            tracing::warn!(%err, "default playback rate rejected");
        }

        Self {
            playlist: Playlist::new(),
            state,
            engine,
            rng,
            config: config.player.clone(),
            pending: None,
            active: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn engine(&self) -> &AudioEngine<B> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AudioEngine<B> {
        &mut self.engine
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state
            .current_index
            .and_then(|index| self.playlist.get(index))
    }

    /// Most recent playback or media failure, kept for display.
    pub fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    pub fn status(&self) -> PlayerStatus {
        if self.playlist.is_empty() {
            PlayerStatus::Empty
        } else if self.active {
            PlayerStatus::Playing
        } else {
            PlayerStatus::Paused
        }
    }

    /// True while a `play()` request is unresolved.
    pub fn is_play_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Appends a track and returns its index. The first track of an empty
    /// playlist becomes current.
    pub fn append(&mut self, track: NewTrack) -> usize {
        let placeholder = self.config.placeholder_cover.clone();
        let appended = self.playlist.append(track, &placeholder, &mut self.rng);
        tracing::debug!(id = %appended.id, title = %appended.title, "track appended");

        let index = self.playlist.len() - 1;
        if self.state.current_index.is_none() {
            self.load(0);
        }
        index
    }

    /// Removes a track, keeping `current_index` in range. Removing the
    /// current track loads whatever now sits at its position.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        let removed = self.playlist.remove(index)?;
        let Some(current) = self.state.current_index else {
            return Some(removed);
        };

        if self.playlist.is_empty() {
            self.engine.pause();
            self.reset_transport();
            self.state.current_index = None;
            self.state.is_playing = false;
        } else if index < current {
            self.state.current_index = Some(current - 1);
        } else if index == current {
            self.load(current as isize);
        }
        Some(removed)
    }

    /// Selects the track at `index`, wrapping out-of-range values, and
    /// points the engine at it. Never starts playback by itself.
    pub fn load(&mut self, index: isize) -> bool {
        if self.playlist.is_empty() {
            tracing::debug!("load ignored: playlist is empty");
            return false;
        }

        let index = wrap_index(index, self.playlist.len());
        self.state.current_index = Some(index);
        self.reset_transport();

        let track = &self.playlist.tracks()[index];
        tracing::info!(index, title = %track.title, "loaded track");
        self.engine.set_source(&track.source);
        true
    }

    /// Asks the engine to start the current track.
    pub fn play(&mut self) -> PlayRequest {
        if self.playlist.is_empty() {
            tracing::info!("nothing to play");
            return PlayRequest::NothingToPlay;
        }
        if self.active {
            return PlayRequest::AlreadyPlaying;
        }
        if let Some(ticket) = self.pending {
            return PlayRequest::Pending(ticket);
        }

        let ticket = self.engine.play();
        self.pending = Some(ticket);
        PlayRequest::Pending(ticket)
    }

    /// Stops playback. Returns `false` if nothing was playing or pending.
    pub fn pause(&mut self) -> bool {
        if !self.active && self.pending.is_none() {
            return false;
        }

        self.engine.pause();
        self.reset_transport();
        self.state.is_playing = false;
        tracing::info!("paused");
        true
    }

    /// Play when idle, pause when playing or about to play.
    pub fn toggle(&mut self) {
        if self.active || self.pending.is_some() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Moves to the next or previous track per the shuffle policy and
    /// starts it.
    pub fn advance(&mut self, direction: Direction) -> Option<usize> {
        let current = self.state.current_index.unwrap_or(0);
        let next = select_next(
            current,
            self.playlist.len(),
            direction,
            self.state.is_shuffle,
            &mut self.rng,
        )?;

        self.load(next as isize);
        self.play();
        Some(next)
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.state.is_shuffle = shuffle;
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.state.is_shuffle = !self.state.is_shuffle;
        self.state.is_shuffle
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.state.is_repeat = repeat;
    }

    pub fn toggle_repeat(&mut self) -> bool {
        self.state.is_repeat = !self.state.is_repeat;
        self.state.is_repeat
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.state.volume = self.engine.set_volume(volume);
        self.state.volume
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.engine.set_rate(rate)?;
        self.state.rate = rate;
        Ok(())
    }

    pub fn seek(&mut self, target: SeekTarget) -> Option<f64> {
        if self.playlist.is_empty() {
            return None;
        }
        self.engine.seek(target)
    }

    /// Pulls pending engine events and applies them. Returns the events so
    /// the caller can refresh its display.
    ///
    /// Once an event replaces the source, the rest of the batch belongs to
    /// the old track and is skipped.
    pub fn pump(&mut self) -> Vec<MediaEvent> {
        let generation = self.engine.source_generation();
        let events = self.engine.poll();
        for (applied, event) in events.iter().enumerate() {
            if self.engine.source_generation() != generation {
                tracing::debug!(
                    skipped = events.len() - applied,
                    "source replaced mid-batch, skipping events"
                );
                break;
            }
            self.handle_event(event);
        }
        events
    }

    /// Applies one engine event to the state machine.
    pub fn handle_event(&mut self, event: &MediaEvent) {
        match event {
            MediaEvent::PlayResolved { ticket, outcome } => self.resolve_play(*ticket, outcome),
            MediaEvent::Ended => self.on_ended(),
            MediaEvent::Error { reason } => {
                let err = PlayerError::DecodeOrSource(reason.clone());
                tracing::warn!(%err, track = ?self.current_track().map(|t| &t.title), "media error");
                self.reset_transport();
                self.state.is_playing = false;
                self.last_error = Some(err);
            }
            MediaEvent::MetadataLoaded { duration } => {
                tracing::debug!(duration, "metadata loaded");
            }
            MediaEvent::TimeUpdate { .. } => {}
        }
    }

    fn resolve_play(&mut self, ticket: PlayTicket, outcome: &std::result::Result<(), String>) {
        if self.pending != Some(ticket) {
            tracing::debug!(?ticket, "ignoring stale play resolution");
            return;
        }
        self.pending = None;

        match outcome {
            Ok(()) => {
                self.active = true;
                self.state.is_playing = true;
                tracing::info!(
                    title = ?self.current_track().map(|t| &t.title),
                    "playing"
                );
            }
            Err(reason) => {
                let err = PlayerError::PlaybackBlocked(reason.clone());
                tracing::warn!(%err, "play request rejected");
                self.state.is_playing = false;
                self.last_error = Some(err);
            }
        }
    }

    fn on_ended(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        self.active = false;

        if self.state.is_repeat {
            self.engine.seek(SeekTarget::Seconds(0.0));
            self.play();
        } else {
            self.advance(Direction::Forward);
        }
    }

    fn reset_transport(&mut self) {
        self.pending = None;
        self.active = false;
    }
}

impl<B, R> std::fmt::Debug for Player<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("tracks", &self.playlist.len())
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("active", &self.active)
            .finish()
    }
}
