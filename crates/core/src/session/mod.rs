//! Glue between UI controls and the player.
//!
//! A [`Session`] owns everything one open player window needs: the state
//! machine, favorites and their store, the analyzer and its render targets,
//! the theme and the search box contents.

use std::str::FromStr;

use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    audio::{MediaBackend, MediaEvent, SeekTarget},
    config::AppConfig,
    favorites::{FavoriteSet, KeyValueStore},
    player::Player,
    playlist::Track,
    render::RenderGraph,
    selector::Direction,
    visualizer::{AnalyzerFrame, FrequencyAnalyzer},
    PlayerError, Result,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Default,
    Neon,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Default => Theme::Neon,
            Theme::Neon => Theme::Default,
        }
    }
}

/// Every control the UI exposes.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TogglePlay,
    Next,
    Previous,
    ToggleShuffle,
    ToggleRepeat,
    ToggleFavorite,
    ToggleTheme,
    /// Click on the seek bar, as a fraction of its width.
    Seek(f64),
    Volume(f32),
    Rate(f32),
    /// Click on a playlist row: load and play it.
    Select(usize),
    Search(String),
}

impl FromStr for Command {
    type Err = PlayerError;

    /// Parses `toggle`, `next`, `seek=0.5`, `search=go` and friends.
    fn from_str(raw: &str) -> Result<Self> {
        let (name, value) = match raw.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (raw.trim(), None),
        };

        let number = |value: Option<&str>| -> Result<f64> {
            value
                .ok_or_else(|| PlayerError::msg(format!("`{name}` needs a value")))?
                .parse::<f64>()
                .map_err(|err| PlayerError::msg(format!("invalid value for `{name}`: {err}")))
        };

        Ok(match name.to_ascii_lowercase().as_str() {
            "toggle" | "play" | "pause" => Command::TogglePlay,
            "next" => Command::Next,
            "prev" | "previous" => Command::Previous,
            "shuffle" => Command::ToggleShuffle,
            "repeat" => Command::ToggleRepeat,
            "favorite" | "like" => Command::ToggleFavorite,
            "theme" => Command::ToggleTheme,
            "seek" => Command::Seek(number(value)?),
            "volume" => Command::Volume(number(value)? as f32),
            "rate" | "speed" => Command::Rate(number(value)? as f32),
            "select" => {
                let index = number(value)?;
                if index < 0.0 || index.fract() != 0.0 {
                    return Err(PlayerError::msg("`select` needs a track index"));
                }
                Command::Select(index as usize)
            }
            "search" => Command::Search(value.unwrap_or_default().to_string()),
            other => return Err(PlayerError::msg(format!("unknown command `{other}`"))),
        })
    }
}

/// Keys with global shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    pub fn command(self) -> Command {
        match self {
            Key::Space => Command::TogglePlay,
            Key::ArrowLeft => Command::Previous,
            Key::ArrowRight => Command::Next,
        }
    }
}

pub struct Session<B, R = StdRng> {
    player: Player<B, R>,
    favorites: FavoriteSet,
    store: Box<dyn KeyValueStore>,
    analyzer: FrequencyAnalyzer,
    render: RenderGraph,
    theme: Theme,
    search: String,
}

impl<B: MediaBackend, R: Rng> Session<B, R> {
    /// Wires a session together, reading the favorites snapshot once.
    pub fn new(player: Player<B, R>, store: Box<dyn KeyValueStore>, config: &AppConfig) -> Self {
        let favorites = FavoriteSet::load(store.as_ref(), &config.player.favorites_key);
        tracing::debug!(favorites = favorites.len(), "session started");

        Self {
            player,
            favorites,
            store,
            analyzer: FrequencyAnalyzer::new(config.analyzer.clone()),
            render: RenderGraph::new(),
            theme: Theme::default(),
            search: String::new(),
        }
    }

    pub fn player(&self) -> &Player<B, R> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player<B, R> {
        &mut self.player
    }

    pub fn favorites(&self) -> &FavoriteSet {
        &self.favorites
    }

    pub fn render_graph(&self) -> &RenderGraph {
        &self.render
    }

    pub fn render_graph_mut(&mut self) -> &mut RenderGraph {
        &mut self.render
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn is_favorite(&self, track: &Track) -> bool {
        self.favorites.contains(&track.id)
    }

    /// Rows of the playlist view: index, track and favorite flag, filtered
    /// by the current search.
    pub fn visible_tracks(&self) -> Vec<(usize, &Track, bool)> {
        self.player
            .playlist()
            .filter(&self.search)
            .into_iter()
            .map(|(index, track)| (index, track, self.is_favorite(track)))
            .collect()
    }

    pub fn handle_key(&mut self, key: Key) {
        self.dispatch(key.command());
    }

    /// Applies one user command. Runs inside the gesture, so the audio graph
    /// is initialised here on first use.
    pub fn dispatch(&mut self, command: Command) {
        if let Err(err) = self.player.engine_mut().ensure_ready() {
            tracing::warn!(%err, "visualisation unavailable");
        }

        match command {
            Command::TogglePlay => self.player.toggle(),
            Command::Next => {
                self.player.advance(Direction::Forward);
            }
            Command::Previous => {
                self.player.advance(Direction::Backward);
            }
            Command::ToggleShuffle => {
                let on = self.player.toggle_shuffle();
                tracing::info!(on, "shuffle");
            }
            Command::ToggleRepeat => {
                let on = self.player.toggle_repeat();
                tracing::info!(on, "repeat");
            }
            Command::ToggleFavorite => self.toggle_favorite(),
            Command::ToggleTheme => {
                self.theme = self.theme.toggled();
                tracing::info!(theme = ?self.theme, "theme changed");
            }
            Command::Seek(fraction) => {
                self.player.seek(SeekTarget::Fraction(fraction));
            }
            Command::Volume(volume) => {
                self.player.set_volume(volume);
            }
            Command::Rate(rate) => {
                if let Err(err) = self.player.set_rate(rate) {
                    tracing::warn!(%err, "playback rate not applied");
                }
            }
            Command::Select(index) => {
                if index < self.player.playlist().len() {
                    self.player.load(index as isize);
                    self.player.play();
                }
            }
            Command::Search(query) => self.search = query,
        }
    }

    fn toggle_favorite(&mut self) {
        let Some(id) = self.player.current_track().map(|track| track.id.clone()) else {
            return;
        };
        let now = self.favorites.toggle(&id, self.store.as_mut());
        tracing::info!(%id, favorite = now, "favorite toggled");
    }

    /// Processes queued media events.
    pub fn pump(&mut self) -> Vec<MediaEvent> {
        self.player.pump()
    }

    /// Runs one analyzer tick and pushes the result to the render targets.
    pub fn frame(&mut self) -> AnalyzerFrame {
        let source = self.player.engine_mut().spectrum_source();
        let frame = self.analyzer.tick(source);
        self.render.apply_frame(&frame);
        frame
    }
}

impl<B, R> std::fmt::Debug for Session<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("player", &self.player)
            .field("favorites", &self.favorites.len())
            .field("theme", &self.theme)
            .field("search", &self.search)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{
        audio::VirtualBackend, favorites::MemoryStore, player::PlayerStatus, playlist::NewTrack,
    };

    fn session() -> Session<VirtualBackend, StdRng> {
        let config = AppConfig::default();
        let mut player = Player::with_rng(
            VirtualBackend::new(48_000).with_default_duration(30.0),
            &config,
            StdRng::seed_from_u64(2),
        );
        player.append(NewTrack::new("That Go!", "Young Thug", "that_go.mp3"));
        player.append(NewTrack::new("712pm", "Future", "712pm.mp3"));
        player.append(NewTrack::new("one of wun", "Gunna", "one_of_wun.mp3"));
        Session::new(player, Box::new(MemoryStore::new()), &config)
    }

    #[test]
    fn parses_cli_commands() {
        assert_eq!("toggle".parse::<Command>().unwrap(), Command::TogglePlay);
        assert_eq!("seek=0.5".parse::<Command>().unwrap(), Command::Seek(0.5));
        assert_eq!("select=2".parse::<Command>().unwrap(), Command::Select(2));
        assert_eq!(
            "search=go".parse::<Command>().unwrap(),
            Command::Search("go".to_string())
        );
        assert!("seek".parse::<Command>().is_err());
        assert!("select=-1".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn keyboard_shortcuts_map_to_transport() {
        let mut session = session();

        session.handle_key(Key::Space);
        session.pump();
        assert_eq!(session.player().status(), PlayerStatus::Playing);

        session.handle_key(Key::ArrowRight);
        assert_eq!(session.player().state().current_index, Some(1));
        session.handle_key(Key::ArrowLeft);
        session.handle_key(Key::ArrowLeft);
        assert_eq!(session.player().state().current_index, Some(2));
    }

    #[test]
    fn first_gesture_initialises_analysis() {
        let mut session = session();
        assert!(session.frame().is_cleared());

        session.dispatch(Command::ToggleTheme);
        assert!(session.player().engine().is_ready());
        assert_eq!(session.theme(), Theme::Neon);
    }

    #[test]
    fn search_filters_view_but_not_playback() {
        let mut session = session();
        session.dispatch(Command::Search("go".to_string()));

        let rows = session.visible_tracks();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.title, "That Go!");

        session.dispatch(Command::Next);
        assert_eq!(session.player().state().current_index, Some(1));
    }

    #[test]
    fn favorites_follow_the_current_track() {
        let mut session = session();
        session.dispatch(Command::ToggleFavorite);

        let rows = session.visible_tracks();
        assert!(rows[0].2);
        assert!(!rows[1].2);

        session.dispatch(Command::ToggleFavorite);
        assert!(session.favorites().is_empty());
    }

    #[test]
    fn select_out_of_range_is_ignored() {
        let mut session = session();
        session.dispatch(Command::Select(9));
        assert_eq!(session.player().state().current_index, Some(0));
        assert!(!session.player().is_play_pending());

        session.dispatch(Command::Select(2));
        assert_eq!(session.player().state().current_index, Some(2));
        assert!(session.player().is_play_pending());
    }

    #[test]
    fn playing_audio_drives_the_glow() {
        let mut session = session();
        session.dispatch(Command::TogglePlay);
        session.pump();

        for _ in 0..30 {
            session
                .player_mut()
                .engine_mut()
                .backend_mut()
                .advance(1.0 / 60.0);
            session.pump();
            session.frame();
        }

        let frame = session.frame();
        assert_eq!(frame.spectrum.len(), 128);
        assert!(frame.smoothed_bass_average > 0.0);
        assert!(session.render_graph().last_glow().is_some());
    }

    #[test]
    fn pausing_lets_the_spectrum_fall_silent() {
        let mut session = session();
        session.dispatch(Command::TogglePlay);
        session.pump();
        let step = 1.0 / 60.0;

        for _ in 0..30 {
            session.player_mut().engine_mut().backend_mut().advance(step);
            session.pump();
            session.frame();
        }
        assert!(session.frame().spectrum.iter().any(|&m| m > 0));

        session.dispatch(Command::TogglePlay);
        assert_eq!(session.player().status(), PlayerStatus::Paused);
        for _ in 0..300 {
            session.player_mut().engine_mut().backend_mut().advance(step);
            session.pump();
            session.frame();
        }

        let frame = session.frame();
        assert_eq!(frame.spectrum.len(), 128);
        assert!(frame.spectrum.iter().all(|&m| m == 0));
        assert!(frame.smoothed_bass_average < 1e-3);
        let glow = frame.glow.unwrap();
        assert_eq!(glow.blur, 8.0);
        assert!((glow.scale - 1.0).abs() < 1e-6);
    }
}
