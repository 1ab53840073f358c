//! Core library for the Music Player application.
//!
//! The crate holds everything below the UI: the playback state machine and
//! its track selection policy, the adapter over the platform media element,
//! the frequency analyzer that drives the cover glow, favorites persistence
//! and cover art lookup. Each module owns one subsystem; [`session`] ties
//! them together behind the commands a UI sends.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod favorites;
pub mod import;
pub mod mapping;
pub mod metadata;
pub mod player;
pub mod playlist;
pub mod render;
pub mod selector;
pub mod session;
pub mod timeline;
pub mod visualizer;

pub use analysis::{AnalysisGraph, SpectrumSource};
pub use audio::{AudioEngine, MediaBackend, MediaEvent, PlayTicket, SeekTarget, VirtualBackend};
pub use config::{AnalyzerConfig, AppConfig, AudioConfig, PlayerConfig};
pub use error::{PlayerError, Result};
pub use favorites::{FavoriteSet, JsonFileStore, KeyValueStore, MemoryStore};
pub use import::{import_files, FileUriResolver, UriResolver};
pub use mapping::{GlowMapping, GlowParams};
pub use metadata::{resolve_cover, CoverInfo, MetadataLookup, OfflineLookup};
pub use player::{PlaybackState, PlayRequest, Player, PlayerStatus};
pub use playlist::{NewTrack, Playlist, Track, TrackId};
pub use render::{BarChartTarget, GlowTarget, RenderGraph, TextBars};
pub use selector::{select_next, Direction};
pub use session::{Command, Key, Session, Theme};
pub use timeline::{format_time, FrameScheduler, PlaybackPosition};
pub use visualizer::{AnalyzerFrame, FrequencyAnalyzer};
