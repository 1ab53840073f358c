use std::{cell::RefCell, path::PathBuf, rc::Rc, time::Duration};

use clap::{Parser, Subcommand};
use music_player_core::{
    config::load_seed_playlist, import_files, AppConfig, BarChartTarget, Command,
    FavoriteSet, FileUriResolver, FrameScheduler, GlowParams, GlowTarget, JsonFileStore,
    KeyValueStore, MemoryStore, OfflineLookup, Player, Session, TextBars, VirtualBackend,
};
use tracing_subscriber::EnvFilter;

fn main() -> music_player_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config,
            playlist,
            files,
            seconds,
            fps,
            commands,
            store,
        } => run_play(PlayArgs {
            config,
            playlist,
            files,
            seconds,
            fps,
            commands,
            store,
        }),
        Commands::Favorites { config, store } => run_favorites(config, store),
    }
}

struct PlayArgs {
    config: Option<PathBuf>,
    playlist: Option<PathBuf>,
    files: Vec<PathBuf>,
    seconds: f64,
    fps: u32,
    commands: Vec<String>,
    store: Option<PathBuf>,
}

fn run_play(args: PlayArgs) -> music_player_core::Result<()> {
    let config = load_config(args.config.as_ref())?;
    tracing::info!(seconds = args.seconds, fps = args.fps, "starting headless session");

    let commands = if args.commands.is_empty() {
        vec![Command::TogglePlay]
    } else {
        args.commands
            .iter()
            .map(|raw| raw.parse::<Command>())
            .collect::<music_player_core::Result<Vec<_>>>()?
    };

    let backend = VirtualBackend::new(config.audio.sample_rate);
    let mut player = Player::new(backend, &config);
    if let Some(path) = &args.playlist {
        let seed = load_seed_playlist(path)?;
        tracing::info!(tracks = seed.len(), path = %path.display(), "seed playlist loaded");
        for track in seed {
            player.append(track);
        }
    }
    import_files(&mut player, &args.files, &OfflineLookup, &mut FileUriResolver);

    let mut session = Session::new(player, open_store(args.store), &config);
    let bars = SharedBars::new(48, 8);
    session.render_graph_mut().register_bars(bars.clone());
    session.render_graph_mut().register_glow(GlowLog);

    for command in commands {
        session.dispatch(command);
    }

    let mut scheduler = FrameScheduler::new(args.fps);
    let step = scheduler.interval();
    let total = Duration::from_secs_f64(args.seconds.max(0.0));
    let mut elapsed = Duration::ZERO;
    let mut labels = ("0:00".to_string(), "0:00".to_string());

    while elapsed < total {
        elapsed += step;
        for _ in 0..scheduler.advance(step) {
            session
                .player_mut()
                .engine_mut()
                .backend_mut()
                .advance(step.as_secs_f64());
            session.pump();
            session.frame();
        }

        if scheduler.frames() % u64::from(args.fps.max(1)) == 0 {
            if let Some(current) = session.player().engine().position().labels() {
                labels = current;
            }
            print_status(&session, &labels);
        }
    }

    if let Some(glow) = session.render_graph().last_glow() {
        println!(
            "glow: blur {:.0}px scale {:.3} shadows {:.0}px/{:.0}px",
            glow.blur, glow.scale, glow.inner_radius, glow.outer_radius
        );
    }
    println!("{}", bars.0.borrow().render());
    Ok(())
}

fn run_favorites(config: Option<PathBuf>, store: Option<PathBuf>) -> music_player_core::Result<()> {
    let config = load_config(config.as_ref())?;
    let store = open_store(store);
    let favorites = FavoriteSet::load(store.as_ref(), &config.player.favorites_key);

    if favorites.is_empty() {
        println!("no favorites");
    }
    for id in favorites.ids() {
        println!("{id}");
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> music_player_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn open_store(path: Option<PathBuf>) -> Box<dyn KeyValueStore> {
    match path.or_else(JsonFileStore::default_path) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using favorites store");
            Box::new(JsonFileStore::new(path))
        }
        None => {
            tracing::warn!("no data directory, favorites will not persist");
            Box::new(MemoryStore::new())
        }
    }
}

fn print_status(session: &Session<VirtualBackend>, labels: &(String, String)) {
    let player = session.player();
    let state = player.state();
    let (title, artist, favorite) = match player.current_track() {
        Some(track) => (
            track.title.as_str(),
            track.artist.as_str(),
            session.is_favorite(track),
        ),
        None => ("-", "-", false),
    };

    println!(
        "[{:?}] {title} - {artist}{} {} / {} vol {:.2} rate {:.2} shuffle {} repeat {} theme {:?}",
        player.status(),
        if favorite { " *" } else { "" },
        labels.0,
        labels.1,
        state.volume,
        state.rate,
        on_off(state.is_shuffle),
        on_off(state.is_repeat),
        session.theme(),
    );
    if let Some(err) = player.last_error() {
        println!("  last error: {err}");
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[derive(Clone)]
struct SharedBars(Rc<RefCell<TextBars>>);

impl SharedBars {
    fn new(columns: usize, rows: usize) -> Self {
        Self(Rc::new(RefCell::new(TextBars::new(columns, rows))))
    }
}

impl BarChartTarget for SharedBars {
    fn draw_bars(&mut self, magnitudes: &[u8]) {
        self.0.borrow_mut().draw_bars(magnitudes);
    }

    fn clear(&mut self) {
        self.0.borrow_mut().clear();
    }
}

struct GlowLog;

impl GlowTarget for GlowLog {
    fn apply_glow(&mut self, glow: &GlowParams) {
        tracing::trace!(blur = glow.blur, scale = glow.scale, "glow");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Music player with a reactive cover glow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a headless session against the virtual media backend.
    Play {
        /// JSON config file; defaults apply to anything it leaves out.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// JSON array of tracks to start with.
        #[arg(short, long)]
        playlist: Option<PathBuf>,
        /// Local audio files to import after the playlist.
        files: Vec<PathBuf>,
        /// Simulated seconds to run for.
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f64,
        /// Analyzer frames per simulated second.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Commands applied in order before the clock starts, e.g.
        /// `next`, `seek=0.5`, `search=go`. Defaults to `toggle`.
        #[arg(long = "command")]
        commands: Vec<String>,
        /// Key-value store file holding favorites.
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// List persisted favorite track ids.
    Favorites {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        store: Option<PathBuf>,
    },
}
