//! Turning local media files into playlist entries.

use std::path::{Path, PathBuf};

use rand::Rng;
use url::Url;

use crate::{
    audio::MediaBackend,
    metadata::{resolve_cover, MetadataLookup},
    player::Player,
    playlist::NewTrack,
    PlayerError, Result,
};

/// Resolves a local file to a URI the media backend can load.
pub trait UriResolver {
    fn resolve(&mut self, path: &Path) -> Result<String>;
}

/// Resolves paths to absolute `file://` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileUriResolver;

impl UriResolver for FileUriResolver {
    fn resolve(&mut self, path: &Path) -> Result<String> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Url::from_file_path(&absolute)
            .map(String::from)
            .map_err(|()| PlayerError::msg(format!("cannot build a URL for {}", absolute.display())))
    }
}

/// Display title for a file name: drops the last extension and turns runs
/// of `_` and `-` into single spaces.
pub fn derive_title(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };

    let mut title = String::with_capacity(stem.len());
    let mut in_separator = false;
    for c in stem.chars() {
        if c == '_' || c == '-' {
            if !in_separator {
                title.push(' ');
            }
            in_separator = true;
        } else {
            title.push(c);
            in_separator = false;
        }
    }
    title.trim().to_string()
}

/// Appends every file in `files` and loads the last one without playing it.
/// Files that cannot be resolved are skipped with a warning. Returns the
/// indices of the appended tracks.
pub fn import_files<B: MediaBackend, R: Rng>(
    player: &mut Player<B, R>,
    files: &[PathBuf],
    lookup: &dyn MetadataLookup,
    resolver: &mut dyn UriResolver,
) -> Vec<usize> {
    let mut appended = Vec::with_capacity(files.len());

    for path in files {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = derive_title(&file_name);

        let source = match resolver.resolve(path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "skipping file");
                continue;
            }
        };

        let info = resolve_cover(lookup, &title, None, player.config());
        tracing::info!(file = %file_name, %title, "importing");
        let track = NewTrack::new(title, info.artist, source).with_cover(info.cover);
        appended.push(player.append(track));
    }

    if let Some(&last) = appended.last() {
        player.load(last as isize);
    }
    appended
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        audio::VirtualBackend,
        config::AppConfig,
        metadata::{LookupMatch, OfflineLookup},
        player::PlayerStatus,
    };

    struct Fixed;

    impl UriResolver for Fixed {
        fn resolve(&mut self, path: &Path) -> Result<String> {
            if path.to_string_lossy().contains("unreadable") {
                return Err(PlayerError::msg("unreadable"));
            }
            Ok(format!("blob:{}", path.display()))
        }
    }

    struct Found;

    impl MetadataLookup for Found {
        fn lookup(&self, _title: &str, _artist: Option<&str>) -> Result<Option<LookupMatch>> {
            Ok(Some(LookupMatch {
                cover: Some("cover.jpg".to_string()),
                artist: Some("Found Artist".to_string()),
            }))
        }
    }

    fn player() -> Player<VirtualBackend, StdRng> {
        Player::with_rng(
            VirtualBackend::new(1_000),
            &AppConfig::default(),
            StdRng::seed_from_u64(11),
        )
    }

    #[test]
    fn titles_drop_extension_and_separators() {
        assert_eq!(derive_title("one_of_wun.mp3"), "one of wun");
        assert_eq!(derive_title("My--Song__v2.final.flac"), "My Song v2.final");
        assert_eq!(derive_title("_intro_.ogg"), "intro");
        assert_eq!(derive_title("no_extension"), "no extension");
        assert_eq!(derive_title(".hidden"), ".hidden");
    }

    #[test]
    fn imports_append_and_load_the_last_file() {
        let mut player = player();
        let files = vec![
            PathBuf::from("/music/that_go.mp3"),
            PathBuf::from("/music/unreadable.mp3"),
            PathBuf::from("/music/712-pm.mp3"),
        ];

        let appended = import_files(&mut player, &files, &Found, &mut Fixed);

        assert_eq!(appended, vec![0, 1]);
        assert_eq!(player.state().current_index, Some(1));
        assert_eq!(player.status(), PlayerStatus::Paused);
        let track = player.current_track().unwrap();
        assert_eq!(track.title, "712 pm");
        assert_eq!(track.artist, "Found Artist");
        assert_eq!(track.cover, "cover.jpg");
        assert_eq!(track.source, "blob:/music/712-pm.mp3");
    }

    #[test]
    fn offline_imports_use_upload_defaults() {
        let mut player = player();
        import_files(
            &mut player,
            &[PathBuf::from("/music/a.wav")],
            &OfflineLookup,
            &mut Fixed,
        );

        let track = player.current_track().unwrap();
        assert_eq!(track.artist, "Local Upload");
        assert_eq!(track.cover, "assets/placeholder.jpg");
    }

    #[cfg(unix)]
    #[test]
    fn file_resolver_builds_file_urls() {
        let uri = FileUriResolver.resolve(Path::new("/tmp/my song.mp3")).unwrap();
        assert_eq!(uri, "file:///tmp/my%20song.mp3");
    }
}
