use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_LEN: usize = 7;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque identifier of a track. Issued once per playlist and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = (0..ID_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One playable item with its display metadata. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub source: String,
    pub cover: String,
}

impl Track {
    /// Case-insensitive substring match over title and artist. `needle` must
    /// already be lowercase.
    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.artist.to_lowercase().contains(needle)
    }
}

/// Description of a track that has not been given an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub source: String,
    #[serde(default)]
    pub cover: Option<String>,
}

impl NewTrack {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            source: source.into(),
            cover: None,
        }
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }
}

/// Ordered list of tracks; insertion order is navigation order.
#[derive(Debug, Default, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
    issued: HashSet<TrackId>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn position(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| &track.id == id)
    }

    /// Appends a track, assigning it a fresh id drawn from `rng`. Missing
    /// covers are replaced by `placeholder_cover`.
    pub fn append<R: Rng + ?Sized>(
        &mut self,
        track: NewTrack,
        placeholder_cover: &str,
        rng: &mut R,
    ) -> &Track {
        let id = loop {
            let candidate = TrackId::random(rng);
            if self.issued.insert(candidate.clone()) {
                break candidate;
            }
        };

        let index = self.tracks.len();
        self.tracks.push(Track {
            id,
            title: track.title,
            artist: track.artist,
            source: track.source,
            cover: track
                .cover
                .unwrap_or_else(|| placeholder_cover.to_string()),
        });
        &self.tracks[index]
    }

    /// Removes the track at `index`. Its id stays reserved.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        (index < self.tracks.len()).then(|| self.tracks.remove(index))
    }

    /// Tracks whose title or artist contains `query`, ignoring case, paired
    /// with their playlist index. Playback order is not affected.
    pub fn filter<'a>(&'a self, query: &str) -> Vec<(usize, &'a Track)> {
        let needle = query.trim().to_lowercase();
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| needle.is_empty() || track.matches(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn demo_playlist() -> Playlist {
        let mut rng = StdRng::seed_from_u64(7);
        let mut playlist = Playlist::new();
        playlist.append(
            NewTrack::new("That Go!", "Young Thug", "songs/that_go.mp3"),
            "placeholder.jpg",
            &mut rng,
        );
        playlist.append(
            NewTrack::new("712pm", "Future", "songs/712pm.mp3"),
            "placeholder.jpg",
            &mut rng,
        );
        playlist
    }

    #[test]
    fn search_matches_title_case_insensitively() {
        let playlist = demo_playlist();

        let hits = playlist.filter("go");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[0].1.title, "That Go!");
    }

    #[test]
    fn search_matches_artist_and_empty_query_returns_all() {
        let playlist = demo_playlist();

        assert_eq!(playlist.filter("FUTURE")[0].0, 1);
        assert_eq!(playlist.filter("").len(), 2);
        assert!(playlist.filter("gunna").is_empty());
    }

    #[test]
    fn ids_are_base36_and_unique() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut playlist = Playlist::new();
        for i in 0..200 {
            playlist.append(NewTrack::new(format!("t{i}"), "a", "s"), "p", &mut rng);
        }

        let ids: HashSet<_> = playlist.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 200);
        assert!(playlist.iter().all(|t| t.id.as_str().len() == ID_LEN
            && t.id.as_str().bytes().all(|b| ID_ALPHABET.contains(&b))));
    }

    #[test]
    fn removed_ids_are_not_reissued() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut playlist = Playlist::new();
        let first = playlist
            .append(NewTrack::new("a", "b", "c"), "p", &mut rng)
            .id
            .clone();
        playlist.remove(0).unwrap();

        let mut replay = StdRng::seed_from_u64(3);
        let second = playlist
            .append(NewTrack::new("a", "b", "c"), "p", &mut replay)
            .id
            .clone();
        assert_ne!(first, second);
    }

    #[test]
    fn missing_cover_uses_placeholder() {
        let mut playlist = demo_playlist();
        assert_eq!(playlist.get(0).unwrap().cover, "placeholder.jpg");
        assert!(playlist.remove(5).is_none());
    }
}
