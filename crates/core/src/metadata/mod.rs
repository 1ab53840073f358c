//! Best-effort cover art and artist lookup.
//!
//! The transport is left to implementors of [`MetadataLookup`]; this module
//! owns the query shaping, the response format of the iTunes search API and
//! the fallback rules.

use serde::Deserialize;
use url::Url;

use crate::{config::PlayerConfig, PlayerError, Result};

const SEARCH_ENDPOINT: &str = "https://itunes.apple.com/search";
const THUMBNAIL_SIZE: &str = "100x100bb";
const FULL_SIZE: &str = "500x500bb";

/// Display metadata resolved for a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverInfo {
    pub cover: String,
    pub artist: String,
}

/// Match returned by a lookup service. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupMatch {
    pub cover: Option<String>,
    pub artist: Option<String>,
}

/// Remote metadata collaborator.
pub trait MetadataLookup {
    /// Returns the best match for `title` by `artist`, `Ok(None)` when
    /// nothing matched.
    fn lookup(&self, title: &str, artist: Option<&str>) -> Result<Option<LookupMatch>>;
}

/// Lookup that never finds anything; used when running offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLookup;

impl MetadataLookup for OfflineLookup {
    fn lookup(&self, _title: &str, _artist: Option<&str>) -> Result<Option<LookupMatch>> {
        Ok(None)
    }
}

/// Resolves cover and artist, substituting placeholders on any failure.
///
/// Never fails: lookup errors are logged at warn level and swallowed.
pub fn resolve_cover(
    lookup: &dyn MetadataLookup,
    title: &str,
    artist: Option<&str>,
    config: &PlayerConfig,
) -> CoverInfo {
    let artist = artist.map(str::trim).filter(|a| !a.is_empty());

    let found = match lookup.lookup(title, artist) {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(%err, title, "metadata lookup failed, using placeholder");
            None
        }
    };

    match found {
        Some(found) => CoverInfo {
            cover: found
                .cover
                .unwrap_or_else(|| config.placeholder_cover.clone()),
            artist: found
                .artist
                .or_else(|| artist.map(str::to_string))
                .unwrap_or_else(|| config.unknown_artist.clone()),
        },
        None => CoverInfo {
            cover: config.placeholder_cover.clone(),
            artist: artist
                .map(str::to_string)
                .unwrap_or_else(|| config.upload_artist.clone()),
        },
    }
}

/// Normalises a title for searching: runs of `_` and `-` become spaces,
/// parenthesised parts are dropped, a standalone `ft` (optionally with the
/// dot, when a word follows directly) is removed and whitespace collapses.
pub fn clean_query(title: &str) -> String {
    let spaced = collapse_separators(title);
    let without_groups = strip_groups(&spaced);
    let without_featuring = strip_featuring(&without_groups);

    without_featuring
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn collapse_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_separator = false;
    for c in text.chars() {
        if c == '_' || c == '-' {
            if !in_separator {
                out.push(' ');
            }
            in_separator = true;
        } else {
            out.push(c);
            in_separator = false;
        }
    }
    out
}

/// Removes every `(...)` pair, shortest match first. An unclosed `(` stays.
fn strip_groups(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        match rest[open..].find(')') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Drops `ft` and `ft.` where they stand at word boundaries, case
/// insensitively. `ft.` only counts as one token when a word character
/// follows the dot; otherwise just the `ft` goes.
fn strip_featuring(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let starts_word = i == 0 || !is_word(chars[i - 1]);
        let is_ft = starts_word
            && chars[i].eq_ignore_ascii_case(&'f')
            && chars.get(i + 1).is_some_and(|c| c.eq_ignore_ascii_case(&'t'));

        if is_ft {
            let after = chars.get(i + 2).copied();
            if after == Some('.') && chars.get(i + 3).copied().is_some_and(is_word) {
                i += 3;
                continue;
            }
            if !after.is_some_and(is_word) {
                i += 2;
                continue;
            }
        }

        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Builds the search request URL for a track.
pub fn search_url(title: &str, artist: Option<&str>) -> Result<Url> {
    let mut term = clean_query(title);
    if let Some(artist) = artist.map(str::trim).filter(|a| !a.is_empty()) {
        term.push(' ');
        term.push_str(artist);
    }

    Url::parse_with_params(
        SEARCH_ENDPOINT,
        &[("term", term.trim()), ("limit", "1"), ("media", "music")],
    )
    .map_err(|err| PlayerError::MetadataLookupFailed(err.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    artwork_url100: Option<String>,
    artist_name: Option<String>,
}

/// Extracts the first result of a search response, upgrading the artwork
/// thumbnail to the large rendition.
pub fn parse_search_response(body: &str) -> Result<Option<LookupMatch>> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|err| PlayerError::MetadataLookupFailed(err.to_string()))?;

    Ok(response.results.into_iter().next().map(|result| LookupMatch {
        cover: result
            .artwork_url100
            .filter(|url| !url.is_empty())
            .map(|url| url.replace(THUMBNAIL_SIZE, FULL_SIZE)),
        artist: result.artist_name.filter(|name| !name.is_empty()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<Option<LookupMatch>>);

    impl MetadataLookup for Canned {
        fn lookup(&self, _title: &str, _artist: Option<&str>) -> Result<Option<LookupMatch>> {
            match &self.0 {
                Ok(found) => Ok(found.clone()),
                Err(err) => Err(PlayerError::MetadataLookupFailed(err.to_string())),
            }
        }
    }

    #[test]
    fn cleans_separators_groups_and_featuring() {
        assert_eq!(clean_query("one_of-wun"), "one of wun");
        assert_eq!(clean_query("Song (Remix) ft Someone"), "Song Someone");
        assert_eq!(clean_query("  A   B (x"), "A B (x");
        assert_eq!(clean_query("Left (a) mid (b) right"), "Left mid right");
    }

    #[test]
    fn featuring_is_matched_at_word_boundaries() {
        assert_eq!(clean_query("Song ft.Someone"), "Song Someone");
        assert_eq!(clean_query("Song FT.Someone"), "Song Someone");
        assert_eq!(clean_query("Song [ft] x"), "Song [] x");
        assert_eq!(clean_query("Song ft. Someone"), "Song . Someone");
        assert_eq!(clean_query("Song_ft-Someone"), "Song Someone");
        assert_eq!(clean_query("Swift Left ftw"), "Swift Left ftw");
        assert_eq!(clean_query("Song (ft) Other"), "Song Other");
    }

    #[test]
    fn builds_encoded_search_url() {
        let url = search_url("That_Go!", Some("Young Thug")).unwrap();

        assert_eq!(url.host_str(), Some("itunes.apple.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("term".to_string(), "That Go! Young Thug".to_string()));
        assert_eq!(pairs[1], ("limit".to_string(), "1".to_string()));
    }

    #[test]
    fn parses_first_result_and_upgrades_artwork() {
        let body = r#"{
            "resultCount": 1,
            "results": [{
                "artistName": "Gunna",
                "artworkUrl100": "https://example.com/art/100x100bb.jpg"
            }]
        }"#;

        let found = parse_search_response(body).unwrap().unwrap();
        assert_eq!(found.artist.as_deref(), Some("Gunna"));
        assert_eq!(
            found.cover.as_deref(),
            Some("https://example.com/art/500x500bb.jpg")
        );
        assert_eq!(
            parse_search_response(r#"{"resultCount":0,"results":[]}"#).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_response_is_a_lookup_failure() {
        assert!(matches!(
            parse_search_response("<html>"),
            Err(PlayerError::MetadataLookupFailed(_))
        ));
    }

    #[test]
    fn failures_fall_back_to_placeholders() {
        let config = PlayerConfig::default();
        let failing = Canned(Err(PlayerError::msg("timeout")));

        let info = resolve_cover(&failing, "song", None, &config);
        assert_eq!(info.cover, "assets/placeholder.jpg");
        assert_eq!(info.artist, "Local Upload");

        let info = resolve_cover(&OfflineLookup, "song", Some("Future"), &config);
        assert_eq!(info.artist, "Future");
    }

    #[test]
    fn partial_matches_fill_gaps() {
        let config = PlayerConfig::default();
        let cover_only = Canned(Ok(Some(LookupMatch {
            cover: Some("big.jpg".to_string()),
            artist: None,
        })));

        let info = resolve_cover(&cover_only, "song", None, &config);
        assert_eq!(info.cover, "big.jpg");
        assert_eq!(info.artist, "Unknown Artist");
    }
}
