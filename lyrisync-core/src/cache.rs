//! Memoized per-file track info.
//!
//! Deriving a title and artist means reading lyric metadata, so results are
//! kept per path until the track list changes.

use crate::detect::resolve_format;
use crate::lrc::LrcFile;
use crate::model::Format;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Display metadata for one lyric file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl TrackInfo {
    /// Derive info from lyric text, falling back to an `Artist - Title` file stem.
    ///
    /// LRC `[ti:]`/`[ar:]` tags take precedence over the file name.
    #[must_use]
    pub fn from_lyrics(text: &str, path: &Path) -> Self {
        let extension = path.extension().and_then(|e| e.to_str());
        let mut info = if resolve_format(text, Format::Auto, extension) == Format::Lrc {
            let metadata = LrcFile::parse(text).metadata;
            Self {
                title: metadata.title.filter(|t| !t.is_empty()),
                artist: metadata.artist.filter(|a| !a.is_empty()),
            }
        } else {
            Self::default()
        };

        let stem = Self::from_file_stem(path);
        info.title = info.title.or(stem.title);
        info.artist = info.artist.or(stem.artist);
        info
    }

    /// Parse `Artist - Title` from the file stem; a stem without the separator is the title
    #[must_use]
    pub fn from_file_stem(path: &Path) -> Self {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return Self::default();
        };

        match stem.split_once(" - ") {
            Some((artist, title)) => Self {
                title: non_empty(title),
                artist: non_empty(artist),
            },
            None => Self {
                title: non_empty(stem),
                artist: None,
            },
        }
    }

    /// `Artist - Title`, or whichever part is known
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(title)) => title.clone(),
            (Some(artist), None) => artist.clone(),
            (None, None) => "Unknown track".to_string(),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Memoization table for [`TrackInfo`], keyed by lyric file path
#[derive(Debug, Default)]
pub struct TrackInfoCache {
    entries: HashMap<PathBuf, TrackInfo>,
    track_list: Vec<PathBuf>,
}

impl TrackInfoCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&TrackInfo> {
        self.entries.get(path)
    }

    /// Cached info for `path`, computing it with `load` on a miss
    pub fn get_or_insert_with(
        &mut self,
        path: &Path,
        load: impl FnOnce(&Path) -> TrackInfo,
    ) -> &TrackInfo {
        self.entries
            .entry(path.to_path_buf())
            .or_insert_with(|| load(path))
    }

    /// Adopt a new track list, dropping every entry if it differs from the
    /// current one. Returns whether the cache was invalidated.
    pub fn sync_track_list(&mut self, paths: &[PathBuf]) -> bool {
        if self.track_list == paths {
            return false;
        }

        debug!(
            "Track list changed ({} -> {} tracks), clearing {} cached entries",
            self.track_list.len(),
            paths.len(),
            self.entries.len()
        );
        self.track_list = paths.to_vec();
        self.entries.clear();
        true
    }

    /// Drop the entry for one path
    pub fn invalidate(&mut self, path: &Path) -> Option<TrackInfo> {
        self.entries.remove(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
