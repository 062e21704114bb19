//! Cooperative chunked parsing and load generations.
//!
//! Large lyric files are parsed in chunks, yielding to the runtime between
//! chunks so the frame loop keeps running. Every load is stamped with a
//! generation; a result that finishes after a newer load started (or after a
//! track change) is stale and must be dropped.

use crate::detect::resolve_format;
use crate::error::{CoreError, Result};
use crate::model::{Format, LyricLine};
use crate::parser::{line_parser_for, strip_bom, ParseOptions};
use crate::playback::TrackId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lines parsed between yields when nothing else is configured
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Async parser that yields to the scheduler every `chunk_size` lines
#[derive(Debug, Clone, Copy)]
pub struct ChunkedParser {
    chunk_size: usize,
}

impl Default for ChunkedParser {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedParser {
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Parse `text`, producing the same timeline as [`crate::parser::parse_with_options`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ParseCancelled`] if `cancel` fires; cancellation
    /// is observed at chunk boundaries.
    pub async fn parse(
        &self,
        text: &str,
        format: Format,
        options: &ParseOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<LyricLine>> {
        if cancel.is_cancelled() {
            return Err(CoreError::ParseCancelled);
        }

        let text = strip_bom(text);
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let format = resolve_format(text, format, options.extension.as_deref());
        let mut parser = line_parser_for(format, options);
        let mut chunks = 0_usize;

        for (idx, line) in text.lines().enumerate() {
            if idx > 0 && idx % self.chunk_size == 0 {
                chunks += 1;
                tokio::task::yield_now().await;
                if cancel.is_cancelled() {
                    debug!("Chunked parse cancelled after {idx} lines");
                    return Err(CoreError::ParseCancelled);
                }
            }
            parser.feed_line(line);
        }

        let lines = parser.finish();
        debug!(
            "Parsed {} lyric lines as {} in {} chunks",
            lines.len(),
            format,
            chunks + 1
        );
        Ok(lines)
    }
}

/// A claim on one lyric load
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub generation: u64,
    pub track: Option<TrackId>,
    pub cancel: CancellationToken,
}

/// Monotonic load counter; only the newest ticket may publish
#[derive(Debug, Default)]
pub struct ParseGeneration {
    current: u64,
    cancel: Option<CancellationToken>,
}

impl ParseGeneration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn current(&self) -> u64 {
        self.current
    }

    /// Start a new load, cancelling the one in flight
    pub fn begin(&mut self, track: Option<TrackId>) -> LoadTicket {
        self.invalidate();
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        LoadTicket {
            generation: self.current,
            track,
            cancel,
        }
    }

    /// Make every outstanding ticket stale
    pub fn invalidate(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.current += 1;
    }

    /// Check that `ticket` may still publish
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StaleParse`] when a newer load or a track change
    /// superseded the ticket.
    pub fn check(&self, ticket: &LoadTicket) -> Result<()> {
        if ticket.generation == self.current {
            Ok(())
        } else {
            warn!(
                "Dropping stale lyrics parse (generation {}, current {})",
                ticket.generation, self.current
            );
            Err(CoreError::StaleParse {
                generation: ticket.generation,
                current: self.current,
            })
        }
    }
}
