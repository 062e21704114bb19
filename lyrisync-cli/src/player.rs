//! Simulated playback that drives a [`SyncEngine`] from the terminal.

use crate::error::{CliError, Result};
use crate::watcher::watch_lyrics_file;
use lyrisync_core::time::format_lrc_timestamp;
use lyrisync_core::{
    ChunkedParser, CoreError, Format, FrameDriver, FrameTick, Layout, LineBox, LoadTicket, LyricLine,
    LyrisyncConfig, ParseOptions, PlaybackSample, SyncEngine, SyncEvent, TrackId, TrackInfo,
    TrackInfoCache, Viewport,
};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// How often the simulated transport reports its position at normal speed
const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Floor for the sample interval at high speeds
const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Playback continues this long past the last line before stopping
const TAIL_SECS: f64 = 5.0;

/// Geometry of the virtual lyric list used for scroll requests
const LINE_HEIGHT: f64 = 40.0;
const VIEWPORT_HEIGHT: f64 = 400.0;

/// A transport that advances with wall time at a fixed speed
#[derive(Debug)]
pub struct SimulatedPlayback {
    track: TrackId,
    origin: f64,
    speed: f64,
    started_at: Instant,
    paused_at: Option<f64>,
}

impl SimulatedPlayback {
    #[must_use]
    pub fn new(track: TrackId, start: f64, speed: f64) -> Self {
        Self {
            track,
            origin: start.max(0.0),
            speed,
            started_at: Instant::now(),
            paused_at: None,
        }
    }

    /// Current position in seconds
    #[must_use]
    pub fn position(&self) -> f64 {
        self.paused_at
            .unwrap_or_else(|| self.origin + self.started_at.elapsed().as_secs_f64() * self.speed)
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.position());
        }
    }

    #[must_use]
    pub fn sample(&self) -> PlaybackSample {
        PlaybackSample::new(
            Some(self.track.clone()),
            self.position(),
            self.paused_at.is_none(),
        )
    }
}

/// Options of the `play` command
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub file: PathBuf,
    pub format: Format,
    pub parse: ParseOptions,
    pub speed: f64,
    pub start: f64,
    pub duration: Option<f64>,
    pub watch: bool,
}

/// Raw text alongside the parsed lines, for metadata lookups
type LoadResult = (LoadTicket, Result<(String, Vec<LyricLine>)>);

/// Reads and parses the lyrics file off the main loop
struct Loader {
    file: PathBuf,
    format: Format,
    options: ParseOptions,
    parser: ChunkedParser,
    tx: mpsc::Sender<LoadResult>,
}

impl Loader {
    fn spawn(&self, ticket: LoadTicket) {
        let file = self.file.clone();
        let format = self.format;
        let options = self.options.clone();
        let parser = self.parser;
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = match tokio::fs::read_to_string(&file).await {
                Ok(text) => match parser.parse(&text, format, &options, &ticket.cancel).await {
                    Ok(lines) => Ok((text, lines)),
                    Err(e) => Err(CliError::from(e)),
                },
                Err(source) => Err(CliError::ReadLyrics { path: file, source }),
            };
            let _ = tx.send((ticket, result)).await;
        });
    }
}

/// One fixed-height box per line, stacked from the top
fn list_layout(count: usize) -> Layout {
    let mut lines = Vec::with_capacity(count);
    let mut top = 0.0;
    for _ in 0..count {
        lines.push(LineBox {
            offset_top: top,
            height: LINE_HEIGHT,
        });
        top += LINE_HEIGHT;
    }

    Layout {
        lines,
        viewport: Viewport {
            container_height: VIEWPORT_HEIGHT,
            scroll_height: top,
        },
    }
}

fn render_progress(progress: &[f64]) -> String {
    let mut out = String::new();
    for (i, p) in progress.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:.0}%", p * 100.0);
    }
    out
}

/// Sample interval for `speed`, short enough that playback advances less than
/// half the seek threshold between samples
fn sample_interval(speed: f64, seek_threshold: f64) -> Duration {
    Duration::try_from_secs_f64(seek_threshold / speed / 2.0)
        .map_or(SAMPLE_INTERVAL, |limit| limit.min(SAMPLE_INTERVAL))
        .max(MIN_SAMPLE_INTERVAL)
}

/// Feed a transport sample and run the frame driver only while playing
fn apply_sample(
    engine: &mut SyncEngine,
    sample: PlaybackSample,
    frames: &mut FrameDriver,
    frame_tx: &mpsc::Sender<FrameTick>,
) {
    engine.on_playback(sample);
    if engine.is_playing() {
        frames.start(frame_tx.clone());
    } else {
        frames.stop();
    }
}

/// Play the lyrics file until it ends or `cancel` fires
///
/// # Errors
///
/// Returns an error if the lyrics cannot be read on the first load or the
/// file watcher cannot be started.
#[allow(clippy::too_many_lines)]
pub async fn play(
    options: PlayOptions,
    config: &LyrisyncConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let mut engine = SyncEngine::new(config);
    let events = tokio::spawn(log_sync_events(engine.subscribe()));

    let track = TrackId::from(options.file.display().to_string());
    let mut playback = SimulatedPlayback::new(track, options.start, options.speed);
    engine.on_playback(playback.sample());

    let (load_tx, mut load_rx) = mpsc::channel(4);
    let loader = Loader {
        file: options.file.clone(),
        format: options.format,
        options: options.parse.clone(),
        parser: ChunkedParser::new(config.parse.chunk_size),
        tx: load_tx,
    };
    loader.spawn(engine.begin_load());

    let mut track_info = TrackInfoCache::new();
    let (reload_tx, mut reload_rx) = mpsc::channel(1);
    let _watcher = if options.watch {
        Some(watch_lyrics_file(&options.file, reload_tx.clone())?)
    } else {
        None
    };

    let frame_rate = u64::from(config.clock.frame_rate.max(1));
    let (frame_tx, mut frame_rx) = mpsc::channel(4);
    let mut frames = FrameDriver::new(config.clock.frame_rate);
    let mut sampler = tokio::time::interval(sample_interval(
        options.speed,
        config.clock.seek_threshold_secs,
    ));
    let mut end_time = options.duration.map(|d| options.start + d);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Stopping playback");
                break;
            }
            Some((ticket, result)) = load_rx.recv() => match result {
                Ok((text, lines)) => {
                    let count = lines.len();
                    let last_end = lines.last().map(|line| line.time + TAIL_SECS);
                    match engine.finish_load(&ticket, lines) {
                        Ok(()) => {
                            let name = track_info
                                .get_or_insert_with(&options.file, |path| {
                                    TrackInfo::from_lyrics(&text, path)
                                })
                                .display_name();
                            info!("Now playing: {name}");
                            engine.set_layout(list_layout(count));
                            if options.duration.is_none() {
                                end_time = Some(last_end.unwrap_or(options.start));
                            }
                        }
                        Err(e) => warn!("{e}"),
                    }
                }
                Err(CliError::Core(CoreError::ParseCancelled)) => {
                    debug!("Superseded lyrics load cancelled");
                }
                Err(e) if engine.timeline().is_none() => {
                    frames.stop();
                    return Err(e);
                }
                Err(e) => warn!("Keeping previous lyrics: {e}"),
            },
            Some(()) = reload_rx.recv() => {
                info!("Lyrics file changed, reloading");
                track_info.invalidate(&options.file);
                loader.spawn(engine.begin_load());
            }
            _ = sampler.tick() => {
                if end_time.is_some_and(|end| playback.position() >= end) {
                    playback.pause();
                    engine.on_playback(playback.sample());
                    frames.stop();
                    info!("Playback finished at {:.2}s", playback.position());
                    break;
                }

                apply_sample(&mut engine, playback.sample(), &mut frames, &frame_tx);
            }
            Some(tick) = frame_rx.recv() => {
                let visual = engine.tick_frame(tick.delta);
                let progress = engine.active_progress();
                if !progress.is_empty() {
                    trace!("Karaoke at {visual:.3}s: {}", render_progress(&progress));
                }
                if tick.frame % frame_rate == 0 {
                    debug!(
                        "Frame {}: visual {visual:.3}s, scroll offset {:.1}",
                        tick.frame,
                        engine.scroll_offset()
                    );
                }
            }
        }
    }

    frames.stop();
    drop(reload_tx);
    // Closing the engine closes the event channel and ends the logger
    drop(engine);
    let _ = events.await;
    Ok(())
}

/// Log sync events as they happen
async fn log_sync_events(mut rx: broadcast::Receiver<SyncEvent>) {
    let mut lines: Option<Arc<[LyricLine]>> = None;

    loop {
        match rx.recv().await {
            Ok(event) => match event {
                SyncEvent::TrackChanged { track, position } => {
                    info!("Track changed: {track} (at {position:.2}s)");
                }
                SyncEvent::PlaybackPaused { position } => {
                    info!("Playback paused at {position:.2}s");
                }
                SyncEvent::PlaybackResumed { position } => {
                    info!("Playback resumed at {position:.2}s");
                }
                SyncEvent::PlaybackStopped => {
                    info!("Playback stopped");
                }
                SyncEvent::SeekOccurred { position } => {
                    info!("Seek to {position:.2}s");
                }
                SyncEvent::PositionSync { .. } => {
                    // Fires every sample
                }
                SyncEvent::LyricsLoaded { lines: loaded } => {
                    info!("Lyrics loaded: {} lines", loaded.len());
                    lines = Some(loaded);
                }
                SyncEvent::LyricsNotFound => {
                    info!("No lyrics found for current track");
                    lines = None;
                }
                SyncEvent::ActiveLineChanged {
                    current: Some(index),
                    ..
                } => {
                    if let Some(line) = lines.as_deref().and_then(|l| l.get(index)) {
                        info!("[{}] {}", format_lrc_timestamp(line.time), line.primary());
                        if let Some(translation) = line.translation() {
                            info!("           {translation}");
                        }
                    }
                }
                SyncEvent::ActiveLineChanged { current: None, .. } => {
                    debug!("No active line");
                }
                SyncEvent::ScrollRequested { index, command } => {
                    debug!("Scroll to line {index}: offset {:.1}", command.target());
                }
            },
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Sync event channel closed");
                break;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                error!("Missed {n} sync events");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_playback_advances() {
        let mut playback = SimulatedPlayback::new(TrackId::from("t"), 10.0, 2.0);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((playback.position() - 16.0).abs() < 1e-6);
        assert!(playback.sample().is_playing);

        playback.pause();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((playback.position() - 16.0).abs() < 1e-6);
        assert!(!playback.sample().is_playing);
    }

    impl SimulatedPlayback {
        fn resume(&mut self) {
            if let Some(position) = self.paused_at.take() {
                self.origin = position;
                self.started_at = Instant::now();
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_follow_pause_and_resume() {
        let mut engine = SyncEngine::default();
        let mut playback = SimulatedPlayback::new(TrackId::from("t"), 0.0, 1.0);
        let mut frames = FrameDriver::new(60);
        let (frame_tx, mut frame_rx) = mpsc::channel(4);

        apply_sample(&mut engine, playback.sample(), &mut frames, &frame_tx);
        assert!(frames.is_running());
        assert!(frame_rx.recv().await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        playback.pause();
        apply_sample(&mut engine, playback.sample(), &mut frames, &frame_tx);
        assert!(!frames.is_running());
        assert!(!engine.is_playing());

        tokio::time::advance(Duration::from_secs(1)).await;
        playback.resume();
        apply_sample(&mut engine, playback.sample(), &mut frames, &frame_tx);
        assert!(frames.is_running());
        assert!((playback.position() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_interval_keeps_fast_playback_below_seek_threshold() {
        assert_eq!(sample_interval(1.0, 1.5), SAMPLE_INTERVAL);
        assert_eq!(sample_interval(0.5, 1.5), SAMPLE_INTERVAL);

        for speed in [6.0, 8.0, 50.0, 100.0] {
            let interval = sample_interval(speed, 1.5);
            assert!(interval < SAMPLE_INTERVAL);
            assert!(interval.as_secs_f64() * speed < 1.5);
        }
        assert_eq!(sample_interval(1e9, 1.5), MIN_SAMPLE_INTERVAL);
    }

    #[test]
    fn test_list_layout() {
        let layout = list_layout(3);
        assert_eq!(layout.lines.len(), 3);
        assert!((layout.lines[2].offset_top - 80.0).abs() < 1e-9);
        assert!((layout.viewport.scroll_height - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_progress() {
        assert_eq!(render_progress(&[1.0, 0.5, 0.0]), "100% 50% 0%");
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_runs_to_end() {
        let dir = std::env::temp_dir().join(format!("lyrisync-play-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("song.lrc");
        std::fs::write(&file, "[00:00.50]one\n[00:01.00]two\n").unwrap();

        let options = PlayOptions {
            file,
            format: Format::Auto,
            parse: ParseOptions::default(),
            speed: 1.0,
            start: 0.0,
            duration: Some(2.0),
            watch: false,
        };
        let result = play(options, &LyrisyncConfig::default(), CancellationToken::new()).await;
        assert!(result.is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_play_missing_file_fails() {
        let options = PlayOptions {
            file: PathBuf::from("/nonexistent/lyrisync/missing.lrc"),
            format: Format::Auto,
            parse: ParseOptions::default(),
            speed: 1.0,
            start: 0.0,
            duration: None,
            watch: false,
        };
        let result = play(options, &LyrisyncConfig::default(), CancellationToken::new()).await;
        assert!(matches!(result, Err(CliError::ReadLyrics { .. })));
    }
}
