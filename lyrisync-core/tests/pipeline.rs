use lyrisync_core::{
    detect_format, parse, resolve_active_index, stringify, ChunkedParser, Format, Layout, LineBox,
    LyrisyncConfig, ParseOptions, PlaybackSample, SyncEngine, SyncEvent, TrackId, Viewport,
};
use tokio_util::sync::CancellationToken;

const BILINGUAL_LRC: &str = "[ti:Song]\n[00:10.00][00:15.00]Hello\n[00:10.00]你好\n[00:20.00]World\n";

const KARAOKE_ASS: &str = "[Script Info]\nTitle: Test\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:12.00,0:00:14.00,Default,,0,0,0,,{\\k50}hello{\\k100}world\n";

fn layout(count: usize) -> Layout {
    let lines: Vec<LineBox> = (0..count)
        .map(|i| LineBox {
            offset_top: 50.0 * f64::from(u32::try_from(i).unwrap()),
            height: 50.0,
        })
        .collect();
    Layout {
        lines,
        viewport: Viewport {
            container_height: 200.0,
            scroll_height: 50.0 * f64::from(u32::try_from(count).unwrap()),
        },
    }
}

fn playing(time: f64) -> PlaybackSample {
    PlaybackSample::new(Some(TrackId::from("song")), time, true)
}

#[test]
fn test_bilingual_lrc_merges_into_one_line() {
    let lines = parse(BILINGUAL_LRC, Format::Auto);
    assert_eq!(lines.len(), 2);

    let first = &lines[0];
    assert!((first.time - 10.0).abs() < 1e-9);
    assert_eq!(first.texts, vec!["Hello".to_string(), "你好".to_string()]);
    let karaoke = first.karaoke.as_ref().unwrap();
    assert_eq!(karaoke.timings.len(), 1);
    assert!((karaoke.timings[0].time - 15.0).abs() < 1e-9);
    assert_eq!(karaoke.timings[0].position, 1);

    assert_eq!(resolve_active_index(&lines, 9.7), None);
    assert_eq!(resolve_active_index(&lines, 12.0), Some(0));
    assert_eq!(resolve_active_index(&lines, 25.0), Some(1));
}

#[test]
fn test_ass_karaoke_words_decode() {
    assert_eq!(detect_format(KARAOKE_ASS), Format::Ass);
    let lines = parse(KARAOKE_ASS, Format::Auto);
    assert_eq!(lines.len(), 1);

    let words = &lines[0].words;
    assert_eq!(words.len(), 2);
    assert_eq!(words[0].text, "hello");
    assert!((words[0].start - 12.0).abs() < 1e-9);
    assert!((words[0].end - 12.5).abs() < 1e-9);
    assert!((words[1].start - 12.5).abs() < 1e-9);
    assert!((words[1].end - 13.5).abs() < 1e-9);
}

#[test]
fn test_export_then_reparse_keeps_timeline() {
    let lines = parse(BILINGUAL_LRC, Format::Lrc);
    for format in [Format::Lrc, Format::Ass] {
        let reparsed = parse(&stringify(&lines, format), format);
        assert_eq!(reparsed.len(), lines.len(), "{format}");
        assert_eq!(reparsed[0].texts, lines[0].texts, "{format}");
        assert!((reparsed[1].time - 20.0).abs() < 1e-9, "{format}");
    }
}

#[tokio::test]
async fn test_chunked_parse_feeds_engine() {
    let config = LyrisyncConfig::default();
    let mut engine = SyncEngine::new(&config);
    let mut rx = engine.subscribe();

    engine.on_playback(playing(12.0));
    let ticket = engine.begin_load();
    let lines = ChunkedParser::new(1)
        .parse(
            BILINGUAL_LRC,
            Format::Auto,
            &ParseOptions::default(),
            &ticket.cancel,
        )
        .await
        .unwrap();
    engine.finish_load(&ticket, lines).unwrap();
    engine.set_layout(layout(2));

    assert_eq!(engine.active_index(), Some(0));
    assert_eq!(engine.active_line().unwrap().primary(), "Hello");

    // Past the single segment boundary the whole line is filled
    engine.on_playback(playing(16.0));
    engine.tick_frame(0.0);
    assert_eq!(engine.active_progress(), vec![1.0]);

    engine.on_playback(playing(19.9));
    assert_eq!(engine.active_index(), Some(1));

    let mut saw_loaded = false;
    let mut changes = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            SyncEvent::LyricsLoaded { lines } => {
                saw_loaded = true;
                assert_eq!(lines.len(), 2);
            }
            SyncEvent::ActiveLineChanged { current, .. } => changes.push(current),
            _ => {}
        }
    }
    assert!(saw_loaded);
    assert_eq!(changes, vec![Some(0), Some(1)]);
}

#[tokio::test]
async fn test_track_change_rejects_stale_load() {
    let mut engine = SyncEngine::default();
    engine.on_playback(playing(1.0));
    let ticket = engine.begin_load();

    engine.on_playback(PlaybackSample::new(Some(TrackId::from("other")), 0.0, true));
    assert!(ticket.cancel.is_cancelled());

    let lines = parse(BILINGUAL_LRC, Format::Lrc);
    assert!(engine.finish_load(&ticket, lines).is_err());
    assert!(engine.timeline().is_none());
}

#[test]
fn test_visual_clock_follows_seek() {
    let mut engine = SyncEngine::default();
    engine.on_playback(playing(10.0));
    engine.tick_frame(1.0 / 60.0);

    engine.on_playback(playing(40.0));
    let visual = engine.tick_frame(1.0 / 60.0);
    assert!((visual - 40.0).abs() < 1e-9);
}
