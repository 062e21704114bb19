pub mod ass;
pub mod cache;
pub mod clock;
pub mod config;
pub mod detect;
pub mod error;
pub mod export;
pub mod frame;
pub mod lrc;
pub mod model;
pub mod parser;
pub mod paths;
pub mod playback;
pub mod resolver;
pub mod schedule;
pub mod scroll;
pub mod srt;
pub mod sync;
pub mod time;

pub use ass::{AssOptions, StyleRole};
pub use cache::{TrackInfo, TrackInfoCache};
pub use clock::{line_progress, lrc_segment_progress, word_progress, VisualClock};
pub use config::{
    AssStyleConfig, ClockConfig, LoggingConfig, LyrisyncConfig, ParseConfig, ScrollConfig,
    SyncConfig,
};
pub use detect::{detect_format, resolve_format};
pub use error::{CoreError, Result};
pub use export::stringify;
pub use frame::{FrameDriver, FrameTick};
pub use lrc::{LrcFile, LrcMetadata};
pub use model::{Format, KaraokeTiming, KaraokeWord, LrcKaraoke, LyricLine};
pub use parser::{parse, parse_with_options, LineParser, ParseOptions};
pub use paths::{config_dir, config_path, log_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME};
pub use playback::{PlaybackSample, TrackId};
pub use resolver::{resolve_active_index, resolve_with_lookahead, LOOKAHEAD_SECS};
pub use schedule::{ChunkedParser, LoadTicket, ParseGeneration, DEFAULT_CHUNK_SIZE};
pub use scroll::{LineBox, ScrollAnimation, ScrollCommand, ScrollSynchronizer, Viewport};
pub use sync::{Layout, SyncEngine, SyncEvent};
pub use time::SecondsExt;
