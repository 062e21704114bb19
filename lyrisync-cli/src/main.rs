mod error;
mod player;
mod watcher;

use crate::error::{CliError, Result};
use crate::player::PlayOptions;
use clap::{Parser, Subcommand, ValueEnum};
use lyrisync_core::{
    detect_format, parse_with_options, stringify, CoreError, Format, LyrisyncConfig, ParseOptions,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "lyrisync", version, about = "Parse timed lyrics and keep them in sync with playback")]
struct Cli {
    /// Config file to use instead of ~/.config/lyrisync/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play a lyric file against a simulated playback clock
    Play {
        file: PathBuf,
        /// Input format: auto, lrc, ass or srt
        #[arg(long, default_value = "auto")]
        format: Format,
        /// Playback speed multiplier
        #[arg(long, default_value_t = 1.0, value_parser = parse_speed)]
        speed: f64,
        /// Start position in seconds
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Stop after this many seconds instead of after the last line
        #[arg(long)]
        duration: Option<f64>,
        /// Reload the lyrics whenever the file changes
        #[arg(long)]
        watch: bool,
    },
    /// Convert a lyric file to another format
    Export {
        file: PathBuf,
        /// Input format: auto, lrc, ass or srt
        #[arg(long, default_value = "auto")]
        from: Format,
        #[arg(long, value_enum)]
        to: ExportTarget,
    },
    /// Print the format sniffed from a lyric file's content
    Detect { file: PathBuf },
}

/// Fastest accepted `--speed`
const MAX_SPEED: f64 = 100.0;

fn parse_speed(s: &str) -> std::result::Result<f64, String> {
    let speed: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if speed.is_finite() && speed > 0.0 && speed <= MAX_SPEED {
        Ok(speed)
    } else {
        Err(format!("speed must be above 0 and at most {MAX_SPEED}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportTarget {
    Lrc,
    Ass,
    Srt,
    /// The parsed timeline as JSON
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(LyrisyncConfig::config_path);

    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled(&config_path);
    init_tracing(file_logging_enabled);

    let result = load_config(&config_path).and_then(|config| run(cli.command, &config));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Load config, falling back to defaults when the template was just created
fn load_config(path: &Path) -> Result<LyrisyncConfig> {
    match LyrisyncConfig::load_or_create_at(path) {
        Ok(config) => Ok(config),
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created config template at {}; using defaults",
                path.display()
            );
            Ok(LyrisyncConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn run(command: Command, config: &LyrisyncConfig) -> Result<()> {
    match command {
        Command::Detect { file } => {
            let text = read_lyrics(&file)?;
            let format = detect_format(&text);
            debug!(
                "Extension suggests {:?}",
                file.extension()
                    .and_then(|e| e.to_str())
                    .and_then(Format::from_extension)
            );
            println!("{format}");
            Ok(())
        }
        Command::Export { file, from, to } => {
            let text = read_lyrics(&file)?;
            let lines = parse_with_options(&text, from, &parse_options(config, &file));
            info!("Exporting {} lines as {to:?}", lines.len());

            let output = match to {
                ExportTarget::Json => serde_json::to_string_pretty(&lines)? + "\n",
                ExportTarget::Lrc => stringify(&lines, Format::Lrc),
                ExportTarget::Ass => stringify(&lines, Format::Ass),
                ExportTarget::Srt => stringify(&lines, Format::Srt),
            };
            print!("{output}");
            Ok(())
        }
        Command::Play {
            file,
            format,
            speed,
            start,
            duration,
            watch,
        } => {
            let options = PlayOptions {
                parse: parse_options(config, &file),
                file,
                format,
                speed,
                start,
                duration,
                watch,
            };

            let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;

            // Set up Ctrl+C handler to trigger graceful shutdown
            let cancel_token = CancellationToken::new();
            let ctrlc_token = cancel_token.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                info!("Received Ctrl+C, shutting down gracefully...");
                ctrlc_token.cancel();
            }) {
                error!("Failed to set Ctrl+C handler: {e}");
            }

            runtime.block_on(player::play(options, config, cancel_token))
        }
    }
}

fn read_lyrics(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::ReadLyrics {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse options for `file`: its extension plus the configured ASS style roles
fn parse_options(config: &LyrisyncConfig, file: &Path) -> ParseOptions {
    let options = ParseOptions::default().with_ass_options(config.ass.to_options());
    match file.extension().and_then(|e| e.to_str()) {
        Some(ext) => options.with_extension(ext),
        None => options,
    }
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled(config_path: &Path) -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so exported lyrics on stdout stay clean
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = lyrisync_core::paths::log_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
