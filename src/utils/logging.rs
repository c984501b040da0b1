use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::utils::timing::TIMING_TARGET;

const LOGS_DIR: &str = "logs";

/// Keeps the non-blocking log writers flushing until `main` returns.
pub struct LoggingGuards {
    _writers: Vec<WorkerGuard>,
}

pub fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Application events at the configured level. Analysis timing goes to its own
/// files, and the HTTP stack only reports warnings.
fn app_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN)
}

fn timing_filter() -> Targets {
    Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO)
}

fn daily_file(
    dir: &Path,
    name: &str,
    guards: &mut Vec<WorkerGuard>,
) -> tracing_appender::non_blocking::NonBlocking {
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
    guards.push(guard);
    writer
}

/// Stdout plus daily-rolled text and JSON-lines files under `logs/`:
/// `chroma.*` for application events, `timing.*` for Gemini call timings.
pub fn init_logging(log_level: &str) -> LoggingGuards {
    let logs_dir = Path::new(LOGS_DIR);
    if let Err(err) = fs::create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory: {err}");
    }

    let mut guards = Vec::with_capacity(4);
    let app_text = daily_file(logs_dir, "chroma.log", &mut guards);
    let app_json = daily_file(logs_dir, "chroma.jsonl", &mut guards);
    let timing_text = daily_file(logs_dir, "timing.log", &mut guards);
    let timing_json = daily_file(logs_dir, "timing.jsonl", &mut guards);

    let app = app_filter(parse_log_level(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(app.clone()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(app_text)
                .with_ansi(false)
                .with_filter(app.clone()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(app_json)
                .with_filter(app),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(timing_text)
                .with_ansi(false)
                .with_filter(timing_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(timing_json)
                .with_filter(timing_filter()),
        )
        .init();

    LoggingGuards { _writers: guards }
}
