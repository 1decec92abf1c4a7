//! Logging setup on tracing + tracing-subscriber
//!
//! Console output goes to stderr so that commands printing JSON summaries on
//! stdout stay pipeable. An optional rolling file layer is added when
//! `[logging] file` is set. `RUST_LOG` still overrides per-module levels.

use std::fs;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Keeps the non-blocking file writer alive; drop it last to flush.
pub struct LogGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber for long-running commands.
pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let level = effective_level(settings, verbose, quiet);
    let filter = build_env_filter(&settings.level, level)?;
    let console = console_layer(settings.json_format);

    let (file, file_guard) = match settings.file.as_deref() {
        Some(path) => {
            let (layer, guard) = file_layer(
                path,
                settings.max_file_size_mb,
                settings.max_files,
                settings.json_format,
            )?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(
        level = %level,
        file = ?settings.file,
        json = settings.json_format,
        "Logging initialized"
    );

    Ok(LogGuards {
        _file_guard: file_guard,
    })
}

/// Console-only logging for short commands (`config`, `persona list`, ...).
pub fn init_simple(level: Level) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// `--quiet` beats `-v`; otherwise each `-v` steps one level down.
fn effective_level(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => parse_level(&settings.level),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub(crate) fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_env_filter(default_level: &str, cli_level: Level) -> Result<EnvFilter> {
    let own_crate = directive(&format!("persona_engine={}", cli_level))
        .or_else(|_| directive(&format!("persona_engine={}", default_level)))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.to_string().to_lowercase()))
        .add_directive(own_crate)
        // HTTP stacks are chatty at debug
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("reqwest=warn")?)
        .add_directive(directive("h2=warn")?)
        .add_directive(directive("tower_http=info")?);

    Ok(filter)
}

fn directive(raw: &str) -> Result<Directive> {
    raw.parse().map_err(|e| {
        Error::config_field_invalid(
            "logging.level",
            format!("Invalid log directive '{}': {}", raw, e),
        )
    })
}

fn console_layer<S>(json: bool) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if json {
        Box::new(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_events(FmtSpan::CLOSE),
        )
    } else {
        Box::new(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(true)
                .compact(),
        )
    }
}

fn file_layer<S>(
    log_file: &str,
    max_size_mb: u64,
    max_files: u32,
    json: bool,
) -> Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let path = Path::new(log_file);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).map_err(|e| Error::IoWrite {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let prefix = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("persona-engine");

    // tracing-appender only rotates on time; small size limits rotate hourly
    let rotation = if max_size_mb > 0 && max_size_mb < 10 {
        Rotation::HOURLY
    } else {
        Rotation::DAILY
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(max_files.max(1) as usize)
        .build(directory)
        .map_err(|e| Error::Internal(format!("Failed to create log file appender: {}", e)))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer: BoxedLayer<S> = if json {
        Box::new(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false),
        )
    } else {
        Box::new(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
    };

    Ok((layer, guard))
}
