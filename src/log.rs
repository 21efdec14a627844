//! The `log` module provides initialisation and configuration of the application's logging system.
//!
//! Messages can be filtered by level (error, warn, info, debug, trace) and are colourised when
//! written to a terminal. The level can be chosen with the `BERN_LOG_LEVEL` environment variable.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// A flag indicating whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The default log level for the program.
///
/// Used as a fallback if the user hasn't specified something else with the `BERN_LOG_LEVEL`
/// environment variable or the settings.toml file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The file name for the log file containing messages about the ordinary operation of the model
const LOG_INFO_FILE_NAME: &str = "bern_info.log";

/// The file name for the log file containing warnings and error messages
const LOG_ERROR_FILE_NAME: &str = "bern_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Parse a log level name
pub(crate) fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Initialise the program logger using the `fern` logging library with colourised output.
///
/// The user can specify their preferred logging level via the `settings.toml` file (defaulting to
/// `info` if not present) or with the `BERN_LOG_LEVEL` environment variable. If both are provided,
/// the environment variable takes precedence.
///
/// Possible log level options are:
///
/// * `off`
/// * `error`
/// * `warn`
/// * `info`
/// * `debug`
/// * `trace`
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_file_path`: The location to save log files (if Some, log files will be created)
pub fn init(log_level_from_settings: &str, log_file_path: Option<&Path>) -> Result<()> {
    // Retrieve the log level from the environment variable or settings
    let log_level = env::var("BERN_LOG_LEVEL").unwrap_or_else(|_| log_level_from_settings.into());
    let log_level = parse_log_level(&log_level)?;

    let mut dispatch = Dispatch::new().chain(console_dispatch(log_level));
    if let Some(log_file_path) = log_file_path {
        dispatch = dispatch.chain(file_dispatch(log_file_path, log_level)?);
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// Messages below `warn` go to stdout, the rest to stderr
fn console_dispatch(log_level: LevelFilter) -> Dispatch {
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let stdout_colours = std::io::stdout().is_terminal().then_some(colours);
    let stderr_colours = std::io::stderr().is_terminal().then_some(colours);

    Dispatch::new()
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_console(out, message, record, stdout_colours.as_ref());
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            Dispatch::new()
                .format(move |out, message, record| {
                    write_console(out, message, record, stderr_colours.as_ref());
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        )
}

/// Log files in the output folder, with progress messages and problems kept apart.
///
/// The info log always records at least `info`.
fn file_dispatch(dir: &Path, log_level: LevelFilter) -> Result<Dispatch> {
    let open = |file_name| {
        let path = dir.join(file_name);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Could not create log file {}", path.display()))
    };

    Ok(Dispatch::new()
        .format(|out, message, record| write_log(out, &record.level(), record, message))
        .chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .level(log_level.max(LevelFilter::Info))
                .chain(open(LOG_INFO_FILE_NAME)?),
        )
        .chain(
            Dispatch::new()
                .level(LevelFilter::Warn)
                .chain(open(LOG_ERROR_FILE_NAME)?),
        ))
}

/// Format a log line as `[time level target] message`
fn write_log(out: FormatCallback, level: &dyn Display, record: &Record, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");
    let target = record.target();
    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

/// Write a console log line, colouring the level if colours are given
fn write_console(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    match colours {
        Some(colours) => write_log(out, &colours.color(record.level()), record, message),
        None => write_log(out, &record.level(), record, message),
    }
}
