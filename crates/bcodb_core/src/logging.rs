//! Process-wide log file setup for registry tooling.
//!
//! # Responsibility
//! - Start the rotating file logger that core and CLI events write through.
//! - Capture panics into the log before the process dies.
//!
//! # Invariants
//! - At most one logger per process; later `init_logging` calls are
//!   rejected, never silently reconfigured.
//! - Log macros before (or without) initialization are silent no-ops.
//!
//! # See also
//! - docs/architecture/logging.md

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "bcodb";
const ROTATE_AFTER_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 4;
const PANIC_PAYLOAD_MAX_CHARS: usize = 200;

static ACTIVE_LOGGER: OnceCell<LoggerHandle> = OnceCell::new();

#[derive(Debug)]
pub enum LoggingError {
    /// A logger is already running for this process.
    AlreadyInitialized,
    InvalidLevel(String),
    LogDirUnavailable { dir: PathBuf, detail: String },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInitialized => {
                f.write_str("logging is already initialized for this process")
            }
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; use off|error|warn|info|debug|trace"
            ),
            Self::LogDirUnavailable { dir, detail } => {
                write!(f, "cannot use log directory `{}`: {detail}", dir.display())
            }
            Self::Backend(detail) => write!(f, "logger failed to start: {detail}"),
        }
    }
}

impl Error for LoggingError {}

/// Starts file logging for this process.
///
/// Log files land under `log_dir` (created when missing) as `bcodb_*`,
/// rotated by size. The first call wins the process; there is no
/// reconfiguration path, so callers decide level and directory up front.
///
/// # Errors
/// - `AlreadyInitialized` when a logger is already running.
/// - `InvalidLevel` when `level` names no supported level.
/// - `LogDirUnavailable` when `log_dir` is empty or cannot be created.
/// - `Backend` when the logger itself fails to start.
pub fn init_logging(level: &str, log_dir: &Path) -> Result<(), LoggingError> {
    if ACTIVE_LOGGER.get().is_some() {
        return Err(LoggingError::AlreadyInitialized);
    }

    let level = parse_level(level)?;
    if log_dir.as_os_str().is_empty() {
        return Err(LoggingError::LogDirUnavailable {
            dir: log_dir.to_path_buf(),
            detail: "path is empty".to_string(),
        });
    }
    std::fs::create_dir_all(log_dir).map_err(|err| LoggingError::LogDirUnavailable {
        dir: log_dir.to_path_buf(),
        detail: err.to_string(),
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(FileSpec::default().directory(log_dir).basename(LOG_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AFTER_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        // Unbuffered writes: a short-lived maintenance process must not
        // lose its tail lines to an unflushed buffer.
        .write_mode(WriteMode::Direct)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    if ACTIVE_LOGGER.set(handle).is_err() {
        return Err(LoggingError::AlreadyInitialized);
    }
    install_panic_hook();

    info!(
        "event=log_open module=logging status=ok level={level} dir={} version={}",
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(())
}

/// Returns the default log level for the current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(raw: &str) -> Result<&'static str, LoggingError> {
    const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
    let wanted = raw.trim().to_ascii_lowercase();
    LEVELS
        .iter()
        .find(|level| **level == wanted)
        .copied()
        .ok_or(LoggingError::InvalidLevel(wanted))
}

// Runs at most once: initialization sets `ACTIVE_LOGGER` exactly once and
// this is only called right after a successful set.
fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        // Payload text is uncontrolled; collapse it to one capped line so
        // it cannot break the one-event-per-line format.
        error!(
            "event=panic module=logging status=error location={location} payload={}",
            flatten_payload(panic_info)
        );
        previous_hook(panic_info);
    }));
}

fn flatten_payload(info: &std::panic::PanicHookInfo<'_>) -> String {
    let raw = if let Some(text) = info.payload().downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = info.payload().downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string payload".to_string()
    };
    squash_to_line(&raw, PANIC_PAYLOAD_MAX_CHARS)
}

fn squash_to_line(raw: &str, max_chars: usize) -> String {
    let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut capped: String = flat.chars().take(max_chars).collect();
    capped.push_str("...");
    capped
}

#[cfg(test)]
mod tests {
    use super::{init_logging, parse_level, squash_to_line, LoggingError};
    use std::path::Path;

    #[test]
    fn parse_level_is_case_and_whitespace_tolerant() {
        assert_eq!(parse_level("INFO").expect("INFO should parse"), "info");
        assert_eq!(parse_level(" Warn ").expect("warn should parse"), "warn");
        assert!(matches!(
            parse_level("verbose"),
            Err(LoggingError::InvalidLevel(_))
        ));
    }

    #[test]
    fn squash_to_line_collapses_whitespace_and_caps_length() {
        assert_eq!(squash_to_line("a\nb\r\n  c", 40), "a b c");

        let capped = squash_to_line("assertion failed at some length", 9);
        assert_eq!(capped, "assertion...");
    }

    // All init paths live in one test: the process-wide logger can only be
    // started once, so ordering across tests cannot be relied on.
    #[test]
    fn init_logging_starts_once_then_refuses() {
        let bad_level =
            init_logging("loud", Path::new("/tmp")).expect_err("unknown level must be rejected");
        assert!(matches!(bad_level, LoggingError::InvalidLevel(_)));

        let empty_dir =
            init_logging("info", Path::new("")).expect_err("empty dir must be rejected");
        assert!(matches!(empty_dir, LoggingError::LogDirUnavailable { .. }));

        let dir = tempfile::tempdir().expect("temp dir should be created");
        init_logging("info", dir.path()).expect("first init should succeed");

        let again = init_logging("debug", dir.path()).expect_err("second init must be refused");
        assert!(matches!(again, LoggingError::AlreadyInitialized));
    }
}
