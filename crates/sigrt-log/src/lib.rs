//! Diagnostic logging for the `sigrt` runtime.
//!
//! Precondition violations, scheduling misuse and lifecycle tracing from
//! the object runtime and the main loop all go through this crate. Output
//! goes to stderr by default; a [`Sink`] can be installed to redirect it.
//!
//! # Example
//!
//! ```
//! use sigrt_log::{debug, error, warn, Level};
//!
//! sigrt_log::set_level(Level::Debug);
//!
//! let source_id = 7;
//! debug!("source {} attached", source_id);
//! warn!("loop is already running");
//! error!("invalid object handle: {:?}", (3, 1));
//! ```
//!
//! # Configuration
//!
//! The level defaults to [`Level::Warn`]. [`init_from_env`] reads the
//! `SIGRT_LOG` environment variable (`error`, `warn`, `info`, `debug`,
//! `trace`, case-insensitive).

use std::fmt::{self, Arguments};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

/// Environment variable consulted by [`init_from_env`].
pub const ENV_VAR: &str = "SIGRT_LOG";

/// Severity of a log record.
///
/// Lower numeric values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Precondition violations and other programmer errors
    Error = 0,
    /// Misuse that is ignored after a diagnostic
    Warn = 1,
    /// Informational messages
    Info = 2,
    /// Lifecycle events (registration, attach, run start/stop)
    Debug = 3,
    /// Per-phase and per-release detail
    Trace = 4,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case name of this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring case.
    ///
    /// ```
    /// use sigrt_log::Level;
    ///
    /// assert_eq!("error".parse::<Level>(), Ok(Level::Error));
    /// assert_eq!("TRACE".parse::<Level>(), Ok(Level::Trace));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Replacement output for log records.
///
/// Receives the level, the module path of the call site and the message.
pub type Sink = fn(Level, &str, &Arguments<'_>);

static SINK: RwLock<Option<Sink>> = RwLock::new(None);

/// Process-wide level filter.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the most verbose level that will be emitted.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current level.
    #[must_use]
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Returns `true` if a record at `level` would be emitted.
    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, creating it at [`Level::Warn`] on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the global level.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the global level from its name.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if `s` is not a level name; the level is left
/// unchanged.
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Applies the level named by `SIGRT_LOG`, if the variable is set.
///
/// Returns the level that was applied.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the variable holds an unknown level name.
pub fn init_from_env() -> Result<Option<Level>, ParseLevelError> {
    match std::env::var(ENV_VAR) {
        Ok(value) => {
            let level: Level = value.parse()?;
            set_level(level);
            Ok(Some(level))
        }
        Err(_) => Ok(None),
    }
}

/// Routes every subsequent record to `sink` instead of stderr.
pub fn set_sink(sink: Sink) {
    *SINK.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
}

/// Restores stderr output.
pub fn reset_sink() {
    *SINK.write().unwrap_or_else(PoisonError::into_inner) = None;
}

#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments<'_>) {
    static RESET: &str = "\x1b[0m";

    if !get_logger().enabled(level) {
        return;
    }

    let sink = *SINK.read().unwrap_or_else(PoisonError::into_inner);
    match sink {
        Some(sink) => sink(level, target, &args),
        None => {
            let color = level.color_code();
            eprintln!("{color}[{level}]{RESET} {target}: {args}");
        }
    }
}

/// Logs a record at an explicit level.
///
/// ```
/// use sigrt_log::{log, Level};
///
/// log!(level: Level::Error, "type id {} is not registered", 12);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below share the global level and sink.
    static SERIAL: Mutex<()> = Mutex::new(());
    static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn capture(level: Level, target: &str, args: &Arguments<'_>) {
        CAPTURED
            .lock()
            .unwrap()
            .push(format!("{level} {target} {args}"));
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("error".parse::<Level>(), Ok(Level::Error));
        assert_eq!("Warning".parse::<Level>(), Ok(Level::Warn));
        assert_eq!(" info ".parse::<Level>(), Ok(Level::Info));
        assert_eq!("DEBUG".parse::<Level>(), Ok(Level::Debug));
        assert_eq!("trace".parse::<Level>(), Ok(Level::Trace));

        let err = "chatty".parse::<Level>().unwrap_err();
        assert_eq!(err.to_string(), "invalid log level: chatty");
    }

    #[test]
    fn test_logger_level_filtering() {
        let logger = Logger::new(Level::Warn);

        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Warn));
        assert!(!logger.enabled(Level::Info));

        logger.set_level(Level::Trace);
        assert!(logger.enabled(Level::Trace));
        assert_eq!(logger.level(), Level::Trace);
    }

    #[test]
    fn test_set_level_from_str() {
        let _guard = SERIAL.lock().unwrap();

        set_level_from_str("debug").unwrap();
        assert_eq!(get_logger().level(), Level::Debug);

        assert!(set_level_from_str("nope").is_err());
        assert_eq!(get_logger().level(), Level::Debug);

        set_level(Level::Warn);
    }

    #[test]
    fn test_sink_receives_enabled_records_only() {
        let _guard = SERIAL.lock().unwrap();
        CAPTURED.lock().unwrap().clear();

        set_level(Level::Warn);
        set_sink(capture);
        error!("object {} is dead", 4);
        debug!("not emitted");
        reset_sink();

        let captured = CAPTURED.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].starts_with("ERROR sigrt_log::tests"));
        assert!(captured[0].ends_with("object 4 is dead"));
    }

    #[test]
    fn test_sink_survives_poisoned_lock() {
        let _guard = SERIAL.lock().unwrap();
        CAPTURED.lock().unwrap().clear();

        let _ = std::thread::spawn(|| {
            let _held = SINK.write().unwrap();
            panic!("poison the sink lock");
        })
        .join();
        assert!(SINK.is_poisoned());

        set_level(Level::Warn);
        set_sink(capture);
        warn!("still routed");
        reset_sink();

        let captured = CAPTURED.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].ends_with("still routed"));
    }

    #[test]
    fn test_init_from_env_without_variable() {
        let _guard = SERIAL.lock().unwrap();

        if std::env::var(ENV_VAR).is_err() {
            assert_eq!(init_from_env(), Ok(None));
        }
    }
}
