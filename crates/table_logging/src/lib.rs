#![deny(missing_docs)]
//! Logging macros for the table loader workspace.
//!
//! Every `table_*` macro takes either plain `format!` arguments or a leading
//! `scope: <expr>;` naming the table scope the message belongs to:
//!
//! ```
//! use table_logging::table_info;
//!
//! let scope = "audit-log";
//! table_info!("Config loaded");
//! table_info!(scope: scope; "Loaded {} rows", 25);
//! ```
//!
//! Scoped messages are written as `[audit-log] Loaded 25 rows`. Callers do not
//! need their own `log` dependency.

use log::LevelFilter;

#[doc(hidden)]
pub use log as __log;

/// Environment variable read by [`initialize_for_tests`].
pub const TEST_LEVEL_ENV: &str = "TABLE_TEST_LOG";

#[doc(hidden)]
#[macro_export]
macro_rules! __table_log {
    ($level:expr, scope: $scope:expr; $($arg:tt)+) => {
        $crate::__log::log!(
            $level,
            "[{}] {}",
            $scope,
            ::std::format_args!($($arg)+)
        )
    };
    ($level:expr, $($arg:tt)+) => {
        $crate::__log::log!($level, $($arg)+)
    };
}

/// Logs at trace level, optionally tagged with a table scope.
#[macro_export]
macro_rules! table_trace {
    ($($arg:tt)+) => {
        $crate::__table_log!($crate::__log::Level::Trace, $($arg)+)
    };
}

/// Logs at debug level, optionally tagged with a table scope.
#[macro_export]
macro_rules! table_debug {
    ($($arg:tt)+) => {
        $crate::__table_log!($crate::__log::Level::Debug, $($arg)+)
    };
}

/// Logs at info level, optionally tagged with a table scope.
#[macro_export]
macro_rules! table_info {
    ($($arg:tt)+) => {
        $crate::__table_log!($crate::__log::Level::Info, $($arg)+)
    };
}

/// Logs at warn level, optionally tagged with a table scope.
#[macro_export]
macro_rules! table_warn {
    ($($arg:tt)+) => {
        $crate::__table_log!($crate::__log::Level::Warn, $($arg)+)
    };
}

/// Logs at error level, optionally tagged with a table scope.
#[macro_export]
macro_rules! table_error {
    ($($arg:tt)+) => {
        $crate::__table_log!($crate::__log::Level::Error, $($arg)+)
    };
}

/// Level for test logging: the value of [`TEST_LEVEL_ENV`] when it names a
/// level (`off`, `error` .. `trace`, any case), else debug in debug builds and
/// info in release builds.
pub fn test_level(requested: Option<&str>) -> LevelFilter {
    if let Some(level) = requested.and_then(|value| value.trim().parse().ok()) {
        return level;
    }
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Initializes a terminal logger for tests at [`test_level`].
///
/// No-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let requested = std::env::var(TEST_LEVEL_ENV).ok();
    let _ = CombinedLogger::init(vec![TermLogger::new(
        test_level(requested.as_deref()),
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
