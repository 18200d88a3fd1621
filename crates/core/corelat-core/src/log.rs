//! Leveled logging sink shared by every harness component.
//!
//! [`lprint!`] / [`lprintln!`] write raw text (the per-core summary lines);
//! [`llog!`] and the level macros (`linfo!`, `lwarn!`, ...) carry a
//! severity so the host can filter. The embedding environment installs its
//! writers with [`set_print_fn`] / [`set_log_fn`]; until then output is
//! dropped.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

/// Log severity level. Lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// The run cannot continue.
    Error = 0,
    /// Suspicious measurement condition (baseline mismatch, operation failure).
    Warn = 1,
    /// Progress and per-run summaries.
    Info = 2,
    /// Per-phase diagnostics.
    Debug = 3,
    /// Per-iteration tracing. Perturbs timing; never enable for real runs.
    Trace = 4,
}

impl LogLevel {
    /// Returns the fixed-width name used as a line prefix.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Error,
            1 => Self::Warn,
            2 => Self::Info,
            3 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw print function
// ---------------------------------------------------------------------------

/// Signature of the raw print function.
pub type PrintFn = fn(fmt::Arguments<'_>);

fn null_print(_args: fmt::Arguments<'_>) {}

static PRINT_FN: AtomicPtr<()> = AtomicPtr::new(null_print as *mut ());

/// Installs the raw print function.
///
/// # Safety
///
/// `f` must be callable concurrently from every participating core.
pub unsafe fn set_print_fn(f: PrintFn) {
    PRINT_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_print_fn() -> PrintFn {
    let ptr = PRINT_FN.load(Ordering::Acquire);
    // SAFETY: only `PrintFn` pointers are ever stored into PRINT_FN.
    unsafe { core::mem::transmute::<*mut (), PrintFn>(ptr) }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    load_print_fn()(args);
}

/// Prints raw text (no level, no filtering).
#[macro_export]
macro_rules! lprint {
    ($($arg:tt)*) => { $crate::log::_print(format_args!($($arg)*)) };
}

/// Prints raw text with a trailing newline.
#[macro_export]
macro_rules! lprintln {
    () => { $crate::lprint!("\n") };
    ($($arg:tt)*) => { $crate::lprint!("{}\n", format_args!($($arg)*)) };
}

// ---------------------------------------------------------------------------
// Leveled log function
// ---------------------------------------------------------------------------

/// Signature of the leveled log function.
pub type LogFn = fn(LogLevel, fmt::Arguments<'_>);

fn null_log(_level: LogLevel, _args: fmt::Arguments<'_>) {}

static LOG_FN: AtomicPtr<()> = AtomicPtr::new(null_log as *mut ());

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Installs the leveled log function.
///
/// # Safety
///
/// `f` must be callable concurrently from every participating core.
pub unsafe fn set_log_fn(f: LogFn) {
    LOG_FN.store(f as *mut (), Ordering::Release);
}

/// Sets the most verbose level that is forwarded to the log function.
pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the current maximum forwarded level.
pub fn max_level() -> LogLevel {
    LogLevel::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

/// Returns `true` if messages at `level` would be forwarded.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

#[inline]
fn load_log_fn() -> LogFn {
    let ptr = LOG_FN.load(Ordering::Acquire);
    // SAFETY: only `LogFn` pointers are ever stored into LOG_FN.
    unsafe { core::mem::transmute::<*mut (), LogFn>(ptr) }
}

#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    if enabled(level) {
        load_log_fn()(level, args);
    }
}

/// Logs a message at the given level.
#[macro_export]
macro_rules! llog {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_log($level, format_args!($($arg)*))
    };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! lerr {
    ($($arg:tt)*) => { $crate::llog!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! lwarn {
    ($($arg:tt)*) => { $crate::llog!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Logs an info-level message.
#[macro_export]
macro_rules! linfo {
    ($($arg:tt)*) => { $crate::llog!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Logs a debug-level message.
#[macro_export]
macro_rules! ldebug {
    ($($arg:tt)*) => { $crate::llog!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Logs a trace-level message.
#[macro_export]
macro_rules! ltrace {
    ($($arg:tt)*) => { $crate::llog!($crate::log::LogLevel::Trace, $($arg)*) };
}
