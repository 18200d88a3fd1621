//! Routes harness output to the terminal.
//!
//! Raw prints (summary lines) go to stdout unfiltered; leveled messages
//! go to stderr, filtered by the `-q` / `-v` flags.

use std::fmt;
use std::io::Write;

use corelat_core::log::{self, LogLevel};

/// Installs the print and log functions for the current process.
pub fn init(quiet: bool, verbose: bool) {
    let level = if quiet {
        LogLevel::Error
    } else if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    log::set_max_level(level);
    // SAFETY: both functions only lock the std streams, which is safe from
    // any thread.
    unsafe {
        log::set_print_fn(print_stdout);
        log::set_log_fn(log_stderr);
    }
}

fn print_stdout(args: fmt::Arguments<'_>) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_fmt(args);
}

fn log_stderr(level: LogLevel, args: fmt::Arguments<'_>) {
    eprintln!("[{}] {}", level.name(), args);
}
