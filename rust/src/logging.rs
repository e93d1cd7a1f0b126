//! Verbosity-gated logging macros for the scheduler.
//!
//! Output goes to stderr and costs nothing at verbosity 0.
//! - 0: SILENT
//! - 1: DECISIONS (phase placements, cycle reports, request summaries)
//! - 2: DETAILS (ready sets, inferred edges, validation)
//! - 3: TRACE (queue pops and in-degree updates)

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_DECISIONS: u8 = 1;
pub const VERBOSITY_DETAILS: u8 = 2;
pub const VERBOSITY_TRACE: u8 = 3;

/// Log at DECISIONS level (verbosity >= 1).
#[macro_export]
macro_rules! log_decisions {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DECISIONS {
            eprintln!("[scheduler] {}", format_args!($($arg)*));
        }
    };
}

/// Log at DETAILS level (verbosity >= 2).
#[macro_export]
macro_rules! log_details {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DETAILS {
            eprintln!("[scheduler]   {}", format_args!($($arg)*));
        }
    };
}

/// Log at TRACE level (verbosity >= 3).
#[macro_export]
macro_rules! log_trace {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_TRACE {
            eprintln!("[scheduler]     {}", format_args!($($arg)*));
        }
    };
}
