//! Logging macros with verbosity level control.
//!
//! Messages go through `tracing`, so the host decides where they end up. The
//! verbosity gate sits in front of the tracing call and makes logging free
//! when a request runs silent (verbosity=0).
//! - 0: SILENT (only warnings emitted directly via `tracing::warn!`)
//! - 1: CHANGES (accepted moves, project placements, stage results)
//! - 2: CHECKS (candidate evaluation, rejected moves)
//! - 3: DEBUG (per-task pass internals)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1), emitted as `info`.
///
/// Used for: accepted optimizer moves, portfolio placement decisions.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            ::tracing::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2), emitted as `debug`.
///
/// Used for: candidate moves, scoring of portfolio orderings.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            ::tracing::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3), emitted as `trace`.
///
/// Used for: forward/backward pass details, timeline loads.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            ::tracing::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(VERBOSITY_SILENT < VERBOSITY_CHANGES);
        assert!(VERBOSITY_CHANGES < VERBOSITY_CHECKS);
        assert!(VERBOSITY_CHECKS < VERBOSITY_DEBUG);
    }

    #[test]
    fn test_log_macros_with_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();

        let verbosity = VERBOSITY_DEBUG;
        log_changes!(verbosity, "move accepted: {}", "a");
        log_checks!(verbosity, "candidate {}", 2);
        log_debug!(verbosity, "forward pass {}", 3);

        let silent = VERBOSITY_SILENT;
        log_changes!(silent, "never emitted {}", 1);
    }
}
