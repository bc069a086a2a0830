//! Logging setup for dupedb.
//!
//! Uses the `log` facade with an `env_logger` backend. The level comes from,
//! in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. info
//!
//! Per-file failures are logged at `warn`, per-file progress at `trace`,
//! and phase summaries at `info`.
//!
//! # Example
//!
//! ```rust,no_run
//! use dupedb::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize logging from the CLI verbosity flags.
///
/// Returns `false` if a logger was already installed (for example by a test
/// harness); the existing logger is left in place.
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let from_env = env::var("RUST_LOG").ok();
    let mut builder = Builder::new();

    match &from_env {
        Some(filters) => {
            builder.parse_filters(filters);
        }
        None => {
            builder.filter_level(determine_level(verbose, quiet));
            // The walker crate is chatty at debug level.
            builder.filter_module("jwalk", LevelFilter::Warn);
        }
    }

    configure_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return false;
    }

    match from_env {
        Some(filters) => log::debug!("Logging initialized from RUST_LOG={}", filters),
        None => log::debug!(
            "Logging initialized at level {:?}",
            determine_level(verbose, quiet)
        ),
    }
    true
}

/// Map CLI flags to a level filter; quiet wins over verbose.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Debug builds (or any `-v`) print timestamp and module path; release
/// builds at default verbosity print level and message only.
fn configure_format(builder: &mut Builder, verbose: u8) {
    let detailed = cfg!(debug_assertions) || verbose > 0;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if detailed {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_level() {
        assert_eq!(determine_level(0, false), LevelFilter::Info);
        assert_eq!(determine_level(1, false), LevelFilter::Debug);
        assert_eq!(determine_level(2, false), LevelFilter::Trace);
        assert_eq!(determine_level(5, false), LevelFilter::Trace);
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(determine_level(0, true), LevelFilter::Error);
        assert_eq!(determine_level(2, true), LevelFilter::Error);
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_logging(0, true);
        assert!(!init_logging(0, true));
    }
}
