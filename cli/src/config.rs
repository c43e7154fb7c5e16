//! Configuration for the `uci-analyze` front end.
//!
//! Every value has a compile-time default and can be overridden at runtime via
//! a dedicated environment variable. Command-line flags take precedence over
//! both.

use std::path::PathBuf;
use std::time::Duration;

/// Default engine binary, resolved through `PATH`.
const DEFAULT_ENGINE_PATH: &str = "stockfish";

/// Default time to wait for `uciok` after launching (in seconds).
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Get the engine binary to launch.
///
/// Priority:
/// 1. `UCI_DRIVER_ENGINE_PATH` env variable if set
/// 2. `stockfish` as fallback
pub fn get_engine_path() -> PathBuf {
    if let Ok(path) = std::env::var("UCI_DRIVER_ENGINE_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_ENGINE_PATH)
}

/// Get extra arguments for the engine binary.
///
/// Reads `UCI_DRIVER_ENGINE_ARGS` and splits it on whitespace. Empty when unset.
pub fn get_engine_args() -> Vec<String> {
    std::env::var("UCI_DRIVER_ENGINE_ARGS")
        .map(|args| split_args(&args))
        .unwrap_or_default()
}

fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

/// Get the probe timeout.
///
/// Priority:
/// 1. `UCI_DRIVER_PROBE_TIMEOUT_SECS` env variable if set (falls back to the
///    default if the value cannot be parsed as a `u64`)
/// 2. `10` seconds as fallback
pub fn get_probe_timeout() -> Duration {
    let secs = std::env::var("UCI_DRIVER_PROBE_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Get the directory for daily log files.
///
/// `None` when `UCI_DRIVER_LOG_DIR` is unset, in which case logs go to stderr.
pub fn get_log_dir() -> Option<PathBuf> {
    std::env::var_os("UCI_DRIVER_LOG_DIR").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_engine_path() {
        let path = get_engine_path();
        match std::env::var("UCI_DRIVER_ENGINE_PATH") {
            Ok(val) => assert_eq!(path, PathBuf::from(val)),
            Err(_) => assert_eq!(path, PathBuf::from(DEFAULT_ENGINE_PATH)),
        }
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("  --uci   -q "), vec!["--uci", "-q"]);
        assert!(split_args("").is_empty());
    }

    #[test]
    fn test_get_probe_timeout_default() {
        if std::env::var("UCI_DRIVER_PROBE_TIMEOUT_SECS").is_err() {
            assert_eq!(
                get_probe_timeout(),
                Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS)
            );
        }
    }

    #[test]
    fn test_get_log_dir() {
        match std::env::var_os("UCI_DRIVER_LOG_DIR") {
            Some(val) => assert_eq!(get_log_dir(), Some(PathBuf::from(val))),
            None => assert_eq!(get_log_dir(), None),
        }
    }
}
