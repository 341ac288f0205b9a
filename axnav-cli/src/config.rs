use crate::duration_parser::parse_duration;
use axnav::{ExecutorConfig, NavigationError, ProviderConfig, RetryPolicy};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "axnav", version)]
#[command(about = "Interactive shell for exploring accessibility trees")]
#[command(
    long_about = "axnav walks the accessibility tree of running applications: pick an application, \
                  a window and an element, list and search children, inspect attributes and press \
                  buttons. Every call into the accessibility service runs under a deadline."
)]
pub struct Cli {
    /// JSON accessibility snapshot to explore instead of a live service
    #[arg(long, env = "AXNAV_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Application to select at startup (name or PID)
    #[arg(long, env = "AXNAV_APP")]
    pub app: Option<String>,

    /// Deadline for one provider call, e.g. 2s or 500ms
    #[arg(long, env = "AXNAV_TIMEOUT", default_value = "2s", allow_hyphen_values = true)]
    pub timeout: String,

    /// Deadline for loading the children of one element
    #[arg(
        long,
        env = "AXNAV_ELEMENT_TIMEOUT",
        default_value = "500ms",
        allow_hyphen_values = true
    )]
    pub element_timeout: String,

    /// Budget for whole-tree walks (tree, find)
    #[arg(
        long,
        env = "AXNAV_WALK_TIMEOUT",
        default_value = "10s",
        allow_hyphen_values = true
    )]
    pub walk_timeout: String,

    /// Attempts per navigation call, at least 1
    #[arg(long, env = "AXNAV_RETRIES", default_value_t = 3, allow_hyphen_values = true)]
    pub retries: i64,

    /// Pause between attempts
    #[arg(
        long,
        env = "AXNAV_RETRY_DELAY",
        default_value = "250ms",
        allow_hyphen_values = true
    )]
    pub retry_delay: String,

    /// Default depth for `tree`
    #[arg(long, env = "AXNAV_MAX_DEPTH", default_value_t = 8)]
    pub max_depth: usize,

    /// Debug log file (default: <data dir>/axnav/logs/axnav.log)
    #[arg(long, env = "AXNAV_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, env = "AXNAV_NO_COLOR")]
    pub no_color: bool,
}

/// Validated startup settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderConfig,
    pub executor: ExecutorConfig,
    pub app: Option<String>,
    pub max_depth: usize,
}

impl Cli {
    pub fn settings(&self) -> Result<Settings, NavigationError> {
        let attempts = u32::try_from(self.retries)
            .ok()
            .filter(|attempts| *attempts >= 1)
            .ok_or_else(|| {
                NavigationError::Validation(format!(
                    "--retries must be at least 1, got {}",
                    self.retries
                ))
            })?;
        let retry = RetryPolicy::new(attempts, duration("--retry-delay", &self.retry_delay)?)?;

        let executor = ExecutorConfig {
            call_timeout: positive_duration("--timeout", &self.timeout)?,
            element_timeout: positive_duration("--element-timeout", &self.element_timeout)?,
            walk_timeout: positive_duration("--walk-timeout", &self.walk_timeout)?,
            retry,
        };

        Ok(Settings {
            provider: ProviderConfig {
                snapshot: self.snapshot.clone(),
            },
            executor,
            app: self.app.clone().filter(|app| !app.trim().is_empty()),
            max_depth: self.max_depth,
        })
    }
}

fn duration(flag: &str, value: &str) -> Result<Duration, NavigationError> {
    parse_duration(value).map_err(|e| NavigationError::Validation(format!("{flag}: {e}")))
}

fn positive_duration(flag: &str, value: &str) -> Result<Duration, NavigationError> {
    let parsed = duration(flag, value)?;
    if parsed.is_zero() {
        return Err(NavigationError::Validation(format!(
            "{flag} must be greater than zero"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["axnav"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&[]).settings().unwrap();
        assert_eq!(settings.executor.call_timeout, Duration::from_secs(2));
        assert_eq!(settings.executor.element_timeout, Duration::from_millis(500));
        assert_eq!(settings.executor.walk_timeout, Duration::from_secs(10));
        assert_eq!(settings.executor.retry.max_attempts(), 3);
        assert_eq!(settings.executor.retry.delay(), Duration::from_millis(250));
        assert_eq!(settings.max_depth, 8);
    }

    #[test]
    fn test_custom_values() {
        let settings = parse(&[
            "--timeout",
            "1.5s",
            "--retries",
            "1",
            "--retry-delay",
            "0",
            "--app",
            "TextEdit",
        ])
        .settings()
        .unwrap();
        assert_eq!(settings.executor.call_timeout, Duration::from_millis(1500));
        assert_eq!(settings.executor.retry.max_attempts(), 1);
        assert_eq!(settings.executor.retry.delay(), Duration::ZERO);
        assert_eq!(settings.app.as_deref(), Some("TextEdit"));
    }

    #[test]
    fn test_invalid_values_are_validation_errors() {
        for args in [
            &["--retries", "0"][..],
            &["--retries", "-2"][..],
            &["--retry-delay", "-1s"][..],
            &["--timeout", "0"][..],
            &["--timeout", "soon"][..],
            &["--element-timeout", "-100ms"][..],
        ] {
            let err = parse(args).settings().unwrap_err();
            assert!(
                matches!(err, NavigationError::Validation(_)),
                "{args:?} gave {err:?}"
            );
        }
    }
}
