use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_NAME: &str = "axnav.log";

/// Console logging goes to stderr so it never mixes with shell output.
/// The file layer records debug output of both crates when its file can be
/// opened; otherwise only the console layer is installed. Returns the
/// directory the log file is written to.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Option<PathBuf> {
    let default_level = if verbose { "debug" } else { "warn" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, log_dir, file_error) = match file_appender(log_file) {
        Ok((dir, appender)) => (
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(EnvFilter::new("axnav=debug,axnav_cli=debug")),
            ),
            Some(dir),
            None,
        ),
        Err(e) => (None, None, Some(e)),
    };

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .try_init();
    if let Err(e) = installed {
        eprintln!("warning: logging not initialized: {e}");
        return None;
    }

    if let Some(e) = file_error {
        warn!("File logging disabled: {e:#}");
    }
    log_dir
}

/// Opens the log file: `log_file` as given, or a daily rolling file in the
/// user's data directory.
fn file_appender(log_file: Option<&Path>) -> anyhow::Result<(PathBuf, RollingFileAppender)> {
    let (log_dir, file_name, daily) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("--log-file must name a file: {}", path.display()))?;
            (dir, PathBuf::from(name), false)
        }
        None => (default_log_dir(), PathBuf::from(LOG_FILE_NAME), true),
    };
    // The appender panics if it cannot open its directory.
    std::fs::create_dir_all(&log_dir)?;
    let appender = if daily {
        rolling::daily(&log_dir, &file_name)
    } else {
        rolling::never(&log_dir, &file_name)
    };
    Ok((log_dir, appender))
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("axnav")
        .join("logs")
}
