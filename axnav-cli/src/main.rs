use axnav::{create_provider, AccessibilityProvider, ErrorKind, NavigationError, Navigator};
use clap::Parser;
use tracing::{debug, info, warn};

mod commands;
mod config;
mod display;
mod duration_parser;
mod logging;
mod shell;

use config::Cli;
use shell::Shell;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Some(dir) = logging::init_logging(cli.verbose, cli.log_file.as_deref()) {
        debug!("Writing debug log to {}", dir.display());
    }

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            match e.downcast_ref::<NavigationError>() {
                Some(error) => {
                    display::print_error(error);
                    exit_code(error)
                }
                None => {
                    eprintln!("error: {e:#}");
                    1
                }
            }
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings()?;
    debug!(?settings, "Starting");

    let provider = create_provider(&settings.provider)?;
    ensure_authorized(provider.as_ref())?;

    let mut navigator =
        Navigator::new(provider, settings.executor).with_max_depth(Some(settings.max_depth));

    if let Some(app) = settings.app.as_deref() {
        info!("Selecting startup application '{app}'");
        if let Err(e) = navigator.select_application(Some(app)) {
            warn!("Startup application '{app}' not selected: {e}");
            display::print_error(&e);
        }
    }

    Shell::new(navigator).run().await
}

fn ensure_authorized(provider: &dyn AccessibilityProvider) -> Result<(), NavigationError> {
    if provider.is_accessibility_authorized() {
        return Ok(());
    }
    warn!("Accessibility access not granted, requesting it");
    if provider.request_authorization() {
        return Ok(());
    }
    Err(NavigationError::Unauthorized(
        "the accessibility service refused access to this process".to_string(),
    ))
}

/// 2 for bad flags, 1 for everything else that stops startup.
fn exit_code(error: &NavigationError) -> i32 {
    match error.kind() {
        ErrorKind::Validation => 2,
        _ => 1,
    }
}
