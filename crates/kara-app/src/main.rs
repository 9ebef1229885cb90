//! kara: demo controlling process.
//!
//! Starts the hub, answers `ping` with `"world!"`, opens one window and
//! runs until every window is closed or the process is interrupted.

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kara_common::{AppEvent, ConfigError, KaraError};
use kara_config::KaraConfig;
use kara_hub::{App, HandlerResult, IpcRequest};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kara: {e}");
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);
    config.renderer.program = resolve_renderer(&config.renderer.program);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.directive())),
        )
        .init();

    match run(config, args.url).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "kara stopped");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<KaraConfig, ConfigError> {
    match path {
        Some(path) => kara_config::load_from_path(path),
        None => kara_config::load_from_dir(Path::new(".")),
    }
}

/// Prefer a renderer installed next to this executable when the config
/// names a bare program.
fn resolve_renderer(program: &str) -> String {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return program.to_string();
    }
    let sibling: Option<PathBuf> = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(program)))
        .filter(|candidate| candidate.is_file());
    match sibling {
        Some(path) => path.to_string_lossy().into_owned(),
        None => program.to_string(),
    }
}

async fn run(config: KaraConfig, url: Option<String>) -> Result<(), KaraError> {
    let app = App::new(config);
    let mut events = app.subscribe();

    app.ipc().handle("ping", |req: IpcRequest| async move {
        tracing::info!(window = %req.window_id, "ping");
        HandlerResult::Ok(json!("world!"))
    })?;

    let port = app.start().await?;
    let window = app.create_window()?;
    tracing::info!(
        window = %window.id(),
        pid = ?window.pid(),
        port,
        version = app.version(),
        "Window created"
    );

    if let Some(url) = url {
        let window = window.clone();
        tokio::spawn(async move {
            if let Err(e) = window.load_url(url).await {
                tracing::warn!(error = %e, "Initial navigation failed");
            }
        });
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(AppEvent::AllWindowsClosed) | Err(RecvError::Closed) => break,
                Ok(event) => tracing::debug!(?event, "App event"),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event subscriber lagged");
                }
            },
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    app.quit().await;
    Ok(())
}
