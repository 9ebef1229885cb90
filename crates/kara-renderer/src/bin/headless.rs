//! kara-headless: a renderer without a screen.
//!
//! Connects with the startup parameters from its environment, logs every
//! system call, and behaves like a page for the hub: navigation and
//! content swaps reconnect the socket the way a reloaded page would, and
//! `stop` exits the process.

use std::process::ExitCode;

use kara_common::SystemCall;
use kara_renderer::{RendererClient, RendererEnv};
use serde_json::Value;

enum Next {
    Reconnect,
    Exit,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kara_headless=info,kara_renderer=info".into()),
        )
        .init();

    let env = match RendererEnv::from_env() {
        Ok(env) => env,
        Err(e) => {
            tracing::error!(error = %e, "Invalid startup parameters");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(window = %env.id, port = env.port, debug = env.debug, "Headless renderer starting");

    let mut location = String::from("about:blank");

    loop {
        let (client, mut calls) = match RendererClient::connect(&env).await {
            Ok(connected) => connected,
            Err(e) => {
                tracing::error!(error = %e, "Could not reach hub");
                return ExitCode::FAILURE;
            }
        };
        client.set_location(location.clone());
        client.handle("echo", |args: &[Value]| {
            Ok(args.first().cloned().unwrap_or(Value::Null))
        });

        let next = loop {
            let Some(call) = calls.recv().await else {
                tracing::info!("Hub connection closed");
                break Next::Exit;
            };
            tracing::info!(method = call.method(), "System call");
            match call {
                SystemCall::Navigate { url } => {
                    location = url;
                    break Next::Reconnect;
                }
                SystemCall::SetHtml { .. } => {
                    location = String::from("about:blank");
                    break Next::Reconnect;
                }
                SystemCall::Eval { script } if script.trim() == "location.reload()" => {
                    break Next::Reconnect;
                }
                SystemCall::Eval { script } => {
                    tracing::debug!(script = %script, "Eval ignored");
                }
                SystemCall::SetTitle { title } => {
                    tracing::debug!(title = %title, "Title set");
                }
                SystemCall::SetSize { width, height } => {
                    tracing::debug!(width, height, "Size set");
                }
                SystemCall::Stop => break Next::Exit,
            }
        };

        client.close();
        match next {
            Next::Reconnect => tracing::info!(location = %location, "Reloading page"),
            Next::Exit => return ExitCode::SUCCESS,
        }
    }
}
