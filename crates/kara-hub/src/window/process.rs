//! The external renderer process behind a window.

use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};

use kara_common::{KaraError, WindowId};
use kara_config::RendererConfig;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, watch};

pub(crate) struct RendererProcess {
    pid: Option<u32>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
    exited: watch::Receiver<bool>,
}

/// Launch the renderer with its startup parameters in the environment.
///
/// The returned receiver fires once the process has exited, for any
/// reason. Output lines are forwarded to the log under the window's id.
pub(crate) fn spawn(
    window: &WindowId,
    config: &RendererConfig,
    env: &[(&'static str, String)],
) -> Result<(RendererProcess, oneshot::Receiver<Option<ExitStatus>>), KaraError> {
    let mut command = Command::new(&config.program);
    command
        .args(&config.args)
        .envs(env.iter().map(|(key, value)| (*key, value.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| KaraError::Spawn {
        program: config.program.clone(),
        source,
    })?;
    let pid = child.id();
    tracing::info!(window = %window, pid = ?pid, program = %config.program, "Renderer spawned");

    if let Some(stdout) = child.stdout.take() {
        forward_output(window.clone(), stdout, false);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_output(window.clone(), stderr, true);
    }

    let (kill_tx, kill_rx) = oneshot::channel::<()>();
    let (exited_tx, exited_rx) = watch::channel(false);
    let (status_tx, status_rx) = oneshot::channel();
    let id = window.clone();

    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status.ok(),
            _ = kill_rx => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(window = %id, error = %e, "Failed to kill renderer");
                }
                None
            }
        };
        tracing::debug!(window = %id, status = ?status, "Renderer exited");
        let _ = exited_tx.send(true);
        let _ = status_tx.send(status);
    });

    let process = RendererProcess {
        pid,
        kill: Mutex::new(Some(kill_tx)),
        exited: exited_rx,
    };
    Ok((process, status_rx))
}

impl RendererProcess {
    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Kill the process if it is still running and wait until it is gone.
    pub(crate) async fn terminate(&self) {
        let kill = self
            .kill
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(kill) = kill {
            let _ = kill.send(());
        }
        let mut exited = self.exited.clone();
        let _ = exited.wait_for(|done| *done).await;
    }
}

fn forward_output<R>(window: WindowId, stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                tracing::warn!(target: "kara::renderer", window = %window, "{line}");
            } else {
                tracing::info!(target: "kara::renderer", window = %window, "{line}");
            }
        }
    });
}
