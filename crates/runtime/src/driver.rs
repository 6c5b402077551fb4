//! One driver subprocess per tenant, line-delimited JSON over stdio.
//!
//! The driver owns the real protocol connection and the tenant's credential
//! folder; this module owns the process: spawn with piped stdio, forward
//! stdout lines as [`TransportEvent`]s, write [`DriverCommand`] lines to
//! stdin, and kill the child on destroy so no connection outlives its
//! session.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use mb_protocol::{ChatAddress, DriverCommand, TenantId, TransportEvent};

use crate::transport::{MessagingTransport, Result, TransportError, TransportFactory, TransportLink};

/// Configuration for launching driver processes.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Driver executable.
    pub program: PathBuf,
    /// Extra arguments placed before the generated ones.
    pub args: Vec<String>,
    /// Root of the per-tenant credential store; each tenant gets a
    /// subdirectory named after its id.
    pub session_root: PathBuf,
}

/// Spawns one driver process per connected tenant.
pub struct DriverTransportFactory {
    config: DriverConfig,
}

impl DriverTransportFactory {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for DriverTransportFactory {
    async fn connect(&self, tenant: &TenantId) -> Result<TransportLink> {
        let session_dir = self.config.session_root.join(tenant.as_str());
        tokio::fs::create_dir_all(&session_dir).await?;

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg("--tenant")
            .arg(tenant.as_str())
            .arg("--session-dir")
            .arg(&session_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::Spawn(format!("{}: {e}", self.config.program.display()))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("driver stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("driver stdout was not piped".to_string()))?;

        let (event_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(read_events(tenant.clone(), stdout, event_tx));

        debug!(
            target = "mb.driver",
            tenant = %tenant,
            program = %self.config.program.display(),
            session_dir = %session_dir.display(),
            "driver spawned"
        );

        let transport = Arc::new(DriverTransport {
            tenant: tenant.clone(),
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            destroyed: AtomicBool::new(false),
        });
        Ok(TransportLink { transport, events })
    }
}

struct DriverTransport {
    tenant: TenantId,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    destroyed: AtomicBool,
}

impl DriverTransport {
    async fn write_command(&self, command: &DriverCommand) -> Result<()> {
        let mut line = serde_json::to_string(command)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        line.push('\n');

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingTransport for DriverTransport {
    async fn send_message(&self, chat: &ChatAddress, body: &str) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.write_command(&DriverCommand::SendMessage {
            chat: chat.clone(),
            body: body.to_string(),
        })
        .await
    }

    async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Well-behaved drivers exit on the shutdown command or on stdin
        // closing; the kill below covers the rest.
        let _ = self.write_command(&DriverCommand::Shutdown).await;
        self.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        debug!(target = "mb.driver", tenant = %self.tenant, "driver destroyed");
        Ok(())
    }
}

async fn read_events(
    tenant: TenantId,
    stdout: ChildStdout,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<TransportEvent>(line) {
                    Ok(event) => {
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(
                            target = "mb.driver",
                            tenant = %tenant,
                            error = %err,
                            line,
                            "ignoring malformed driver line"
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(
                    target = "mb.driver",
                    tenant = %tenant,
                    error = %err,
                    "driver stdout read failed"
                );
                break;
            }
        }
    }
    debug!(target = "mb.driver", tenant = %tenant, "driver event stream ended");
}
