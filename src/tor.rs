//! Start/stop control of the local SOCKS proxy process.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::proxy::ProxyConfig;

/// Time the proxy gets to bootstrap before the port is probed.
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of the anonymizing proxy. Both operations are idempotent.
#[async_trait]
pub trait AnonymizerControl: Send + Sync {
    /// Starts the proxy and waits until it accepts connections.
    /// Returns `true` when the proxy is running afterwards.
    async fn start(&self) -> bool;

    /// Stops the proxy. Returns `true` when it is no longer running.
    async fn stop(&self) -> bool;

    fn is_running(&self) -> bool;
}

struct RunningTor {
    child: Child,
    // Removed when the process is dropped.
    _data_dir: TempDir,
}

/// Spawns `tor --SocksPort <port> --DataDirectory <tempdir>`.
pub struct TorProcess {
    binary: String,
    proxy: ProxyConfig,
    settle: Duration,
    process: Mutex<Option<RunningTor>>,
    running: AtomicBool,
}

impl TorProcess {
    pub fn new(binary: impl Into<String>, proxy: ProxyConfig) -> Self {
        Self {
            binary: binary.into(),
            proxy,
            settle: SETTLE_DELAY,
            process: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Overrides the bootstrap delay.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.proxy
    }

    fn spawn(&self, data_dir: &TempDir) -> std::io::Result<Child> {
        Command::new(&self.binary)
            .arg("--SocksPort")
            .arg(self.proxy.port.to_string())
            .arg("--DataDirectory")
            .arg(data_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Returns whether something accepts TCP connections at the proxy address.
pub async fn probe(proxy: &ProxyConfig) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(proxy.socket_addr())).await,
        Ok(Ok(_))
    )
}

#[async_trait]
impl AnonymizerControl for TorProcess {
    async fn start(&self) -> bool {
        let mut guard = self.process.lock().await;
        if guard.is_some() {
            debug!("Tor already running");
            return true;
        }

        let data_dir = match tempfile::Builder::new().prefix("veil-tor-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "Failed to create Tor data directory");
                return false;
            }
        };

        let mut child = match self.spawn(&data_dir) {
            Ok(child) => child,
            Err(e) => {
                warn!(binary = %self.binary, error = %e, "Failed to start Tor");
                return false;
            }
        };
        info!(port = self.proxy.port, "Starting Tor");

        tokio::time::sleep(self.settle).await;

        if let Ok(Some(status)) = child.try_wait() {
            warn!(%status, "Tor exited during startup");
            return false;
        }
        if !probe(&self.proxy).await {
            warn!(addr = %self.proxy.socket_addr(), "Tor SOCKS port not reachable");
            if let Err(e) = child.kill().await {
                debug!(error = %e, "Failed to kill Tor");
            }
            return false;
        }

        *guard = Some(RunningTor {
            child,
            _data_dir: data_dir,
        });
        self.running.store(true, Ordering::SeqCst);
        info!(proxy = %self.proxy.url(), "Tor ready");
        true
    }

    async fn stop(&self) -> bool {
        let mut guard = self.process.lock().await;
        let Some(mut running) = guard.take() else {
            return true;
        };
        self.running.store(false, Ordering::SeqCst);

        match running.child.kill().await {
            Ok(()) => {
                info!("Tor stopped");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to stop Tor");
                false
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
