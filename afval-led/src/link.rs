//! Network link on a Linux host.

use std::time::Duration;

use afval_core::{Link, PortError};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Considers the link up when a TCP connection to `probe` succeeds.
pub(crate) struct HostLink {
    probe: String,
}

impl HostLink {
    pub(crate) fn new(probe: impl Into<String>) -> Self {
        Self {
            probe: probe.into(),
        }
    }
}

#[async_trait]
impl Link for HostLink {
    async fn is_up(&self) -> bool {
        matches!(
            timeout(PROBE_TIMEOUT, TcpStream::connect(self.probe.as_str())).await,
            Ok(Ok(_))
        )
    }

    async fn connect(&self, ssid: &str, password: &str) -> Result<(), PortError> {
        if ssid.is_empty() {
            log::debug!("No wifi network configured, leaving the link to the host");
            return Ok(());
        }

        log::info!("Connecting to {ssid}");
        let mut command = Command::new("nmcli");
        command
            .args(["device", "wifi", "connect", ssid])
            .kill_on_drop(true);
        if !password.is_empty() {
            command.args(["password", password]);
        }

        let status = timeout(CONNECT_TIMEOUT, command.status())
            .await
            .map_err(|_elapsed| PortError::Timeout)??;
        if status.success() {
            Ok(())
        } else {
            log::warn!("nmcli exited with {status}");
            Err(PortError::LinkDown)
        }
    }
}
