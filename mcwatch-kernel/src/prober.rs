use crate::config::Target;
use crate::error::ProbeError;
use crate::models::{ProbeOutcome, Snapshot};
use crate::slp::{self, StatusResponse};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// One bounded query against the watched server. Implementations never
/// fail: every error becomes `ProbeOutcome::Failure`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self) -> ProbeOutcome;
}

/// Prober speaking Server List Ping. Stateless; clones share nothing.
#[derive(Debug, Clone)]
pub struct SlpProber {
    target: Target,
    timeout: Duration,
}

impl SlpProber {
    pub fn new(target: Target, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    async fn query(&self) -> Result<StatusResponse, ProbeError> {
        let exchange = slp::query_server_status(&self.target.host, self.target.port);
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout.as_millis())),
        }
    }
}

#[async_trait]
impl Prober for SlpProber {
    async fn probe(&self) -> ProbeOutcome {
        match self.query().await {
            Ok(status) => {
                if let Some(version) = &status.version {
                    debug!(target_addr = %self.target, version = %version.name, "status received");
                }
                ProbeOutcome::Snapshot(Snapshot::from(status))
            }
            Err(e) => {
                debug!(target_addr = %self.target, reason = %e, "probe failed");
                ProbeOutcome::failure(e.to_string())
            }
        }
    }
}

impl From<StatusResponse> for Snapshot {
    fn from(status: StatusResponse) -> Self {
        let names = status
            .players
            .sample
            .unwrap_or_default()
            .into_iter()
            .map(|player| player.name)
            .collect();
        Self {
            online: status.players.online,
            capacity: status.players.max,
            names,
        }
    }
}
