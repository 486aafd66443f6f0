use crate::format;
use crate::models::ProbeOutcome;
use crate::prober::Prober;
use std::sync::Arc;

/// On-demand `players` answer. Holds only the prober, so it can never
/// reach the change detector's state.
#[derive(Clone)]
pub struct StatusQuery {
    prober: Arc<dyn Prober>,
}

impl StatusQuery {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Probes now and formats whatever came back. Always answers.
    pub async fn query_now(&self) -> String {
        match self.prober.probe().await {
            ProbeOutcome::Snapshot(snapshot) => format::online_reply(&snapshot),
            ProbeOutcome::Failure(_) => format::OFFLINE_REPLY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Snapshot;
    use async_trait::async_trait;

    struct Fixed(ProbeOutcome);

    #[async_trait]
    impl Prober for Fixed {
        async fn probe(&self) -> ProbeOutcome {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn online_reply_lists_names() {
        let query = StatusQuery::new(Arc::new(Fixed(ProbeOutcome::Snapshot(Snapshot {
            online: 3,
            capacity: 20,
            names: vec!["alex".into()],
        }))));
        assert_eq!(query.query_now().await, "🟢 **Server Online**\nPlayers: 3 / 20\nOnline: alex, ...");
    }

    #[tokio::test]
    async fn unchanged_state_is_still_reported() {
        let query = StatusQuery::new(Arc::new(Fixed(ProbeOutcome::Snapshot(Snapshot {
            online: 0,
            capacity: 8,
            names: vec![],
        }))));
        let first = query.query_now().await;
        assert_eq!(query.query_now().await, first);
        assert!(first.ends_with("Online: No player names available."));
    }

    #[tokio::test]
    async fn failure_gives_offline_reply() {
        let query = StatusQuery::new(Arc::new(Fixed(ProbeOutcome::failure("timed out"))));
        assert_eq!(query.query_now().await, "🔴 Server is offline or unreachable.");
    }
}
