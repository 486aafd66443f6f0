use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Free hosting tiers idle a service after ~15 minutes without traffic.
pub const SELF_PING_PERIOD: Duration = Duration::from_secs(14 * 60);

/// GETs our own public URL every `period` so the host keeps us awake.
/// Failures are ignored.
pub fn spawn_self_ping(http: reqwest::Client, url: String, period: Duration) -> JoinHandle<()> {
    task::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match http.get(&url).send().await {
                Ok(response) => debug!(status = response.status().as_u16(), "self-ping sent"),
                Err(e) => debug!(error = %e, "self-ping failed"),
            }
        }
    })
}
