/**
 * STATUS POLLER - supervised periodic probe-and-notify task
 *
 * The poller owns the only `ChangeDetector`. One cycle = probe, evaluate,
 * deliver. Cycles never overlap: the next tick is awaited only after the
 * previous cycle returned, and late ticks are delayed rather than bursted.
 * Delivery failures and panics inside a cycle are logged; the loop keeps
 * going.
 */

use crate::detector::ChangeDetector;
use crate::health::WatchHealth;
use crate::models::Notification;
use crate::notify::Notifier;
use crate::prober::Prober;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub struct StatusPoller {
    detector: ChangeDetector,
    prober: Arc<dyn Prober>,
    notifier: Option<Arc<dyn Notifier>>,
    health: WatchHealth,
}

impl StatusPoller {
    pub fn new(prober: Arc<dyn Prober>, notifier: Option<Arc<dyn Notifier>>, health: WatchHealth) -> Self {
        Self {
            detector: ChangeDetector::new(),
            prober,
            notifier,
            health,
        }
    }

    /// Runs one cycle and returns the transition it produced, if any.
    /// The detector has already moved on when delivery is attempted.
    pub async fn run_cycle(&mut self) -> Option<Notification> {
        let outcome = self.prober.probe().await;
        self.health.record_cycle();

        let notification = self.detector.evaluate(&outcome)?;
        match &self.notifier {
            Some(notifier) => match notifier.deliver(&notification).await {
                Ok(()) => {
                    self.health.record_notification();
                    info!(reachable = outcome.is_reachable(), "status change posted");
                }
                Err(e) => {
                    self.health.record_delivery_failure();
                    warn!(error = %e, "status change not delivered, dropping it");
                }
            },
            None => debug!("no notification destination configured, transition not posted"),
        }
        Some(notification)
    }

    /// Moves the poller into a background task ticking every `period`.
    /// The first cycle runs immediately and sets the baseline.
    pub fn spawn(mut self, period: Duration) -> JoinHandle<()> {
        task::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(panic) = AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                    error!(panic = panic_message(panic.as_ref()), "poll cycle panicked");
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
