/**
 * CHANGE DETECTOR - decides whether a probe outcome is worth announcing
 *
 * ROLE:
 * Remembers the last *notified* state and compares every new probe outcome
 * against it. Only reachability and the two player counts take part in the
 * comparison; roster changes alone are noise.
 *
 * OWNERSHIP:
 * `evaluate` takes `&mut self`, so whoever owns the detector is its only
 * writer. The poll task owns it; the on-demand command path never sees it.
 */

use crate::models::{LastKnown, Notification, ObservedState, ProbeOutcome};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_known: LastKnown,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_known(&self) -> LastKnown {
        self.last_known
    }

    /// Compares `outcome` with the last notified state. Returns the
    /// notification to send and remembers the new state, or returns `None`
    /// and leaves the remembered state untouched.
    pub fn evaluate(&mut self, outcome: &ProbeOutcome) -> Option<Notification> {
        let now = self.observe(outcome);
        let last = self.last_known;

        let changed = Some(now.reachable) != last.reachable
            || (now.reachable
                && (Some(now.online) != last.online || now.capacity != last.capacity));

        if !changed {
            debug!(reachable = now.reachable, online = now.online, "no status change");
            return None;
        }

        let notification = match outcome {
            ProbeOutcome::Snapshot(snapshot) => Notification::Online(snapshot.clone()),
            ProbeOutcome::Failure(_) => Notification::Offline,
        };
        self.last_known = LastKnown::from(now);
        info!(
            reachable = now.reachable,
            online = now.online,
            capacity = ?now.capacity,
            "status transition"
        );
        Some(notification)
    }

    // Capacity is not observable while unreachable: keep the last known one.
    fn observe(&self, outcome: &ProbeOutcome) -> ObservedState {
        match outcome {
            ProbeOutcome::Snapshot(snapshot) => ObservedState {
                reachable: true,
                online: snapshot.online,
                capacity: Some(snapshot.capacity),
            },
            ProbeOutcome::Failure(_) => ObservedState {
                reachable: false,
                online: 0,
                capacity: self.last_known.capacity,
            },
        }
    }
}
