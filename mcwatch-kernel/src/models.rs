use serde::Serialize;

/// What one successful probe saw. Reachability is implied: only a
/// successful probe produces a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub online: u32,
    pub capacity: u32,
    /// Roster sample as sent by the server; may be empty or shorter than
    /// `online` (servers can hide it).
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub reason: String,
}

/// Result of exactly one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Snapshot(Snapshot),
    Failure(ProbeFailure),
}

impl ProbeOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(ProbeFailure { reason: reason.into() })
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }
}

/// The part of an outcome that takes part in change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedState {
    pub reachable: bool,
    pub online: u32,
    /// `None` only when the server has never been seen online.
    pub capacity: Option<u32>,
}

/// Most recently notified state. Everything is unknown until the first
/// notification goes out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastKnown {
    pub reachable: Option<bool>,
    pub online: Option<u32>,
    pub capacity: Option<u32>,
}

impl From<ObservedState> for LastKnown {
    fn from(state: ObservedState) -> Self {
        Self {
            reachable: Some(state.reachable),
            online: Some(state.online),
            capacity: state.capacity,
        }
    }
}

/// A state transition worth announcing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Online(Snapshot),
    Offline,
}

impl Notification {
    /// Chat text for this transition.
    pub fn render(&self) -> String {
        match self {
            Self::Online(snapshot) => crate::format::online_announcement(snapshot),
            Self::Offline => crate::format::OFFLINE_ANNOUNCEMENT.to_string(),
        }
    }
}
