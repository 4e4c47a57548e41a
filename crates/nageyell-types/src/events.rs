use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    frame::Facing,
    session::ScanPhase,
    status::{CommitOutcome, Status},
};

/// High-level event kinds moving through a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Scan,
    Credential,
    Status,
    Commit,
}

/// Immutable event envelope for logging and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    Scan(ScanEvent),
    /// Only the length is recorded; the credential itself never leaves the session.
    CredentialAcquired { length: usize },
    Status(Option<Status>),
    /// Scan outcome shown next to the camera; `None` when it expired.
    ScanStatus(Option<Status>),
    Commit(CommitOutcome),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    Start,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub phase: ScanPhase,
    pub facing: Facing,
}

impl SessionEvent {
    pub fn new(payload: EventPayload) -> Self {
        let kind = match &payload {
            EventPayload::Lifecycle(_) => EventKind::Lifecycle,
            EventPayload::Scan(_) => EventKind::Scan,
            EventPayload::CredentialAcquired { .. } => EventKind::Credential,
            EventPayload::Status(_) => EventKind::Status,
            EventPayload::ScanStatus(_) => EventKind::Scan,
            EventPayload::Commit(_) => EventKind::Commit,
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn lifecycle(phase: LifecyclePhase, details: impl Into<String>) -> Self {
        Self::new(EventPayload::Lifecycle(LifecycleEvent {
            phase,
            details: Some(details.into()),
        }))
    }

    pub fn scan(phase: ScanPhase, facing: Facing) -> Self {
        Self::new(EventPayload::Scan(ScanEvent { phase, facing }))
    }

    pub fn status(status: Option<Status>) -> Self {
        Self::new(EventPayload::Status(status))
    }

    pub fn scan_status(status: Option<Status>) -> Self {
        Self::new(EventPayload::ScanStatus(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_payload() {
        assert_eq!(
            SessionEvent::status(Some(Status::WriteSucceeded)).kind,
            EventKind::Status
        );
        assert_eq!(
            SessionEvent::scan(ScanPhase::Streaming, Facing::User).kind,
            EventKind::Scan
        );
        assert_eq!(
            SessionEvent::scan_status(Some(Status::CameraStopped)).kind,
            EventKind::Scan
        );
        assert_eq!(
            SessionEvent::new(EventPayload::CredentialAcquired { length: 3 }).kind,
            EventKind::Credential
        );
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = SessionEvent::new(EventPayload::Commit(CommitOutcome::Failed(
            "read-only".into(),
        )));
        let line = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.kind, EventKind::Commit);
    }
}
