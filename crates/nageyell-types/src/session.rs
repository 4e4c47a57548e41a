use serde::{Deserialize, Serialize};

use crate::{
    frame::Facing,
    record::{FormState, POINT_MIN},
    status::Status,
};

/// Scan controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScanPhase {
    #[default]
    Idle,
    Streaming,
    Detected,
}

/// Everything a session knows. Written only by the controllers that own each field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub credential: Option<String>,
    pub message: String,
    pub point: i64,
    /// Transient status from write attempts and message generation.
    pub status: Option<Status>,
    /// Last scan outcome, kept until the next scan starts.
    pub scan_status: Option<Status>,
    pub scanning: bool,
    pub generating: bool,
    pub facing: Facing,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            credential: None,
            message: String::new(),
            point: POINT_MIN,
            status: None,
            scan_status: None,
            scanning: false,
            generating: false,
            facing: Facing::default(),
        }
    }
}

impl SessionState {
    pub fn with_facing(facing: Facing) -> Self {
        Self {
            facing,
            ..Self::default()
        }
    }

    pub fn form(&self) -> FormState {
        FormState::new(self.message.clone(), self.point)
    }

    pub fn has_credential(&self) -> bool {
        self.credential.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fresh_session() {
        let state = SessionState::default();
        assert_eq!(state.point, 1);
        assert!(state.message.is_empty());
        assert!(state.status.is_none());
        assert!(!state.scanning);
        assert!(!state.has_credential());
        assert_eq!(state.facing, Facing::Environment);
    }

    #[test]
    fn empty_credential_is_not_usable() {
        let state = SessionState {
            credential: Some(String::new()),
            ..SessionState::default()
        };
        assert!(!state.has_credential());
    }
}
