//! Session state machine
//!
//! ```text
//! INITIALIZING --install ok--> ACTIVE --modify--> MODIFYING --applied--> ACTIVE
//!      |                          |
//!      +--install failed--+       +--delete--> DELETING --torn down--+
//!                         v                                          v
//!                      DELETED <-------------------------------------+
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Initializing,
    Active,
    Modifying,
    Deleting,
    Deleted,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Initializing => "SESSION_STATE_INITIALIZING",
            SessionState::Active => "SESSION_STATE_ACTIVE",
            SessionState::Modifying => "SESSION_STATE_MODIFYING",
            SessionState::Deleting => "SESSION_STATE_DELETING",
            SessionState::Deleted => "SESSION_STATE_DELETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == SessionState::Deleted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsmEvent {
    InstallSucceeded,
    InstallFailed,
    ModifyRequested,
    ModifyApplied,
    ModifyFailed,
    DeleteRequested,
    TeardownDone,
}

impl GsmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GsmEvent::InstallSucceeded => "GSM_EVT_INSTALL_SUCCEEDED",
            GsmEvent::InstallFailed => "GSM_EVT_INSTALL_FAILED",
            GsmEvent::ModifyRequested => "GSM_EVT_MODIFY_REQUESTED",
            GsmEvent::ModifyApplied => "GSM_EVT_MODIFY_APPLIED",
            GsmEvent::ModifyFailed => "GSM_EVT_MODIFY_FAILED",
            GsmEvent::DeleteRequested => "GSM_EVT_DELETE_REQUESTED",
            GsmEvent::TeardownDone => "GSM_EVT_TEARDOWN_DONE",
        }
    }
}

/// Next state for `event` in `state`, `None` when the event is not allowed
pub fn next_state(state: SessionState, event: GsmEvent) -> Option<SessionState> {
    use GsmEvent::*;
    use SessionState::*;

    match (state, event) {
        (Initializing, InstallSucceeded) => Some(Active),
        (Initializing, InstallFailed) => Some(Deleted),
        (Active, ModifyRequested) => Some(Modifying),
        (Modifying, ModifyApplied) | (Modifying, ModifyFailed) => Some(Active),
        (Active, DeleteRequested) | (Modifying, DeleteRequested) => Some(Deleting),
        (Deleting, TeardownDone) => Some(Deleted),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = SessionState::Initializing;
        for (event, expected) in [
            (GsmEvent::InstallSucceeded, SessionState::Active),
            (GsmEvent::ModifyRequested, SessionState::Modifying),
            (GsmEvent::ModifyApplied, SessionState::Active),
            (GsmEvent::DeleteRequested, SessionState::Deleting),
            (GsmEvent::TeardownDone, SessionState::Deleted),
        ] {
            state = next_state(state, event).unwrap();
            assert_eq!(state, expected);
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failed_install_goes_to_deleted() {
        assert_eq!(
            next_state(SessionState::Initializing, GsmEvent::InstallFailed),
            Some(SessionState::Deleted)
        );
    }

    #[test]
    fn test_failed_modify_returns_to_active() {
        assert_eq!(
            next_state(SessionState::Modifying, GsmEvent::ModifyFailed),
            Some(SessionState::Active)
        );
    }

    #[test]
    fn test_rejected_transitions() {
        assert_eq!(next_state(SessionState::Initializing, GsmEvent::DeleteRequested), None);
        assert_eq!(next_state(SessionState::Deleting, GsmEvent::ModifyRequested), None);
        assert_eq!(next_state(SessionState::Deleted, GsmEvent::DeleteRequested), None);
        assert_eq!(next_state(SessionState::Active, GsmEvent::InstallSucceeded), None);
        assert_eq!(next_state(SessionState::Active, GsmEvent::ModifyFailed), None);
        assert_eq!(next_state(SessionState::Deleting, GsmEvent::ModifyApplied), None);
    }
}
