use std::time::Instant;

use thiserror::Error;

/// Lifecycle of the device session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No login has succeeded yet.
    Unauthenticated,
    /// A token from a successful login is held.
    Authenticated { since: Instant },
    /// The device rejected the token; a new login is needed.
    Expired,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionStateError {
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated { .. } => "authenticated",
            SessionState::Expired => "expired",
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    /// Re-login from `Authenticated` is allowed and refreshes `since`.
    pub fn transition(&self, next: SessionState) -> Result<SessionState, SessionStateError> {
        use SessionState::*;
        match (self, &next) {
            (Unauthenticated, Authenticated { .. })
            | (Expired, Authenticated { .. })
            | (Authenticated { .. }, Authenticated { .. })
            | (Authenticated { .. }, Expired) => Ok(next),
            _ => Err(SessionStateError::InvalidTransition {
                from: self.name(),
                to: next.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_then_expire_then_login() {
        let state = SessionState::Unauthenticated;
        let state = state
            .transition(SessionState::Authenticated { since: Instant::now() })
            .unwrap();
        let state = state.transition(SessionState::Expired).unwrap();
        let state = state
            .transition(SessionState::Authenticated { since: Instant::now() })
            .unwrap();
        assert!(state.is_authenticated());
    }

    #[test]
    fn cannot_expire_without_token() {
        let err = SessionState::Unauthenticated
            .transition(SessionState::Expired)
            .unwrap_err();
        assert_eq!(
            err,
            SessionStateError::InvalidTransition {
                from: "unauthenticated",
                to: "expired"
            }
        );
        assert!(SessionState::Expired.transition(SessionState::Expired).is_err());
    }

    #[test]
    fn nothing_returns_to_unauthenticated() {
        let state = SessionState::Authenticated { since: Instant::now() };
        assert!(state.transition(SessionState::Unauthenticated).is_err());
    }
}
