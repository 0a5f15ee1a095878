use std::fmt;
use std::time::Instant;

use tracing::{info, warn};

use crate::alarm::AlarmBaseline;
use crate::config::DeviceConfig;

pub mod state;
use state::SessionState;

/// Opaque token issued by the device after login and embedded in command paths.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// One authenticated conversation with one device.
///
/// Only the handshake installs a token; the dispatcher clears it when the
/// device reports the session as expired. Nothing here outlives the process.
#[derive(Debug)]
pub struct Session {
    config: DeviceConfig,
    token: Option<SessionToken>,
    state: SessionState,
    baseline: AlarmBaseline,
}

impl Session {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            token: None,
            state: SessionState::Unauthenticated,
            baseline: AlarmBaseline::Uninitialized,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn baseline(&self) -> AlarmBaseline {
        self.baseline
    }

    /// When the current token was installed; `None` unless authenticated.
    pub fn authenticated_since(&self) -> Option<Instant> {
        match self.state {
            SessionState::Authenticated { since } => Some(since),
            _ => None,
        }
    }

    /// Every state may move to `Authenticated`, so a fresh token always replaces the old one.
    pub(crate) fn install_token(&mut self, token: SessionToken) {
        self.state = SessionState::Authenticated {
            since: Instant::now(),
        };
        self.token = Some(token);
        info!(device = %self.config.address, "session token installed");
    }

    /// Drops the token after the device reported it as no longer valid.
    ///
    /// The alarm baseline is device configuration, not session state, and is kept.
    pub(crate) fn invalidate(&mut self) {
        if self.token.take().is_some() {
            warn!(device = %self.config.address, "device rejected session token");
        }
        if let Ok(next) = self.state.transition(SessionState::Expired) {
            self.state = next;
        }
    }

    pub(crate) fn mark_baseline_set(&mut self) {
        self.baseline = AlarmBaseline::BaselineSet;
    }
}
