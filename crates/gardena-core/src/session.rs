// ── Shared session context ──
//
// The stream side writes the token and the mower service id; the bus
// command side reads them. Both live in one lock-free `ArcSwap` so a
// reader always sees a consistent pair.

use std::sync::Arc;

use arc_swap::ArcSwap;
use gardena_api::AccessToken;

use crate::error::CoreError;

/// Credentials of the current stream session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub token: Option<AccessToken>,
    pub service_id: Option<String>,
}

/// Cheaply cloneable handle to the session state.
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<ArcSwap<SessionState>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ArcSwap::from_pointee(SessionState::default())),
        }
    }

    /// Start a new session with `token`. The previous token and service
    /// id are dropped together.
    pub fn begin(&self, token: AccessToken) {
        self.state.store(Arc::new(SessionState {
            token: Some(token),
            service_id: None,
        }));
    }

    pub fn set_service_id(&self, service_id: String) {
        self.state.rcu(|current| SessionState {
            token: current.token.clone(),
            service_id: Some(service_id.clone()),
        });
    }

    /// Drop token and service id.
    pub fn invalidate(&self) {
        self.state.store(Arc::new(SessionState::default()));
    }

    pub fn current(&self) -> Arc<SessionState> {
        self.state.load_full()
    }

    /// The service id and a live token, as needed to dispatch a command.
    pub fn command_target(&self) -> Result<(String, AccessToken), CoreError> {
        let state = self.state.load();
        let service_id = state.service_id.clone().ok_or(CoreError::MissingServiceId)?;
        let token = state
            .token
            .as_ref()
            .filter(|t| !t.is_expired())
            .cloned()
            .ok_or(CoreError::NotAuthenticated)?;
        Ok((service_id, token))
    }
}
