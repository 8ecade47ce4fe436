//! OAuth2 state shared by the HTTP handlers.

use crate::oauth2::flow::FlowController;
use crate::registry::CredentialRegistry;
use crate::session::{Session, SessionStore};
use std::sync::Arc;

/// Everything the authorization endpoints need: the flow controller over the
/// credential registry, and the store backing browser sessions.
#[derive(Clone)]
pub struct OAuth2State {
    pub flow: FlowController,
    pub sessions: Arc<dyn SessionStore>,
}

impl OAuth2State {
    pub fn new(registry: Arc<CredentialRegistry>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            flow: FlowController::new(registry),
            sessions,
        }
    }

    pub fn session(&self, session_id: &str) -> Session<'_> {
        Session::new(self.sessions.as_ref(), session_id)
    }
}
