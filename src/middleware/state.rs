use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AppSettings;
use crate::generate::GenerationClient;
use crate::oauth::AuthClient;
use crate::twitter::TwitterClient;

/// Shared state for route handlers. Immutable after startup.
#[derive(Clone)]
pub(crate) struct AppState {
    /// `None` when no consumer key is configured.
    pub(crate) auth: Option<Arc<AuthClient>>,
    pub(crate) twitter: Arc<TwitterClient>,
    pub(crate) generator: Arc<GenerationClient>,
    pub(crate) settings: AppSettings,
}

impl AppState {
    pub(crate) fn auth_client(&self) -> Option<&AuthClient> {
        self.auth.as_deref()
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.settings.cookie_key.clone()
    }
}
