use serde::Serialize;

use super::cookies::CredentialStore;
use crate::oauth::AuthClient;
use crate::types::TwitterUser;

/// Snapshot of the caller's login state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<TwitterUser>,
}

impl SessionStatus {
    #[must_use]
    pub fn authenticated(user: TwitterUser) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
        }
    }

    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            user: None,
        }
    }
}

/// Re-verifies the stored access credential against the platform.
///
/// A rejected credential is cleared together with the profile and any
/// leftover temporary credential. Without a consumer key nothing can be
/// verified, so the store is returned untouched.
pub async fn check(client: Option<&AuthClient>, store: CredentialStore) -> (CredentialStore, SessionStatus) {
    let Some(access) = store.access() else {
        return (store, SessionStatus::unauthenticated());
    };

    let Some(client) = client else {
        tracing::error!("Twitter API credentials not configured; session cannot be verified");
        return (store, SessionStatus::unauthenticated());
    };

    match client.verify_credentials(&access).await {
        Ok(user) => {
            let store = if store.profile().as_ref() == Some(&user) {
                store
            } else {
                store.put_profile(&user)
            };
            (store, SessionStatus::authenticated(user))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session verification failed");
            let store = store.clear_session().clear_temporary();
            (store, SessionStatus::unauthenticated())
        }
    }
}

/// Clears the access credential and profile. Always succeeds.
#[must_use]
pub fn logout(store: CredentialStore) -> CredentialStore {
    store.clear_session()
}
