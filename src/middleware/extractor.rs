use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{CookieJar, Key};

use super::cookies::CredentialStore;
use super::error::ApiError;
use super::state::AppState;
use crate::types::{AccessCredential, TwitterUser};

impl FromRequestParts<AppState> for CredentialStore {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let sealed = PrivateCookieJar::<Key>::from_request_parts(parts, state).await?;
        let open = CookieJar::from_request_parts(parts, state).await?;
        Ok(CredentialStore::new(sealed, open, state.settings.cookie_policy()))
    }
}

/// Signed-in caller, read from the access cookies.
///
/// Returns `401 Unauthorized` if either half of the access credential is
/// missing or fails to decrypt. The credential is not re-verified with the
/// platform here; the upstream call that uses it does that.
///
/// # Example
///
/// ```rust,ignore
/// async fn whoami(session: AuthSession) -> impl IntoResponse {
///     match session.profile {
///         Some(user) => format!("Hello, @{}", user.username),
///         None => "Hello".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access: AccessCredential,
    /// Cached profile, if the browser still has it.
    pub profile: Option<TwitterUser>,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let store = match CredentialStore::from_request_parts(parts, state).await {
            Ok(store) => store,
            Err(never) => match never {},
        };

        let access = store.access().ok_or(ApiError::Unauthenticated)?;
        Ok(Self {
            access,
            profile: store.profile(),
        })
    }
}
