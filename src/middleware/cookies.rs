use std::convert::Infallible;

use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::types::{AccessCredential, TemporaryCredential, TwitterUser};

pub const TEMP_TOKEN_COOKIE: &str = "oauth_token";
pub const TEMP_SECRET_COOKIE: &str = "oauth_token_secret";
pub const ACCESS_TOKEN_COOKIE: &str = "twitter_access_token";
pub const ACCESS_SECRET_COOKIE: &str = "twitter_access_secret";
pub const PROFILE_COOKIE: &str = "twitter_user";

const SESSION_PATH: &str = "/";

/// Access-control tags for one stored entry.
///
/// `http_only` also selects the jar: hidden entries are encrypted and
/// authenticated with the server's cookie key, visible ones are stored as
/// plain text for page script to read.
#[derive(Debug, Clone)]
pub struct EntryAttributes {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Option<Duration>,
}

/// Cookie attributes derived from the server settings.
#[derive(Debug, Clone)]
pub(crate) struct CookiePolicy {
    pub(crate) secure: bool,
    pub(crate) temporary_path: String,
    pub(crate) temporary_ttl: Duration,
    pub(crate) session_ttl: Duration,
}

impl CookiePolicy {
    fn temporary(&self) -> EntryAttributes {
        EntryAttributes {
            http_only: true,
            secure: self.secure,
            same_site: SameSite::Lax,
            path: self.temporary_path.clone(),
            max_age: Some(self.temporary_ttl),
        }
    }

    fn credential(&self) -> EntryAttributes {
        EntryAttributes {
            http_only: true,
            secure: self.secure,
            same_site: SameSite::Lax,
            path: SESSION_PATH.into(),
            max_age: Some(self.session_ttl),
        }
    }

    fn profile(&self) -> EntryAttributes {
        EntryAttributes {
            http_only: false,
            ..self.credential()
        }
    }
}

/// Where the browser stands in the login handshake, as far as its cookies tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No handshake in flight and no session.
    Idle,
    /// A temporary credential is waiting for the user's approval.
    TempIssued,
    /// An access credential is stored.
    Established,
}

/// Credential store over the request's cookies.
///
/// Reads see the cookies the browser sent; writes accumulate as
/// `Set-Cookie` headers emitted when the store is returned from a handler.
pub struct CredentialStore {
    sealed: PrivateCookieJar,
    open: CookieJar,
    policy: CookiePolicy,
}

impl CredentialStore {
    pub(crate) fn new(sealed: PrivateCookieJar, open: CookieJar, policy: CookiePolicy) -> Self {
        Self {
            sealed,
            open,
            policy,
        }
    }

    /// Stores `value` under `key` with the given attributes.
    #[must_use]
    pub fn set(mut self, key: &str, value: &str, attributes: &EntryAttributes) -> Self {
        let mut builder = Cookie::build((key.to_string(), value.to_string()))
            .http_only(attributes.http_only)
            .secure(attributes.secure)
            .same_site(attributes.same_site)
            .path(attributes.path.clone());
        if let Some(max_age) = attributes.max_age {
            builder = builder.max_age(max_age);
        }

        if attributes.http_only {
            self.sealed = self.sealed.add(builder.build());
        } else {
            self.open = self.open.add(builder.build());
        }
        self
    }

    /// Hidden entries first, then visible ones. A hidden entry that fails
    /// to decrypt reads as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.sealed_value(key).or_else(|| self.open_value(key))
    }

    /// Removes `key` at `path`. Removing an absent entry is a no-op.
    ///
    /// Removal cookies carry no value, so they go through the plain jar for
    /// both kinds of entry.
    #[must_use]
    pub fn clear(mut self, key: &str, path: &str) -> Self {
        self.open = self
            .open
            .remove(Cookie::build((key.to_string(), "")).path(path.to_string()));
        self
    }

    #[must_use]
    pub fn temporary(&self) -> Option<TemporaryCredential> {
        Some(TemporaryCredential {
            request_token: self.sealed_value(TEMP_TOKEN_COOKIE)?,
            request_token_secret: self.sealed_value(TEMP_SECRET_COOKIE)?,
        })
    }

    /// Stores a new temporary credential, replacing any earlier one.
    #[must_use]
    pub fn put_temporary(self, temporary: &TemporaryCredential) -> Self {
        let attributes = self.policy.temporary();
        self.set(TEMP_TOKEN_COOKIE, &temporary.request_token, &attributes)
            .set(TEMP_SECRET_COOKIE, &temporary.request_token_secret, &attributes)
    }

    #[must_use]
    pub fn clear_temporary(self) -> Self {
        let path = self.policy.temporary_path.clone();
        self.clear(TEMP_TOKEN_COOKIE, &path)
            .clear(TEMP_SECRET_COOKIE, &path)
    }

    /// The access credential, only if both halves are present and intact.
    #[must_use]
    pub fn access(&self) -> Option<AccessCredential> {
        Some(AccessCredential {
            access_token: self.sealed_value(ACCESS_TOKEN_COOKIE)?,
            access_secret: self.sealed_value(ACCESS_SECRET_COOKIE)?,
        })
    }

    #[must_use]
    pub fn put_access(self, access: &AccessCredential) -> Self {
        let attributes = self.policy.credential();
        self.set(ACCESS_TOKEN_COOKIE, &access.access_token, &attributes)
            .set(ACCESS_SECRET_COOKIE, &access.access_secret, &attributes)
    }

    /// Cached profile for display. Unparsable JSON reads as absent.
    #[must_use]
    pub fn profile(&self) -> Option<TwitterUser> {
        let raw = self.open_value(PROFILE_COOKIE)?;
        serde_json::from_str(&raw).ok()
    }

    #[must_use]
    pub fn put_profile(self, user: &TwitterUser) -> Self {
        match serde_json::to_string(user) {
            Ok(json) => {
                let attributes = self.policy.profile();
                self.set(PROFILE_COOKIE, &json, &attributes)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Profile serialization failed");
                self
            }
        }
    }

    /// Drops the access credential together with the profile that depends on it.
    #[must_use]
    pub fn clear_session(self) -> Self {
        self.clear(ACCESS_TOKEN_COOKIE, SESSION_PATH)
            .clear(ACCESS_SECRET_COOKIE, SESSION_PATH)
            .clear(PROFILE_COOKIE, SESSION_PATH)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.access().is_some() {
            SessionPhase::Established
        } else if self.temporary().is_some() {
            SessionPhase::TempIssued
        } else {
            SessionPhase::Idle
        }
    }

    fn sealed_value(&self, key: &str) -> Option<String> {
        self.sealed
            .get(key)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn open_value(&self, key: &str) -> Option<String> {
        self.open
            .get(key)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl IntoResponseParts for CredentialStore {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let res = self.sealed.into_response_parts(res)?;
        self.open.into_response_parts(res)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::{HeaderMap, HeaderValue};
    use axum::response::IntoResponse;
    use axum_extra::extract::cookie::Key;

    use super::*;

    fn policy() -> CookiePolicy {
        CookiePolicy {
            secure: false,
            temporary_path: "/api/auth".into(),
            temporary_ttl: Duration::minutes(15),
            session_ttl: Duration::days(30),
        }
    }

    fn empty_store(key: &Key) -> CredentialStore {
        CredentialStore::new(PrivateCookieJar::new(key.clone()), CookieJar::new(), policy())
    }

    /// Replays the `Set-Cookie` headers of `store` as a request `Cookie` header.
    fn round_trip(store: CredentialStore, key: &Key) -> CredentialStore {
        let response = (store, ()).into_response();
        let pairs: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter(|pair| pair.split_once('=').is_some_and(|(_, value)| !value.is_empty()))
            .map(str::to_string)
            .collect();

        let mut headers = HeaderMap::new();
        if !pairs.is_empty() {
            headers.insert(COOKIE, HeaderValue::from_str(&pairs.join("; ")).unwrap());
        }
        CredentialStore::new(
            PrivateCookieJar::from_headers(&headers, key.clone()),
            CookieJar::from_headers(&headers),
            policy(),
        )
    }

    fn access() -> AccessCredential {
        AccessCredential {
            access_token: "acc-token".into(),
            access_secret: "acc-secret".into(),
        }
    }

    #[test]
    fn test_empty_store_is_idle() {
        let key = Key::generate();
        let store = empty_store(&key);
        assert_eq!(store.phase(), SessionPhase::Idle);
        assert!(store.access().is_none());
        assert!(store.profile().is_none());
    }

    #[test]
    fn test_temporary_round_trip() {
        let key = Key::generate();
        let temporary = TemporaryCredential {
            request_token: "req".into(),
            request_token_secret: "req-secret".into(),
        };
        let store = round_trip(empty_store(&key).put_temporary(&temporary), &key);

        assert_eq!(store.temporary(), Some(temporary));
        assert_eq!(store.phase(), SessionPhase::TempIssued);
    }

    #[test]
    fn test_access_and_profile_round_trip() {
        let key = Key::generate();
        let user = TwitterUser::new("42", "Alice, \"A\"", "alice");
        let store = round_trip(empty_store(&key).put_access(&access()).put_profile(&user), &key);

        assert_eq!(store.access(), Some(access()));
        assert_eq!(store.profile(), Some(user));
        assert_eq!(store.phase(), SessionPhase::Established);
    }

    #[test]
    fn test_credentials_are_not_readable_without_key() {
        let key = Key::generate();
        let store = round_trip(empty_store(&key).put_access(&access()), &key);
        assert!(store.access().is_some());

        let other_key = Key::generate();
        let response = (empty_store(&key).put_access(&access()), ()).into_response();
        let raw: Vec<&str> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert!(raw.iter().all(|c| !c.contains("acc-secret")));
        assert!(raw.iter().all(|c| c.contains("HttpOnly")));

        let stolen = round_trip(empty_store(&key).put_access(&access()), &other_key);
        assert!(stolen.access().is_none());
    }

    #[test]
    fn test_half_access_pair_reads_as_absent() {
        let key = Key::generate();
        let attributes = policy().credential();
        let store = empty_store(&key).set(ACCESS_TOKEN_COOKIE, "only-token", &attributes);
        let store = round_trip(store, &key);

        assert!(store.access().is_none());
        assert_eq!(store.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_profile_cookie_is_script_readable() {
        let key = Key::generate();
        let user = TwitterUser::new("42", "Alice", "alice");
        let response = (empty_store(&key).put_profile(&user), ()).into_response();
        let header = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();

        assert!(header.starts_with("twitter_user="));
        assert!(!header.contains("HttpOnly"));
        assert!(header.contains("Max-Age=2592000"));
    }

    #[test]
    fn test_clear_session_emits_removals() {
        let key = Key::generate();
        let user = TwitterUser::new("42", "Alice", "alice");
        let store = round_trip(empty_store(&key).put_access(&access()).put_profile(&user), &key);

        let response = (store.clear_session(), ()).into_response();
        let removed: Vec<&str> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(|c| c.contains("Max-Age=0"))
            .filter_map(|c| c.split('=').next())
            .collect();

        assert_eq!(removed.len(), 3);
        for name in [ACCESS_TOKEN_COOKIE, ACCESS_SECRET_COOKIE, PROFILE_COOKIE] {
            assert!(removed.contains(&name), "{name} should be removed");
        }
    }

    #[test]
    fn test_clear_absent_entry_is_noop() {
        let key = Key::generate();
        let response = (empty_store(&key).clear_session().clear_temporary(), ()).into_response();
        assert!(response.headers().get(SET_COOKIE).is_none());
    }
}
