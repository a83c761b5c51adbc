use url::Url;

use super::cookies::CredentialStore;
use crate::oauth::AuthClient;
use crate::types::TwitterUser;

/// How the user came back from the authorization page.
#[derive(Debug, Clone, Copy)]
pub enum Continuation<'a> {
    /// Redirect style: the platform appended the token and verifier to the callback.
    Callback { token: &'a str, verifier: &'a str },
    /// Out-of-band style: the user typed the PIN shown by the platform.
    Pin { pin: &'a str },
}

/// Why a handshake step failed. No state is written when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("Twitter API credentials not configured")]
    NotConfigured,

    /// No temporary credential in the store (expired or never issued).
    #[error("Missing OAuth tokens")]
    MissingState,

    /// The returned token is not the one this browser was issued.
    #[error("OAuth token mismatch")]
    TokenMismatch,

    #[error("Authentication failed")]
    Exchange(#[source] crate::Error),

    #[error("Failed to initialize Twitter auth")]
    Initiate(#[source] crate::Error),
}

/// Obtains a temporary credential and stores it, returning the page the
/// user must visit to approve it.
///
/// # Errors
///
/// [`HandshakeError::NotConfigured`] without a consumer key,
/// [`HandshakeError::Initiate`] if the platform refuses. The store is
/// dropped unchanged in both cases.
pub async fn initiate(
    client: Option<&AuthClient>,
    store: CredentialStore,
) -> Result<(CredentialStore, Url), HandshakeError> {
    let client = client.ok_or(HandshakeError::NotConfigured)?;

    let temporary = client
        .request_token()
        .await
        .map_err(HandshakeError::Initiate)?;
    let url = client.authorization_url(&temporary);

    tracing::debug!(request_token = %temporary.request_token, "Temporary credential issued");
    Ok((store.put_temporary(&temporary), url))
}

/// Trades the stored temporary credential and the user's verifier for an
/// access credential, then loads the profile it belongs to.
///
/// On success the store holds the access pair and profile and no longer
/// holds the temporary pair. On failure nothing is written.
///
/// # Errors
///
/// Checked in order: [`HandshakeError::MissingState`],
/// [`HandshakeError::TokenMismatch`], [`HandshakeError::NotConfigured`],
/// then [`HandshakeError::Exchange`] for any upstream failure.
pub async fn complete(
    client: Option<&AuthClient>,
    store: CredentialStore,
    continuation: Continuation<'_>,
) -> Result<(CredentialStore, TwitterUser), HandshakeError> {
    let temporary = store.temporary().ok_or(HandshakeError::MissingState)?;

    let verifier = match continuation {
        Continuation::Callback { token, verifier } => {
            if token != temporary.request_token {
                return Err(HandshakeError::TokenMismatch);
            }
            verifier
        }
        Continuation::Pin { pin } => pin,
    };

    let client = client.ok_or(HandshakeError::NotConfigured)?;

    let access = client
        .exchange_verifier(&temporary, verifier)
        .await
        .map_err(HandshakeError::Exchange)?;
    let user = client
        .verify_credentials(&access)
        .await
        .map_err(HandshakeError::Exchange)?;

    tracing::info!(user_id = %user.id, username = %user.username, "Twitter login successful");

    let store = store
        .clear_temporary()
        .put_access(&access)
        .put_profile(&user);
    Ok((store, user))
}
