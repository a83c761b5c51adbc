use reqwest::header::AUTHORIZATION;
use url::Url;

use crate::error::{Error, ensure_success};
use crate::signature::{ConsumerKey, RequestSigner};
use crate::types::{AccessCredential, Envelope, TemporaryCredential, TwitterUser};

/// Production API host for both the OAuth 1.0a endpoints and the v2 API.
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/";

const PROFILE_FIELDS: &str = "profile_image_url,name,username";

/// Twitter OAuth 1.0a configuration.
///
/// Required fields are constructor parameters, so there are no runtime
/// "missing field" errors.
///
/// ```rust,ignore
/// use tweet_mimic::{ConsumerKey, OAuthConfig};
///
/// let config = OAuthConfig::new(
///     ConsumerKey::new("api-key", "api-secret"),
///     "https://my-app.com/api/auth/twitter/callback".parse()?,
/// );
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) consumer: ConsumerKey,
    pub(crate) callback_url: Url,
    pub(crate) api_base: Url,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(consumer: ConsumerKey, callback_url: Url) -> Self {
        Self {
            consumer,
            callback_url,
            api_base: DEFAULT_API_BASE.parse().expect("valid default URL"),
        }
    }

    /// Override the API host (used to point at a local stand-in).
    #[must_use]
    pub fn with_api_base(mut self, url: Url) -> Self {
        self.api_base = with_trailing_slash(url);
        self
    }

    #[must_use]
    pub fn consumer(&self) -> &ConsumerKey {
        &self.consumer
    }

    /// Where the platform sends the user back after authorization.
    #[must_use]
    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub(crate) fn endpoint(&self, path: &str) -> Url {
        self.api_base.join(path).expect("valid endpoint path")
    }
}

/// Joined paths replace the last segment unless the base ends in `/`.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// OAuth 1.0a client for the three-legged handshake and the identity lookup.
pub struct AuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Step 1: obtain a temporary credential bound to the configured callback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, a classified error for a
    /// non-success status, or [`Error::Decode`] if the platform did not
    /// confirm the callback.
    pub async fn request_token(&self) -> Result<TemporaryCredential, Error> {
        let url = self.config.endpoint("oauth/request_token");
        let header = RequestSigner::new(&self.config.consumer)
            .with_protocol_param("oauth_callback", self.config.callback_url.as_str())
            .authorization_header("POST", &url, &[]);

        let response = self.http.post(url).header(AUTHORIZATION, header).send().await?;
        let body = ensure_success(response, "request token").await?.text().await?;
        let fields = TokenFields::parse(&body);

        if fields.callback_confirmed.as_deref() != Some("true") {
            return Err(Error::decode("request token", "callback not confirmed"));
        }
        let (request_token, request_token_secret) = fields.into_pair("request token")?;

        Ok(TemporaryCredential {
            request_token,
            request_token_secret,
        })
    }

    /// Step 2: the page the user visits to approve the temporary credential.
    #[must_use]
    pub fn authorization_url(&self, temporary: &TemporaryCredential) -> Url {
        let mut url = self.config.endpoint("oauth/authenticate");
        url.query_pairs_mut()
            .append_pair("oauth_token", &temporary.request_token);
        url
    }

    /// Step 3: trade the temporary credential and verifier for an access credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for a rejected verifier or expired
    /// temporary credential, [`Error::Http`] on network failure.
    pub async fn exchange_verifier(
        &self,
        temporary: &TemporaryCredential,
        verifier: &str,
    ) -> Result<AccessCredential, Error> {
        let url = self.config.endpoint("oauth/access_token");
        let header = RequestSigner::new(&self.config.consumer)
            .with_token(&temporary.request_token, &temporary.request_token_secret)
            .with_protocol_param("oauth_verifier", verifier)
            .authorization_header("POST", &url, &[]);

        let response = self.http.post(url).header(AUTHORIZATION, header).send().await?;
        let body = ensure_success(response, "access token").await?.text().await?;
        let (access_token, access_secret) = TokenFields::parse(&body).into_pair("access token")?;

        Ok(AccessCredential {
            access_token,
            access_secret,
        })
    }

    /// Fetch the profile of the user the access credential belongs to.
    ///
    /// Doubles as credential verification: a revoked or expired pair yields
    /// [`Error::Unauthorized`].
    ///
    /// # Errors
    ///
    /// Returns a classified [`Error`] for any non-success response or an
    /// envelope without `data`.
    pub async fn verify_credentials(&self, access: &AccessCredential) -> Result<TwitterUser, Error> {
        let mut url = self.config.endpoint("2/users/me");
        url.query_pairs_mut().append_pair("user.fields", PROFILE_FIELDS);

        let header = self
            .signer(access)
            .authorization_header("GET", &url, &[]);

        let response = self.http.get(url).header(AUTHORIZATION, header).send().await?;
        let envelope = ensure_success(response, "users/me")
            .await?
            .json::<Envelope<TwitterUser>>()
            .await
            .map_err(|e| Error::decode("users/me", e))?;

        envelope.data.ok_or(Error::Unauthorized)
    }

    fn signer<'a>(&'a self, access: &'a AccessCredential) -> RequestSigner<'a> {
        RequestSigner::new(&self.config.consumer)
            .with_token(&access.access_token, &access.access_secret)
    }
}

/// Form-encoded token response of the OAuth 1.0a endpoints.
#[derive(Default)]
struct TokenFields {
    token: Option<String>,
    secret: Option<String>,
    callback_confirmed: Option<String>,
}

impl TokenFields {
    fn parse(body: &str) -> Self {
        let mut fields = Self::default();
        for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            match key.as_ref() {
                "oauth_token" => fields.token = Some(value.into_owned()),
                "oauth_token_secret" => fields.secret = Some(value.into_owned()),
                "oauth_callback_confirmed" => fields.callback_confirmed = Some(value.into_owned()),
                _ => {}
            }
        }
        fields
    }

    fn into_pair(self, operation: &'static str) -> Result<(String, String), Error> {
        match (self.token, self.secret) {
            (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
                Ok((token, secret))
            }
            _ => Err(Error::decode(operation, "missing oauth_token or oauth_token_secret")),
        }
    }
}
