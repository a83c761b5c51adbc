use axum_extra::extract::cookie::Key;
use time::Duration;
use url::Url;

use super::cookies::CookiePolicy;
use super::error::ApiError;
use crate::generate::{GenerationClient, GenerationConfig};
use crate::oauth::{AuthClient, DEFAULT_API_BASE, OAuthConfig};
use crate::signature::ConsumerKey;
use crate::twitter::{ApiConfig, TwitterClient};

/// Shared settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AppSettings {
    pub(crate) cookie_key: Key,
    pub(crate) secure_cookies: bool,
    pub(crate) app_url: Url,
    pub(crate) auth_path: String,
    pub(crate) temporary_ttl: Duration,
    pub(crate) session_ttl_days: i64,
}

impl AppSettings {
    fn defaults(app_url: Url) -> Self {
        Self {
            cookie_key: Key::generate(),
            secure_cookies: true,
            app_url,
            auth_path: "/api/auth".into(),
            temporary_ttl: Duration::minutes(15),
            session_ttl_days: 30,
        }
    }

    pub(crate) fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            secure: self.secure_cookies,
            temporary_path: self.auth_path.clone(),
            temporary_ttl: self.temporary_ttl,
            session_ttl: Duration::days(self.session_ttl_days),
        }
    }

    /// `{app_url}{auth_path}/twitter/callback`, the fixed OAuth callback.
    pub(crate) fn callback_url(&self) -> Url {
        let mut url = self.app_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{}/twitter/callback", self.auth_path));
        url.set_query(None);
        url
    }

    /// Application root with a human-readable `error` parameter.
    pub(crate) fn error_redirect(&self, reason: &str) -> String {
        let mut url = self.app_url.clone();
        url.query_pairs_mut().clear().append_pair("error", reason);
        url.into()
    }
}

/// Server configuration.
///
/// Only the application URL is required. Platform and generation
/// credentials are optional: a route that needs a missing one answers with
/// a configuration error instead of the server refusing to start.
///
/// Use [`from_env()`](MimicConfig::from_env) for convention-based setup,
/// or [`new()`](MimicConfig::new) with `with_*` methods for full control.
pub struct MimicConfig {
    pub(super) consumer: Option<ConsumerKey>,
    pub(super) bearer_token: Option<String>,
    pub(super) api_base: Url,
    pub(super) generation: GenerationConfig,
    pub(super) http: reqwest::Client,
    pub(super) settings: AppSettings,
}

impl MimicConfig {
    /// Create config for the app served at `app_url`.
    ///
    /// All optional fields use sensible defaults. Override with `with_*` methods.
    #[must_use]
    pub fn new(app_url: Url) -> Self {
        Self {
            consumer: None,
            bearer_token: None,
            api_base: DEFAULT_API_BASE.parse().expect("valid default URL"),
            generation: GenerationConfig::new(),
            http: reqwest::Client::new(),
            settings: AppSettings::defaults(app_url),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `APP_URL`: public URL of the app (the OAuth callback is derived from it)
    ///
    /// # Optional env vars
    /// - `TWITTER_API_KEY` / `TWITTER_API_SECRET_KEY`: consumer key pair (login and posting)
    /// - `TWITTER_BEARER_TOKEN`: app-only token (fetching posts)
    /// - `OPENAI_API_KEY`: chat-completion key (generation)
    /// - `OPENAI_ENDPOINT`, `OPENAI_MODEL`: generation overrides
    /// - `TWITTER_API_BASE`: override the platform host
    /// - `SECURE_COOKIES`: `"0"` or `"false"` to allow cookies over plain HTTP
    /// - `COOKIE_KEY`: cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, ApiError> {
        let app_url_str =
            std::env::var("APP_URL").map_err(|_| ApiError::Config("APP_URL is required".into()))?;
        let app_url: Url = app_url_str
            .parse()
            .map_err(|e| ApiError::Config(format!("APP_URL: {e}")))?;

        let mut config = Self::new(app_url);

        match (
            non_empty_var("TWITTER_API_KEY"),
            non_empty_var("TWITTER_API_SECRET_KEY"),
        ) {
            (Some(key), Some(secret)) => config = config.with_consumer(ConsumerKey::new(key, secret)),
            (None, None) => tracing::warn!("TWITTER_API_KEY/TWITTER_API_SECRET_KEY not set; login and posting disabled"),
            _ => {
                return Err(ApiError::Config(
                    "TWITTER_API_KEY and TWITTER_API_SECRET_KEY must be set together".into(),
                ));
            }
        }

        if let Some(token) = non_empty_var("TWITTER_BEARER_TOKEN") {
            config = config.with_bearer_token(token);
        }
        if let Some(url_str) = non_empty_var("TWITTER_API_BASE") {
            let url: Url = url_str
                .parse()
                .map_err(|e| ApiError::Config(format!("TWITTER_API_BASE: {e}")))?;
            config = config.with_api_base(url);
        }

        let mut generation = GenerationConfig::new();
        if let Some(key) = non_empty_var("OPENAI_API_KEY") {
            generation = generation.with_api_key(key);
        }
        if let Some(url_str) = non_empty_var("OPENAI_ENDPOINT") {
            let url: Url = url_str
                .parse()
                .map_err(|e| ApiError::Config(format!("OPENAI_ENDPOINT: {e}")))?;
            generation = generation.with_endpoint(url);
        }
        if let Some(model) = non_empty_var("OPENAI_MODEL") {
            generation = generation.with_model(model);
        }
        config = config.with_generation(generation);

        let insecure = matches!(
            std::env::var("SECURE_COOKIES").as_deref(),
            Ok("0") | Ok("false"),
        );

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                ApiError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => {
                tracing::warn!("COOKIE_KEY not set; sessions will not survive a restart");
                Key::generate()
            }
        };

        Ok(config
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!insecure))
    }

    #[must_use]
    pub fn with_consumer(mut self, consumer: ConsumerKey) -> Self {
        self.consumer = Some(consumer);
        self
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_api_base(mut self, url: Url) -> Self {
        self.api_base = url;
        self
    }

    #[must_use]
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Use a custom HTTP client for every upstream call.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    pub(super) fn auth_client(&self) -> Option<AuthClient> {
        let consumer = self.consumer.clone()?;
        let config = OAuthConfig::new(consumer, self.settings.callback_url())
            .with_api_base(self.api_base.clone());
        Some(AuthClient::new(config).with_http_client(self.http.clone()))
    }

    pub(super) fn twitter_client(&self) -> TwitterClient {
        let mut config = ApiConfig::new().with_api_base(self.api_base.clone());
        if let Some(token) = &self.bearer_token {
            config = config.with_bearer_token(token.clone());
        }
        if let Some(consumer) = &self.consumer {
            config = config.with_consumer(consumer.clone());
        }
        TwitterClient::new(config).with_http_client(self.http.clone())
    }

    pub(super) fn generation_client(&self) -> GenerationClient {
        GenerationClient::new(self.generation.clone()).with_http_client(self.http.clone())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
