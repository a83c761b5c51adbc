//! Content proxy: timeline reads with the app's bearer token and
//! user-context posting with an access credential.

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, ensure_success};
use crate::oauth::{DEFAULT_API_BASE, with_trailing_slash};
use crate::signature::{ConsumerKey, RequestSigner};
use crate::types::{AccessCredential, Envelope, PostedTweet, PublicMetrics, Tweet, TweetId, TwitterUserId};

/// Posts fetched when the caller does not ask for a count.
pub const DEFAULT_FETCH_COUNT: u8 = 10;
const MIN_FETCH_COUNT: i64 = 1;
const MAX_FETCH_COUNT: i64 = 100;

const TIMELINE_FIELDS: &str = "created_at,text,public_metrics";

/// Clamps a requested fetch count into `1..=100`.
#[must_use]
pub fn clamp_count(requested: i64) -> u8 {
    // Both bounds fit in u8.
    requested.clamp(MIN_FETCH_COUNT, MAX_FETCH_COUNT) as u8
}

/// Endpoints and application credentials for content calls.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiConfig {
    pub(crate) api_base: Url,
    pub(crate) bearer_token: Option<String>,
    pub(crate) consumer: Option<ConsumerKey>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.parse().expect("valid default URL"),
            bearer_token: None,
            consumer: None,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_base(mut self, url: Url) -> Self {
        self.api_base = with_trailing_slash(url);
        self
    }

    /// App-only token used for public reads.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Application key pair used to sign posts together with the user's access credential.
    #[must_use]
    pub fn with_consumer(mut self, consumer: ConsumerKey) -> Self {
        self.consumer = Some(consumer);
        self
    }

    #[must_use]
    pub fn can_read(&self) -> bool {
        self.bearer_token.is_some()
    }

    #[must_use]
    pub fn can_post(&self) -> bool {
        self.consumer.is_some()
    }

    fn endpoint(&self, path: &str) -> Url {
        self.api_base.join(path).expect("valid endpoint path")
    }
}

#[derive(Debug, Deserialize)]
struct UserLookup {
    id: TwitterUserId,
}

#[derive(Debug, Deserialize)]
struct TimelineTweet {
    id: TweetId,
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

impl From<TimelineTweet> for Tweet {
    fn from(raw: TimelineTweet) -> Self {
        Self {
            id: raw.id,
            text: raw.text,
            created_at: raw.created_at,
            metrics: raw.public_metrics.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTarget<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a TweetId,
}

/// Client for the platform's v2 content endpoints.
pub struct TwitterClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl TwitterClient {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
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
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Most recent original posts of `username`, retweets and replies excluded.
    ///
    /// `count` is clamped with [`clamp_count`].
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`] without a bearer token, [`Error::NotFound`]
    /// for an unknown account, [`Error::RateLimited`] when throttled.
    pub async fn recent_tweets(&self, username: &str, count: i64) -> Result<Vec<Tweet>, Error> {
        let user_id = self.user_id(username).await?;
        self.user_timeline(&user_id, clamp_count(count)).await
    }

    /// Resolves a handle to the platform's user id.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the platform has no such account.
    pub async fn user_id(&self, username: &str) -> Result<TwitterUserId, Error> {
        let bearer = self.bearer()?;
        let mut url = self.config.endpoint("2/users/by/username/");
        url.path_segments_mut()
            .map_err(|()| Error::decode("user lookup", "API base cannot hold a path"))?
            .pop_if_empty()
            .push(username);

        let response = self.http.get(url).bearer_auth(bearer).send().await?;
        let envelope = ensure_success(response, "user lookup")
            .await?
            .json::<Envelope<UserLookup>>()
            .await
            .map_err(|e| Error::decode("user lookup", e))?;

        envelope.data.map(|user| user.id).ok_or(Error::NotFound)
    }

    /// # Errors
    ///
    /// Classified [`Error`] for any non-success response.
    pub async fn user_timeline(&self, user_id: &TwitterUserId, max_results: u8) -> Result<Vec<Tweet>, Error> {
        let bearer = self.bearer()?;
        let mut url = self.config.endpoint(&format!("2/users/{user_id}/tweets"));
        url.query_pairs_mut()
            .append_pair("max_results", &max_results.to_string())
            .append_pair("exclude", "retweets,replies")
            .append_pair("tweet.fields", TIMELINE_FIELDS);

        let response = self.http.get(url).bearer_auth(bearer).send().await?;
        let envelope = ensure_success(response, "user timeline")
            .await?
            .json::<Envelope<Vec<TimelineTweet>>>()
            .await
            .map_err(|e| Error::decode("user timeline", e))?;

        // An account with no matching posts comes back without `data`.
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Tweet::from)
            .collect())
    }

    /// Publishes one post as the user, optionally as a reply.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`] without a consumer key, [`Error::Unauthorized`]
    /// if the access credential is rejected.
    pub async fn post_tweet(
        &self,
        access: &AccessCredential,
        text: &str,
        reply_to: Option<&TweetId>,
    ) -> Result<PostedTweet, Error> {
        let consumer = self
            .config
            .consumer
            .as_ref()
            .ok_or(Error::NotConfigured("consumer key"))?;
        let url = self.config.endpoint("2/tweets");
        let header = RequestSigner::new(consumer)
            .with_token(&access.access_token, &access.access_secret)
            .authorization_header("POST", &url, &[]);

        let body = CreateTweet {
            text,
            reply: reply_to.map(|id| ReplyTarget {
                in_reply_to_tweet_id: id,
            }),
        };

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, header)
            .json(&body)
            .send()
            .await?;
        let envelope = ensure_success(response, "create tweet")
            .await?
            .json::<Envelope<PostedTweet>>()
            .await
            .map_err(|e| Error::decode("create tweet", e))?;

        envelope
            .data
            .ok_or_else(|| Error::decode("create tweet", "missing data"))
    }

    /// Publishes `texts` in order, each replying to the one before it.
    ///
    /// A single entry is a standalone post. Stops at the first failure;
    /// already published entries stay published.
    ///
    /// # Errors
    ///
    /// The first [`Error`] returned by [`post_tweet`](Self::post_tweet).
    pub async fn post_thread(&self, access: &AccessCredential, texts: &[String]) -> Result<Vec<PostedTweet>, Error> {
        let mut posted: Vec<PostedTweet> = Vec::with_capacity(texts.len());
        for text in texts {
            let reply_to = posted.last().map(|previous| &previous.id);
            let tweet = self.post_tweet(access, text, reply_to).await?;
            tracing::debug!(tweet_id = %tweet.id, position = posted.len(), "Posted thread entry");
            posted.push(tweet);
        }
        Ok(posted)
    }

    fn bearer(&self) -> Result<&str, Error> {
        self.config
            .bearer_token
            .as_deref()
            .ok_or(Error::NotConfigured("bearer token"))
    }
}
