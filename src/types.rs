use std::fmt;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Platform user identifier (numeric string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct TwitterUserId(pub String);

/// Platform post identifier (numeric string).
///
/// Kept as a string: post ids exceed the range JSON clients can hold as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct TweetId(pub String);

/// Short-lived token/secret pair identifying one in-progress handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredential {
    pub request_token: String,
    pub request_token_secret: String,
}

/// Long-lived token/secret pair authorizing calls on the user's behalf.
///
/// Both halves always travel together; there is no way to hold one without the other.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub access_token: String,
    pub access_secret: String,
}

impl fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredential")
            .field("request_token", &self.request_token)
            .field("request_token_secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("access_token", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

/// Identity fields of the signed-in user.
///
/// Cached in a script-readable cookie for display. Never trusted for
/// authorization: the access credential is re-verified instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TwitterUser {
    pub id: TwitterUserId,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl TwitterUser {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: TwitterUserId(id.into()),
            name: name.into(),
            username: username.into(),
            profile_image_url: None,
        }
    }

    #[must_use]
    pub fn with_profile_image_url(mut self, url: impl Into<String>) -> Self {
        self.profile_image_url = Some(url.into());
        self
    }
}

/// Engagement counters of a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

/// A post as returned to the UI by the fetch route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: TweetId,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metrics: PublicMetrics,
}

/// A post created through the platform API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedTweet {
    pub id: TweetId,
    pub text: String,
}

/// `{ "data": ... }` wrapper used by the platform's v2 endpoints.
///
/// `data` is absent when the platform reports lookup failures in an `errors` array.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) data: Option<T>,
}
