#![doc = include_str!("../README.md")]

pub mod error;
pub mod generate;
pub mod oauth;
pub mod signature;
pub mod twitter;
pub mod types;

#[cfg(feature = "middleware")]
pub mod middleware;

// Re-exports for convenient access
pub use error::Error;
pub use generate::{GenerationClient, GenerationConfig, StyleRequest};
pub use oauth::{AuthClient, OAuthConfig};
pub use signature::{ConsumerKey, RequestSigner};
pub use twitter::{ApiConfig, TwitterClient};
pub use types::{
    AccessCredential, PostedTweet, PublicMetrics, TemporaryCredential, Tweet, TweetId, TwitterUser,
    TwitterUserId,
};
