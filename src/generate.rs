//! Generation proxy: style-conditioned prompts sent to a chat-completion API.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, ensure_success};

/// Longest post the platform accepts, in characters.
pub const MAX_TWEET_CHARS: usize = 280;
const ELLIPSIS: &str = "...";

pub const DEFAULT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 500;

/// Chat-completion settings.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GenerationConfig {
    pub(crate) api_key: Option<String>,
    pub(crate) endpoint: Url,
    pub(crate) model: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_COMPLETIONS_URL.parse().expect("valid default URL"),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl GenerationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, url: Url) -> Self {
        self.endpoint = url;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// What to write and whose voice to write it in.
#[derive(Debug, Clone, Copy)]
pub struct StyleRequest<'a> {
    pub topic: &'a str,
    pub username: &'a str,
    pub examples: &'a [String],
    pub thread: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// System message carrying the examples, user message carrying the topic
/// and the output format.
#[must_use]
pub fn build_messages(request: &StyleRequest<'_>) -> Vec<ChatMessage> {
    let username = request.username;
    let examples = request.examples.join("\n\n");
    let system = format!(
        "You are a tweet writer that imitates @{username}'s writing style. \
         Here are some example tweets from @{username} to learn their style from:\n\n{examples}"
    );

    let topic = request.topic;
    let user = if request.thread {
        format!(
            "Write a Twitter thread (2-5 tweets) about: {topic}\n\
             Make sure each tweet is under {MAX_TWEET_CHARS} characters and maintains @{username}'s writing style. \
             Format the response as a JSON array of tweet strings."
        )
    } else {
        format!(
            "Write a single tweet about: {topic}\n\
             Make sure it's under {MAX_TWEET_CHARS} characters and maintains @{username}'s writing style. \
             Format the response as a JSON array with a single tweet string."
        )
    };

    vec![ChatMessage::new("system", system), ChatMessage::new("user", user)]
}

/// Reads the model's reply as a JSON array of strings, or failing that as
/// one post per non-blank line with any `1.` style numbering removed.
#[must_use]
pub fn parse_completion(content: &str) -> Vec<String> {
    if let Ok(tweets) = serde_json::from_str::<Vec<String>>(content.trim()) {
        return tweets;
    }

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| strip_numbering(line).trim().to_string())
        .collect()
}

fn strip_numbering(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return line;
    }
    match rest.strip_prefix('.') {
        Some(after_dot) => after_dot.trim_start(),
        None => line,
    }
}

/// Cuts anything longer than [`MAX_TWEET_CHARS`] to 277 characters plus `...`.
#[must_use]
pub fn truncate_tweet(text: String) -> String {
    if text.chars().count() <= MAX_TWEET_CHARS {
        return text;
    }
    let keep = MAX_TWEET_CHARS - ELLIPSIS.len();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Client for the chat-completion endpoint.
pub struct GenerationClient {
    config: GenerationConfig,
    http: reqwest::Client,
}

impl GenerationClient {
    #[must_use]
    pub fn new(config: GenerationConfig) -> Self {
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
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generates posts in the requested style, each at most [`MAX_TWEET_CHARS`] long.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`] without an API key; a classified [`Error`]
    /// for upstream failures.
    pub async fn generate(&self, request: &StyleRequest<'_>) -> Result<Vec<String>, Error> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(Error::NotConfigured("generation API key"))?;

        let messages = build_messages(request);
        let body = CompletionRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http
            .post(self.config.endpoint.clone())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let completion = ensure_success(response, "chat completion")
            .await?
            .json::<CompletionResponse>()
            .await
            .map_err(|e| Error::decode("chat completion", e))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let tweets: Vec<String> = parse_completion(&content)
            .into_iter()
            .map(truncate_tweet)
            .collect();
        tracing::debug!(count = tweets.len(), thread = request.thread, "Generated tweets");
        Ok(tweets)
    }
}
