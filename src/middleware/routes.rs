use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::config::MimicConfig;
use super::cookies::CredentialStore;
use super::error::ApiError;
use super::extractor::AuthSession;
use super::handshake::{self, Continuation, HandshakeError};
use super::session::{self, SessionStatus};
use super::state::AppState;
use crate::generate::StyleRequest;
use crate::twitter::DEFAULT_FETCH_COUNT;
use crate::types::{PostedTweet, Tweet, TwitterUser};

const CREDENTIALS_NOT_CONFIGURED: &str = "Twitter API credentials not configured";

/// Create the application router with every API route mounted.
pub fn app_routes(config: MimicConfig) -> Router {
    let auth_path = config.settings.auth_path.clone();

    let state = AppState {
        auth: config.auth_client().map(Arc::new),
        twitter: Arc::new(config.twitter_client()),
        generator: Arc::new(config.generation_client()),
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/twitter"), get(initiate))
        .route(&format!("{auth_path}/twitter/callback"), get(callback))
        .route(&format!("{auth_path}/twitter/verify"), post(verify_pin))
        .route(&format!("{auth_path}/check"), get(check))
        .route(&format!("{auth_path}/logout"), post(logout))
        .route("/api/tweets", post(fetch_tweets))
        .route("/api/tweets/post", post(post_tweets))
        .route("/api/generate", post(generate))
        .route("/health", get(health))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AuthorizationUrl {
    url: String,
}

async fn initiate(
    State(state): State<AppState>,
    store: CredentialStore,
) -> Result<(CredentialStore, Json<AuthorizationUrl>), ApiError> {
    let (store, url) = handshake::initiate(state.auth_client(), store)
        .await
        .map_err(|e| match e {
            HandshakeError::NotConfigured => ApiError::Config(CREDENTIALS_NOT_CONFIGURED.into()),
            other => {
                tracing::error!(error = ?other, "Twitter auth initialization failed");
                ApiError::Internal(other.to_string())
            }
        })?;

    Ok((store, Json(AuthorizationUrl { url: url.into() })))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    store: CredentialStore,
    Query(params): Query<CallbackParams>,
) -> Result<(CredentialStore, Redirect), Response> {
    let token = params.oauth_token.filter(|t| !t.is_empty());
    let verifier = params.oauth_verifier.filter(|v| !v.is_empty());
    let (Some(token), Some(verifier)) = (token, verifier) else {
        return Err(login_error(&state, &HandshakeError::MissingState));
    };

    let continuation = Continuation::Callback {
        token: &token,
        verifier: &verifier,
    };
    let (store, _user) = handshake::complete(state.auth_client(), store, continuation)
        .await
        .map_err(|e| login_error(&state, &e))?;

    Ok((store, Redirect::to(state.settings.app_url.as_str())))
}

// ── PIN ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PinRequest {
    pin: Option<String>,
}

#[derive(Serialize)]
struct PinVerified {
    authenticated: bool,
    user: TwitterUser,
}

async fn verify_pin(
    State(state): State<AppState>,
    store: CredentialStore,
    payload: Result<Json<PinRequest>, JsonRejection>,
) -> Result<(CredentialStore, Json<PinVerified>), ApiError> {
    let body = request_body(payload, "Failed to verify PIN")?;
    let pin = body.pin.filter(|p| !p.trim().is_empty());
    let Some(pin) = pin.filter(|_| store.temporary().is_some()) else {
        return Err(ApiError::BadRequest("Missing required authentication data".into()));
    };

    let (store, user) = handshake::complete(state.auth_client(), store, Continuation::Pin { pin: pin.trim() })
        .await
        .map_err(|e| match e {
            HandshakeError::NotConfigured => ApiError::Config(CREDENTIALS_NOT_CONFIGURED.into()),
            other => {
                tracing::error!(error = ?other, "PIN verification failed");
                ApiError::Internal("Failed to verify PIN".into())
            }
        })?;

    Ok((
        store,
        Json(PinVerified {
            authenticated: true,
            user,
        }),
    ))
}

// ── Session ────────────────────────────────────────────────────────

async fn check(State(state): State<AppState>, store: CredentialStore) -> (CredentialStore, Json<SessionStatus>) {
    let (store, status) = session::check(state.auth_client(), store).await;
    (store, Json(status))
}

async fn logout(store: CredentialStore) -> (CredentialStore, Json<serde_json::Value>) {
    (session::logout(store), Json(json!({ "success": true })))
}

// ── Fetch ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FetchRequest {
    username: Option<String>,
    count: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct TweetList {
    tweets: Vec<Tweet>,
}

async fn fetch_tweets(
    State(state): State<AppState>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<TweetList>, ApiError> {
    let body = request_body(payload, "Failed to fetch tweets")?;
    let username = required(body.username, "Username is required")?;
    if !state.twitter.config().can_read() {
        return Err(ApiError::Config(CREDENTIALS_NOT_CONFIGURED.into()));
    }

    let count = body
        .count
        .as_ref()
        .and_then(requested_count)
        .unwrap_or(i64::from(DEFAULT_FETCH_COUNT));
    let tweets = state
        .twitter
        .recent_tweets(username.trim_start_matches('@'), count)
        .await
        .map_err(|e| match e {
            crate::Error::NotFound => ApiError::NotFound("User not found".into()),
            other => ApiError::upstream(other, "Failed to fetch tweets"),
        })?;

    tracing::debug!(username = %username, count = tweets.len(), "Fetched tweets");
    Ok(Json(TweetList { tweets }))
}

// ── Post ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PostRequest {
    tweets: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PostOutcome {
    Single { success: bool, tweet: PostedTweet },
    Thread { success: bool, tweets: Vec<PostedTweet> },
}

async fn post_tweets(
    State(state): State<AppState>,
    session: AuthSession,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Result<Json<PostOutcome>, ApiError> {
    let body = request_body(payload, "Failed to post tweets")?;
    let texts = body.tweets.unwrap_or_default();
    if texts.is_empty() {
        return Err(ApiError::BadRequest("At least one tweet is required".into()));
    }
    if !state.twitter.config().can_post() {
        return Err(ApiError::Config(CREDENTIALS_NOT_CONFIGURED.into()));
    }

    let mut posted = state
        .twitter
        .post_thread(&session.access, &texts)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to post tweets"))?;

    tracing::info!(count = posted.len(), "Posted tweets");
    let outcome = if posted.len() == 1 {
        PostOutcome::Single {
            success: true,
            tweet: posted.remove(0),
        }
    } else {
        PostOutcome::Thread {
            success: true,
            tweets: posted,
        }
    };
    Ok(Json(outcome))
}

// ── Generate ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ExampleTweet {
    text: String,
}

#[derive(Deserialize)]
struct GenerateRequest {
    prompt: Option<String>,
    username: Option<String>,
    #[serde(rename = "isThread")]
    is_thread: Option<bool>,
    tweets: Option<Vec<ExampleTweet>>,
}

#[derive(Serialize)]
struct GeneratedTweets {
    tweets: Vec<String>,
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GeneratedTweets>, ApiError> {
    let body = request_body(payload, "Failed to generate tweets")?;
    let missing = || ApiError::BadRequest("Missing required parameters".into());
    let prompt = body.prompt.filter(|p| !p.trim().is_empty()).ok_or_else(missing)?;
    let username = body.username.filter(|u| !u.trim().is_empty()).ok_or_else(missing)?;
    let examples: Vec<String> = body
        .tweets
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.text)
        .collect();
    if examples.is_empty() {
        return Err(missing());
    }

    let request = StyleRequest {
        topic: &prompt,
        username: &username,
        examples: &examples,
        thread: body.is_thread.unwrap_or(false),
    };
    let tweets = state
        .generator
        .generate(&request)
        .await
        .map_err(|e| match e {
            crate::Error::NotConfigured(what) => ApiError::Config(format!("{what} is not configured")),
            other => {
                tracing::error!(error = %other, "Generation failed");
                ApiError::Internal("Failed to generate tweets".into())
            }
        })?;

    Ok(Json(GeneratedTweets { tweets }))
}

// ── Health ─────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(state: &AppState, error: &HandshakeError) -> Response {
    match error {
        HandshakeError::TokenMismatch | HandshakeError::MissingState => {
            tracing::warn!(error = %error, "OAuth callback rejected");
        }
        _ => tracing::error!(error = ?error, "OAuth callback failed"),
    }
    Redirect::to(&state.settings.error_redirect(&error.to_string())).into_response()
}

/// Unwraps a JSON body. A missing or unparsable body fails with the route's
/// generic message, like any other failure of that route.
fn request_body<T>(payload: Result<Json<T>, JsonRejection>, fallback: &str) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::warn!(error = %rejection, "Rejected request body");
        ApiError::Internal(fallback.into())
    })
}

/// Reads a fetch count the way a loosely typed client sends it: any JSON
/// number, a numeric string, or a boolean. Fractions are truncated and
/// out-of-range values saturate; anything else means "use the default".
fn requested_count(value: &serde_json::Value) -> Option<i64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) if s.trim().is_empty() => 0.0,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    if number.is_nan() {
        return None;
    }
    // Saturating cast: ±inf and huge values land on i64::MIN/MAX.
    Some(number as i64)
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.into()))
}
