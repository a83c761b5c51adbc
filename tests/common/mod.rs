#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, CookieJar, Key};
use serde_json::{Value, json};
use tower::ServiceExt;
use tweet_mimic::middleware::{MimicConfig, app_routes};
use tweet_mimic::{ConsumerKey, GenerationConfig};
use url::Url;

pub const APP_URL: &str = "http://localhost:3000";
pub const RESET_EPOCH: i64 = 4_102_444_800;

/// Calls the fake upstream received, for assertions.
#[derive(Debug, Default)]
pub struct Recorded {
    pub exchanges: usize,
    pub max_results: Vec<String>,
    pub posts: Vec<Value>,
    pub completions: Vec<Value>,
}

pub struct Upstream {
    pub base: Url,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl Upstream {
    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

fn authorization(headers: &HeaderMap) -> &str {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn request_token(headers: HeaderMap) -> Response {
    if !authorization(&headers).contains("oauth_callback=") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    "oauth_token=req-token&oauth_token_secret=req-secret&oauth_callback_confirmed=true".into_response()
}

async fn access_token(State(recorded): State<Arc<Mutex<Recorded>>>, headers: HeaderMap) -> Response {
    recorded.lock().unwrap().exchanges += 1;
    let auth = authorization(&headers);
    if auth.contains("oauth_verifier=\"good-verifier\"") && auth.contains("oauth_token=\"req-token\"") {
        "oauth_token=acc-token&oauth_token_secret=acc-secret&user_id=42&screen_name=alice".into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn users_me(headers: HeaderMap) -> Response {
    if !authorization(&headers).contains("oauth_token=\"acc-token\"") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "title": "Unauthorized" }))).into_response();
    }
    Json(json!({
        "data": {
            "id": "42",
            "name": "Alice",
            "username": "alice",
            "profile_image_url": "https://pbs.example/alice.png"
        }
    }))
    .into_response()
}

async fn user_by_username(Path(username): Path<String>) -> Response {
    match username.as_str() {
        "ghost" => Json(json!({ "errors": [{ "title": "Not Found Error" }] })).into_response(),
        "limited" => {
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "title": "Too Many Requests" })))
                .into_response();
            response
                .headers_mut()
                .insert("x-rate-limit-reset", HeaderValue::from(RESET_EPOCH));
            response
        }
        _ => Json(json!({ "data": { "id": "1001", "name": username, "username": username } })).into_response(),
    }
}

async fn timeline(
    State(recorded): State<Arc<Mutex<Recorded>>>,
    Path(user_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    assert_eq!(user_id, "1001");
    let max_results = query.get("max_results").cloned().unwrap_or_default();
    recorded.lock().unwrap().max_results.push(max_results);

    Json(json!({
        "data": [
            {
                "id": "1",
                "text": "first post",
                "created_at": "2024-01-01T00:00:00.000Z",
                "public_metrics": { "retweet_count": 1, "reply_count": 2, "like_count": 3, "quote_count": 4 }
            },
            { "id": "2", "text": "second post" }
        ]
    }))
    .into_response()
}

async fn create_tweet(
    State(recorded): State<Arc<Mutex<Recorded>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorization(&headers).contains("oauth_token=\"acc-token\"") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut recorded = recorded.lock().unwrap();
    recorded.posts.push(body.clone());
    let id = format!("{}", 2000 + recorded.posts.len());
    (StatusCode::CREATED, Json(json!({ "data": { "id": id, "text": body["text"] } }))).into_response()
}

async fn completions(State(recorded): State<Arc<Mutex<Recorded>>>, Json(body): Json<Value>) -> Response {
    recorded.lock().unwrap().completions.push(body);
    let content = serde_json::to_string(&vec!["short one".to_string(), "x".repeat(300)]).unwrap();
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })).into_response()
}

/// Serves a stand-in for the platform and the completion API on an ephemeral port.
pub async fn spawn_upstream() -> Upstream {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let router = Router::new()
        .route("/oauth/request_token", post(request_token))
        .route("/oauth/access_token", post(access_token))
        .route("/2/users/me", get(users_me))
        .route("/2/users/by/username/{username}", get(user_by_username))
        .route("/2/users/{id}/tweets", get(timeline))
        .route("/2/tweets", post(create_tweet))
        .route("/v1/chat/completions", post(completions))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Upstream {
        base: format!("http://{addr}/").parse().unwrap(),
        recorded,
    }
}

pub fn cookie_key() -> Key {
    Key::from(&[7u8; 64][..])
}

/// Fully configured server pointed at `upstream`.
pub fn config(upstream: &Upstream) -> MimicConfig {
    MimicConfig::new(APP_URL.parse().unwrap())
        .with_consumer(ConsumerKey::new("consumer-key", "consumer-secret"))
        .with_bearer_token("bearer-token")
        .with_api_base(upstream.base.clone())
        .with_generation(
            GenerationConfig::new()
                .with_api_key("gen-key")
                .with_endpoint(upstream.base.join("v1/chat/completions").unwrap()),
        )
        .with_cookie_key(cookie_key())
        .with_secure_cookies(false)
}

pub fn app(upstream: &Upstream) -> Router {
    app_routes(config(upstream))
}

/// Cookie jar that replays `Set-Cookie` headers like a browser would.
#[derive(Debug, Default)]
pub struct Browser {
    cookies: BTreeMap<String, String>,
}

impl Browser {
    /// Browser already holding an encrypted access credential.
    pub fn with_access(token: &str, secret: &str) -> Self {
        let mut browser = Self::default();
        browser.seal("twitter_access_token", token);
        browser.seal("twitter_access_secret", secret);
        browser
    }

    /// Stores `value` encrypted with the server's key.
    pub fn seal(&mut self, name: &str, value: &str) {
        let jar = PrivateCookieJar::new(cookie_key()).add(Cookie::new(name.to_string(), value.to_string()));
        let response = (jar, ()).into_response();
        self.absorb(&response);
    }

    pub fn has(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Decrypted value of an encrypted cookie.
    pub fn open(&self, name: &str) -> Option<String> {
        PrivateCookieJar::from_headers(&self.headers(), cookie_key())
            .get(name)
            .map(|c| c.value().to_string())
    }

    /// Decoded value of a plain cookie.
    pub fn plain(&self, name: &str) -> Option<String> {
        CookieJar::from_headers(&self.headers())
            .get(name)
            .map(|c| c.value().to_string())
    }

    pub fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = self.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }
        match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub async fn send(&mut self, app: &Router, request: Request<Body>) -> Response {
        let response = app.clone().oneshot(request).await.unwrap();
        self.absorb(&response);
        response
    }

    pub async fn get(&mut self, app: &Router, uri: &str) -> Response {
        let request = self.request(Method::GET, uri, None);
        self.send(app, request).await
    }

    pub async fn post(&mut self, app: &Router, uri: &str, body: Value) -> Response {
        let request = self.request(Method::POST, uri, Some(body));
        self.send(app, request).await
    }

    fn absorb(&mut self, response: &Response) {
        for header in set_cookies(response) {
            let Some((name, value)) = header.split(';').next().and_then(|pair| pair.split_once('=')) else {
                continue;
            };
            if value.is_empty() || header.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self.cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
        Some(pairs.join("; "))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = self.cookie_header() {
            headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());
        }
        headers
    }
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `Set-Cookie` header for `name`, if the response carried one.
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response).into_iter().find(|c| c.starts_with(&prefix))
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(axum::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
