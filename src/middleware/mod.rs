//! Axum server for the login handshake and the content routes.
//!
//! All per-user state lives in the browser's cookies: the temporary
//! credential during login, then the access credential and a cached
//! profile. The server itself holds only immutable clients and settings.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tweet_mimic::middleware::{MimicConfig, app_routes};
//!
//! // APP_URL plus whichever credentials are available
//! let config = MimicConfig::from_env()?;
//!
//! let app = axum::Router::new().merge(app_routes(config));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Routes
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/api/auth/twitter` | start login, returns `{ url }` |
//! | GET | `/api/auth/twitter/callback` | redirect target after approval |
//! | POST | `/api/auth/twitter/verify` | complete login with a PIN |
//! | GET | `/api/auth/check` | `{ authenticated, user? }` |
//! | POST | `/api/auth/logout` | clear the session |
//! | POST | `/api/tweets` | recent posts of a user |
//! | POST | `/api/tweets/post` | publish a post or thread |
//! | POST | `/api/generate` | generate posts in a user's style |
//! | GET | `/health` | liveness |

mod config;
mod cookies;
mod error;
mod extractor;
pub mod handshake;
mod routes;
pub mod session;
mod state;

pub use config::MimicConfig;
pub use cookies::{CredentialStore, EntryAttributes, SessionPhase};
pub use error::ApiError;
pub use extractor::AuthSession;
pub use handshake::{Continuation, HandshakeError};
pub use routes::app_routes;
pub use session::SessionStatus;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
