mod auth;
mod blog;
mod contact;
mod events;
mod family;
mod media;
mod polls;
mod realtime;

use crate::auth::{AuthService, SessionContext};
use crate::blog::BlogService;
use crate::config::KinshipConfig;
use crate::contact::ContactService;
use crate::database::Database;
use crate::errors::DomainError;
use crate::events::EventService;
use crate::family::FamilyService;
use crate::media::MediaService;
use crate::polls::PollService;
use crate::realtime::ChangeHub;
use anyhow::Result;
use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub const SESSION_COOKIE: &str = "kinship_session";

#[derive(Clone)]
pub struct AppState {
    pub config: KinshipConfig,
    pub database: Database,
    pub hub: ChangeHub,
    pub auth: AuthService,
    pub blog: BlogService,
    pub polls: PollService,
    pub family: FamilyService,
    pub events: EventService,
    pub media: MediaService,
    pub contact: ContactService,
}

impl AppState {
    pub fn new(config: KinshipConfig, database: Database, hub: ChangeHub) -> Self {
        Self {
            auth: AuthService::new(database.clone(), config.auth.session_ttl_hours),
            blog: BlogService::new(database.clone(), hub.clone()),
            polls: PollService::new(database.clone(), hub.clone()),
            family: FamilyService::new(database.clone(), hub.clone()),
            events: EventService::new(database.clone(), hub.clone()),
            media: MediaService::new(database.clone(), config.paths.clone(), hub.clone()),
            contact: ContactService::new(database.clone()),
            config,
            database,
            hub,
        }
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Browser navigation without a session: send them to the sign-in page.
    SignInRedirect,
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorResponse { message: msg })
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse { message: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse { message: msg }),
            ApiError::SignInRedirect => (
                StatusCode::SEE_OTHER,
                ErrorResponse {
                    message: "sign in required".into(),
                },
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::SignInRedirect) {
            return Redirect::to("/auth").into_response();
        }
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DomainError>() {
            Ok(DomainError::Invalid(msg)) => ApiError::BadRequest(msg),
            Ok(DomainError::Unauthorized(msg)) => ApiError::Unauthorized(msg),
            Ok(DomainError::Forbidden(msg)) => ApiError::Forbidden(msg),
            Ok(DomainError::NotFound(msg)) => ApiError::NotFound(msg),
            Ok(DomainError::Conflict(msg)) => ApiError::Conflict(msg),
            Err(err) => ApiError::Internal(err),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// A signed-in user; rejects with 401 (or a 303 to `/auth` for browser
/// navigations) when the session is missing or stale.
pub(crate) struct RequireUser(pub SessionContext);

/// A signed-in admin; 403 for everyone else.
pub(crate) struct RequireAdmin(pub SessionContext);

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }
    let cookies = parts
        .headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.trim().to_string())
    })
}

fn wants_html(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

fn resolve_session(parts: &Parts, state: &AppState) -> Result<Option<SessionContext>, ApiError> {
    let Some(token) = bearer_token(parts) else {
        return Ok(None);
    };
    state.auth.authenticate(&token).map_err(ApiError::from)
}

fn unauthenticated(parts: &Parts) -> ApiError {
    if wants_html(parts) {
        ApiError::SignInRedirect
    } else {
        ApiError::Unauthorized("sign in required".into())
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match resolve_session(parts, state)? {
            Some(ctx) => Ok(Self(ctx)),
            None => Err(unauthenticated(parts)),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let RequireUser(ctx) = RequireUser::from_request_parts(parts, state).await?;
        if !ctx.is_admin() {
            return Err(ApiError::Forbidden("admin role required".into()));
        }
        Ok(Self(ctx))
    }
}

/// The raw bearer token of a valid session; sign-out needs it to delete
/// the row.
pub(crate) struct SessionToken(pub String);

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let Some(token) = bearer_token(parts) else {
            return Err(unauthenticated(parts));
        };
        if state.auth.authenticate(&token)?.is_none() {
            return Err(unauthenticated(parts));
        }
        Ok(Self(token))
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound("no such route".into())
}

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state
        .config
        .file
        .max_upload_bytes
        .unwrap_or(50 * 1024 * 1024);
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signup", post(auth::sign_up_handler))
        .route("/auth/signin", post(auth::sign_in_handler))
        .route("/auth/signout", post(auth::sign_out_handler))
        .route(
            "/auth/me",
            get(auth::me_handler).put(auth::update_me_handler),
        )
        .route(
            "/family/branches",
            get(family::list_branches).post(family::create_branch),
        )
        .route(
            "/family/branches/:id",
            get(family::get_branch).delete(family::delete_branch),
        )
        .route(
            "/family/members",
            get(family::list_members).post(family::create_member),
        )
        .route(
            "/family/members/:id",
            get(family::get_member).delete(family::delete_member),
        )
        .route("/family/news", get(family::list_news).post(family::create_news))
        .route("/family/news/:id", delete(family::delete_news))
        .route("/media", get(media::list_media).post(media::upload_media))
        .route("/media/:id", delete(media::delete_media))
        .route("/media/files/:id", get(media::download_media))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event).delete(events::delete_event),
        )
        .route("/polls", get(polls::list_polls).post(polls::create_poll))
        .route("/polls/:id", get(polls::get_poll))
        .route("/polls/:id/vote", post(polls::vote))
        .route("/blog/posts", get(blog::list_posts).post(blog::create_post))
        .route("/blog/posts/all", get(blog::list_all_posts))
        .route(
            "/blog/posts/:id",
            get(blog::get_post).put(blog::update_post).delete(blog::delete_post),
        )
        .route(
            "/blog/posts/:id/comments",
            get(blog::list_comments).post(blog::add_comment),
        )
        .route("/blog/comments/:id", delete(blog::delete_comment))
        .route("/blog/posts/:id/like", post(blog::like_post))
        .route("/blog/posts/:id/unlike", post(blog::unlike_post))
        .route("/contact", post(contact::submit_message))
        .route("/contact/messages", get(contact::list_messages))
        .route("/realtime", get(realtime::realtime_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(max_upload_bytes as usize))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries the configured port first, then walks upward.
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) => {
                if offset == 0 {
                    tracing::debug!(port, error = %err, "port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "could not find available port in range {}-{}",
        start_port,
        start_port + MAX_PORT_ATTEMPTS - 1
    )
}

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub async fn serve_http(config: KinshipConfig, database: Database, hub: ChangeHub) -> Result<()> {
    let requested_port = config.api_port;
    let state = AppState::new(config, database, hub);

    let purge_auth = state.auth.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match purge_auth.purge_expired_sessions() {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "expired sessions removed"),
                Err(err) => tracing::warn!(error = ?err, "session purge failed"),
            }
        }
    });

    let router = build_router(state);

    let (listener, actual_port) = find_available_port(requested_port).await?;
    if actual_port != requested_port {
        tracing::warn!(
            requested_port,
            actual_port,
            "configured port was in use, bound to next available port"
        );
    }
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));
    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
