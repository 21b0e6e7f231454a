mod auth;
mod posts;
mod tags;
mod users;

use crate::accounts::AccountService;
use crate::auth::TokenVerifier;
use crate::config::PictoriaConfig;
use crate::database::Database;
use crate::error::StoreError;
use crate::posts::PostService;
use anyhow::Result;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: PictoriaConfig,
    pub database: Database,
    pub accounts: AccountService,
    pub posts: PostService,
    pub verifier: Arc<TokenVerifier>,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Store(StoreError),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    code: 0,
                    error: "Unauthorized".into(),
                    message,
                },
            ),
            ApiError::Store(err) => (
                err.status(),
                ErrorResponse {
                    code: err.code(),
                    error: err.kind().into(),
                    message: err.to_string(),
                },
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        code: 1,
                        error: "UnknownError".into(),
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Unknown(_) | StoreError::NotConnected => {
                tracing::error!(error = %err, "storage failure");
            }
            _ => {}
        }
        ApiError::Store(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

/// Query parameters shared by the paginated listings.
#[derive(Debug, Deserialize)]
pub(crate) struct PageParams {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

pub(crate) async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/u", get(users::list_users).post(users::create_user))
        .route("/api/u/login", post(users::login))
        .route("/api/me", get(users::me))
        .route("/api/u/:username", get(users::get_user))
        .route("/api/u/:username/posts", get(users::user_posts))
        .route("/api/u/:username/likes", get(users::user_likes))
        .route("/api/u/:username/followers", get(users::user_followers))
        .route("/api/u/:username/following", get(users::user_following))
        .route(
            "/api/u/:username/follow",
            post(users::follow_user).delete(users::unfollow_user),
        )
        .route("/api/p", get(posts::list_posts).post(posts::create_post))
        .route("/api/p/:id", get(posts::get_post).delete(posts::delete_post))
        .route("/api/p/:id/view", post(posts::record_view))
        .route("/api/p/:id/comment", post(posts::add_comment))
        .route(
            "/api/p/:id/like",
            post(posts::like_post).delete(posts::unlike_post),
        )
        .route("/api/t", get(tags::list_tags))
        .route("/api/t/:name/posts", get(tags::tag_posts))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                return Ok((listener, port));
            }
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "port in use, trying next port");
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

pub async fn serve_http(
    config: PictoriaConfig,
    database: Database,
    verifier: TokenVerifier,
) -> Result<()> {
    let state = AppState {
        accounts: AccountService::new(database.clone()),
        posts: PostService::new(database.clone()),
        config: config.clone(),
        database,
        verifier: Arc::new(verifier),
    };

    let app = router(state);

    let (listener, actual_port) = find_available_port(config.api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
