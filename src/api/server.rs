//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::handlers;
use super::models::{CreateQuizRequest, LoginRequest, Payload};
use super::session::{
    build_cookie, expired_cookie, read_cookie, with_cookies, AuthUser, ACCESS_COOKIE, REFRESH_COOKIE,
};
use crate::auth::{Authenticator, Registration};
use crate::config::Config;
use crate::processing::QuizPipeline;
use crate::quiz::QuizUpdate;
use crate::store::Store;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub authenticator: Authenticator,
    pub pipeline: Arc<QuizPipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, pipeline: QuizPipeline, config: Config) -> Self {
        let authenticator = Authenticator::new(store.clone(), config.auth.clone());
        Self {
            store,
            authenticator,
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

/// Build the router with every route and middleware layer
pub fn build_router(app_state: AppState) -> Router {
    // Cookies need credentialed CORS, which rules out a wildcard origin
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // Health check endpoints (both paths for compatibility)
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))

        // Account endpoints
        .route("/api/register/", post(register_handler))
        .route("/api/login/", post(login_handler))
        .route("/api/logout/", post(logout_handler))
        .route("/api/token/refresh/", post(refresh_handler))

        // Quiz endpoints
        .route("/api/createQuiz/", post(create_quiz_handler))
        .route("/api/quizzes/", get(list_quizzes_handler))
        .route(
            "/api/quizzes/:id/",
            get(quiz_detail_handler)
                .put(update_quiz_handler)
                .patch(update_quiz_handler)
                .delete(delete_quiz_handler),
        )

        // Add state and middleware
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(app_state: AppState) -> Result<()> {
    let addr = format!("{}:{}", app_state.config.server.host, app_state.config.server.port);
    info!("🚀 Starting HTTP server on {}", addr);

    let app = build_router(app_state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 API server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match handlers::health_check(&state).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

/// Registration handler
async fn register_handler(State(state): State<AppState>, Payload(form): Payload<Registration>) -> Response {
    match handlers::register(&state, &form).await {
        Ok(data) => (StatusCode::CREATED, Json(data)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Login handler; sets both token cookies
async fn login_handler(State(state): State<AppState>, Payload(request): Payload<LoginRequest>) -> Response {
    match handlers::login(&state, &request).await {
        Ok((data, tokens)) => {
            let auth = state.authenticator.config();
            let cookies = [
                build_cookie(ACCESS_COOKIE, &tokens.access, auth.access_token_ttl_seconds, auth.secure_cookies),
                build_cookie(REFRESH_COOKIE, &tokens.refresh, auth.refresh_token_ttl_seconds, auth.secure_cookies),
            ];
            with_cookies((StatusCode::OK, Json(data)).into_response(), &cookies)
        }
        Err(e) => e.into_response(),
    }
}

/// Logout handler; clears both token cookies
async fn logout_handler(State(state): State<AppState>, AuthUser(user): AuthUser) -> Response {
    match handlers::logout(&state, &user).await {
        Ok(data) => {
            let secure = state.authenticator.config().secure_cookies;
            let cookies = [expired_cookie(ACCESS_COOKIE, secure), expired_cookie(REFRESH_COOKIE, secure)];
            with_cookies((StatusCode::OK, Json(data)).into_response(), &cookies)
        }
        Err(e) => e.into_response(),
    }
}

/// Access-token refresh handler; reads the refresh cookie
async fn refresh_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let refresh = read_cookie(&headers, REFRESH_COOKIE);
    match handlers::refresh_token(&state, refresh.as_deref()).await {
        Ok((data, access)) => {
            let auth = state.authenticator.config();
            let cookie = build_cookie(ACCESS_COOKIE, &access, auth.access_token_ttl_seconds, auth.secure_cookies);
            with_cookies((StatusCode::OK, Json(data)).into_response(), &[cookie])
        }
        Err(e) => e.into_response(),
    }
}

/// Quiz creation handler
async fn create_quiz_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(request): Payload<CreateQuizRequest>,
) -> Response {
    match handlers::create_quiz(&state, &user, &request).await {
        Ok(quiz) => (StatusCode::CREATED, Json(quiz)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Quiz list handler
async fn list_quizzes_handler(State(state): State<AppState>, AuthUser(user): AuthUser) -> Response {
    match handlers::list_quizzes(&state, &user).await {
        Ok(quizzes) => (StatusCode::OK, Json(quizzes)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Quiz detail handler
async fn quiz_detail_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(quiz_id): Path<i64>,
) -> Response {
    match handlers::get_quiz(&state, &user, quiz_id).await {
        Ok(quiz) => (StatusCode::OK, Json(quiz)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Quiz update handler for PUT and PATCH
async fn update_quiz_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(quiz_id): Path<i64>,
    Payload(update): Payload<QuizUpdate>,
) -> Response {
    match handlers::update_quiz(&state, &user, quiz_id, &update).await {
        Ok(quiz) => (StatusCode::OK, Json(quiz)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Quiz deletion handler
async fn delete_quiz_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(quiz_id): Path<i64>,
) -> Response {
    match handlers::delete_quiz(&state, &user, quiz_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
