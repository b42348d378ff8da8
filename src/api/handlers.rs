//! API request handlers

use anyhow::Result;
use serde_json::Value;
use tracing::info;

use super::models::{ApiError, CreateQuizRequest, LoginRequest, INVALID_REQUEST_DATA};
use super::server::AppState;
use crate::auth::{Registration, TokenPair, User};
use crate::quiz::{Quiz, QuizUpdate};

/// Handle health check requests
pub async fn health_check(state: &AppState) -> Result<Value> {
    Ok(serde_json::json!({
        "status": "healthy",
        "service": "video-quiz-api",
        "version": env!("CARGO_PKG_VERSION"),
        "generation_mode": state.config.llm.generation_mode.as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Handle account registration
pub async fn register(state: &AppState, form: &Registration) -> Result<Value, ApiError> {
    state.authenticator.register(form)?;
    Ok(serde_json::json!({ "detail": "User created successfully!" }))
}

/// Handle login; returns the body and the tokens to set as cookies
pub async fn login(state: &AppState, request: &LoginRequest) -> Result<(Value, TokenPair), ApiError> {
    let username = request.username.as_deref().unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();
    if username.trim().is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest("Username and password are required.".to_string()));
    }

    let (user, tokens) = state.authenticator.login(username.trim(), password)?;
    let body = serde_json::json!({
        "detail": "Login successful",
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
        }
    });
    Ok((body, tokens))
}

/// Handle logout
pub async fn logout(state: &AppState, user: &User) -> Result<Value, ApiError> {
    state.authenticator.logout(user)?;
    Ok(serde_json::json!({
        "detail": "Log-Out successfully! All Tokens will be deleted. Refresh token is now invalid."
    }))
}

/// Handle access-token refresh; `None` means no refresh cookie was sent
pub async fn refresh_token(state: &AppState, refresh: Option<&str>) -> Result<(Value, String), ApiError> {
    let refresh = refresh.ok_or_else(|| ApiError::BadRequest("Refresh token not found!".to_string()))?;

    let access = state
        .authenticator
        .refresh(refresh)?
        .ok_or(ApiError::InvalidRefreshToken)?;

    let body = serde_json::json!({
        "detail": "Token refreshed",
        "access": access,
    });
    Ok((body, access))
}

/// Handle quiz creation from a video URL
pub async fn create_quiz(state: &AppState, user: &User, request: &CreateQuizRequest) -> Result<Quiz, ApiError> {
    let url = request
        .url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(INVALID_REQUEST_DATA.to_string()))?;

    info!("📥 Quiz requested by {} for {}", user.username, url);
    Ok(state.pipeline.create_quiz(url, user.id).await?)
}

/// Handle quiz listing; only the caller's quizzes, newest first
pub async fn list_quizzes(state: &AppState, user: &User) -> Result<Vec<Quiz>, ApiError> {
    Ok(state.store.list_quizzes(user.id)?)
}

/// Handle quiz detail requests
pub async fn get_quiz(state: &AppState, user: &User, quiz_id: i64) -> Result<Quiz, ApiError> {
    state.store.get_quiz(user.id, quiz_id)?.ok_or(ApiError::NotFound)
}

/// Handle full or partial quiz updates; only title and description change
pub async fn update_quiz(state: &AppState, user: &User, quiz_id: i64, update: &QuizUpdate) -> Result<Quiz, ApiError> {
    state
        .store
        .update_quiz(user.id, quiz_id, update)?
        .ok_or(ApiError::NotFound)
}

/// Handle quiz deletion
pub async fn delete_quiz(state: &AppState, user: &User, quiz_id: i64) -> Result<(), ApiError> {
    if state.store.delete_quiz(user.id, quiz_id)? {
        info!("🗑️  Quiz {} deleted by {}", quiz_id, user.username);
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}
