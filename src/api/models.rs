//! API data models

use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::auth::AuthError;
use crate::processing::PipelineError;

/// Body of `POST /api/login/`
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Body of `POST /api/createQuiz/`
#[derive(Debug, Default, Deserialize)]
pub struct CreateQuizRequest {
    pub url: Option<String>,
}

pub const INVALID_REQUEST_DATA: &str = "Invalid URL or request data.";

/// Request body read as JSON, or as a form when sent url-encoded.
///
/// An empty body yields `T::default()`; anything unreadable is a JSON 400.
#[derive(Debug)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Default + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|_| ApiError::BadRequest(INVALID_REQUEST_DATA.to_string()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload(T::default()));
        }

        if is_form {
            let req = Request::from_parts(parts, axum::body::Body::from(bytes));
            let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
                debug!("Rejected form body: {}", e);
                ApiError::BadRequest(INVALID_REQUEST_DATA.to_string())
            })?;
            return Ok(Payload(value));
        }

        serde_json::from_slice(&bytes).map(Payload).map_err(|e| {
            debug!("Rejected JSON body: {}", e);
            ApiError::BadRequest(INVALID_REQUEST_DATA.to_string())
        })
    }
}

/// Error returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 with `{"detail": ...}`
    #[error("{0}")]
    BadRequest(String),

    /// 400 with `{"error": ...}`
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    /// 401 with `{"message": ...}`
    #[error("Refresh Token invalid!")]
    InvalidRefreshToken,

    #[error("Not found.")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) | ApiError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(message) => serde_json::json!({ "error": message }),
            ApiError::InvalidRefreshToken => serde_json::json!({ "message": self.to_string() }),
            other => serde_json::json!({ "detail": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("Internal error: {:#}", e);
        ApiError::Internal(e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        if e.is_client_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(message) => ApiError::Validation(message),
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized(AuthError::InvalidCredentials.to_string())
            }
            AuthError::Internal(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<CreateQuizRequest, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let req = builder.body(Body::from(body)).unwrap();
        Payload::<CreateQuizRequest>::from_request(req, &()).await.map(|Payload(v)| v)
    }

    #[tokio::test]
    async fn test_payload_formats() {
        let json = extract(Some("application/json"), r#"{"url": "https://youtu.be/a"}"#).await.unwrap();
        assert_eq!(json.url.as_deref(), Some("https://youtu.be/a"));

        let untyped = extract(None, r#"{"url": "https://youtu.be/b"}"#).await.unwrap();
        assert_eq!(untyped.url.as_deref(), Some("https://youtu.be/b"));

        let form = extract(Some("application/x-www-form-urlencoded"), "url=https%3A%2F%2Fyoutu.be%2Fc")
            .await
            .unwrap();
        assert_eq!(form.url.as_deref(), Some("https://youtu.be/c"));

        let empty = extract(None, "").await.unwrap();
        assert!(empty.url.is_none());
    }

    #[tokio::test]
    async fn test_payload_rejection_is_bad_request() {
        let err = extract(Some("application/json"), "{not json").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), INVALID_REQUEST_DATA);

        let err = extract(Some("application/json"), r#"{"url": 42}"#).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pipeline_errors_map_to_status() {
        let invalid: ApiError = PipelineError::InvalidInput("empty".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let download: ApiError = PipelineError::DownloadFailure("boom".into()).into();
        assert_eq!(download.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(download.to_string(), "Error downloading audio: boom");
    }

    #[test]
    fn test_auth_errors_map_to_status() {
        let validation: ApiError = AuthError::Validation("Passwords do not match".into()).into();
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);

        let credentials: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(credentials.status(), StatusCode::UNAUTHORIZED);
    }
}
