//! API error type
//!
//! Every handler returns `Result<_, ApiError>`; this is the one place that
//! decides status codes and what text reaches the client.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::ai::AiError;
use crate::auth::AuthError;
use crate::store::StoreError;

/// Generic message for unexpected failures
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400
    #[error("{0}")]
    Validation(String),

    /// 401 (and 500 for internal auth failures)
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 409
    #[error("{0}")]
    Conflict(String),

    /// 429
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// 500; `detail` is logged, `message` is sent
    #[error("{detail}")]
    Internal { message: String, detail: String },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            message: GENERIC_FAILURE.to_string(),
            detail: detail.into(),
        }
    }

    /// Map an AI failure; `fallback` is what the client sees for anything
    /// that is neither a rate limit nor a rejected prompt.
    pub fn from_ai(err: AiError, fallback: &str) -> Self {
        match err {
            AiError::RateLimited(message) => Self::RateLimited {
                message,
                retry_after_secs: None,
            },
            AiError::InvalidRequest(message) => Self::Validation(message),
            err @ AiError::Service(_) => Self::Internal {
                message: fallback.to_string(),
                detail: err.to_string(),
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsernameTaken => Self::Conflict(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            ApiError::Auth(err) => return err.into_response(),
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message, None),
            ApiError::RateLimited {
                message,
                retry_after_secs,
            } => (StatusCode::TOO_MANY_REQUESTS, message, retry_after_secs),
            ApiError::Internal { message, detail } => {
                error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, message, None)
            }
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// `Json<T>` whose rejection is a 400 in the API's error shape
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation(rejection_message(&rejection))),
        }
    }
}

/// `Path<T>` whose rejection is a 400 in the API's error shape
pub struct PathParam<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation(format!(
                "Invalid path parameter: {}",
                rejection.body_text()
            ))),
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body".to_string(),
        JsonRejection::JsonDataError(e) => format!("Invalid request body: {}", e.body_text()),
        _ => "Invalid JSON body".to_string(),
    }
}
