use std::convert::Infallible;
use std::time::Duration;
use log::error;
use serde_json::json;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};
use crate::auth::AuthError;
use crate::discord::{DispatchError, PlatformError};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid or expired token")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests. Try again in {} minutes.", .retry_after.as_secs().div_ceil(60).max(1))]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl warp::reject::Reject for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn reject(self) -> Rejection {
        warp::reject::custom(self)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateTemplate => ApiError::BadRequest(err.to_string()),
            StoreError::TemplateNotFound => ApiError::NotFound(err.to_string()),
            StoreError::Io { .. } | StoreError::Encode(_) => {
                error!("Storage failure: {}", err);
                ApiError::Internal("Failed to save data".to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::WrongPassword => ApiError::Unauthorized(err.to_string()),
            AuthError::Malformed | AuthError::BadSignature | AuthError::Expired => ApiError::Forbidden,
            AuthError::Encode(_) | AuthError::Hash(_) => {
                error!("Auth failure: {}", err);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotConnected => ApiError::Unavailable(err.to_string()),
            PlatformError::NoGuild => ApiError::NotFound("Server not found".to_string()),
            PlatformError::Discord(_) | PlatformError::Rejected(_) => {
                error!("Discord request failed: {}", err);
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotConnected => ApiError::Unavailable(err.to_string()),
            DispatchError::ChannelNotFound => ApiError::NotFound(err.to_string()),
            DispatchError::NotTextChannel => ApiError::BadRequest(err.to_string()),
            DispatchError::MissingPermissions => ApiError::Internal(err.to_string()),
            DispatchError::Platform(inner) => inner.into(),
        }
    }
}

/// Turn every rejection into a JSON `{error}` body with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message, retry_after) = if let Some(api) = err.find::<ApiError>() {
        let retry_after = match api {
            ApiError::RateLimited { retry_after } => Some(retry_after.as_secs().max(1)),
            _ => None,
        };
        (api.status(), api.to_string(), retry_after)
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string(), None)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e), None)
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string(), None)
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string(), None)
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected a JSON body".to_string(), None)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string(), None)
    } else if err.find::<warp::filters::cors::CorsForbidden>().is_some() {
        (StatusCode::FORBIDDEN, "Origin not allowed".to_string(), None)
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string(), None)
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), None)
    };

    let body = match retry_after {
        Some(secs) => json!({ "error": message, "retry_after_seconds": secs }),
        None => json!({ "error": message }),
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
