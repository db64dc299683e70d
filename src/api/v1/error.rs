use crate::api::v1::handler::ApiResponse;
use crate::application_port::SessionError;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("No such user")]
    UserNotFound,
    #[error("User already exists")]
    UserExists,
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Service temporarily unavailable")]
    StoreUnavailable,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials | ApiErrorCode::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::UserNotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::UserExists => StatusCode::CONFLICT,
            ApiErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<SessionError> for ApiErrorCode {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            SessionError::UserNotFound => ApiErrorCode::UserNotFound,
            SessionError::UserExists => ApiErrorCode::UserExists,
            // Collapsed on purpose: the caller never learns which of the
            // signature/expiry/liveness checks turned the request away.
            SessionError::TokenMalformed
            | SessionError::TokenSignatureInvalid
            | SessionError::TokenExpired
            | SessionError::TokenRevoked => ApiErrorCode::Unauthorized,
            SessionError::Store(detail) => {
                warn!("session store unavailable: {}", detail);
                ApiErrorCode::StoreUnavailable
            }
            e @ (SessionError::KeyMissing(_)
            | SessionError::Signing(_)
            | SessionError::Internal(_)) => ApiErrorCode::internal(e),
        }
    }
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, status) = if let Some(code) = err.find::<ApiErrorCode>() {
        (code.clone(), code.status())
    } else if err.find::<warp::body::BodyDeserializeError>().is_some() {
        (ApiErrorCode::InvalidRequest, StatusCode::BAD_REQUEST)
    } else if err.is_not_found() {
        (ApiErrorCode::InvalidRequest, StatusCode::NOT_FOUND)
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::InvalidRequest, StatusCode::METHOD_NOT_ALLOWED)
    } else {
        warn!("unhandled rejection: {:?}", err);
        (ApiErrorCode::InternalError, StatusCode::INTERNAL_SERVER_ERROR)
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    Ok(warp::reply::with_status(json, status))
}
