use rocket::serde::json::Json;
use rocket::{Responder, catch};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API error taxonomy. Interactive callers get a distinct status and body
/// per class; transient/internal failures are logged server-side and
/// surfaced as a generic message.
#[derive(Debug, Responder)]
pub enum ApiError {
    #[response(status = 400)]
    InvalidInput(Json<ErrorBody>),
    #[response(status = 401)]
    Unauthorized(Json<ErrorBody>),
    #[response(status = 404)]
    NotFound(Json<ErrorBody>),
    #[response(status = 404)]
    InvalidCode(Json<ErrorBody>),
    #[response(status = 500)]
    Internal(Json<ErrorBody>),
}

impl ApiError {
    pub fn invalid_input(msg: &str) -> Self {
        ApiError::InvalidInput(Json(ErrorBody { error: msg.into() }))
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized(Json(ErrorBody {
            error: "authentication required".into(),
        }))
    }

    pub fn not_found(msg: &str) -> Self {
        ApiError::NotFound(Json(ErrorBody { error: msg.into() }))
    }

    /// Claim failures carry their own body so the UI can render a specific
    /// message instead of a generic 404.
    pub fn invalid_code() -> Self {
        ApiError::InvalidCode(Json(ErrorBody {
            error: "invalid or already claimed code".into(),
        }))
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        log::error!("internal error: {err}");
        ApiError::Internal(Json(ErrorBody {
            error: "internal server error".into(),
        }))
    }
}

/// Request-guard rejections (no resolved identity) land here so the 401
/// carries the same error body shape as every other failure.
#[catch(401)]
pub fn unauthorized_catcher() -> ApiError {
    ApiError::unauthorized()
}
