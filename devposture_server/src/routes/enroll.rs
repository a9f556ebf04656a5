use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{State, post};

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::enrollment::{self, ClaimOutcome};
use crate::error::ApiError;
use crate::models::{ClaimRequest, PollRequest, PollResponse};

/// Device-side enrollment poll (from client, unauthenticated)
#[post("/enroll/poll", format = "json", data = "<req>")]
pub async fn poll(
    pool: &State<DbPool>,
    req: Json<PollRequest>,
) -> Result<Json<PollResponse>, ApiError> {
    let req = req.into_inner();
    if req.serial_number.trim().is_empty() {
        return Err(ApiError::invalid_input("serialNumber is required"));
    }
    if req.enrollment_code.trim().is_empty() {
        return Err(ApiError::invalid_input("enrollmentCode is required"));
    }

    let pool = pool.inner().clone();
    let resp = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        enrollment::poll_enrollment(&mut conn, &req, Utc::now().naive_utc())
            .map_err(ApiError::internal)
    })
    .await
    .map_err(ApiError::internal)??;

    Ok(Json(resp))
}

/// User-side claim of a pairing code read off the device
#[post("/enroll/claim", format = "json", data = "<req>")]
pub async fn claim(
    pool: &State<DbPool>,
    req: Json<ClaimRequest>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let code = req.into_inner().code;
    if code.trim().is_empty() {
        return Err(ApiError::invalid_input("code is required"));
    }

    let claimer = user.email.clone();
    let pool = pool.inner().clone();
    let outcome = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        enrollment::claim_code(&mut conn, &code, &user.email, &user.name, Utc::now().naive_utc())
            .map_err(ApiError::internal)
    })
    .await
    .map_err(ApiError::internal)??;

    match outcome {
        ClaimOutcome::Claimed => {
            log::info!("enrollment code claimed by {claimer}");
            Ok(Json(serde_json::json!({ "success": true })))
        }
        ClaimOutcome::InvalidCode => Err(ApiError::invalid_code()),
    }
}
