use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{State, post};

use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{TelemetryAck, TelemetryReport};
use crate::store;

/// Receive a compliance report from an agent (from client, unauthenticated)
#[post("/report", format = "json", data = "<report>")]
pub async fn ingest_report(
    pool: &State<DbPool>,
    report: Json<TelemetryReport>,
) -> Result<Json<TelemetryAck>, ApiError> {
    let report = report.into_inner();
    if report.hostname.trim().is_empty() {
        return Err(ApiError::invalid_input("hostname is required"));
    }
    if report.serial_number.trim().is_empty() {
        return Err(ApiError::invalid_input("serialNumber is required"));
    }

    let pool = pool.inner().clone();
    let device = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        store::upsert_report(&mut conn, &report, Utc::now().naive_utc())
            .map_err(ApiError::internal)
    })
    .await
    .map_err(ApiError::internal)??;

    log::info!(
        "report from {} ({}): compliant={}",
        device.device_key,
        device.hostname,
        device.is_compliant
    );

    Ok(Json(TelemetryAck {
        success: true,
        is_compliant: device.is_compliant,
    }))
}
