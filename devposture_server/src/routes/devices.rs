use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get};

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::Device;
use crate::store;

/// List enrolled devices, optionally filtered to one owner
#[get("/devices?<email>")]
pub async fn list_devices(
    pool: &State<DbPool>,
    email: Option<String>,
    _user: AuthUser,
) -> Result<Json<Vec<Device>>, ApiError> {
    let pool = pool.inner().clone();
    let devices = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        match email.as_deref() {
            Some(email) => store::list_enrolled_for(&mut conn, email),
            None => store::list_enrolled(&mut conn),
        }
        .map_err(ApiError::internal)
    })
    .await
    .map_err(ApiError::internal)??;

    Ok(Json(devices))
}

/// Get details for a specific device
#[get("/devices/<device_key>")]
pub async fn get_device_details(
    pool: &State<DbPool>,
    device_key: &str,
    _user: AuthUser,
) -> Result<Json<Device>, ApiError> {
    let key = device_key.to_string();
    let pool = pool.inner().clone();
    let device = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        store::get_device(&mut conn, &key).map_err(ApiError::internal)
    })
    .await
    .map_err(ApiError::internal)??;

    device
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no such device"))
}

/// Administrative delete by (partition, key). Idempotent: deleting an
/// absent key still answers 204.
#[delete("/devices/<partition>/<device_key>")]
pub async fn delete_device(
    pool: &State<DbPool>,
    partition: &str,
    device_key: &str,
    user: AuthUser,
) -> Result<Status, ApiError> {
    let partition = partition.to_string();
    let key = device_key.to_string();
    let pool = pool.inner().clone();

    let existed = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        store::delete_device(&mut conn, &partition, &key).map_err(ApiError::internal)
    })
    .await
    .map_err(ApiError::internal)??;

    if existed {
        log::info!("device {device_key} deleted by {}", user.email);
    }

    Ok(Status::NoContent)
}
