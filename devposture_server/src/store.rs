//! Device record store: keyed reads, merge-upserts, filtered scans and
//! idempotent deletes over the `devices` table. All enrollment transitions
//! live in `enrollment`; this module never touches the state machine.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::models::{Device, EnrollmentStatus, NewDevice, ReportChangeset, TelemetryReport};
use crate::schema::devices;

/// Point lookup by device key.
pub fn get_device(conn: &mut SqliteConnection, key: &str) -> QueryResult<Option<Device>> {
    devices::table
        .find(key)
        .select(Device::as_select())
        .first::<Device>(conn)
        .optional()
}

/// Merge-upsert a telemetry report: creates the record if the key is new,
/// otherwise updates only the reported fields. `is_compliant` is recomputed
/// from the full check set in the same write, so it can never be stale
/// relative to the stored facts.
pub fn upsert_report(
    conn: &mut SqliteConnection,
    report: &TelemetryReport,
    now: NaiveDateTime,
) -> QueryResult<Device> {
    diesel::insert_into(devices::table)
        .values(&NewDevice::from_report(report, now))
        .on_conflict(devices::device_key)
        .do_update()
        .set(&ReportChangeset::new(report, now))
        .execute(conn)?;

    devices::table
        .find(&report.serial_number)
        .select(Device::as_select())
        .first::<Device>(conn)
}

/// All enrolled devices, in no particular order.
pub fn list_enrolled(conn: &mut SqliteConnection) -> QueryResult<Vec<Device>> {
    devices::table
        .filter(devices::enrollment_state.eq(EnrollmentStatus::Enrolled.as_str()))
        .select(Device::as_select())
        .load::<Device>(conn)
}

/// Enrolled devices owned by one user.
pub fn list_enrolled_for(conn: &mut SqliteConnection, email: &str) -> QueryResult<Vec<Device>> {
    devices::table
        .filter(devices::enrollment_state.eq(EnrollmentStatus::Enrolled.as_str()))
        .filter(devices::user_email.eq(email))
        .select(Device::as_select())
        .load::<Device>(conn)
}

/// Delete a record by (partition, key). Returns whether a row existed;
/// deleting an absent key is success, keeping admin deletes idempotent.
pub fn delete_device(
    conn: &mut SqliteConnection,
    partition: &str,
    key: &str,
) -> QueryResult<bool> {
    let deleted = diesel::delete(
        devices::table
            .filter(devices::tenant_partition.eq(partition))
            .filter(devices::device_key.eq(key)),
    )
    .execute(conn)?;

    Ok(deleted > 0)
}
