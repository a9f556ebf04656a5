//! Background sweep of abandoned enrollment codes. A device that is still
//! waiting refreshes `last_seen` on every poll tick, so only codes nobody
//! is polling for anymore age out.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Build, Rocket, tokio};
use std::time::Duration;

use crate::db::DbPool;
use crate::models::EnrollmentStatus;
use crate::schema::devices;
use crate::settings::Settings;

const SWEEP_INTERVAL_SECS: u64 = 60;

/// Delete pending records whose code has outlived the TTL. Records without
/// a code (devices reporting telemetry while unenrolled) are left alone.
pub fn sweep_stale_pending(
    conn: &mut SqliteConnection,
    ttl_secs: i64,
    now: NaiveDateTime,
) -> QueryResult<usize> {
    let cutoff = now - chrono::Duration::seconds(ttl_secs);

    diesel::delete(
        devices::table
            .filter(devices::enrollment_state.eq(EnrollmentStatus::Pending.as_str()))
            .filter(devices::enrollment_code.is_not_null())
            .filter(devices::last_seen.lt(cutoff)),
    )
    .execute(conn)
}

pub struct PendingSweepFairing;

#[rocket::async_trait]
impl Fairing for PendingSweepFairing {
    fn info(&self) -> Info {
        Info {
            name: "Stale Enrollment Code Sweeper",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let pool = rocket
            .state::<DbPool>()
            .expect("DbPool not managed")
            .clone();
        let ttl_secs = rocket
            .state::<Settings>()
            .map(|s| s.pending_code_ttl_secs)
            .unwrap_or_else(|| Settings::default().pending_code_ttl_secs);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(SWEEP_INTERVAL_SECS)).await;

                let pool = pool.clone();
                let _ = tokio::task::spawn_blocking(move || {
                    let mut conn = pool.get().ok()?;
                    match sweep_stale_pending(&mut conn, ttl_secs, Utc::now().naive_utc()) {
                        Ok(0) => {}
                        Ok(n) => log::info!("swept {n} stale pending enrollment(s)"),
                        Err(e) => log::warn!("pending sweep failed: {e}"),
                    }
                    Some(())
                })
                .await;
            }
        });

        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment;
    use crate::models::PollRequest;
    use crate::store;
    use crate::store::tests::{test_conn, test_now};

    fn poll(serial: &str, code: &str) -> PollRequest {
        PollRequest {
            serial_number: serial.into(),
            hostname: "LAB-01".into(),
            enrollment_code: code.into(),
            os_build: "10.0.26100".into(),
        }
    }

    #[test]
    fn sweep_only_removes_aged_out_codes() {
        let mut conn = test_conn();
        let now = test_now();
        let stale = now - chrono::Duration::seconds(7200);

        // Abandoned pending code, live pending code, and an enrolled device.
        enrollment::poll_enrollment(&mut conn, &poll("sn-stale", "AAAAAA"), stale).unwrap();
        enrollment::poll_enrollment(&mut conn, &poll("sn-live", "BBBBBB"), now).unwrap();
        enrollment::poll_enrollment(&mut conn, &poll("sn-done", "CCCCCC"), stale).unwrap();
        enrollment::claim_code(&mut conn, "CCCCCC", "jan@example.com", "Jan", stale).unwrap();

        let swept = sweep_stale_pending(&mut conn, 3600, now).unwrap();
        assert_eq!(swept, 1);

        assert!(store::get_device(&mut conn, "sn-stale").unwrap().is_none());
        assert!(store::get_device(&mut conn, "sn-live").unwrap().is_some());
        // Enrolled records never expire, however old.
        assert!(store::get_device(&mut conn, "sn-done").unwrap().is_some());
    }
}
