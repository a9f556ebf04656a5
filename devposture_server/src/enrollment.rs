//! Enrollment coordinator: the pending-code handshake between an
//! unauthenticated device (poll side) and an authenticated user (claim
//! side). The claim is a single conditional UPDATE keyed on the code value,
//! so two racing claimants can never both win.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::models::{EnrollmentStatus, NewDevice, PollRequest, PollResponse};
use crate::schema::devices;
use crate::store;

/// Outcome of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// No live pending code matched: unknown, already claimed, or expired.
    InvalidCode,
}

/// Device-side poll. Enrolled devices get their claimed identity back
/// immediately (idempotent read-through); anything else is upserted into a
/// pending record announcing the device-generated code.
pub fn poll_enrollment(
    conn: &mut SqliteConnection,
    req: &PollRequest,
    now: NaiveDateTime,
) -> QueryResult<PollResponse> {
    if let Some(device) = store::get_device(conn, &req.serial_number)? {
        if device.enrollment_status() == EnrollmentStatus::Enrolled {
            return Ok(PollResponse::enrolled(device.user_email, device.user_name));
        }
    }

    let inserted = diesel::insert_into(devices::table)
        .values(&NewDevice::pending(
            &req.serial_number,
            &req.hostname,
            &req.os_build,
            &req.enrollment_code,
            now,
        ))
        .on_conflict_do_nothing()
        .execute(conn)?;

    if inserted == 0 {
        // Existing record: refresh the announced code and descriptive
        // fields, but never touch a record a claim has already enrolled.
        diesel::update(
            devices::table
                .filter(devices::device_key.eq(&req.serial_number))
                .filter(devices::enrollment_state.ne(EnrollmentStatus::Enrolled.as_str())),
        )
        .set((
            devices::enrollment_code.eq(&req.enrollment_code),
            devices::hostname.eq(&req.hostname),
            devices::os_build.eq(&req.os_build),
            devices::last_seen.eq(now),
        ))
        .execute(conn)?;
    }

    Ok(PollResponse::pending())
}

/// User-side claim. The claim resolves to one candidate row, then the
/// WHERE clause on (key, code) is the compare-and-swap: the row is
/// transitioned and the code cleared only if the code still matches, so
/// the first claimant wins and every later attempt sees zero affected
/// rows. Keying the update also bounds a cross-device code collision to
/// a single row.
pub fn claim_code(
    conn: &mut SqliteConnection,
    code: &str,
    claimer_email: &str,
    claimer_name: &str,
    now: NaiveDateTime,
) -> QueryResult<ClaimOutcome> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Ok(ClaimOutcome::InvalidCode);
    }

    let candidate = devices::table
        .filter(devices::enrollment_code.eq(&code))
        .select(devices::device_key)
        .first::<String>(conn)
        .optional()?;

    let Some(key) = candidate else {
        return Ok(ClaimOutcome::InvalidCode);
    };

    let claimed = diesel::update(
        devices::table
            .filter(devices::device_key.eq(&key))
            .filter(devices::enrollment_code.eq(&code)),
    )
    .set((
        devices::enrollment_state.eq(EnrollmentStatus::Enrolled.as_str()),
        devices::user_email.eq(claimer_email),
        devices::user_name.eq(claimer_name),
        devices::enrollment_code.eq(None::<&str>),
        devices::last_seen.eq(now),
    ))
    .execute(conn)?;

    if claimed == 1 {
        Ok(ClaimOutcome::Claimed)
    } else {
        Ok(ClaimOutcome::InvalidCode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComplianceChecks;
    use crate::store::tests::{report, test_conn, test_now};

    fn poll(serial: &str, hostname: &str, code: &str) -> PollRequest {
        PollRequest {
            serial_number: serial.into(),
            hostname: hostname.into(),
            enrollment_code: code.into(),
            os_build: "10.0.26100".into(),
        }
    }

    #[test]
    fn first_poll_creates_pending_record() {
        let mut conn = test_conn();

        let resp = poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "AB12CD"), test_now()).unwrap();
        assert_eq!(resp.status, EnrollmentStatus::Pending);

        let device = store::get_device(&mut conn, "sn-1").unwrap().unwrap();
        assert_eq!(device.enrollment_status(), EnrollmentStatus::Pending);
        assert_eq!(device.enrollment_code.as_deref(), Some("AB12CD"));
        assert_eq!(device.hostname, "LAB-01");
        assert!(device.user_email.is_none());
    }

    #[test]
    fn repolling_refreshes_the_announced_code() {
        let mut conn = test_conn();
        poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "AB12CD"), test_now()).unwrap();
        poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "XY34ZW"), test_now()).unwrap();

        let device = store::get_device(&mut conn, "sn-1").unwrap().unwrap();
        assert_eq!(device.enrollment_code.as_deref(), Some("XY34ZW"));
    }

    #[test]
    fn claim_enrolls_and_clears_the_code() {
        let mut conn = test_conn();
        poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "AB12CD"), test_now()).unwrap();

        let outcome =
            claim_code(&mut conn, "AB12CD", "jan@example.com", "Jan Kowalski", test_now()).unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);

        let device = store::get_device(&mut conn, "sn-1").unwrap().unwrap();
        assert_eq!(device.enrollment_status(), EnrollmentStatus::Enrolled);
        assert_eq!(device.user_email.as_deref(), Some("jan@example.com"));
        assert_eq!(device.user_name.as_deref(), Some("Jan Kowalski"));
        assert!(device.enrollment_code.is_none());
    }

    #[test]
    fn second_claim_of_the_same_code_loses() {
        let mut conn = test_conn();
        poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "AB12CD"), test_now()).unwrap();

        let first =
            claim_code(&mut conn, "AB12CD", "first@example.com", "First", test_now()).unwrap();
        let second =
            claim_code(&mut conn, "AB12CD", "second@example.com", "Second", test_now()).unwrap();
        assert_eq!(first, ClaimOutcome::Claimed);
        assert_eq!(second, ClaimOutcome::InvalidCode);

        // Exactly one identity, matching the winner.
        let device = store::get_device(&mut conn, "sn-1").unwrap().unwrap();
        assert_eq!(device.user_email.as_deref(), Some("first@example.com"));
        assert_eq!(device.user_name.as_deref(), Some("First"));
    }

    #[test]
    fn unknown_code_is_invalid() {
        let mut conn = test_conn();
        let outcome =
            claim_code(&mut conn, "NOSUCH", "jan@example.com", "Jan", test_now()).unwrap();
        assert_eq!(outcome, ClaimOutcome::InvalidCode);
        assert_eq!(claim_code(&mut conn, "  ", "jan@example.com", "Jan", test_now()).unwrap(),
            ClaimOutcome::InvalidCode);
    }

    #[test]
    fn claim_normalizes_user_typed_codes() {
        let mut conn = test_conn();
        poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "AB12CD"), test_now()).unwrap();

        let outcome =
            claim_code(&mut conn, " ab12cd ", "jan@example.com", "Jan", test_now()).unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[test]
    fn colliding_codes_bind_at_most_one_device() {
        let mut conn = test_conn();

        // Two pending devices happen to announce the same code.
        poll_enrollment(&mut conn, &poll("sn-a", "LAB-01", "AB12CD"), test_now()).unwrap();
        poll_enrollment(&mut conn, &poll("sn-b", "LAB-02", "AB12CD"), test_now()).unwrap();

        let outcome =
            claim_code(&mut conn, "AB12CD", "user@example.com", "User", test_now()).unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);

        // Exactly one of the two rows was enrolled to the claimant.
        let a = store::get_device(&mut conn, "sn-a").unwrap().unwrap();
        let b = store::get_device(&mut conn, "sn-b").unwrap().unwrap();
        let enrolled: Vec<_> = [&a, &b]
            .into_iter()
            .filter(|d| d.enrollment_status() == EnrollmentStatus::Enrolled)
            .collect();
        assert_eq!(enrolled.len(), 1);
        assert_eq!(enrolled[0].user_email.as_deref(), Some("user@example.com"));

        // The losing device is untouched and still awaiting its own claim.
        let pending = if a.enrollment_status() == EnrollmentStatus::Enrolled { &b } else { &a };
        assert_eq!(pending.enrollment_status(), EnrollmentStatus::Pending);
        assert!(pending.user_email.is_none());
    }

    #[test]
    fn poll_after_claim_returns_the_claimed_identity() {
        let mut conn = test_conn();
        poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "AB12CD"), test_now()).unwrap();
        claim_code(&mut conn, "AB12CD", "jan@example.com", "Jan", test_now()).unwrap();

        // Idempotent, and the code value no longer matters.
        for code in ["AB12CD", "SOMETHING-ELSE"] {
            let resp = poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", code), test_now()).unwrap();
            assert_eq!(resp.status, EnrollmentStatus::Enrolled);
            assert_eq!(resp.user_email.as_deref(), Some("jan@example.com"));
            assert_eq!(resp.user_name.as_deref(), Some("Jan"));
        }

        // A post-claim poll must not have resurrected a pending code.
        let device = store::get_device(&mut conn, "sn-1").unwrap().unwrap();
        assert!(device.enrollment_code.is_none());
    }

    #[test]
    fn poll_upserts_record_created_by_early_telemetry() {
        let mut conn = test_conn();
        store::upsert_report(
            &mut conn,
            &report("sn-1", ComplianceChecks::default()),
            test_now(),
        )
        .unwrap();

        let resp = poll_enrollment(&mut conn, &poll("sn-1", "LAB-01", "AB12CD"), test_now()).unwrap();
        assert_eq!(resp.status, EnrollmentStatus::Pending);

        let device = store::get_device(&mut conn, "sn-1").unwrap().unwrap();
        assert_eq!(device.enrollment_code.as_deref(), Some("AB12CD"));
    }

    #[test]
    fn full_pairing_scenario() {
        let mut conn = test_conn();

        // Device announces its code.
        let resp = poll_enrollment(&mut conn, &poll("sn-lab", "LAB-01", "AB12CD"), test_now()).unwrap();
        assert_eq!(resp.status, EnrollmentStatus::Pending);

        // User claims it; a second claimant is turned away.
        assert_eq!(
            claim_code(&mut conn, "AB12CD", "admin@example.com", "Admin", test_now()).unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            claim_code(&mut conn, "AB12CD", "intruder@example.com", "Intruder", test_now()).unwrap(),
            ClaimOutcome::InvalidCode
        );

        // Device detects completion on its next poll tick.
        let resp = poll_enrollment(&mut conn, &poll("sn-lab", "LAB-01", "AB12CD"), test_now()).unwrap();
        assert_eq!(resp.status, EnrollmentStatus::Enrolled);
        assert_eq!(resp.user_email.as_deref(), Some("admin@example.com"));
    }
}
