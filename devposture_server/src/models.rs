use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::devices;

/// Partition identifier for this single-tenant deployment.
pub const TENANT_PARTITION: &str = "devices";

/// Enrollment state of a device record. A device with no record at all is
/// implicitly unenrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Enrolled,
}

impl EnrollmentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Enrolled => "enrolled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EnrollmentStatus::Pending),
            "enrolled" => Some(EnrollmentStatus::Enrolled),
            _ => None,
        }
    }
}

/// The fixed set of named security-posture checks. New checks are a schema
/// change, not a runtime key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceChecks {
    pub bitlocker: bool,
    pub firewall: bool,
    pub secure_boot: bool,
    pub tpm: bool,
    pub antivirus: bool,
}

impl ComplianceChecks {
    /// A device is compliant only when every check passes.
    pub fn all_pass(&self) -> bool {
        self.bitlocker && self.firewall && self.secure_boot && self.tpm && self.antivirus
    }
}

#[derive(Queryable, Identifiable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = devices)]
#[diesel(primary_key(device_key))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_key: String,
    pub tenant_partition: String,
    pub hostname: String,
    pub os_build: String,
    pub check_disk_encryption: bool,
    pub check_tpm: bool,
    pub check_secure_boot: bool,
    pub check_firewall: bool,
    pub check_antivirus: bool,
    pub is_compliant: bool,
    pub last_seen: NaiveDateTime,
    pub enrollment_state: String,
    #[serde(skip_serializing, default)]
    pub enrollment_code: Option<String>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub azure_ad_device_id: Option<String>,
    pub join_type: Option<String>,
}

impl Device {
    pub fn enrollment_status(&self) -> EnrollmentStatus {
        EnrollmentStatus::parse(&self.enrollment_state).unwrap_or(EnrollmentStatus::Pending)
    }

    pub fn checks(&self) -> ComplianceChecks {
        ComplianceChecks {
            bitlocker: self.check_disk_encryption,
            firewall: self.check_firewall,
            secure_boot: self.check_secure_boot,
            tpm: self.check_tpm,
            antivirus: self.check_antivirus,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = devices)]
pub struct NewDevice<'a> {
    pub device_key: &'a str,
    pub tenant_partition: &'a str,
    pub hostname: &'a str,
    pub os_build: &'a str,
    pub check_disk_encryption: bool,
    pub check_tpm: bool,
    pub check_secure_boot: bool,
    pub check_firewall: bool,
    pub check_antivirus: bool,
    pub is_compliant: bool,
    pub last_seen: NaiveDateTime,
    pub enrollment_state: &'a str,
    pub enrollment_code: Option<&'a str>,
    pub user_email: Option<&'a str>,
    pub user_name: Option<&'a str>,
    pub azure_ad_device_id: Option<&'a str>,
    pub join_type: Option<&'a str>,
}

impl<'a> NewDevice<'a> {
    /// Record shape for a first-time enrollment poll: no facts yet, a live
    /// pairing code, no owner.
    pub fn pending(
        device_key: &'a str,
        hostname: &'a str,
        os_build: &'a str,
        code: &'a str,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            device_key,
            tenant_partition: TENANT_PARTITION,
            hostname,
            os_build,
            check_disk_encryption: false,
            check_tpm: false,
            check_secure_boot: false,
            check_firewall: false,
            check_antivirus: false,
            is_compliant: false,
            last_seen: now,
            enrollment_state: EnrollmentStatus::Pending.as_str(),
            enrollment_code: Some(code),
            user_email: None,
            user_name: None,
            azure_ad_device_id: None,
            join_type: None,
        }
    }

    /// Record shape for a telemetry report arriving before any enrollment
    /// poll ever did.
    pub fn from_report(report: &'a TelemetryReport, now: NaiveDateTime) -> Self {
        Self {
            device_key: &report.serial_number,
            tenant_partition: TENANT_PARTITION,
            hostname: &report.hostname,
            os_build: &report.os_build,
            check_disk_encryption: report.checks.bitlocker,
            check_tpm: report.checks.tpm,
            check_secure_boot: report.checks.secure_boot,
            check_firewall: report.checks.firewall,
            check_antivirus: report.checks.antivirus,
            is_compliant: report.checks.all_pass(),
            last_seen: now,
            enrollment_state: EnrollmentStatus::Pending.as_str(),
            enrollment_code: None,
            user_email: report.user_email.as_deref(),
            user_name: report.user_name.as_deref(),
            azure_ad_device_id: report.azure_ad_device_id.as_deref(),
            join_type: report.join_type.as_deref(),
        }
    }
}

/// Merge changeset for a telemetry report. Optional fields left as `None`
/// are skipped by `AsChangeset`, so an absent identity never clears a
/// stored one.
#[derive(AsChangeset)]
#[diesel(table_name = devices)]
pub struct ReportChangeset<'a> {
    pub hostname: &'a str,
    pub os_build: &'a str,
    pub check_disk_encryption: bool,
    pub check_tpm: bool,
    pub check_secure_boot: bool,
    pub check_firewall: bool,
    pub check_antivirus: bool,
    pub is_compliant: bool,
    pub last_seen: NaiveDateTime,
    pub user_email: Option<&'a str>,
    pub user_name: Option<&'a str>,
    pub azure_ad_device_id: Option<&'a str>,
    pub join_type: Option<&'a str>,
}

impl<'a> ReportChangeset<'a> {
    pub fn new(report: &'a TelemetryReport, now: NaiveDateTime) -> Self {
        Self {
            hostname: &report.hostname,
            os_build: &report.os_build,
            check_disk_encryption: report.checks.bitlocker,
            check_tpm: report.checks.tpm,
            check_secure_boot: report.checks.secure_boot,
            check_firewall: report.checks.firewall,
            check_antivirus: report.checks.antivirus,
            is_compliant: report.checks.all_pass(),
            last_seen: now,
            user_email: report.user_email.as_deref(),
            user_name: report.user_name.as_deref(),
            azure_ad_device_id: report.azure_ad_device_id.as_deref(),
            join_type: report.join_type.as_deref(),
        }
    }
}

/// Telemetry body posted by the agent every reporting cycle. The serial
/// number is the agent-resolved device key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    pub hostname: String,
    pub serial_number: String,
    #[serde(default)]
    pub os_build: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub azure_ad_device_id: Option<String>,
    pub join_type: Option<String>,
    pub checks: ComplianceChecks,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryAck {
    pub success: bool,
    pub is_compliant: bool,
}

/// Device-side enrollment poll body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub serial_number: String,
    pub hostname: String,
    pub enrollment_code: String,
    #[serde(default)]
    pub os_build: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub status: EnrollmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl PollResponse {
    pub fn pending() -> Self {
        Self {
            status: EnrollmentStatus::Pending,
            user_email: None,
            user_name: None,
        }
    }

    pub fn enrolled(user_email: Option<String>, user_name: Option<String>) -> Self {
        Self {
            status: EnrollmentStatus::Enrolled,
            user_email,
            user_name,
        }
    }
}

/// User-side claim body.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub code: String,
}
