//! Security-posture fact collection. Every probe is fault-isolated: a
//! failing command or unparseable output degrades to the safe negative
//! (`false` / `None`) instead of propagating.

use serde::{Deserialize, Serialize};

/// The fixed set of named posture checks reported to the server.
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
    pub fn all_pass(&self) -> bool {
        self.bitlocker && self.firewall && self.secure_boot && self.tpm && self.antivirus
    }
}

/// Domain-join identity facts, present once the device reports a
/// recognized join state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub azure_ad_device_id: Option<String>,
    pub join_type: String,
}

/// Receives one ordered event per individual check as it completes. Used
/// only for UI/log feedback, never for correctness.
pub trait ProgressObserver {
    fn on_check(&mut self, name: &'static str, passed: bool);
}

pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_check(&mut self, name: &'static str, passed: bool) {
        log::info!("check {name}: {}", if passed { "pass" } else { "fail" });
    }
}

/// Run all posture probes in a fixed order, emitting a progress event per
/// check.
pub fn collect_checks<O: ProgressObserver>(observer: &mut O) -> ComplianceChecks {
    let bitlocker = platform::disk_encryption_enabled();
    observer.on_check("disk-encryption", bitlocker);

    let tpm = platform::tpm_ready();
    observer.on_check("tpm", tpm);

    let secure_boot = platform::secure_boot_enabled();
    observer.on_check("secure-boot", secure_boot);

    let firewall = platform::firewall_enabled();
    observer.on_check("firewall", firewall);

    let antivirus = platform::antivirus_enabled();
    observer.on_check("antivirus", antivirus);

    ComplianceChecks {
        bitlocker,
        firewall,
        secure_boot,
        tpm,
        antivirus,
    }
}

pub fn collect_identity() -> Option<DeviceIdentity> {
    platform::device_identity()
}

pub fn hostname() -> String {
    platform::hostname().unwrap_or_else(|| "unknown-host".to_string())
}

pub fn os_build() -> String {
    platform::os_build().unwrap_or_default()
}

#[cfg(windows)]
mod platform {
    use super::DeviceIdentity;
    use std::process::Command;

    /// Run a PowerShell expression and return trimmed stdout, or None on
    /// any failure.
    fn run_powershell(script: &str) -> Option<String> {
        let output = Command::new("powershell")
            .args(["-NoProfile", "-Command", script])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// True when the probe prints PowerShell's `True`, an `On` status, or
    /// a `1` for numeric status values.
    fn probe_bool(name: &str, script: &str) -> bool {
        match run_powershell(script) {
            Some(out) => {
                let out = out.trim();
                out.eq_ignore_ascii_case("true") || out.eq_ignore_ascii_case("on") || out == "1"
            }
            None => {
                log::warn!("{name} probe failed, reporting non-compliant");
                false
            }
        }
    }

    pub fn disk_encryption_enabled() -> bool {
        probe_bool(
            "disk-encryption",
            "(Get-BitLockerVolume -MountPoint $env:SystemDrive).ProtectionStatus",
        )
    }

    pub fn tpm_ready() -> bool {
        probe_bool("tpm", "(Get-Tpm).TpmReady")
    }

    pub fn secure_boot_enabled() -> bool {
        probe_bool("secure-boot", "Confirm-SecureBootUEFI")
    }

    pub fn firewall_enabled() -> bool {
        // All three profiles must be enabled.
        match run_powershell("(Get-NetFirewallProfile).Enabled") {
            Some(out) if !out.is_empty() => out
                .lines()
                .all(|line| line.trim().eq_ignore_ascii_case("true")),
            _ => {
                log::warn!("firewall probe failed, reporting non-compliant");
                false
            }
        }
    }

    pub fn antivirus_enabled() -> bool {
        probe_bool("antivirus", "(Get-MpComputerStatus).AntivirusEnabled")
    }

    /// Parse `dsregcmd /status` for the device's join state. Anything the
    /// parse does not recognize reports as workgroup with no device id.
    pub fn device_identity() -> Option<DeviceIdentity> {
        let output = Command::new("dsregcmd").arg("/status").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let status = String::from_utf8_lossy(&output.stdout).to_string();

        let field = |name: &str| -> Option<String> {
            status
                .lines()
                .find(|line| line.trim_start().starts_with(name))
                .and_then(|line| line.split(':').nth(1))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let azure_joined = field("AzureAdJoined").is_some_and(|v| v.eq_ignore_ascii_case("yes"));
        let domain_joined = field("DomainJoined").is_some_and(|v| v.eq_ignore_ascii_case("yes"));

        let join_type = match (azure_joined, domain_joined) {
            (true, true) => "hybrid",
            (true, false) => "azure-ad",
            (false, true) => "domain",
            (false, false) => "workgroup",
        };

        Some(DeviceIdentity {
            azure_ad_device_id: if azure_joined { field("DeviceId") } else { None },
            join_type: join_type.to_string(),
        })
    }

    pub fn hostname() -> Option<String> {
        std::env::var("COMPUTERNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
    }

    pub fn os_build() -> Option<String> {
        run_powershell(
            "(Get-ItemProperty 'HKLM:\\SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion').CurrentBuildNumber",
        )
        .filter(|v| !v.is_empty())
    }
}

#[cfg(not(windows))]
mod platform {
    use super::DeviceIdentity;
    use std::process::Command;

    // The posture checks are Windows facts; elsewhere every probe reports
    // the safe negative.

    pub fn disk_encryption_enabled() -> bool {
        false
    }

    pub fn tpm_ready() -> bool {
        false
    }

    pub fn secure_boot_enabled() -> bool {
        false
    }

    pub fn firewall_enabled() -> bool {
        false
    }

    pub fn antivirus_enabled() -> bool {
        false
    }

    pub fn device_identity() -> Option<DeviceIdentity> {
        None
    }

    pub fn hostname() -> Option<String> {
        let output = Command::new("hostname").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() { None } else { Some(name) }
    }

    pub fn os_build() -> Option<String> {
        let output = Command::new("uname").arg("-r").output().ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
