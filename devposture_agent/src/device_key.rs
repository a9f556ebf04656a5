//! Stable device key resolution. The BIOS serial is preferred but OEMs
//! ship placeholder values, so the chain falls back through motherboard
//! UUID, MAC address, machine GUID and finally hostname. Each tier tags
//! its value with a prefix so collisions across tiers are impossible, and
//! resolution never fails outright.

/// Known placeholder values OEMs leave in the serial field, lowercased.
const PLACEHOLDER_VALUES: &[&str] = &[
    "default string",
    "to be filled by o.e.m.",
    "to be filled by oem",
    "system serial number",
    "serial number",
    "not specified",
    "not applicable",
    "none",
    "unknown",
    "n/a",
    "na",
    "123456789",
    "oem",
];

pub(crate) fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    if v.is_empty() {
        return true;
    }
    if v.chars().all(|c| c == '0' || c == '-' || c == '.') {
        return true;
    }
    PLACEHOLDER_VALUES.contains(&v.as_str())
}

#[derive(Debug, Default)]
pub(crate) struct KeyCandidates {
    pub serial: Option<String>,
    pub board_uuid: Option<String>,
    pub mac: Option<String>,
    pub machine_guid: Option<String>,
    pub hostname: String,
}

/// Walk the fallback chain, skipping placeholder values at every tier.
pub(crate) fn pick_key(candidates: KeyCandidates) -> String {
    let tiers = [
        ("sn", candidates.serial),
        ("uuid", candidates.board_uuid),
        ("mac", candidates.mac),
        ("mg", candidates.machine_guid),
    ];

    for (prefix, value) in tiers {
        if let Some(value) = value {
            let value = value.trim();
            if !is_placeholder(value) {
                return format!("{prefix}-{value}");
            }
        }
    }

    let hostname = candidates.hostname.trim();
    if hostname.is_empty() {
        "host-unknown".to_string()
    } else {
        format!("host-{hostname}")
    }
}

/// Resolve the device key from the local hardware.
pub fn resolve_device_key() -> String {
    pick_key(KeyCandidates {
        serial: platform::bios_serial(),
        board_uuid: platform::board_uuid(),
        mac: platform::primary_mac().map(normalize_mac),
        machine_guid: platform::machine_guid(),
        hostname: crate::facts::hostname(),
    })
}

fn normalize_mac(mac: String) -> String {
    mac.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(windows)]
mod platform {
    use std::process::Command;

    /// Last non-empty stdout line of a command, the WMIC output shape.
    fn last_line(cmd: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(cmd).args(args).output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .next_back()
            .map(str::to_string)
    }

    pub fn bios_serial() -> Option<String> {
        last_line("wmic", &["bios", "get", "serialnumber"])
            .filter(|s| !s.eq_ignore_ascii_case("serialnumber"))
    }

    pub fn board_uuid() -> Option<String> {
        last_line("wmic", &["csproduct", "get", "uuid"])
            .filter(|s| !s.eq_ignore_ascii_case("uuid"))
    }

    pub fn primary_mac() -> Option<String> {
        let output = Command::new("getmac").args(["/fo", "csv", "/nh"]).output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()?
            .split(',')
            .next()
            .map(|field| field.trim_matches('"').to_string())
            .filter(|mac| !mac.is_empty())
    }

    pub fn machine_guid() -> Option<String> {
        let output = Command::new("reg")
            .args([
                "query",
                r"HKLM\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
            ])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find(|line| line.contains("MachineGuid"))
            .and_then(|line| line.split_whitespace().next_back())
            .map(str::to_string)
    }
}

#[cfg(not(windows))]
mod platform {
    use std::fs;

    fn read_dmi(name: &str) -> Option<String> {
        let value = fs::read_to_string(format!("/sys/class/dmi/id/{name}")).ok()?;
        let value = value.trim().to_string();
        if value.is_empty() { None } else { Some(value) }
    }

    pub fn bios_serial() -> Option<String> {
        read_dmi("product_serial")
    }

    pub fn board_uuid() -> Option<String> {
        read_dmi("product_uuid")
    }

    pub fn primary_mac() -> Option<String> {
        let entries = fs::read_dir("/sys/class/net").ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy() == "lo" {
                continue;
            }
            if let Ok(mac) = fs::read_to_string(entry.path().join("address")) {
                let mac = mac.trim().to_string();
                if !mac.is_empty() {
                    return Some(mac);
                }
            }
        }
        None
    }

    pub fn machine_guid() -> Option<String> {
        let value = fs::read_to_string("/etc/machine-id").ok()?;
        let value = value.trim().to_string();
        if value.is_empty() { None } else { Some(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("Default string"));
        assert!(is_placeholder("To Be Filled By O.E.M."));
        assert!(is_placeholder("0000000000"));
        assert!(is_placeholder("----"));
        assert!(!is_placeholder("PF3XYZ01"));
        assert!(!is_placeholder("4c4c4544-0042-3510"));
    }

    #[test]
    fn real_serial_wins() {
        let key = pick_key(KeyCandidates {
            serial: Some("PF3XYZ01".into()),
            board_uuid: Some("4c4c4544".into()),
            hostname: "LAB-01".into(),
            ..Default::default()
        });
        assert_eq!(key, "sn-PF3XYZ01");
    }

    #[test]
    fn placeholder_serial_falls_back_to_board_uuid() {
        let key = pick_key(KeyCandidates {
            serial: Some("Default string".into()),
            board_uuid: Some("4c4c4544-0042-3510".into()),
            hostname: "LAB-01".into(),
            ..Default::default()
        });
        assert_eq!(key, "uuid-4c4c4544-0042-3510");
    }

    #[test]
    fn chain_walks_every_tier() {
        let key = pick_key(KeyCandidates {
            serial: Some("To be filled by O.E.M.".into()),
            board_uuid: Some("00000000-0000-0000".into()),
            mac: Some("aabbccddeeff".into()),
            machine_guid: None,
            hostname: "LAB-01".into(),
        });
        assert_eq!(key, "mac-aabbccddeeff");
    }

    #[test]
    fn hostname_is_the_terminal_tier() {
        let key = pick_key(KeyCandidates {
            hostname: "LAB-01".into(),
            ..Default::default()
        });
        assert_eq!(key, "host-LAB-01");

        let key = pick_key(KeyCandidates::default());
        assert_eq!(key, "host-unknown");
    }

    #[test]
    fn mac_normalization_strips_separators() {
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF".into()), "aabbccddeeff");
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff".into()), "aabbccddeeff");
    }
}
