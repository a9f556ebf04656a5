//! Periodic compliance reporting. A failed report is logged and dropped;
//! the fixed cadence is the retry mechanism, so there is no backoff and
//! the loop never exits.

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::time::{Duration, sleep};

use crate::config::{AgentConfig, EnrolledIdentity};
use crate::facts::{self, ComplianceChecks, LogProgress};

pub const REPORT_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryReport<'a> {
    hostname: String,
    serial_number: &'a str,
    os_build: String,
    user_email: Option<&'a str>,
    user_name: Option<&'a str>,
    azure_ad_device_id: Option<String>,
    join_type: Option<String>,
    checks: ComplianceChecks,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryAck {
    success: bool,
    is_compliant: bool,
}

/// Collect the current fact set and post it to the inventory server.
async fn send_report(
    client: &Client,
    cfg: &AgentConfig,
    device_key: &str,
    cached: Option<&EnrolledIdentity>,
) -> Result<TelemetryAck> {
    let mut progress = LogProgress;
    let checks = facts::collect_checks(&mut progress);
    let identity = facts::collect_identity();

    let report = TelemetryReport {
        hostname: facts::hostname(),
        serial_number: device_key,
        os_build: facts::os_build(),
        user_email: cached.map(|c| c.user_email.as_str()),
        user_name: cached.map(|c| c.user_name.as_str()),
        azure_ad_device_id: identity.as_ref().and_then(|i| i.azure_ad_device_id.clone()),
        join_type: identity.map(|i| i.join_type),
        checks,
    };

    let resp = client
        .post(format!("{}/api/report", cfg.server_url))
        .json(&report)
        .send()
        .await
        .context("Error sending compliance report")?;

    if !resp.status().is_success() {
        bail!("Compliance report rejected: {}", resp.status());
    }

    let ack = resp
        .json::<TelemetryAck>()
        .await
        .context("Parsing report response")?;
    if !ack.success {
        bail!("Server did not accept the report");
    }
    Ok(ack)
}

/// Report on a fixed cadence forever. When the device was already enrolled
/// at startup the first report goes out immediately; otherwise the first
/// tick waits out one interval while the pairing flow runs.
pub async fn run_report_loop(
    client: &Client,
    cfg: &AgentConfig,
    device_key: &str,
    identity: Arc<RwLock<Option<EnrolledIdentity>>>,
    report_immediately: bool,
) {
    if !report_immediately {
        sleep(REPORT_INTERVAL).await;
    }

    loop {
        let cached = identity.read().ok().and_then(|guard| guard.clone());

        match send_report(client, cfg, device_key, cached.as_ref()).await {
            Ok(ack) => log::info!("report accepted, compliant={}", ack.is_compliant),
            Err(e) => log::warn!("report failed, retrying on next tick: {e}"),
        }

        sleep(REPORT_INTERVAL).await;
    }
}
