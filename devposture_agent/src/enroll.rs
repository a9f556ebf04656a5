//! Device side of the pairing handshake: generate a short code, show it to
//! whoever is at the machine, and poll the server until an authenticated
//! user claims it. No inbound connectivity is assumed; polling is the only
//! channel.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};

use crate::config::{AgentConfig, EnrolledIdentity};
use crate::facts;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 32 symbols, with 0/O, 1/I and other look-alikes removed. Six characters
/// give ~2^30 combinations, plenty for the handful of codes pending at once.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

pub fn generate_pairing_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PollRequest<'a> {
    serial_number: &'a str,
    hostname: String,
    enrollment_code: &'a str,
    os_build: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollResponse {
    status: String,
    user_email: Option<String>,
    user_name: Option<String>,
}

async fn poll_once(client: &Client, cfg: &AgentConfig, req: &PollRequest<'_>) -> Result<PollResponse> {
    let resp = client
        .post(format!("{}/api/enroll/poll", cfg.server_url))
        .json(req)
        .send()
        .await
        .context("Error sending enrollment poll")?;

    if !resp.status().is_success() {
        bail!("Enrollment poll rejected: {}", resp.status());
    }

    resp.json::<PollResponse>()
        .await
        .context("Parsing enrollment poll response")
}

/// Poll until an authenticated user claims this device's code, then cache
/// the claimed identity and return it. Transient failures are logged and
/// retried on the next tick.
pub async fn run_enrollment(
    client: &Client,
    cfg: &AgentConfig,
    device_key: &str,
) -> Result<EnrolledIdentity> {
    let code = generate_pairing_code();

    // Shown to the person at the device so they can type it into the portal.
    println!("Enrollment code: {code}");
    log::info!("waiting for enrollment, code {code}");

    let req = PollRequest {
        serial_number: device_key,
        hostname: facts::hostname(),
        enrollment_code: &code,
        os_build: facts::os_build(),
    };

    loop {
        match poll_once(client, cfg, &req).await {
            Ok(resp) if resp.status == "enrolled" => {
                let identity = EnrolledIdentity {
                    user_email: resp.user_email.unwrap_or_default(),
                    user_name: resp.user_name.unwrap_or_default(),
                    enrolled_at: Utc::now(),
                };
                log::info!("enrolled to {}", identity.user_email);
                if let Err(e) = cfg.store_cached_identity(&identity) {
                    log::warn!("could not cache enrollment identity: {e}");
                }
                return Ok(identity);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Enrollment poll failed: {e}"),
        }

        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        for _ in 0..100 {
            let code = generate_pairing_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('O') && !code.contains('0'));
            assert!(!code.contains('I') && !code.contains('1'));
        }
    }

    #[test]
    fn alphabet_has_thirty_two_distinct_symbols() {
        let mut symbols: Vec<u8> = CODE_ALPHABET.to_vec();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), 32);
    }
}
