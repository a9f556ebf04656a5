mod config;
mod device_key;
mod enroll;
mod facts;
mod logging;
mod report;

use anyhow::Result;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::AgentConfig::load();
    let _logger = logging::init_logging(&cfg)?;

    log::info!("DevPosture agent starting (server: {})", cfg.server_url);

    let device_key = device_key::resolve_device_key();
    log::info!("device key: {device_key}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let cached = cfg.load_cached_identity();
    let enrolled_at_start = cached.is_some();
    let identity = Arc::new(RwLock::new(cached));

    // Not yet paired: run the enrollment handshake alongside the report
    // loop and publish the identity once a user claims the code.
    if !enrolled_at_start {
        let slot = identity.clone();
        let client = client.clone();
        let cfg = cfg.clone();
        let key = device_key.clone();
        tokio::spawn(async move {
            match enroll::run_enrollment(&client, &cfg, &key).await {
                Ok(claimed) => {
                    if let Ok(mut guard) = slot.write() {
                        *guard = Some(claimed);
                    }
                }
                Err(e) => log::error!("enrollment loop ended: {e}"),
            }
        });
    }

    report::run_report_loop(&client, &cfg, &device_key, identity, enrolled_at_start).await;

    Ok(())
}
