use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[cfg(windows)]
const DEFAULT_STATE_DIR: &str = r"C:\ProgramData\DevPosture";
#[cfg(not(windows))]
const DEFAULT_STATE_DIR: &str = "/var/lib/devposture";

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Agent configuration: where the server lives and where local state goes.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub server_url: String,
    pub state_dir: PathBuf,
}

/// The identity claimed for this device, cached locally once enrollment
/// completes so reports can carry it and restarts skip the pairing flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledIdentity {
    pub user_email: String,
    pub user_name: String,
    pub enrolled_at: DateTime<Utc>,
}

impl AgentConfig {
    pub fn load() -> Self {
        let state_dir = std::env::var("DEVPOSTURE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_DIR));

        let server_url = std::env::var("DEVPOSTURE_SERVER")
            .ok()
            .or_else(|| {
                fs::read_to_string(state_dir.join("server_url.txt"))
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        Self {
            server_url,
            state_dir,
        }
    }

    fn identity_path(&self) -> PathBuf {
        self.state_dir.join("identity.json")
    }

    /// Identity from a previous enrollment, if any. Unreadable state is
    /// treated as not enrolled; the pairing flow simply runs again.
    pub fn load_cached_identity(&self) -> Option<EnrolledIdentity> {
        let raw = fs::read_to_string(self.identity_path()).ok()?;
        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                log::warn!("ignoring unreadable identity cache: {e}");
                None
            }
        }
    }

    pub fn store_cached_identity(&self, identity: &EnrolledIdentity) -> Result<()> {
        fs::create_dir_all(&self.state_dir)
            .with_context(|| format!("creating {}", self.state_dir.display()))?;
        let raw = serde_json::to_string_pretty(identity)?;
        fs::write(self.identity_path(), raw)
            .with_context(|| format!("writing {}", self.identity_path().display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_cache_round_trips() {
        let dir = std::env::temp_dir().join(format!("devposture-test-{}", std::process::id()));
        let cfg = AgentConfig {
            server_url: DEFAULT_SERVER_URL.into(),
            state_dir: dir.clone(),
        };

        assert!(cfg.load_cached_identity().is_none());

        let identity = EnrolledIdentity {
            user_email: "jan@example.com".into(),
            user_name: "Jan Kowalski".into(),
            enrolled_at: Utc::now(),
        };
        cfg.store_cached_identity(&identity).unwrap();

        let loaded = cfg.load_cached_identity().unwrap();
        assert_eq!(loaded.user_email, identity.user_email);
        assert_eq!(loaded.user_name, identity.user_name);

        let _ = fs::remove_dir_all(dir);
    }
}
