use std::env;

/// Server settings, resolved from the environment with defaults.
#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// Pending records holding an unclaimed code older than this are swept.
    pub pending_code_ttl_secs: i64,
}

impl Settings {
    pub fn from_env() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "devposture.db".to_string());

        let pending_code_ttl_secs = env::var("PENDING_CODE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(Self::default_pending_ttl);

        Self {
            database_url,
            pending_code_ttl_secs,
        }
    }

    fn default_pending_ttl() -> i64 {
        3600
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "devposture.db".to_string(),
            pending_code_ttl_secs: Self::default_pending_ttl(),
        }
    }
}
