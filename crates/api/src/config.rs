//! Runtime configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

const DEV_JWT_SECRET: &str = "dev-secret";
const MAX_SESSION_TTL_MINUTES: u64 = 365 * 24 * 60;

/// Credentials for the administrator account created at startup.
#[derive(Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub session_ttl: chrono::Duration,
    pub cookie_secure: bool,
    pub sync_delay: Duration,
    pub admin_seed: Option<AdminSeed>,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("session_ttl", &self.session_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .field("sync_delay", &self.sync_delay)
            .field("admin_seed", &self.admin_seed)
            .finish_non_exhaustive()
    }
}

impl Default for ApiConfig {
    /// In-memory development defaults.
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            session_ttl: chrono::Duration::minutes(1440),
            cookie_secure: false,
            sync_delay: Duration::from_millis(2000),
            admin_seed: None,
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn flag(name: &str) -> bool {
    var(name)
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(false)
}

fn number(name: &str, default: u64) -> anyhow::Result<u64> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer, got '{raw}'")),
        None => Ok(default),
    }
}

/// Session lifetime from a minute count; out-of-range values are config errors.
fn session_ttl(minutes: u64) -> anyhow::Result<chrono::Duration> {
    if !(1..=MAX_SESSION_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("SESSION_TTL_MINUTES must be between 1 and {MAX_SESSION_TTL_MINUTES}, got {minutes}");
    }
    i64::try_from(minutes)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .with_context(|| format!("SESSION_TTL_MINUTES out of range: {minutes}"))
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let bind_addr = match var("BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("BIND_ADDR is not a socket address: '{raw}'"))?,
            None => defaults.bind_addr,
        };

        let use_persistent_stores = flag("USE_PERSISTENT_STORES");
        let database_url = var("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        }

        let ttl = session_ttl(number("SESSION_TTL_MINUTES", 1440)?)?;

        let admin_seed = match (var("AMO_ADMIN_EMAIL"), var("AMO_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("AMO_ADMIN_EMAIL and AMO_ADMIN_PASSWORD must both be set; skipping admin seeding");
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            jwt_secret,
            bind_addr,
            use_persistent_stores,
            database_url,
            session_ttl: ttl,
            cookie_secure: flag("COOKIE_SECURE"),
            sync_delay: Duration::from_millis(number("SYNC_SIMULATED_DELAY_MS", 2000)?),
            admin_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_memory_development_settings() {
        let config = ApiConfig::default();
        assert!(!config.use_persistent_stores);
        assert_eq!(config.session_ttl, chrono::Duration::hours(24));
        assert_eq!(config.sync_delay, Duration::from_secs(2));
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn session_ttl_rejects_zero_and_oversized_values() {
        assert_eq!(session_ttl(30).unwrap(), chrono::Duration::minutes(30));
        assert_eq!(
            session_ttl(MAX_SESSION_TTL_MINUTES).unwrap(),
            chrono::Duration::days(365)
        );
        for minutes in [0, MAX_SESSION_TTL_MINUTES + 1, i64::MAX as u64 + 1, u64::MAX] {
            let err = session_ttl(minutes).unwrap_err();
            assert!(err.to_string().contains("SESSION_TTL_MINUTES"), "{minutes}: {err}");
        }
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = ApiConfig {
            jwt_secret: "super-secret".into(),
            admin_seed: Some(AdminSeed {
                email: "admin@amo.rw".into(),
                password: "hunter2hunter2".into(),
            }),
            ..ApiConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("admin@amo.rw"));
    }
}
