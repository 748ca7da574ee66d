use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Where users and jobs are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    /// Process-local; everything is lost on restart.
    Memory,
}

/// Front-end server settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    /// URI of the compute agent, e.g. `http://127.0.0.1:50051`.
    pub agent_addr: String,
    /// End-to-end deadline of one background evaluation.
    pub job_timeout: Duration,
    /// How long shutdown waits for in-flight evaluations.
    pub shutdown_grace: Duration,
}

/// Compute agent settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    /// Server-side cap on a single `Evaluate` call.
    pub eval_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");

        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "calcd".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "calcd-users".into()),
            ttl_minutes: parse_or(&get, "JWT_TTL_MINUTES", 60 * 24),
        };

        let store = match get("STORE").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("postgres") | None => StoreBackend::Postgres {
                database_url: get("DATABASE_URL").context("DATABASE_URL must be set")?,
            },
            Some(other) => anyhow::bail!("unknown STORE backend {other:?}"),
        };

        Ok(Self {
            store,
            jwt,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080),
            agent_addr: get("AGENT_ADDR").unwrap_or_else(|| "http://127.0.0.1:50051".into()),
            job_timeout: Duration::from_secs(parse_or(&get, "JOB_TIMEOUT_SECS", 30)),
            shutdown_grace: Duration::from_secs(parse_or(&get, "SHUTDOWN_GRACE_SECS", 10)),
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("invalid APP_HOST/APP_PORT")
    }
}

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            host: get("AGENT_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "AGENT_PORT", 50051),
            eval_timeout: Duration::from_secs(parse_or(&get, "EVAL_TIMEOUT_SECS", 15)),
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("invalid AGENT_HOST/AGENT_PORT")
    }
}

fn parse_or<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    get(key).and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_the_fixed_conventions() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/calc"),
        ]))
        .unwrap();
        assert_eq!(cfg.listen_addr().unwrap().port(), 8080);
        assert_eq!(cfg.agent_addr, "http://127.0.0.1:50051");
        assert_eq!(cfg.job_timeout, Duration::from_secs(30));
        assert_eq!(
            cfg.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/calc".into()
            }
        );

        let agent = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(agent.listen_addr().unwrap().port(), 50051);
        assert_eq!(agent.eval_timeout, Duration::from_secs(15));
    }

    #[test]
    fn jwt_secret_is_required_and_non_empty() {
        assert!(AppConfig::from_lookup(lookup(&[("STORE", "memory")])).is_err());
        let err = AppConfig::from_lookup(lookup(&[("STORE", "memory"), ("JWT_SECRET", "  ")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn memory_store_needs_no_database_url() {
        let cfg =
            AppConfig::from_lookup(lookup(&[("STORE", "memory"), ("JWT_SECRET", "x")])).unwrap();
        assert_eq!(cfg.store, StoreBackend::Memory);
    }

    #[test]
    fn unknown_store_is_rejected() {
        assert!(
            AppConfig::from_lookup(lookup(&[("STORE", "redis"), ("JWT_SECRET", "x")])).is_err()
        );
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("STORE", "memory"),
            ("JWT_SECRET", "x"),
            ("APP_PORT", "not-a-port"),
            ("JOB_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.job_timeout, Duration::from_secs(5));
    }
}
