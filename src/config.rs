use anyhow::Context;
use serde::Deserialize;

/// Minimum HS512 key length in bytes.
pub const MIN_SECRET_LEN: usize = 64;

/// Upper bound for any token TTL: ten years.
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch
    /// the process environment.
    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let redis_url = var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into());

        let secret = var("JWT_SECRET").context("JWT_SECRET is not set")?;
        anyhow::ensure!(
            secret.len() >= MIN_SECRET_LEN,
            "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes for HS512"
        );

        let jwt = JwtConfig {
            secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "auth-service".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "auth-service-clients".into()),
            access_ttl_seconds: parse_ttl(&var, "JWT_ACCESS_TTL_SECONDS", 15 * 60)?,
            refresh_ttl_seconds: parse_ttl(&var, "JWT_REFRESH_TTL_SECONDS", 60 * 60 * 24 * 14)?,
        };
        Ok(Self {
            database_url,
            redis_url,
            jwt,
        })
    }
}

fn parse_ttl<F>(var: &F, key: &str, default: u64) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let ttl = match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a number of seconds"))?,
        None => default,
    };
    anyhow::ensure!(ttl > 0, "{key} must be positive");
    anyhow::ensure!(
        ttl <= MAX_TTL_SECONDS,
        "{key} must be at most {MAX_TTL_SECONDS} seconds"
    );
    Ok(ttl)
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
        move |key| map.get(key).cloned()
    }

    fn long_secret() -> String {
        "s".repeat(MIN_SECRET_LEN)
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let secret = long_secret();
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("JWT_SECRET", &secret),
        ]))
        .expect("config should load");
        assert_eq!(cfg.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.jwt.issuer, "auth-service");
        assert_eq!(cfg.jwt.access_ttl_seconds, 900);
        assert_eq!(cfg.jwt.refresh_ttl_seconds, 1_209_600);
    }

    #[test]
    fn ttl_overrides_are_parsed() {
        let secret = long_secret();
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("JWT_SECRET", &secret),
            ("JWT_ACCESS_TTL_SECONDS", "60"),
            ("JWT_REFRESH_TTL_SECONDS", " 3600 "),
        ]))
        .unwrap();
        assert_eq!(cfg.jwt.access_ttl_seconds, 60);
        assert_eq!(cfg.jwt.refresh_ttl_seconds, 3600);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "too-short"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("at least"));
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let secret = long_secret();
        for raw in ["9223372036854775000", "18446744073709551615", "315360001"] {
            let err = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://x"),
                ("JWT_SECRET", &secret),
                ("JWT_REFRESH_TTL_SECONDS", raw),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("at most"), "{raw}: {err}");
        }

        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", &secret),
            ("JWT_REFRESH_TTL_SECONDS", "315360000"),
        ]))
        .unwrap();
        assert_eq!(cfg.jwt.refresh_ttl_seconds, MAX_TTL_SECONDS);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let secret = long_secret();
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", &secret),
            ("JWT_ACCESS_TTL_SECONDS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }
}
