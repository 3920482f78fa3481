use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("MESSAGELY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MESSAGELY_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = var("MESSAGELY_DB_PATH")
            .unwrap_or_else(|| "messagely.db".into())
            .into();
        let host = var("MESSAGELY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("MESSAGELY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("MESSAGELY_PORT must be a port number")?;

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
        })
    }
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
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("MESSAGELY_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("messagely.db"));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(
            Config::from_lookup(lookup(&[("MESSAGELY_JWT_SECRET", "dev-secret-change-me")]))
                .is_err()
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("MESSAGELY_JWT_SECRET", "s3cret"),
            ("MESSAGELY_PORT", "http"),
        ]));
        assert!(result.is_err());
    }
}
