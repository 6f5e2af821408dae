use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::anyhow;
use tracing::{info, warn};

const DEFAULT_JWT_SECRET: &str = "CHANGE_THIS_SECRET";

pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub token_lifetime: Duration,
    pub classifier_url: Option<String>,
    pub classifier_timeout: Duration,
    pub database_url: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let jwt_secret = optional("DIARY_JWT_SECRET").unwrap_or_else(|| {
            warn!("DIARY_JWT_SECRET not set, signing tokens with the development secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        Ok(Self {
            port: try_load("DIARY_PORT", "8000")?,
            data_dir: try_load("DIARY_DATA_DIR", "data")?,
            jwt_secret,
            token_lifetime: Duration::from_secs(try_load("DIARY_TOKEN_TTL_SECS", "86400")?),
            classifier_url: optional("DIARY_CLASSIFIER_URL"),
            classifier_timeout: Duration::from_secs(try_load("DIARY_CLASSIFIER_TIMEOUT_SECS", "30")?),
            database_url: optional("DATABASE_URL"),
        })
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("historico.json")
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("usuarios.json")
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    optional(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("invalid {key} value: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let port: u16 = try_load("DIARY_TEST_UNSET_PORT", "8000").unwrap();
        assert_eq!(port, 8000);

        let bad: anyhow::Result<u16> = try_load("DIARY_TEST_UNSET_PORT", "not-a-port");
        assert!(bad.is_err());
    }
}
