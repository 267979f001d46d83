use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::oauth::Credentials;

pub const DEFAULT_FETCH_LIMIT: u32 = 25;
const DEFAULT_STORAGE_FILE: &str = "todo_state.json";

/// Settings read from `config.toml`, each one overridable from the
/// environment.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    /// Prefer the keyring (`set-client-secret`) over storing it here.
    pub client_secret: Option<String>,
    /// Mailbox user address, required with app-only tokens.
    pub mailbox: Option<String>,
    pub storage_path: Option<String>,
    pub fetch_limit: Option<u32>,
}

/// Application directory under the platform config dir.
pub fn app_dir() -> crate::Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(crate::Error::ConfigDirNotFound)?
        .join("outlook_todo"))
}

pub fn config_path() -> crate::Result<PathBuf> {
    Ok(app_dir()?.join("config.toml"))
}

/// Loads the config file (if any) then applies environment
/// overrides.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    load_config_from(&path)?.with_env_overrides(|key| std::env::var(key).ok())
}

/// Reads a config file; a missing file yields the default config.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let cfg: Config = toml::from_str(&s)
        .with_context(|| format!("cannot parse config file {}", path.display()))?;
    Ok(cfg)
}

impl Config {
    /// Applies the `MS_*` and `OUTLOOK_TODO_*` variables found by
    /// `var`.
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("MS_TENANT_ID") {
            self.tenant_id = Some(v);
        }
        if let Some(v) = non_empty("MS_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = non_empty("MS_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Some(v) = non_empty("MS_MAILBOX") {
            self.mailbox = Some(v);
        }
        if let Some(v) = non_empty("OUTLOOK_TODO_STORAGE") {
            self.storage_path = Some(v);
        }
        if let Some(v) = non_empty("OUTLOOK_TODO_LIMIT") {
            let limit = v
                .trim()
                .parse::<u32>()
                .map_err(|e| anyhow!("invalid OUTLOOK_TODO_LIMIT {v:?}: {e}"))?;
            self.fetch_limit = Some(limit);
        }

        Ok(self)
    }

    pub fn fetch_limit(&self) -> u32 {
        self.fetch_limit.unwrap_or(DEFAULT_FETCH_LIMIT)
    }

    /// Builds the app credentials. The secret falls back to
    /// `secret_lookup` (the keyring) keyed by client id.
    pub fn credentials(
        &self,
        secret_lookup: impl FnOnce(&str) -> crate::Result<Option<String>>,
    ) -> Result<Credentials> {
        let mut missing = Vec::new();
        if self.tenant_id.is_none() {
            missing.push("MS_TENANT_ID");
        }
        let client_secret = match &self.client_id {
            None => {
                missing.push("MS_CLIENT_ID");
                self.client_secret.clone()
            }
            Some(_) if self.client_secret.is_some() => self.client_secret.clone(),
            Some(client_id) => secret_lookup(client_id)?,
        };
        if client_secret.is_none() {
            missing.push("MS_CLIENT_SECRET");
        }

        match (&self.tenant_id, &self.client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Ok(Credentials {
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                client_secret,
            }),
            _ => bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ),
        }
    }
}

/// Absolute path of the task store.
pub fn resolve_storage_path(cfg: &Config) -> Result<PathBuf> {
    let raw = cfg.storage_path.as_deref().unwrap_or(DEFAULT_STORAGE_FILE);
    let path = match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .ok_or_else(|| anyhow!("no home dir available to expand {raw}"))?
            .join(rest),
        None => PathBuf::from(raw),
    };
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_keyring(_: &str) -> crate::Result<Option<String>> {
        Ok(None)
    }

    #[test]
    fn env_overrides_file_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "tenant_id = \"file-tenant\"\nclient_id = \"file-client\"\nfetch_limit = 10\n",
        )
        .unwrap();

        let cfg = load_config_from(&path)
            .unwrap()
            .with_env_overrides(env(&[("MS_TENANT_ID", "env-tenant"), ("OUTLOOK_TODO_LIMIT", "5")]))
            .unwrap();

        assert_eq!(cfg.tenant_id.as_deref(), Some("env-tenant"));
        assert_eq!(cfg.client_id.as_deref(), Some("file-client"));
        assert_eq!(cfg.fetch_limit(), 5);
    }

    #[test]
    fn missing_file_is_default_config() {
        let dir = tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.fetch_limit(), DEFAULT_FETCH_LIMIT);
    }

    #[test]
    fn invalid_limit_is_rejected() {
        let err = Config::default()
            .with_env_overrides(env(&[("OUTLOOK_TODO_LIMIT", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("OUTLOOK_TODO_LIMIT"));
    }

    #[test]
    fn credentials_list_every_missing_variable() {
        let err = Config::default().credentials(no_keyring).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: MS_TENANT_ID, MS_CLIENT_ID, MS_CLIENT_SECRET"
        );
    }

    #[test]
    fn credentials_fall_back_to_keyring_secret() {
        let cfg = Config {
            tenant_id: Some("tenant".into()),
            client_id: Some("client".into()),
            ..Default::default()
        };

        let creds = cfg
            .credentials(|client_id| Ok(Some(format!("secret-of-{client_id}"))))
            .unwrap();
        assert_eq!(creds.client_secret, "secret-of-client");
    }

    #[test]
    fn storage_path_is_absolute() {
        let cfg = Config::default();
        let path = resolve_storage_path(&cfg).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with(DEFAULT_STORAGE_FILE));

        let cfg = Config {
            storage_path: Some("/var/lib/todo/state.json".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_storage_path(&cfg).unwrap(),
            PathBuf::from("/var/lib/todo/state.json")
        );
    }
}
