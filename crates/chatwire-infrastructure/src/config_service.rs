//! Configuration loading.
//!
//! Reads `config.toml` from the chatwire config directory, falls back to
//! defaults when the file is missing, then applies environment overrides.

use std::path::PathBuf;

use chatwire_core::ClientConfig;
use chatwire_core::error::Result;
use tracing::{debug, info};

use crate::storage::AtomicTomlFile;

pub const ENV_HOST: &str = "CHATWIRE_HOST";
pub const ENV_SCHEME: &str = "CHATWIRE_SCHEME";

pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the file (or defaults) and applies process environment
    /// overrides.
    pub fn load(&self) -> Result<ClientConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Like [`ConfigService::load`] with an injectable environment.
    pub fn load_with_env<F>(&self, env: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.load_file()?;
        apply_env_overrides(&mut config, env);
        config.validate()?;
        Ok(config)
    }

    /// Writes the defaults if no config file exists yet.
    pub fn ensure_config_file(&self) -> Result<PathBuf> {
        if !self.path.exists() {
            AtomicTomlFile::<ClientConfig>::new(self.path.clone()).save(&ClientConfig::default())?;
            info!(path = %self.path.display(), "wrote default config");
        }
        Ok(self.path.clone())
    }

    fn load_file(&self) -> Result<ClientConfig> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(ClientConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        ClientConfig::from_toml_str(&content)
    }
}

fn apply_env_overrides<F>(config: &mut ClientConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = env(ENV_HOST).filter(|v| !v.trim().is_empty()) {
        debug!(host = %host, "host overridden from environment");
        config.server.host = host;
    }
    if let Some(scheme) = env(ENV_SCHEME).filter(|v| !v.trim().is_empty()) {
        debug!(scheme = %scheme, "scheme overridden from environment");
        config.server.scheme = scheme;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_core::protocol::ChatMode;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));
        assert_eq!(service.load_with_env(no_env).unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"from-file:9000\"\n\n[chat]\nmode = \"simple\"\n",
        )
        .unwrap();

        let service = ConfigService::new(path);
        let config = service
            .load_with_env(|key| match key {
                ENV_HOST => Some("from-env:8000".to_string()),
                ENV_SCHEME => Some("wss".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.host, "from-env:8000");
        assert_eq!(config.server.scheme, "wss");
        assert_eq!(config.chat.mode, ChatMode::Simple);
    }

    #[test]
    fn test_invalid_env_scheme_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));
        let err = service
            .load_with_env(|key| (key == ENV_SCHEME).then(|| "ftp".to_string()))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_ensure_config_file_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));
        let path = service.ensure_config_file().unwrap();
        assert!(path.exists());
        assert_eq!(service.load_with_env(no_env).unwrap(), ClientConfig::default());
    }
}
