//! Layered configuration: defaults, then a JSON file, then `UBERSMITH_*` variables.

use crate::{Error, RequestHandlerBuilder, Result};
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "UBERSMITH_";

/// Connection settings for an Ubersmith instance.
///
/// # Examples
///
/// ```
/// use ubersmith::Config;
///
/// let config: Config = serde_json::from_str(r#"{
///     "base_url": "https://billing.example.com/api/2.0/",
///     "username": "admin",
///     "password": "secret",
///     "index_dir": "indexes"
/// }"#).unwrap();
///
/// assert!(config.verify);
/// assert!(!format!("{:?}", config).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Verify the server's TLS certificate.
    #[serde(default = "default_verify")]
    pub verify: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Where method indexes are stored.
    #[serde(default)]
    pub index_dir: Option<PathBuf>,
}

fn default_verify() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            verify: default_verify(),
            timeout_secs: None,
            index_dir: None,
        }
    }
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// The provider chain used by [`load`](Self::load).
    ///
    /// Precedence, lowest to highest: defaults, the JSON file at `path` (if
    /// any), then `UBERSMITH_*` environment variables.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Loads `path` with environment overrides on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(Self::figment(Some(path.as_ref())))
    }

    /// Reads a JSON configuration file, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or invalid, or names no base URL.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ConfigurationError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Json::file(path)),
        )
    }

    /// Reads `UBERSMITH_BASE_URL`, `UBERSMITH_USERNAME`, `UBERSMITH_PASSWORD`,
    /// `UBERSMITH_VERIFY`, `UBERSMITH_TIMEOUT_SECS` and `UBERSMITH_INDEX_DIR`.
    pub fn from_env() -> Result<Self> {
        Self::from_figment(Self::figment(None))
    }

    /// Extracts and checks a configuration from any provider chain.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| Error::ConfigurationError(format!("Invalid configuration: {}", e)))?;
        if config.base_url.is_empty() {
            return Err(Error::ConfigurationError(format!(
                "No base URL configured (set base_url or {}BASE_URL)",
                ENV_PREFIX
            )));
        }
        Ok(config)
    }

    /// Turns the settings into a handler builder.
    pub fn builder(&self) -> Result<RequestHandlerBuilder> {
        let mut builder = RequestHandlerBuilder::new()
            .base_url(&self.base_url)?
            .verify(self.verify);
        if let Some(username) = &self.username {
            builder = builder.username(username.clone());
        }
        if let Some(password) = &self.password {
            builder = builder.password(password.clone());
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("verify", &self.verify)
            .field("timeout_secs", &self.timeout_secs)
            .field("index_dir", &self.index_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("UBERSMITH_BASE_URL", "https://billing.example.com/api/2.0/");
            jail.set_env("UBERSMITH_USERNAME", "admin");
            jail.set_env("UBERSMITH_PASSWORD", "secret");
            jail.set_env("UBERSMITH_VERIFY", "false");
            jail.set_env("UBERSMITH_TIMEOUT_SECS", "15");
            jail.set_env("UBERSMITH_INDEX_DIR", "/var/lib/ubersmith");

            let config = Config::from_env().map_err(|e| e.to_string())?;

            assert_eq!(config.base_url, "https://billing.example.com/api/2.0/");
            assert_eq!(config.username.as_deref(), Some("admin"));
            assert_eq!(config.password.as_deref(), Some("secret"));
            assert!(!config.verify);
            assert_eq!(config.timeout_secs, Some(15));
            assert_eq!(config.index_dir, Some(PathBuf::from("/var/lib/ubersmith")));
            Ok(())
        });
    }

    #[test]
    fn test_from_env_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("UBERSMITH_BASE_URL", "https://b.example.com/");

            let config = Config::from_env().map_err(|e| e.to_string())?;
            assert!(config.verify);
            assert!(config.username.is_none());
            assert!(config.timeout_secs.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_from_env_errors() {
        Jail::expect_with(|jail| {
            assert!(matches!(
                Config::from_env(),
                Err(Error::ConfigurationError(_))
            ));

            jail.set_env("UBERSMITH_BASE_URL", "https://b.example.com/");
            jail.set_env("UBERSMITH_TIMEOUT_SECS", "soon");
            assert!(matches!(
                Config::from_env(),
                Err(Error::ConfigurationError(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ubersmith.json",
                r#"{"base_url": "https://file.example.com/", "username": "file-user", "verify": false}"#,
            )?;
            jail.set_env("UBERSMITH_USERNAME", "env-user");

            let config = Config::load("ubersmith.json").map_err(|e| e.to_string())?;
            assert_eq!(config.base_url, "https://file.example.com/");
            assert_eq!(config.username.as_deref(), Some("env-user"));
            assert!(!config.verify);

            let file_only = Config::from_file("ubersmith.json").map_err(|e| e.to_string())?;
            assert_eq!(file_only.username.as_deref(), Some("file-user"));
            Ok(())
        });
    }

    #[test]
    fn test_from_file_errors() {
        Jail::expect_with(|jail| {
            assert!(matches!(
                Config::from_file("missing.json"),
                Err(Error::ConfigurationError(_))
            ));

            jail.create_file("broken.json", "{")?;
            assert!(matches!(
                Config::from_file("broken.json"),
                Err(Error::ConfigurationError(_))
            ));

            jail.create_file("no_url.json", r#"{"username": "admin"}"#)?;
            assert!(matches!(
                Config::from_file("no_url.json"),
                Err(Error::ConfigurationError(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = Config::new("https://b.example.com/");
        config.password = Some("hunter2".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        assert!(matches!(
            Config::new("not a url").builder(),
            Err(Error::InvalidUrl(_))
        ));
    }
}
