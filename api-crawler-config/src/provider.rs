//! Configuration provider using Figment for api-crawler

use crate::{error::ConfigError, types::CrawlerConfig, ConfigResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use std::path::Path;
use tracing::{debug, info, trace};

/// Prefix for environment overrides, nested sections separated by `__`
pub const ENV_PREFIX: &str = "API_CRAWLER_";

/// Legacy variable naming the data lake directory
pub const LAKES_BASE_DIR_VAR: &str = "LAKES_BASE_DIR";

/// Loads [`CrawlerConfig`] from every source in precedence order
///
/// Sources are merged so that later ones override earlier ones:
/// 1. Default values
/// 2. An optional TOML, YAML or JSON file
/// 3. `LAKES_BASE_DIR`
/// 4. `API_CRAWLER_*` environment variables
///
/// Nothing is cached; every call reads the sources again.
pub struct ConfigProvider;

impl ConfigProvider {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate the configuration
    pub fn load(&self, file: Option<&Path>) -> ConfigResult<CrawlerConfig> {
        debug!("Loading crawler configuration");

        let config: CrawlerConfig = self.build_figment(file)?.extract()?;
        config.validate()?;

        info!(
            "Loaded crawler configuration (lake dir: {})",
            config.lake.base_dir.display()
        );
        Ok(config)
    }

    fn build_figment(&self, file: Option<&Path>) -> ConfigResult<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(CrawlerConfig::default()));

        if let Some(path) = file {
            figment = figment.merge(self.load_config_file(path)?);
        }

        Ok(figment.merge(self.load_env_vars()))
    }

    fn load_config_file(&self, path: &Path) -> ConfigResult<Figment> {
        // figment treats a missing file as empty, an explicit path must exist
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        trace!("Loading config file: {}", path.display());

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Ok(Figment::from(Toml::file(path))),
            "yaml" | "yml" => Ok(Figment::from(Yaml::file(path))),
            "json" => Ok(Figment::from(Json::file(path))),
            other => Err(ConfigError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }

    fn load_env_vars(&self) -> Figment {
        trace!("Loading environment variables");

        Figment::new()
            .merge(
                Env::raw()
                    .only(&[LAKES_BASE_DIR_VAR])
                    .map(|_| "lake.base_dir".into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlerConfig {
    /// Load from defaults, an optional file and the environment
    pub fn load(file: Option<&Path>) -> ConfigResult<Self> {
        ConfigProvider::new().load(file)
    }

    /// Load from defaults and the environment only
    pub fn from_env() -> ConfigResult<Self> {
        Self::load(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CredentialPolicy;
    use serial_test::serial;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with(ENV_PREFIX) || key == LAKES_BASE_DIR_VAR {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        clear_env();

        let config = CrawlerConfig::from_env().unwrap();
        assert_eq!(config, CrawlerConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_toml_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("crawler.toml");
        fs::write(
            &path,
            r#"
[lake]
base_dir = "/var/lib/lakes"

[credentials]
policy = "lenient"

[http]
max_retries = 5
"#,
        )
        .unwrap();

        let config = CrawlerConfig::load(Some(&path)).unwrap();

        assert_eq!(config.lake.base_dir, PathBuf::from("/var/lib/lakes"));
        assert_eq!(config.credentials.policy, CredentialPolicy::Lenient);
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn test_load_json_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("crawler.json");
        fs::write(&path, r#"{"browser": {"headless": false}}"#).unwrap();

        let config = CrawlerConfig::load(Some(&path)).unwrap();
        assert!(!config.browser.headless);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("crawler.toml");
        fs::write(&path, "[http]\ntimeout_secs = 10\n").unwrap();

        std::env::set_var("API_CRAWLER_HTTP__TIMEOUT_SECS", "45");
        let config = CrawlerConfig::load(Some(&path));
        std::env::remove_var("API_CRAWLER_HTTP__TIMEOUT_SECS");

        assert_eq!(config.unwrap().http.timeout_secs, 45);
    }

    #[test]
    #[serial]
    fn test_legacy_lakes_base_dir() {
        clear_env();

        std::env::set_var(LAKES_BASE_DIR_VAR, "/tmp/legacy-lakes");
        let config = CrawlerConfig::from_env();
        std::env::remove_var(LAKES_BASE_DIR_VAR);

        assert_eq!(
            config.unwrap().lake.base_dir,
            PathBuf::from("/tmp/legacy-lakes")
        );
    }

    #[test]
    #[serial]
    fn test_prefixed_var_beats_legacy_var() {
        clear_env();

        std::env::set_var(LAKES_BASE_DIR_VAR, "/tmp/legacy-lakes");
        std::env::set_var("API_CRAWLER_LAKE__BASE_DIR", "/tmp/new-lakes");
        let config = CrawlerConfig::from_env();
        clear_env();

        assert_eq!(config.unwrap().lake.base_dir, PathBuf::from("/tmp/new-lakes"));
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");

        let err = CrawlerConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_unsupported_extension() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("crawler.ini");
        fs::write(&path, "timeout=1").unwrap();

        let err = CrawlerConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    #[serial]
    fn test_malformed_value_is_parse_error() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("crawler.toml");
        fs::write(&path, "[http]\ntimeout_secs = \"soon\"\n").unwrap();

        let err = CrawlerConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
