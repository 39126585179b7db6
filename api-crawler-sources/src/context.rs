//! Everything an adapter needs to construct itself

use crate::http::RestClient;
use api_crawler_common::{log_by_severity, Result};
use api_crawler_config::{CrawlerConfig, CredentialPolicy, Credentials, ResolvedCredentials};
use api_crawler_lake::{CallRecorder, DataLake};
use std::sync::Arc;

/// Configuration, credentials and data lake shared by adapters
///
/// Adapters never read global state: API keys come from the explicit
/// overrides set here, then from the process environment.
#[derive(Debug, Clone)]
pub struct SourceContext {
    config: Arc<CrawlerConfig>,
    credentials: Credentials,
    policy: CredentialPolicy,
    lake: Arc<DataLake>,
}

impl SourceContext {
    pub fn new(config: CrawlerConfig) -> Self {
        let lake = Arc::new(DataLake::from_config(&config.lake));
        let policy = config.credentials.policy;

        Self {
            config: Arc::new(config),
            credentials: Credentials::new(),
            policy,
            lake,
        }
    }

    /// Context from defaults, `API_CRAWLER_*` and `LAKES_BASE_DIR`
    pub fn from_env() -> Result<Self> {
        let config = CrawlerConfig::from_env().map_err(|e| {
            log_by_severity("Failed to load crawler configuration", &e);
            e
        })?;
        Ok(Self::new(config))
    }

    /// Set an explicit credential, taking precedence over the environment
    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.set(key, value);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Override the configured credential policy
    pub fn with_policy(mut self, policy: CredentialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record into `lake` instead of the configured directory
    pub fn with_lake(mut self, lake: Arc<DataLake>) -> Self {
        self.lake = lake;
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn policy(&self) -> CredentialPolicy {
        self.policy
    }

    pub fn lake(&self) -> &Arc<DataLake> {
        &self.lake
    }

    /// Resolve the keys an adapter needs under this context's policy
    pub fn require_credentials(
        &self,
        source_name: &str,
        keys: &[&str],
    ) -> Result<ResolvedCredentials> {
        self.credentials.require(source_name, keys, self.policy)
    }

    /// Recorder writing `component.*` logs into this context's lake
    pub fn recorder(&self, component: &str) -> CallRecorder {
        CallRecorder::new(component, Arc::clone(&self.lake))
    }

    /// HTTP client configured from the `http` section
    pub fn rest_client(&self) -> Result<RestClient> {
        RestClient::new(&self.config.http)
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::new(CrawlerConfig::default())
    }
}
