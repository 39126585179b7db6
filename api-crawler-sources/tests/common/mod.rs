//! Shared fixtures for adapter tests

#![allow(dead_code)]

use api_crawler_config::{CrawlerConfig, CredentialPolicy};
use api_crawler_lake::CallLogEntry;
use api_crawler_sources::SourceContext;
use tempfile::TempDir;

/// A context recording into `dir`, without HTTP retries
pub fn test_context(dir: &TempDir) -> SourceContext {
    let mut config = CrawlerConfig::default();
    config.lake.base_dir = dir.path().to_path_buf();
    config.http.max_retries = 0;
    config.http.retry_delay_ms = 10;
    config.credentials.policy = CredentialPolicy::Strict;

    SourceContext::new(config)
}

/// Entries recorded for `key` in the context's lake
pub fn entries(ctx: &SourceContext, key: &str) -> Vec<CallLogEntry> {
    ctx.lake().entries(key).unwrap()
}
