//! Credential resolution for adapters
//!
//! Adapters name the keys they need (`GITHUB_API_KEY`, `REDDIT_CLIENT_ID`, ...).
//! A key set explicitly on [`Credentials`] wins over the process environment.

use crate::types::CredentialPolicy;
use api_crawler_common::CrawlerError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

/// A secret value whose `Debug` output never shows the secret
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret, for placing in a request
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Explicit credential overrides, consulted before the environment
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    overrides: HashMap<String, Secret>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style override for one key
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), Secret::new(value));
    }

    /// Override first, then the environment. Blank values count as absent.
    pub fn resolve(&self, key: &str) -> Option<Secret> {
        if let Some(secret) = self.overrides.get(key) {
            if !secret.expose().trim().is_empty() {
                return Some(secret.clone());
            }
        }

        std::env::var(key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(Secret::new)
    }

    /// Resolve every key an adapter needs.
    ///
    /// Under [`CredentialPolicy::Strict`] any missing key fails with a single
    /// [`CrawlerError::MissingCredential`] naming all of them. Under
    /// [`CredentialPolicy::Lenient`] the gap is logged and the caller gets a
    /// set where the missing keys fail on first use.
    pub fn require(
        &self,
        source_name: &str,
        keys: &[&str],
        policy: CredentialPolicy,
    ) -> Result<ResolvedCredentials, CrawlerError> {
        let values: BTreeMap<String, Option<Secret>> = keys
            .iter()
            .map(|key| (key.to_string(), self.resolve(key)))
            .collect();

        let resolved = ResolvedCredentials {
            source_name: source_name.to_string(),
            values,
        };

        let missing = resolved.missing();
        if missing.is_empty() {
            debug!("Resolved {} credential(s) for {}", keys.len(), source_name);
            return Ok(resolved);
        }

        match policy {
            CredentialPolicy::Strict => Err(CrawlerError::MissingCredential {
                source_name: source_name.to_string(),
                missing,
            }),
            CredentialPolicy::Lenient => {
                warn!(
                    "{} constructed without credentials: {}",
                    source_name,
                    missing.join(", ")
                );
                Ok(resolved)
            }
        }
    }
}

/// Credentials resolved for one adapter
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    source_name: String,
    values: BTreeMap<String, Option<Secret>>,
}

impl ResolvedCredentials {
    /// Keys that could not be resolved, in sorted order
    pub fn missing(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Secret> {
        self.values.get(key).and_then(Option::as_ref)
    }

    /// The secret for `key`, or a `MissingCredential` error naming it
    pub fn secret(&self, key: &str) -> Result<&Secret, CrawlerError> {
        self.get(key).ok_or_else(|| CrawlerError::MissingCredential {
            source_name: self.source_name.clone(),
            missing: vec![key.to_string()],
        })
    }
}
