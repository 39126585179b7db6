//! Brave web search adapter

use crate::capabilities::{Initializable, SearchOptions, Searchable};
use crate::context::SourceContext;
use crate::http::{RequestOptions, RestClient};
use api_crawler_common::{Pretty, Result};
use api_crawler_config::ResolvedCredentials;
use api_crawler_lake::{call_args, CallRecorder};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const API_KEY: &str = "BRAVE_API_KEY";

/// Brave Search API client
#[derive(Debug, Clone)]
pub struct BraveSearch {
    client: RestClient,
    endpoint: String,
    credentials: ResolvedCredentials,
    recorder: CallRecorder,
}

#[async_trait]
impl Initializable for BraveSearch {
    const COMPONENT: &'static str = "BraveSearch";

    async fn initialize(ctx: &SourceContext) -> Result<Self> {
        let credentials = ctx.require_credentials(Self::COMPONENT, &[API_KEY])?;

        Ok(Self {
            client: ctx.rest_client()?,
            endpoint: BRAVE_SEARCH_URL.to_string(),
            credentials,
            recorder: ctx.recorder(Self::COMPONENT),
        })
    }
}

impl BraveSearch {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Searchable for BraveSearch {
    /// Web search. `limit` is sent as `count`, `location` as `country`, and
    /// `params` (`offset`, `safesearch`, `freshness`, ...) as-is.
    async fn search(&self, term: &str, options: &SearchOptions) -> Result<Value> {
        debug!("Brave search for '{}' with {}", term, Pretty(options));
        let args = call_args! { search_term: term, options: options };

        self.recorder
            .record_async("search", &args, async {
                let token = self.credentials.secret(API_KEY)?;
                let request = RequestOptions::new()
                    .header("Accept", "application/json")
                    .header("X-Subscription-Token", token.expose())
                    .query("q", term)
                    .query_opt("count", options.limit)
                    .query_opt("country", options.location.as_deref())
                    .query_object(&options.params);

                self.client.get(&self.endpoint, &request).await?.into_json()
            })
            .await
    }
}
