//! Apify actor runs

use crate::capabilities::Initializable;
use crate::context::SourceContext;
use crate::http::{join_url, RequestOptions, RestClient};
use api_crawler_common::{CrawlerError, Result};
use api_crawler_config::ResolvedCredentials;
use api_crawler_lake::{call_args, CallRecorder};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

pub const APIFY_API_URL: &str = "https://api.apify.com/v2";
const API_KEY: &str = "APIFY_API_KEY";

/// Wait between status checks in [`ApifyApi::run_and_get_results`]
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const STATUS_SUCCEEDED: &str = "SUCCEEDED";
const TERMINAL_FAILURES: [&str; 3] = ["FAILED", "ABORTED", "TIMED-OUT"];

/// Client for the Apify actor API
#[derive(Debug, Clone)]
pub struct ApifyApi {
    client: RestClient,
    base_url: String,
    credentials: ResolvedCredentials,
    recorder: CallRecorder,
    poll_interval: Duration,
}

#[async_trait]
impl Initializable for ApifyApi {
    const COMPONENT: &'static str = "ApifyApi";

    async fn initialize(ctx: &SourceContext) -> Result<Self> {
        let credentials = ctx.require_credentials(Self::COMPONENT, &[API_KEY])?;

        Ok(Self {
            client: ctx.rest_client()?,
            base_url: APIFY_API_URL.to_string(),
            credentials,
            recorder: ctx.recorder(Self::COMPONENT),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }
}

impl ApifyApi {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Actors owned by the account
    pub async fn get_actors(&self) -> Result<Value> {
        self.recorder
            .record_async("get_actors", &call_args! {}, async {
                let data = self.fetch("acts").await?;
                Ok(data.get("items").cloned().unwrap_or(Value::Array(Vec::new())))
            })
            .await
    }

    /// Start a run of `actor_id` (`username/actor` or `username~actor`)
    pub async fn run_actor(&self, actor_id: &str, input: Option<&Value>) -> Result<Value> {
        let args = call_args! { actor_id: actor_id, input: input };
        self.recorder
            .record_async("run_actor", &args, self.start_run(actor_id, input))
            .await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Value> {
        let args = call_args! { run_id: run_id };
        self.recorder
            .record_async("get_run", &args, self.fetch(&format!("actor-runs/{run_id}")))
            .await
    }

    /// Items of the run's default dataset
    pub async fn get_run_results(&self, run_id: &str) -> Result<Value> {
        let args = call_args! { run_id: run_id };
        self.recorder
            .record_async("get_run_results", &args, self.dataset_items(run_id))
            .await
    }

    /// Start a run, wait until it succeeds and return its dataset items
    ///
    /// A run ending in `FAILED`, `ABORTED` or `TIMED-OUT` is an error.
    pub async fn run_and_get_results(&self, actor_id: &str, input: Option<&Value>) -> Result<Value> {
        let args = call_args! { actor_id: actor_id, input: input };

        self.recorder
            .record_async("run_and_get_results", &args, async {
                let run = self.start_run(actor_id, input).await?;
                let run_id = run
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CrawlerError::no_results(Self::COMPONENT, "run id in run response"))?
                    .to_string();
                info!("Started Apify run {} of {}", run_id, actor_id);

                self.wait_for_run(&run_id).await?;
                self.dataset_items(&run_id).await
            })
            .await
    }

    async fn wait_for_run(&self, run_id: &str) -> Result<()> {
        loop {
            let run = self.fetch(&format!("actor-runs/{run_id}")).await?;
            let status = run.get("status").and_then(Value::as_str).unwrap_or_default();

            if status == STATUS_SUCCEEDED {
                return Ok(());
            }
            if TERMINAL_FAILURES.contains(&status) {
                return Err(CrawlerError::transport(
                    format!("Apify run {run_id}"),
                    format!("finished with status {status}"),
                ));
            }

            debug!("Apify run {} is {}, waiting", run_id, status);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn start_run(&self, actor_id: &str, input: Option<&Value>) -> Result<Value> {
        let url = join_url(&self.base_url, &format!("acts/{}/runs", actor_path(actor_id)));
        let response = self.client.post(&url, input, &self.auth()?).await?;
        Ok(unwrap_data(response.into_json()?))
    }

    async fn dataset_items(&self, run_id: &str) -> Result<Value> {
        self.fetch(&format!("actor-runs/{run_id}/dataset/items")).await
    }

    async fn fetch(&self, endpoint: &str) -> Result<Value> {
        let url = join_url(&self.base_url, endpoint);
        let response = self.client.get(&url, &self.auth()?).await?;
        Ok(unwrap_data(response.into_json()?))
    }

    fn auth(&self) -> Result<RequestOptions> {
        let token = self.credentials.secret(API_KEY)?;
        Ok(RequestOptions::new().header("Authorization", format!("Bearer {}", token.expose())))
    }
}

/// Actor ids use `~` between owner and name in URLs
fn actor_path(actor_id: &str) -> String {
    actor_id.replace('/', "~")
}

/// Most Apify responses wrap their payload in `{"data": ...}`
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut object) if object.contains_key("data") => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
