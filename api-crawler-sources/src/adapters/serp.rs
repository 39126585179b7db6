//! SerpApi engines: Google Trends, Trending Now and Google Jobs
//!
//! Every engine shares one REST surface; the engine name and API key are
//! added to the query of every request.

use crate::capabilities::{Initializable, RestfulClient};
use crate::context::SourceContext;
use crate::http::{join_url, HttpResponse, RequestOptions, RestClient};
use api_crawler_common::{CrawlerError, Result};
use api_crawler_config::ResolvedCredentials;
use api_crawler_lake::{call_args, CallRecorder};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use tracing::warn;

pub const SERP_API_URL: &str = "https://serpapi.com/search";
const API_KEY: &str = "SERP_API_KEY";

/// Google Trends data types accepted by [`GoogleTrends::trends`]
pub const TRENDS_DATA_TYPES: [&str; 5] = [
    "TIMESERIES",
    "GEO_MAP",
    "GEO_MAP_0",
    "RELATED_TOPICS",
    "RELATED_QUERIES",
];

/// A SerpApi search engine
pub trait SerpEngine: Send + Sync + 'static {
    /// Value of the `engine` query parameter
    const ENGINE: &'static str;
    /// Component name for the call log
    const COMPONENT: &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct GoogleTrendsEngine;

impl SerpEngine for GoogleTrendsEngine {
    const ENGINE: &'static str = "google_trends";
    const COMPONENT: &'static str = "GoogleTrends";
}

#[derive(Debug, Clone, Copy)]
pub struct TrendingNowEngine;

impl SerpEngine for TrendingNowEngine {
    const ENGINE: &'static str = "google_trends_trending_now";
    const COMPONENT: &'static str = "TrendingNow";
}

#[derive(Debug, Clone, Copy)]
pub struct GoogleJobsEngine;

impl SerpEngine for GoogleJobsEngine {
    const ENGINE: &'static str = "google_jobs";
    const COMPONENT: &'static str = "GoogleJobs";
}

pub type GoogleTrends = SerpApi<GoogleTrendsEngine>;
pub type TrendingNow = SerpApi<TrendingNowEngine>;
pub type GoogleJobs = SerpApi<GoogleJobsEngine>;

/// Client for one SerpApi engine
#[derive(Debug, Clone)]
pub struct SerpApi<E> {
    client: RestClient,
    base_url: String,
    credentials: ResolvedCredentials,
    recorder: CallRecorder,
    engine: PhantomData<E>,
}

#[async_trait]
impl<E: SerpEngine> Initializable for SerpApi<E> {
    const COMPONENT: &'static str = E::COMPONENT;

    async fn initialize(ctx: &SourceContext) -> Result<Self> {
        let credentials = ctx.require_credentials(E::COMPONENT, &[API_KEY])?;

        Ok(Self {
            client: ctx.rest_client()?,
            base_url: SERP_API_URL.to_string(),
            credentials,
            recorder: ctx.recorder(E::COMPONENT),
            engine: PhantomData,
        })
    }
}

impl<E: SerpEngine> SerpApi<E> {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn engine(&self) -> &'static str {
        E::ENGINE
    }

    fn engine_query(&self) -> Result<RequestOptions> {
        let api_key = self.credentials.secret(API_KEY)?;
        Ok(RequestOptions::new()
            .query("api_key", api_key.expose())
            .query("engine", E::ENGINE))
    }

    /// GET the search endpoint with `params` on top of the engine query
    async fn query(&self, params: RequestOptions) -> Result<HttpResponse> {
        RestfulClient::get(self, "", params).await
    }
}

impl GoogleTrends {
    /// Interest data for `search_query`. `data_type` must be one of
    /// [`TRENDS_DATA_TYPES`]; it is checked before any request is made.
    ///
    /// The value is sent as `data_type`, with the underscore, which is the
    /// parameter name the SerpApi Google Trends engine documents.
    pub async fn trends(
        &self,
        search_query: &str,
        data_type: &str,
        params: &Map<String, Value>,
    ) -> Result<Value> {
        let args = call_args! { search_query: search_query, data_type: data_type, params: params };

        self.recorder
            .record_async("trends", &args, async {
                if !TRENDS_DATA_TYPES.contains(&data_type) {
                    return Err(CrawlerError::invalid_choice(
                        "data_type",
                        data_type,
                        &TRENDS_DATA_TYPES,
                    ));
                }

                let request = RequestOptions::new()
                    .query("q", search_query)
                    .query("data_type", data_type)
                    .query_object(params);
                self.query(request).await?.into_json()
            })
            .await
    }
}

impl TrendingNow {
    /// Searches trending right now (`geo`, `hours`, `category_id`, ...)
    pub async fn trending(&self, params: &Map<String, Value>) -> Result<Value> {
        let args = call_args! { params: params };

        self.recorder
            .record_async("trending", &args, async {
                self.query(RequestOptions::new().query_object(params))
                    .await?
                    .into_json()
            })
            .await
    }
}

impl GoogleJobs {
    /// Job listings for `search_query`
    ///
    /// A non-success status is not an error here: the result is
    /// `{"error": "Request failed with status code: N"}`.
    pub async fn search_job_postings(
        &self,
        search_query: &str,
        params: &Map<String, Value>,
    ) -> Result<Value> {
        let args = call_args! { search_query: search_query, params: params };

        self.recorder
            .record_async("search_job_postings", &args, async {
                let request = RequestOptions::new()
                    .query("q", search_query)
                    .query_object(params);
                let response = self.query(request).await?;

                if response.is_success() {
                    Ok(response.body)
                } else {
                    warn!("Google Jobs search answered {}", response.status);
                    Ok(json!({
                        "error": format!("Request failed with status code: {}", response.status)
                    }))
                }
            })
            .await
    }
}

#[async_trait]
impl<E: SerpEngine> RestfulClient for SerpApi<E> {
    async fn get(&self, endpoint: &str, options: RequestOptions) -> Result<HttpResponse> {
        let options = self.engine_query()?.merge(options);
        let url = if endpoint.is_empty() {
            self.base_url.clone()
        } else {
            join_url(&self.base_url, endpoint)
        };
        self.client.get(&url, &options).await
    }

    /// SerpApi is read-only
    async fn post(
        &self,
        _endpoint: &str,
        _body: Option<Value>,
        _options: RequestOptions,
    ) -> Result<HttpResponse> {
        Err(CrawlerError::unsupported(E::COMPONENT, "post"))
    }
}
