//! GitHub REST API adapter

use crate::capabilities::{Initializable, RestfulClient, SearchOptions, Searchable};
use crate::context::SourceContext;
use crate::http::{join_url, HttpResponse, RequestOptions, RestClient};
use api_crawler_common::{CrawlerError, Result};
use api_crawler_config::ResolvedCredentials;
use api_crawler_lake::{call_args, CallRecorder};
use async_trait::async_trait;
use chrono::{Duration, Local};
use serde_json::{Map, Value};
use tracing::debug;

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_API_VERSION: &str = "2022-11-28";
const API_KEY: &str = "GITHUB_API_KEY";

/// Page size used by the `get_all_repo_*` operations
pub const PAGE_SIZE: u64 = 100;

/// Client for the GitHub REST API
#[derive(Debug, Clone)]
pub struct GithubApi {
    client: RestClient,
    base_url: String,
    credentials: ResolvedCredentials,
    recorder: CallRecorder,
}

#[async_trait]
impl Initializable for GithubApi {
    const COMPONENT: &'static str = "GithubApi";

    async fn initialize(ctx: &SourceContext) -> Result<Self> {
        let credentials = ctx.require_credentials(Self::COMPONENT, &[API_KEY])?;

        Ok(Self {
            client: ctx.rest_client()?,
            base_url: GITHUB_API_URL.to_string(),
            credentials,
            recorder: ctx.recorder(Self::COMPONENT),
        })
    }
}

impl GithubApi {
    /// Point the adapter at another API root, e.g. GitHub Enterprise
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_headers(&self) -> Result<RequestOptions> {
        let token = self.credentials.secret(API_KEY)?;

        Ok(RequestOptions::new()
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", token.expose()))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION))
    }

    /// Issues of `owner/repo`. With `comments` each issue gains a
    /// `comments_thread` array.
    pub async fn get_repo_issues(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
        comments: bool,
    ) -> Result<Value> {
        let args = call_args! { repo_name: repo_name, params: params, comments: comments };

        self.recorder
            .record_async("get_repo_issues", &args, async {
                let mut issues = self.fetch_repo(repo_name, "issues", params).await?;
                if comments {
                    self.attach_comment_threads(repo_name, &mut issues).await?;
                }
                Ok(issues)
            })
            .await
    }

    pub async fn get_repo_pulls(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Value> {
        let args = call_args! { repo_name: repo_name, params: params };
        self.recorder
            .record_async(
                "get_repo_pulls",
                &args,
                self.fetch_repo(repo_name, "pulls", params),
            )
            .await
    }

    pub async fn get_repo_commits(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Value> {
        let args = call_args! { repo_name: repo_name, params: params };
        self.recorder
            .record_async(
                "get_repo_commits",
                &args,
                self.fetch_repo(repo_name, "commits", params),
            )
            .await
    }

    pub async fn get_repo_comments(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Value> {
        let args = call_args! { repo_name: repo_name, params: params };
        self.recorder
            .record_async(
                "get_repo_comments",
                &args,
                self.fetch_repo(repo_name, "comments", params),
            )
            .await
    }

    /// Every issue of the repository, one page of [`PAGE_SIZE`] at a time
    pub async fn get_all_repo_issues(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Value>> {
        let args = call_args! { repo_name: repo_name, params: params };
        self.recorder
            .record_async(
                "get_all_repo_issues",
                &args,
                self.fetch_all_pages(repo_name, "issues", params),
            )
            .await
    }

    pub async fn get_all_repo_pull_requests(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Value>> {
        let args = call_args! { repo_name: repo_name, params: params };
        self.recorder
            .record_async(
                "get_all_repo_pull_requests",
                &args,
                self.fetch_all_pages(repo_name, "pulls", params),
            )
            .await
    }

    pub async fn get_all_repo_commits(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Value>> {
        let args = call_args! { repo_name: repo_name, params: params };
        self.recorder
            .record_async(
                "get_all_repo_commits",
                &args,
                self.fetch_all_pages(repo_name, "commits", params),
            )
            .await
    }

    pub async fn get_all_repo_comments(
        &self,
        repo_name: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Value>> {
        let args = call_args! { repo_name: repo_name, params: params };
        self.recorder
            .record_async(
                "get_all_repo_comments",
                &args,
                self.fetch_all_pages(repo_name, "comments", params),
            )
            .await
    }

    /// Repositories matching `query` created in the last `days` days, most
    /// starred first
    pub async fn get_trending_repos(&self, query: &str, days: u32) -> Result<Vec<Value>> {
        let args = call_args! { query: query, days: days };
        self.recorder
            .record_async("get_trending_repos", &args, self.trending(query, days))
            .await
    }

    pub async fn get_trending_python_repos(&self, days: u32) -> Result<Vec<Value>> {
        let args = call_args! { days: days };
        self.recorder
            .record_async(
                "get_trending_python_repos",
                &args,
                self.trending("language:python", days),
            )
            .await
    }

    /// Run `query` against `search/{endpoint}` (repositories, issues, code, ...)
    pub async fn search_endpoint(
        &self,
        endpoint: &str,
        query: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let options = RequestOptions::new().query("q", query).merge(options);
        RestfulClient::get(self, &format!("search/{endpoint}"), options).await
    }

    async fn trending(&self, query: &str, days: u32) -> Result<Vec<Value>> {
        let since = Local::now() - Duration::days(i64::from(days));
        let query = format!("{query} created:>{}", since.format("%Y-%m-%d"));
        debug!("Searching trending repositories: {}", query);

        let options = RequestOptions::new()
            .query("sort", "stars")
            .query("order", "desc");
        let body = self
            .search_endpoint("repositories", &query, options)
            .await?
            .into_json()?;

        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_repo(
        &self,
        repo_name: &str,
        endpoint: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Value> {
        let (owner, repo) = split_repo_name(repo_name)?;

        let mut options = RequestOptions::new();
        if let Some(params) = params {
            options = options.query_object(params);
        }

        RestfulClient::get(self, &format!("repos/{owner}/{repo}/{endpoint}"), options)
            .await?
            .into_json()
    }

    async fn fetch_all_pages(
        &self,
        repo_name: &str,
        endpoint: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Value>> {
        let mut collected = Vec::new();
        let mut page: u64 = 1;

        loop {
            let mut query = Map::new();
            query.insert("per_page".to_string(), PAGE_SIZE.into());
            if let Some(params) = params {
                query.extend(params.clone());
            }
            query.insert("page".to_string(), page.into());

            let items = match self.fetch_repo(repo_name, endpoint, Some(&query)).await? {
                Value::Array(items) => items,
                _ => Vec::new(),
            };
            if items.is_empty() {
                break;
            }

            debug!("{} page {}: {} items", endpoint, page, items.len());
            collected.extend(items);
            page += 1;
        }

        Ok(collected)
    }

    async fn attach_comment_threads(&self, repo_name: &str, issues: &mut Value) -> Result<()> {
        let Some(issues) = issues.as_array_mut() else {
            return Ok(());
        };

        for issue in issues.iter_mut() {
            let Some(number) = issue.get("number").and_then(Value::as_u64) else {
                continue;
            };
            let thread = self
                .fetch_repo(repo_name, &format!("issues/{number}/comments"), None)
                .await?;
            if let Some(issue) = issue.as_object_mut() {
                issue.insert("comments_thread".to_string(), thread);
            }
        }
        Ok(())
    }
}

/// Split `owner/repo`, rejecting anything else
pub fn split_repo_name(repo_name: &str) -> Result<(&str, &str)> {
    match repo_name.split('/').collect::<Vec<_>>().as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => Ok((*owner, *repo)),
        _ => Err(CrawlerError::validation(
            "repo_name",
            format!("must be in '{{owner}}/{{repo}}' format. Got {repo_name}"),
        )),
    }
}

#[async_trait]
impl RestfulClient for GithubApi {
    async fn get(&self, endpoint: &str, options: RequestOptions) -> Result<HttpResponse> {
        let options = self.auth_headers()?.merge(options);
        self.client
            .get(&join_url(&self.base_url, endpoint), &options)
            .await
    }

    async fn post(
        &self,
        endpoint: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let options = self.auth_headers()?.merge(options);
        self.client
            .post(&join_url(&self.base_url, endpoint), body.as_ref(), &options)
            .await
    }
}

#[async_trait]
impl Searchable for GithubApi {
    /// Search repositories. `limit` maps to `per_page`; `params` are passed
    /// through as query parameters (`sort`, `order`, ...).
    async fn search(&self, term: &str, options: &SearchOptions) -> Result<Value> {
        let args = call_args! { term: term, options: options };

        self.recorder
            .record_async("search", &args, async {
                let request = RequestOptions::new()
                    .query_opt("per_page", options.limit)
                    .query_object(&options.params);
                self.search_endpoint("repositories", term, request)
                    .await?
                    .into_json()
            })
            .await
    }
}
