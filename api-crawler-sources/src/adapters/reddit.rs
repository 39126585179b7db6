//! Reddit adapter using application-only OAuth

use crate::capabilities::Initializable;
use crate::context::SourceContext;
use crate::http::{join_url, RequestOptions, RestClient};
use api_crawler_common::{CrawlerError, Result};
use api_crawler_config::ResolvedCredentials;
use api_crawler_lake::{call_args, CallRecorder};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::debug;

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const REDDIT_API_URL: &str = "https://oauth.reddit.com";

const CLIENT_ID: &str = "REDDIT_CLIENT_ID";
const CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
const USER_AGENT: &str = "REDDIT_USER_AGENT";

/// Period of [`RedditApi::get_top_posts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    Day,
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl TimeFilter {
    pub const ALL_VALUES: [&'static str; 6] = ["hour", "day", "week", "month", "year", "all"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hour" => Ok(TimeFilter::Hour),
            "day" => Ok(TimeFilter::Day),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            "year" => Ok(TimeFilter::Year),
            "all" => Ok(TimeFilter::All),
            other => Err(CrawlerError::invalid_choice(
                "time_filter",
                other,
                &Self::ALL_VALUES,
            )),
        }
    }
}

/// Read-only Reddit client
///
/// The access token is requested on first use and reused afterwards.
#[derive(Debug)]
pub struct RedditApi {
    client: RestClient,
    auth_url: String,
    api_url: String,
    credentials: ResolvedCredentials,
    recorder: CallRecorder,
    token: OnceCell<String>,
}

#[async_trait]
impl Initializable for RedditApi {
    const COMPONENT: &'static str = "RedditApi";

    async fn initialize(ctx: &SourceContext) -> Result<Self> {
        let credentials =
            ctx.require_credentials(Self::COMPONENT, &[CLIENT_ID, CLIENT_SECRET, USER_AGENT])?;

        Ok(Self {
            client: ctx.rest_client()?,
            auth_url: REDDIT_AUTH_URL.to_string(),
            api_url: REDDIT_API_URL.to_string(),
            credentials,
            recorder: ctx.recorder(Self::COMPONENT),
            token: OnceCell::new(),
        })
    }
}

impl RedditApi {
    pub fn with_urls(mut self, auth_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.api_url = api_url.into();
        self
    }

    /// Top posts of `subreddit_name` for the period named by `time_filter`
    /// (hour, day, week, month, year, all). The filter is checked before any
    /// request is made.
    pub async fn get_top_posts(
        &self,
        subreddit_name: &str,
        limit: u32,
        time_filter: &str,
    ) -> Result<Vec<Value>> {
        let args = call_args! {
            subreddit_name: subreddit_name,
            limit: limit,
            time_filter: time_filter,
        };

        self.recorder
            .record_async("get_top_posts", &args, async {
                let time_filter: TimeFilter = time_filter.parse()?;
                let options = RequestOptions::new()
                    .query("limit", limit)
                    .query("t", time_filter);

                let listing = self
                    .fetch(&format!("r/{subreddit_name}/top"), options)
                    .await?;
                Ok(listing_children(&listing))
            })
            .await
    }

    /// Top-level comments of a submission, best first
    pub async fn get_top_comments(&self, submission_id: &str, limit: u32) -> Result<Vec<Value>> {
        let args = call_args! { submission_id: submission_id, limit: limit };

        self.recorder
            .record_async("get_top_comments", &args, async {
                let options = RequestOptions::new()
                    .query("limit", limit)
                    .query("depth", 1)
                    .query("sort", "top");

                // [submission listing, comment listing]
                let body = self
                    .fetch(&format!("comments/{submission_id}"), options)
                    .await?;
                let mut comments: Vec<Value> = body
                    .get(1)
                    .map(listing_children)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|comment| comment.get("body").is_some())
                    .collect();
                comments.truncate(limit as usize);
                Ok(comments)
            })
            .await
    }

    async fn fetch(&self, endpoint: &str, options: RequestOptions) -> Result<Value> {
        let token = self.access_token().await?;
        let user_agent = self.credentials.secret(USER_AGENT)?;

        let options = RequestOptions::new()
            .header("Authorization", format!("Bearer {token}"))
            .header("User-Agent", user_agent.expose())
            .query("raw_json", 1)
            .merge(options);

        self.client
            .get(&join_url(&self.api_url, endpoint), &options)
            .await?
            .into_json()
    }

    async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| self.request_token())
            .await?;
        Ok(token.as_str())
    }

    async fn request_token(&self) -> Result<String> {
        let client_id = self.credentials.secret(CLIENT_ID)?;
        let client_secret = self.credentials.secret(CLIENT_SECRET)?;
        let user_agent = self.credentials.secret(USER_AGENT)?;

        let basic = STANDARD.encode(format!(
            "{}:{}",
            client_id.expose(),
            client_secret.expose()
        ));
        let options = RequestOptions::new()
            .header("Authorization", format!("Basic {basic}"))
            .header("User-Agent", user_agent.expose());
        let form = vec![("grant_type".to_string(), "client_credentials".to_string())];

        let body = self
            .client
            .post_form(&self.auth_url, &form, &options)
            .await?
            .into_json()?;

        debug!("Obtained Reddit application token");
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CrawlerError::no_results(Self::COMPONENT, "access_token in OAuth response"))
    }
}

/// The `data` objects of a Reddit listing's children
fn listing_children(listing: &Value) -> Vec<Value> {
    listing
        .pointer("/data/children")
        .and_then(Value::as_array)
        .map(|children| {
            children
                .iter()
                .filter_map(|child| child.get("data").cloned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_time_filter_parsing() {
        assert_eq!("week".parse::<TimeFilter>().unwrap(), TimeFilter::Week);
        assert_eq!("all".parse::<TimeFilter>().unwrap(), TimeFilter::All);
        assert_eq!(TimeFilter::default(), TimeFilter::Week);

        let err = "fortnight".parse::<TimeFilter>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for 'time_filter': fortnight. Valid options are [hour, day, week, month, year, all]"
        );
    }

    #[test]
    fn test_listing_children() {
        let listing = json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t3", "data": {"title": "first"}},
                {"kind": "t3", "data": {"title": "second"}}
            ]}
        });

        let posts = listing_children(&listing);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1]["title"], "second");
        assert!(listing_children(&json!({})).is_empty());
    }
}
