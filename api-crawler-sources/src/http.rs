//! REST transport shared by the HTTP adapters
//!
//! [`RestClient`] wraps `reqwest` with the retry policy of the crawler: GET
//! requests that fail in transport or answer 429/5xx are retried with
//! exponential backoff. Every response, successful or not, is returned as a
//! serializable [`HttpResponse`] so it can be recorded as-is.

use api_crawler_common::{CrawlerError, Result};
use api_crawler_config::HttpConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::{form_urlencoded, Url};

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Exponential backoff multiplier for retry delays
const BACKOFF_MULTIPLIER: u32 = 2;

/// Longest wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Uniform response of a REST call
///
/// `body` holds parsed JSON when the payload is JSON, the raw text otherwise,
/// and `null` for an empty payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`CrawlerError::HttpStatus`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let body = match &self.body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Err(CrawlerError::HttpStatus {
            url: self.url,
            status: self.status,
            body,
        })
    }

    /// The body of a successful response
    pub fn into_json(self) -> Result<Value> {
        Ok(self.error_for_status()?.body)
    }
}

/// Request body
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Json(&'a Value),
    Form(&'a [(String, String)]),
}

/// Query parameters and headers for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Add a parameter only when it has a value
    pub fn query_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add every string, number or boolean member of a JSON object as a
    /// query parameter
    pub fn query_object(mut self, params: &serde_json::Map<String, Value>) -> Self {
        for (name, value) in params {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            self.query.push((name.clone(), value));
        }
        self
    }

    /// Merge another set of options after this one
    pub fn merge(mut self, other: RequestOptions) -> Self {
        self.query.extend(other.query);
        self.headers.extend(other.headers);
        self
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP client with retry logic and exponential backoff
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    max_retries: u32,
    base_delay: Duration,
}

impl RestClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| CrawlerError::transport("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            base_delay: config.retry_delay(),
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        self.send(Method::GET, url, None, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        self.send(Method::POST, url, body.map(Payload::Json), options)
            .await
    }

    /// POST an `application/x-www-form-urlencoded` body
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        self.send(Method::POST, url, Some(Payload::Form(form)), options)
            .await
    }

    /// Send a request, retrying idempotent ones on transient failures
    ///
    /// Non-success statuses are returned as responses, not errors. Only
    /// transport failures on the final attempt are errors.
    #[instrument(skip(self, payload, options), fields(attempt, max_retries = self.max_retries))]
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        payload: Option<Payload<'_>>,
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        let mut target = validate_url(url)?;
        if !options.query.is_empty() {
            target.query_pairs_mut().extend_pairs(&options.query);
        }
        let retries = if method == Method::GET {
            self.max_retries
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            tracing::Span::current().record("attempt", attempt);
            debug!("Attempt {} of {}", attempt + 1, retries + 1);

            let mut request = self.client.request(method.clone(), target.clone());
            for (name, value) in &options.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            match payload {
                Some(Payload::Json(body)) => request = request.json(body),
                Some(Payload::Form(form)) => {
                    let encoded = form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(form)
                        .finish();
                    request = request
                        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                        .body(encoded);
                }
                None => {}
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retryable = status == HTTP_TOO_MANY_REQUESTS || status >= 500;

                    if retryable && attempt < retries {
                        warn!("{} {} answered {}, retrying", method, url, status);
                    } else {
                        let response = read_response(response).await?;
                        if response.is_success() {
                            info!("{} {} succeeded: {}", method, url, status);
                        } else {
                            debug!("{} {} answered {}", method, url, status);
                        }
                        return Ok(response);
                    }
                }
                Err(e) if attempt >= retries => {
                    return Err(CrawlerError::transport(format!("{method} {url}"), e));
                }
                Err(e) => warn!("{} {} failed, retrying: {}", method, url, e),
            }

            sleep(backoff_delay(self.base_delay, attempt)).await;
            attempt += 1;
        }
    }
}

/// Delay before retry `attempt + 1`, doubling from `base` up to [`MAX_BACKOFF`]
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    BACKOFF_MULTIPLIER
        .checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| CrawlerError::validation("url", format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(CrawlerError::validation(
            "url",
            format!("{url}: unsupported scheme '{scheme}'"),
        )),
    }
}

async fn read_response(response: reqwest::Response) -> Result<HttpResponse> {
    let url = response.url().to_string();
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| CrawlerError::transport(format!("Failed to read response body from {url}"), e))?;

    Ok(HttpResponse {
        url,
        status,
        body: parse_body(text),
    })
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Join a base URL and an endpoint path
pub fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> RestClient {
        RestClient::new(&HttpConfig::default())
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_get_parses_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos"))
            .and(query_param("per_page", "100"))
            .and(header("X-Test", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .mount(&mock_server)
            .await;

        let options = RequestOptions::new()
            .query("per_page", 100)
            .header("X-Test", "yes");
        let response = test_client()
            .get(&format!("{}/repos", mock_server.uri()), &options)
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!([{"id": 1}]));
        assert!(response.url.ends_with("/repos?per_page=100"));
    }

    #[tokio::test]
    async fn test_text_body_is_kept_as_string() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&mock_server)
            .await;

        let response = test_client()
            .get(&format!("{}/plain", mock_server.uri()), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.body, json!("hello"));
    }

    #[tokio::test]
    async fn test_retry_logic_eventual_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&mock_server)
            .await;

        let response = test_client()
            .get(&format!("{}/flaky", mock_server.uri()), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_retries_exhausted_returns_last_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .expect(4)
            .mount(&mock_server)
            .await;

        let response = test_client()
            .get(&format!("{}/down", mock_server.uri()), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        let err = response.error_for_status().unwrap_err();
        assert!(matches!(err, CrawlerError::HttpStatus { status: 500, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_backoff_doubles_and_is_capped() {
        let base = Duration::from_millis(500);

        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 10), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, 32), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::ZERO, 40), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_many_retries_do_not_overflow_backoff() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/always-down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(41)
            .mount(&mock_server)
            .await;

        let response = test_client()
            .with_max_retries(40)
            .with_retry_delay(Duration::ZERO)
            .get(&format!("{}/always-down", mock_server.uri()), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_post_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/runs"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = test_client()
            .post(
                &format!("{}/runs", mock_server.uri()),
                Some(&json!({"input": 1})),
                &RequestOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 502);
    }

    #[tokio::test]
    async fn test_post_form_encodes_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("grant_type=client_credentials&scope=read+all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("scope".to_string(), "read all".to_string()),
        ];
        let response = test_client()
            .post_form(
                &format!("{}/token", mock_server.uri()),
                &form,
                &RequestOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.body["access_token"], "t");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = test_client()
            .get(&format!("{}/missing", mock_server.uri()), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_url_is_validation_error() {
        let err = test_client()
            .get("not a url", &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlerError::Validation { .. }));

        let err = test_client()
            .get("ftp://example.com/file", &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlerError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Nothing listens on the discard port
        let client = test_client().with_max_retries(1);
        let err = client
            .get("http://127.0.0.1:9/", &RequestOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlerError::Transport { .. }));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.github.com/", "/repos/a/b"),
            "https://api.github.com/repos/a/b"
        );
        assert_eq!(
            join_url("https://api.github.com", "https://other.example/x"),
            "https://other.example/x"
        );
    }

    #[test]
    fn test_query_object_skips_nested_values() {
        let params = json!({"q": "rust", "page": 2, "exact": true, "nested": {"a": 1}});
        let options = RequestOptions::new().query_object(params.as_object().unwrap());

        assert_eq!(options.query_value("q"), Some("rust"));
        assert_eq!(options.query_value("page"), Some("2"));
        assert_eq!(options.query_value("exact"), Some("true"));
        assert_eq!(options.query_value("nested"), None);
    }
}
