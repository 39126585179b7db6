//! # api-crawler
//!
//! Uniform adapters over external data sources (REST APIs, search engines,
//! rendered web pages) with a durable record of every data-fetching call.
//!
//! ## Features
//!
//! - **Capability contracts**: adapters implement only what their upstream
//!   supports ([`Searchable`], [`RestfulClient`], [`BrowserDriven`])
//! - **Call recording**: every designated operation is appended, with its
//!   arguments, result, timing and error state, to a JSON log per operation
//! - **Configuration**: defaults, a config file and `API_CRAWLER_*`
//!   environment variables through Figment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use api_crawler::prelude::*;
//!
//! # async fn example() -> api_crawler::Result<()> {
//! api_crawler::init_tracing(tracing::Level::INFO).ok();
//!
//! let ctx = SourceContext::from_env()?;
//! let github = GithubApi::initialize(&ctx).await?;
//! let issues = github.get_repo_issues("rust-lang/rust", None, false).await?;
//!
//! println!("{} open issues", issues.as_array().map_or(0, Vec::len));
//! # Ok(())
//! # }
//! ```
//!
//! Every call above lands in `<lake dir>/GithubApi_get_repo_issues.json`.

pub mod logging;

pub use api_crawler_common::{
    log_by_severity, CrawlerError, ErrorSeverity, Pretty, Result, Severity,
};
pub use api_crawler_config::{
    ConfigError, CrawlerConfig, CredentialPolicy, Credentials, LakeConfig, Secret,
};
pub use api_crawler_lake::{
    call_args, read_log, to_lake_value, CallArgs, CallLogEntry, CallRecorder, DataLake,
    LakeError, LogKey,
};
pub use api_crawler_sources::{
    adapters, with_session, ApifyApi, BraveSearch, BrowserDriven, ChromeRenderer, GithubApi,
    GoogleJobs, GoogleTrends, HttpResponse, IndeedSearch, Initializable, JobFilters, JobPosting,
    LocatorKind, PageRenderer, RedditApi, RequestOptions, RestfulClient, SearchOptions,
    Searchable, SourceContext, TrendingNow,
};
pub use logging::init_tracing;

/// Everything needed to construct and drive adapters
pub mod prelude {
    pub use crate::{
        BrowserDriven, CrawlerError, Initializable, RestfulClient, SearchOptions, Searchable,
        SourceContext,
    };
    pub use crate::{GithubApi, IndeedSearch, JobFilters};
}
