//! # api-crawler Sources
//!
//! Capability contracts and the adapters that implement them.
//!
//! Adapters are built from a [`SourceContext`] through [`Initializable`],
//! then used through the capability traits they implement:
//!
//! | Adapter | Capabilities |
//! |---------|--------------|
//! | [`GithubApi`] | [`RestfulClient`], [`Searchable`] |
//! | [`BraveSearch`] | [`Searchable`] |
//! | [`GoogleTrends`], [`TrendingNow`], [`GoogleJobs`] | [`RestfulClient`] |
//! | [`ApifyApi`], [`RedditApi`] | operations only |
//! | [`IndeedSearch`] | [`Searchable`], [`BrowserDriven`] |
//!
//! ```no_run
//! use api_crawler_sources::{GithubApi, Initializable, SearchOptions, Searchable, SourceContext};
//!
//! # async fn example() -> api_crawler_common::Result<()> {
//! let ctx = SourceContext::from_env()?;
//! let github = GithubApi::initialize(&ctx).await?;
//!
//! let repos = github
//!     .search("language:rust", &SearchOptions::new().limit(5))
//!     .await?;
//! println!("{}", repos["total_count"]);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod capabilities;
pub mod chrome;
pub mod context;
pub mod http;
pub mod renderer;

pub use adapters::{
    ApifyApi, BraveSearch, GithubApi, GoogleJobs, GoogleTrends, IndeedSearch, JobFilters,
    JobPosting, RedditApi, SerpApi, SerpEngine, TimeFilter, TrendingNow,
};
pub use capabilities::{
    with_session, BrowserDriven, Initializable, Locator, LocatorKind, RestfulClient,
    SearchOptions, Searchable,
};
pub use chrome::{detect_chrome, ChromeDetection, ChromeRenderer};
pub use context::SourceContext;
pub use http::{join_url, HttpResponse, Payload, RequestOptions, RestClient};
pub use renderer::PageRenderer;
