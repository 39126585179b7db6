//! Data-source adapters
//!
//! Each adapter implements the capabilities its upstream supports and records
//! its data-fetching operations under its own component name.

pub mod apify;
pub mod brave;
pub mod github;
pub mod indeed;
pub mod reddit;
pub mod serp;

pub use apify::ApifyApi;
pub use brave::BraveSearch;
pub use github::GithubApi;
pub use indeed::{IndeedSearch, JobFilters, JobPosting};
pub use reddit::{RedditApi, TimeFilter};
pub use serp::{GoogleJobs, GoogleTrends, SerpApi, SerpEngine, TrendingNow};
