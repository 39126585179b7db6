//! Indeed job search through a rendered browser page
//!
//! Indeed has no public API, so job cards are scraped from the rendered
//! search results. Result pages hold 15 cards; larger requests paginate with
//! the `start` parameter, which makes CAPTCHAs more likely.

use crate::capabilities::{BrowserDriven, Initializable, Locator, LocatorKind, SearchOptions, Searchable};
use crate::chrome::ChromeRenderer;
use crate::context::SourceContext;
use crate::renderer::PageRenderer;
use api_crawler_common::{log_by_severity, CrawlerError, Pretty, Result};
use api_crawler_lake::{call_args, CallRecorder};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub const INDEED_BASE_URL: &str = "https://www.indeed.com";
pub const DEFAULT_LOCATION: &str = "United States";
pub const DEFAULT_LISTINGS: usize = 15;

/// Job cards per result page, and the `start` increment between pages
pub const PAGE_SIZE: u32 = 15;

const COMPONENT: &str = "IndeedSearch";

/// Phrases of Indeed's human-verification interstitials
const CAPTCHA_PHRASES: [&str; 3] = [
    "Verify you are human by completing the action below",
    "Verifying you are human. This may take a few seconds.",
    "needs to review the security of your connection before proceeding.",
];

pub const EXPERIENCE_LEVELS: [&str; 4] = ["mid_level", "entry_level", "senior_level", "no_exp"];
pub const JOB_TYPES: [&str; 5] = ["fulltime", "parttime", "internship", "temporary", "contract"];
pub const WORK_TYPES: [&str; 2] = ["hybrid", "remote"];

/// `fromage` values Indeed honours
const EFFECTIVE_DAYS_AGO: [u32; 5] = [0, 1, 3, 7, 14];

/// Optional search filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilters {
    /// Only postings from the last N days, 0 for any time
    #[serde(default)]
    pub days_ago: u32,
    /// Minimum yearly pay, appended to the query text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay: Option<u64>,
    /// One of [`EXPERIENCE_LEVELS`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_level: Option<String>,
    /// One of [`WORK_TYPES`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    /// One of [`JOB_TYPES`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
}

impl JobFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn days_ago(mut self, days: u32) -> Self {
        self.days_ago = days;
        self
    }

    pub fn pay(mut self, pay: u64) -> Self {
        self.pay = Some(pay);
        self
    }

    pub fn exp_level(mut self, level: impl Into<String>) -> Self {
        self.exp_level = Some(level.into());
        self
    }

    pub fn work_type(mut self, work_type: impl Into<String>) -> Self {
        self.work_type = Some(work_type.into());
        self
    }

    pub fn job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    /// Filters from search parameters; unknown keys are ignored
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let filters: JobFilters = serde_json::from_value(Value::Object(params.clone()))
            .map_err(|e| CrawlerError::validation("filters", e.to_string()))?;
        filters.validate()?;
        Ok(filters)
    }

    /// Reject values Indeed does not understand
    pub fn validate(&self) -> Result<()> {
        check_choice("exp_level", self.exp_level.as_deref(), &EXPERIENCE_LEVELS)?;
        check_choice("job_type", self.job_type.as_deref(), &JOB_TYPES)?;
        check_choice("work_type", self.work_type.as_deref(), &WORK_TYPES)
    }

    fn has_attributes(&self) -> bool {
        self.exp_level.is_some() || self.work_type.is_some() || self.job_type.is_some()
    }

    /// The `sc` attribute block, e.g. `0kf%3Aexplvl(ENTRY_LEVEL)jt(fulltime)%3B`
    fn attribute_block(&self) -> Option<String> {
        if !self.has_attributes() {
            return None;
        }

        let mut block = String::from("0kf%3A");
        match self.exp_level.as_deref() {
            Some("no_exp") => block.push_str("attr(D7S5D)"),
            Some(level) => block.push_str(&format!("explvl({})", level.to_uppercase())),
            None => {}
        }
        if let Some(job_type) = &self.job_type {
            block.push_str(&format!("jt({job_type})"));
        }
        match self.work_type.as_deref() {
            Some("hybrid") => block.push_str("attr(PAXZC)"),
            Some("remote") => block.push_str("attr(DSQF7)"),
            _ => {}
        }
        block.push_str("%3B");
        Some(block)
    }
}

fn check_choice(parameter: &str, value: Option<&str>, allowed: &[&str]) -> Result<()> {
    match value {
        Some(value) if !allowed.contains(&value) => {
            Err(CrawlerError::invalid_choice(parameter, value, allowed))
        }
        _ => Ok(()),
    }
}

/// One job card from the result list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub snippet: Option<String>,
    pub date: Option<String>,
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
}

/// Build the search URL for one result page
///
/// Words of `search_query` and `location` are joined with `+`; filters are
/// validated before anything else.
pub fn create_job_search_url(
    base_url: &str,
    search_query: &str,
    location: &str,
    start_from: u32,
    filters: &JobFilters,
) -> Result<String> {
    filters.validate()?;

    if !EFFECTIVE_DAYS_AGO.contains(&filters.days_ago) {
        warn!(
            "days_ago={} may be ignored by Indeed; it only honours 1, 3, 7 or 14",
            filters.days_ago
        );
    }

    let mut url = format!(
        "{}/jobs?q={}",
        base_url.trim_end_matches('/'),
        plus_joined(search_query)
    );
    if let Some(pay) = filters.pay.filter(|pay| *pay > 0) {
        url.push_str(&format!("+${}", with_thousands(pay)));
    }
    if !location.is_empty() {
        url.push_str(&format!("&l={}", plus_joined(location)));
    }
    if start_from != 0 {
        url.push_str(&format!("&start={start_from}"));
    }
    if filters.days_ago != 0 {
        url.push_str(&format!("&fromage={}", filters.days_ago));
    }
    if let Some(block) = filters.attribute_block() {
        url.push_str(&format!("&sc={block}"));
    }

    Ok(url)
}

fn plus_joined(text: &str) -> String {
    text.split(' ')
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

fn with_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Fail with [`CrawlerError::BotDetected`] on a human-verification page
pub fn check_for_captcha(html: &str) -> Result<()> {
    match CAPTCHA_PHRASES.iter().find(|phrase| html.contains(*phrase)) {
        Some(phrase) => {
            warn!("Indeed served a verification page: {}", phrase);
            Err(CrawlerError::bot_detected(
                COMPONENT,
                "CAPTCHA encountered while accessing Indeed",
            ))
        }
        None => Ok(()),
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| {
        CrawlerError::validation("selector", format!("Invalid CSS selector '{css}': {e}"))
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse the job cards of a result page
///
/// Cards are the `li` children of the list inside `#mosaic-jobResults`. A
/// page without that container has no results at all.
pub fn parse_job_postings(html: &str, base_url: &str) -> Result<Vec<JobPosting>> {
    let document = Html::parse_document(html);

    let results = document
        .select(&selector("div#mosaic-jobResults")?)
        .next()
        .ok_or_else(|| CrawlerError::no_results(COMPONENT, "No search results found."))?;
    let Some(feed) = results.select(&selector("ul")?).next() else {
        return Ok(Vec::new());
    };

    let title = selector("span")?;
    let company = selector("span[data-testid='company-name']")?;
    let location = selector("div[data-testid='text-location']")?;
    let snippet = selector("ul[style^='list-style']")?;
    let date = selector("span[data-testid^='myJobsStateDate']")?;
    let link = selector("a")?;

    let base = base_url.trim_end_matches('/');
    let postings = feed
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li")
        .map(|card| {
            let first = |sel: &Selector| card.select(sel).next().map(element_text);
            JobPosting {
                title: first(&title),
                company: first(&company),
                location: first(&location),
                snippet: first(&snippet),
                date: first(&date),
                link: card
                    .select(&link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(|href| absolute_link(base, href)),
                full_description: None,
            }
        })
        .collect::<Vec<_>>();

    debug!("Parsed {} job cards", postings.len());
    Ok(postings)
}

fn absolute_link(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{base}{href}")
    }
}

/// Text of `#jobDescriptionText` on a posting page
pub fn parse_full_description(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector("div#jobDescriptionText")?)
        .next()
        .map(element_text))
}

/// Indeed job search driven through a [`PageRenderer`]
pub struct IndeedSearch<R = ChromeRenderer> {
    renderer: R,
    base_url: String,
    recorder: CallRecorder,
}

#[async_trait]
impl Initializable for IndeedSearch<ChromeRenderer> {
    const COMPONENT: &'static str = COMPONENT;

    async fn initialize(ctx: &SourceContext) -> Result<Self> {
        let renderer = ChromeRenderer::new(ctx.config().browser.clone());
        Ok(Self::with_renderer(ctx, renderer))
    }
}

impl<R: PageRenderer> IndeedSearch<R> {
    /// Search through `renderer`, recording into the context's lake
    pub fn with_renderer(ctx: &SourceContext, renderer: R) -> Self {
        Self {
            renderer,
            base_url: INDEED_BASE_URL.to_string(),
            recorder: ctx.recorder(COMPONENT),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Job postings for `search_query` in `location`
    ///
    /// Pages of 15 are fetched until `n_listings` postings are collected or a
    /// page adds nothing. With `get_full_description` every posting's page is
    /// rendered too. With `close` the browser session is released whatever
    /// the outcome.
    pub async fn get_job_postings_data(
        &self,
        search_query: &str,
        location: &str,
        n_listings: usize,
        get_full_description: bool,
        close: bool,
        filters: &JobFilters,
    ) -> Result<Vec<JobPosting>> {
        let args = call_args! {
            search_query: search_query,
            location: location,
            n_listings: n_listings,
            get_full_description: get_full_description,
            close: close,
            filters: filters,
        };

        self.recorder
            .record_async(
                "get_job_postings_data",
                &args,
                self.run_job_search(search_query, location, n_listings, get_full_description, close, filters),
            )
            .await
    }

    async fn run_job_search(
        &self,
        search_query: &str,
        location: &str,
        n_listings: usize,
        get_full_description: bool,
        close: bool,
        filters: &JobFilters,
    ) -> Result<Vec<JobPosting>> {
        let outcome = self
            .collect_postings(search_query, location, n_listings, get_full_description, filters)
            .await;
        self.finish_session(outcome, close).await
    }

    /// Release the browser session when `close` is set, keeping the first error
    async fn finish_session<T>(&self, outcome: Result<T>, close: bool) -> Result<T> {
        if !close {
            return outcome;
        }
        match (outcome, self.close().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    log_by_severity("Closing after a failed search also failed", &close_err);
                }
                Err(err)
            }
        }
    }

    async fn collect_postings(
        &self,
        search_query: &str,
        location: &str,
        n_listings: usize,
        get_full_description: bool,
        filters: &JobFilters,
    ) -> Result<Vec<JobPosting>> {
        filters.validate()?;
        if get_full_description {
            warn!("Fetching full descriptions may trigger CAPTCHAs or rate limits");
        }
        if n_listings > PAGE_SIZE as usize {
            warn!("Paginating for {} listings may trigger CAPTCHAs or rate limits", n_listings);
        }

        let mut postings = Vec::new();
        let mut start_from = 0;

        while postings.len() < n_listings {
            let page = match self.search_page(search_query, location, start_from, filters).await {
                Ok(page) => page,
                // Past the first page a missing result list means the end
                Err(CrawlerError::NoResults { .. }) if start_from > 0 => break,
                Err(err) => return Err(err),
            };
            if page.is_empty() {
                break;
            }

            postings.extend(page);
            start_from += PAGE_SIZE;
        }
        postings.truncate(n_listings);

        if get_full_description {
            for posting in postings.iter_mut() {
                if let Some(link) = posting.link.clone() {
                    let html = self.renderer.render(&link).await?;
                    check_for_captcha(&html)?;
                    posting.full_description = parse_full_description(&html)?;
                }
            }
        }

        info!("Collected {} Indeed postings for '{}'", postings.len(), search_query);
        Ok(postings)
    }

    async fn search_page(
        &self,
        search_query: &str,
        location: &str,
        start_from: u32,
        filters: &JobFilters,
    ) -> Result<Vec<JobPosting>> {
        let url = create_job_search_url(&self.base_url, search_query, location, start_from, filters)?;
        let html = self.renderer.render(&url).await?;
        check_for_captcha(&html)?;
        parse_job_postings(&html, &self.base_url)
    }
}

#[async_trait]
impl<R: PageRenderer> Searchable for IndeedSearch<R> {
    /// Job search. `location` defaults to the United States and `limit` to
    /// 15. `params` carries [`JobFilters`] fields plus the booleans
    /// `get_full_description` (default false) and `close` (default true).
    async fn search(&self, term: &str, options: &SearchOptions) -> Result<Value> {
        debug!("Indeed search for '{}' with {}", term, Pretty(options));
        let args = call_args! { term: term, options: options };

        self.recorder
            .record_async("search", &args, async {
                let location = options.location.as_deref().unwrap_or(DEFAULT_LOCATION);
                let n_listings = options.limit.unwrap_or(DEFAULT_LISTINGS);
                let flag = |name: &str, default: bool| {
                    options
                        .params
                        .get(name)
                        .and_then(Value::as_bool)
                        .unwrap_or(default)
                };
                let close = flag("close", true);

                let postings = match JobFilters::from_params(&options.params) {
                    Ok(filters) => {
                        self.run_job_search(
                            term,
                            location,
                            n_listings,
                            flag("get_full_description", false),
                            close,
                            &filters,
                        )
                        .await
                    }
                    Err(err) => self.finish_session(Err(err), close).await,
                }?;
                serde_json::to_value(postings).map_err(CrawlerError::from)
            })
            .await
    }
}

#[async_trait]
impl<R: PageRenderer> BrowserDriven for IndeedSearch<R> {
    async fn scroll_to(&self, locator: &str, kind: LocatorKind) -> Result<()> {
        self.renderer
            .scroll_into_view(&Locator::new(kind, locator))
            .await
    }

    async fn close(&self) -> Result<()> {
        self.renderer.shutdown().await
    }
}
