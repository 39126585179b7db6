//! The browser-automation seam used by rendered-page adapters

use crate::capabilities::Locator;
use api_crawler_common::Result;
use async_trait::async_trait;

/// Renders pages in a browser session owned by the implementor
///
/// The session is opened lazily by the first call that needs it and released
/// by [`shutdown`](PageRenderer::shutdown), which may be called any number of
/// times.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigate to `url` and return the rendered HTML
    async fn render(&self, url: &str) -> Result<String>;

    /// Scroll the first element matching `locator` on the current page into view
    async fn scroll_into_view(&self, locator: &Locator) -> Result<()>;

    /// Close the session, if one is open
    async fn shutdown(&self) -> Result<()>;
}
