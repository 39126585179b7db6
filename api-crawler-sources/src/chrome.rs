//! Chrome-backed [`PageRenderer`] and Chrome installation detection
//!
//! The renderer launches Chrome through the DevTools protocol with a
//! throwaway profile directory the first time a page is rendered and keeps
//! one tab open until [`PageRenderer::shutdown`] is called or the renderer is
//! dropped.

use crate::capabilities::Locator;
use crate::renderer::PageRenderer;
use api_crawler_common::{CrawlerError, Result};
use api_crawler_config::BrowserConfig as BrowserSettings;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const COMPONENT: &str = "ChromeRenderer";

/// Where Chrome was looked for and where it was found
#[derive(Debug, Clone)]
pub struct ChromeDetection {
    pub path: Option<PathBuf>,
    pub paths_checked: Vec<PathBuf>,
    /// How the binary was found (configured path, env, PATH, standard location)
    pub method: Option<String>,
}

impl ChromeDetection {
    fn found(path: PathBuf, method: impl Into<String>, paths_checked: Vec<PathBuf>) -> Self {
        Self {
            path: Some(path),
            paths_checked,
            method: Some(method.into()),
        }
    }

    pub fn is_found(&self) -> bool {
        self.path.is_some()
    }

    /// Diagnostic listing every location that was checked
    pub fn message(&self) -> String {
        match &self.path {
            Some(path) => format!("Chrome found at: {}", path.display()),
            None => format!(
                "Chrome/Chromium not found. Checked {} locations:\n{}",
                self.paths_checked.len(),
                self.paths_checked
                    .iter()
                    .map(|p| format!("  - {}", p.display()))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }
}

/// Find a Chrome binary
///
/// Checked in order: the configured path, the `CHROME` environment variable,
/// common binary names on `PATH`, then the platform's standard install
/// locations.
pub fn detect_chrome(configured: Option<&Path>) -> ChromeDetection {
    let mut paths_checked = Vec::new();

    if let Some(path) = configured {
        paths_checked.push(path.to_path_buf());
        if path.exists() {
            return ChromeDetection::found(path.to_path_buf(), "configured chrome_path", paths_checked);
        }
    }

    if let Ok(chrome_path) = std::env::var("CHROME") {
        let path = PathBuf::from(chrome_path);
        paths_checked.push(path.clone());
        if path.exists() {
            return ChromeDetection::found(path, "environment variable CHROME", paths_checked);
        }
    }

    for binary_name in [
        "chrome",
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(binary_name) {
            paths_checked.push(path.clone());
            if path.exists() {
                return ChromeDetection::found(path, format!("PATH ({binary_name})"), paths_checked);
            }
        }
    }

    for path in standard_chrome_paths() {
        paths_checked.push(path.clone());
        if path.exists() {
            return ChromeDetection::found(path, "standard installation location", paths_checked);
        }
    }

    ChromeDetection {
        path: None,
        paths_checked,
        method: None,
    }
}

fn standard_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
            PathBuf::from("/opt/google/chrome/chrome"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        let program_files =
            std::env::var("ProgramFiles").unwrap_or_else(|_| "C:\\Program Files".to_string());
        let program_files_x86 = std::env::var("ProgramFiles(x86)")
            .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());

        vec![
            PathBuf::from(format!(
                "{program_files}\\Google\\Chrome\\Application\\chrome.exe"
            )),
            PathBuf::from(format!(
                "{program_files_x86}\\Google\\Chrome\\Application\\chrome.exe"
            )),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec![]
    }
}

/// An open browser with one tab
struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    // Removed when the session ends
    _profile: TempDir,
}

/// Renders pages in a headless Chrome
pub struct ChromeRenderer {
    settings: BrowserSettings,
    session: Mutex<Option<ChromeSession>>,
}

impl ChromeRenderer {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Whether a browser session is currently open
    pub async fn is_open(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn launch(&self) -> Result<ChromeSession> {
        let detection = detect_chrome(self.settings.chrome_path.as_deref());
        let chrome_path = match detection.path.clone() {
            Some(path) => path,
            None => {
                return Err(CrawlerError::transport(
                    "Failed to launch Chrome",
                    io::Error::new(io::ErrorKind::NotFound, detection.message()),
                ))
            }
        };
        info!(
            "Found Chrome at: {} (via {})",
            chrome_path.display(),
            detection.method.as_deref().unwrap_or("unknown")
        );

        // A fresh profile per session avoids SingletonLock conflicts
        let profile = tempfile::Builder::new()
            .prefix("chromium-profile-")
            .tempdir()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .user_data_dir(profile.path())
            .window_size(self.settings.window_width, self.settings.window_height)
            .args(vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
                "--no-first-run".to_string(),
                "--disable-default-apps".to_string(),
                format!("--user-agent={}", self.settings.user_agent),
            ]);
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| CrawlerError::transport("Failed to build browser config", e))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlerError::transport("Failed to launch Chrome", e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let text = e.to_string();
                    if text.contains("connection closed") || text.contains("websocket closed") {
                        warn!("Browser connection lost, stopping handler: {}", e);
                        break;
                    }
                    // Chrome sends CDP messages chromiumoxide does not model
                    trace!("CDP message error (continuing): {}", e);
                }
            }
            debug!("CDP handler task completed");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    debug!("Browser close error (ignored): {}", close_err);
                }
                handler.abort();
                return Err(CrawlerError::transport("Failed to open a browser tab", e));
            }
        };

        debug!("Chrome session started with profile {}", profile.path().display());
        Ok(ChromeSession {
            browser,
            page,
            handler,
            _profile: profile,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let session = guard
            .as_ref()
            .ok_or_else(|| CrawlerError::transport(COMPONENT, "browser session unavailable"))?;

        debug!("Navigating to {}", url);
        session
            .page
            .goto(url)
            .await
            .map_err(|e| CrawlerError::transport(format!("Failed to navigate to {url}"), e))?;

        tokio::time::sleep(self.settings.page_load_delay()).await;

        let html = session
            .page
            .content()
            .await
            .map_err(|e| CrawlerError::transport(format!("Failed to read page {url}"), e))?;
        trace!("Rendered {} characters from {}", html.len(), url);
        Ok(html)
    }

    async fn scroll_into_view(&self, locator: &Locator) -> Result<()> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| {
            CrawlerError::validation("locator", "no page is open, render a page first")
        })?;

        let found = match locator.css_selector() {
            Some(selector) => session.page.find_element(selector).await,
            None => session.page.find_xpath(locator.path.as_str()).await,
        };
        let element = found.map_err(|_| {
            CrawlerError::no_results(
                COMPONENT,
                format!("no element matches {} locator '{}'", locator.kind, locator.path),
            )
        })?;

        element
            .scroll_into_view()
            .await
            .map_err(|e| CrawlerError::transport("Failed to scroll element into view", e))?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let session = self.session.lock().await.take();

        if let Some(mut session) = session {
            debug!("Cleaning up browser resources");
            if let Err(e) = session.browser.close().await {
                debug!("Browser close error (ignored): {}", e);
            }
            session.handler.abort();
        }
        Ok(())
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            // Dropping the Browser kills the Chrome process
            session.handler.abort();
        }
    }
}

impl std::fmt::Debug for ChromeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeRenderer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::LocatorKind;

    #[test]
    fn test_configured_path_wins() {
        let temp_dir = TempDir::new().unwrap();
        let fake_chrome = temp_dir.path().join("chrome");
        std::fs::write(&fake_chrome, "").unwrap();

        let detection = detect_chrome(Some(&fake_chrome));

        assert!(detection.is_found());
        assert_eq!(detection.path.as_deref(), Some(fake_chrome.as_path()));
        assert_eq!(detection.method.as_deref(), Some("configured chrome_path"));
        assert_eq!(detection.paths_checked[0], fake_chrome);
    }

    #[test]
    fn test_missing_configured_path_is_listed() {
        let temp_dir = TempDir::new().unwrap();
        let absent = temp_dir.path().join("no-chrome-here");

        let detection = detect_chrome(Some(&absent));

        assert!(detection.paths_checked.contains(&absent));
        if !detection.is_found() {
            assert!(detection.message().contains("no-chrome-here"));
        }
    }

    #[tokio::test]
    async fn test_shutdown_without_session_is_noop() {
        let renderer = ChromeRenderer::new(BrowserSettings::default());

        assert!(!renderer.is_open().await);
        renderer.shutdown().await.unwrap();
        renderer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_scroll_without_page_is_rejected() {
        let renderer = ChromeRenderer::new(BrowserSettings::default());

        let err = renderer
            .scroll_into_view(&Locator::new(LocatorKind::Css, "#main"))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlerError::Validation { .. }));
    }
}
