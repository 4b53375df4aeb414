//! Page rendering: load a URL in a headless browser and return its DOM.
//!
//! Many reference pages are single-page applications whose content only
//! exists after JavaScript has run, so a plain HTTP GET is not enough. The
//! crawler asks a [`PageRenderer`] for the rendered `outerHTML` of the
//! document element.
//!
//! ## Waiting for the page to settle
//!
//! After navigation the renderer polls `document.readyState` and the size of
//! the serialized DOM every `settle_poll_ms`. The page counts as settled once
//! it reports `complete` and the size did not change between two consecutive
//! polls. The whole render, navigation included, is bounded by
//! `render_timeout_secs`; if the page never settles, whatever has rendered
//! by then is returned.
//!
//! ## Browser lifetime
//!
//! [`ChromeRenderer`] launches one browser per run and reuses a single tab
//! for every reference. [`PageRenderer::shutdown`] closes it; the crawl calls
//! it whether or not individual references failed.

use crate::error::UnitError;
use async_trait::async_trait;

/// Render a URL and return the resulting document markup.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigate to `url` and return `document.documentElement.outerHTML`.
    async fn render(&self, url: &str) -> Result<String, UnitError>;

    /// Release the browser. Later `render` calls fail.
    async fn shutdown(&self) {}
}

/// Tracks DOM-idle checks until the page is settled.
#[derive(Debug, Default)]
pub struct SettleTracker {
    last_size: Option<usize>,
}

impl SettleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one check; returns `true` once the page is settled.
    pub fn observe(&mut self, ready_state: &str, size: usize) -> bool {
        let unchanged = self.last_size == Some(size);
        self.last_size = Some(size);
        ready_state == "complete" && unchanged
    }
}

#[cfg(feature = "browser")]
pub use chrome::ChromeRenderer;

#[cfg(feature = "browser")]
mod chrome {
    use super::{PageRenderer, SettleTracker};
    use crate::config::CrawlConfig;
    use crate::error::{HarvestError, UnitError};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::Page;
    use futures::StreamExt;
    use std::time::{Duration, Instant};
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    const READY_STATE_JS: &str = "document.readyState";
    const DOM_SIZE_JS: &str = "document.documentElement ? document.documentElement.outerHTML.length : 0";
    const OUTER_HTML_JS: &str = "document.documentElement ? document.documentElement.outerHTML : ''";

    struct Session {
        browser: Browser,
        page: Page,
        handler: JoinHandle<()>,
    }

    /// [`PageRenderer`] driving a headless Chromium over the DevTools protocol.
    pub struct ChromeRenderer {
        session: Mutex<Option<Session>>,
        render_timeout: Duration,
        settle_poll: Duration,
    }

    impl ChromeRenderer {
        /// Launch a headless browser configured from `config`.
        ///
        /// The executable is discovered on `PATH` or through the `CHROME`
        /// environment variable.
        pub async fn launch(config: &CrawlConfig) -> Result<Self, HarvestError> {
            let browser_config = BrowserConfig::builder()
                .no_sandbox()
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg(format!("--user-agent={}", config.user_agent))
                .build()
                .map_err(HarvestError::BrowserLaunchFailed)?;

            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .map_err(|e| HarvestError::BrowserLaunchFailed(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!("Browser handler stopped: {}", e);
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| HarvestError::BrowserLaunchFailed(e.to_string()))?;

            info!("Headless browser started");
            Ok(Self {
                session: Mutex::new(Some(Session {
                    browser,
                    page,
                    handler,
                })),
                render_timeout: Duration::from_secs(config.render_timeout_secs),
                settle_poll: Duration::from_millis(config.settle_poll_ms),
            })
        }

        async fn wait_until_settled(&self, page: &Page, deadline: Instant) {
            let mut tracker = SettleTracker::new();
            loop {
                let ready = page
                    .evaluate(READY_STATE_JS)
                    .await
                    .ok()
                    .and_then(|r| r.into_value::<String>().ok())
                    .unwrap_or_default();
                let size = page
                    .evaluate(DOM_SIZE_JS)
                    .await
                    .ok()
                    .and_then(|r| r.into_value::<usize>().ok())
                    .unwrap_or(0);

                if tracker.observe(&ready, size) {
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    debug!("Page did not settle before the render timeout");
                    return;
                }
                tokio::time::sleep(self.settle_poll.min(deadline - now)).await;
            }
        }
    }

    #[async_trait]
    impl PageRenderer for ChromeRenderer {
        async fn render(&self, url: &str) -> Result<String, UnitError> {
            let failed = |detail: String| UnitError::RenderFailed {
                url: url.to_string(),
                detail,
            };

            let guard = self.session.lock().await;
            let session = guard
                .as_ref()
                .ok_or_else(|| failed("browser has been shut down".into()))?;
            let page = &session.page;

            let deadline = Instant::now() + self.render_timeout;
            match tokio::time::timeout(self.render_timeout, page.goto(url)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(failed(e.to_string())),
                Err(_) => {
                    return Err(failed(format!(
                        "navigation timed out after {}s",
                        self.render_timeout.as_secs()
                    )))
                }
            }

            self.wait_until_settled(page, deadline).await;

            page.evaluate(OUTER_HTML_JS)
                .await
                .map_err(|e| failed(e.to_string()))?
                .into_value::<String>()
                .map_err(|e| failed(e.to_string()))
        }

        async fn shutdown(&self) {
            let Some(mut session) = self.session.lock().await.take() else {
                return;
            };
            if let Err(e) = session.page.close().await {
                debug!("Closing tab failed: {}", e);
            }
            if let Err(e) = session.browser.close().await {
                warn!("Closing browser failed: {}", e);
            }
            if let Err(e) = session.browser.wait().await {
                debug!("Waiting for browser exit failed: {}", e);
            }
            session.handler.abort();
            info!("Headless browser stopped");
        }
    }
}
