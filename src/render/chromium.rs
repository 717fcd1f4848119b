//! Chromium-based renderer using chromiumoxide

use super::{RenderedPage, Renderer};
use crate::config::RenderConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
const OUTER_HTML: &str = "document.documentElement.outerHTML";
const MESSAGE_BUFFER: &str = "window._websocketMessages || []";

/// Renders pages in a freshly launched headless Chromium
///
/// Each call to [`Renderer::render`] launches one browser, opens one page
/// and closes both before returning.
pub struct ChromiumRenderer {
    chrome_path: Option<PathBuf>,
    settle: Duration,
    scroll_settle: Duration,
    navigation_timeout: Duration,
}

impl ChromiumRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.as_ref().map(PathBuf::from),
            settle: Duration::from_millis(config.settle_ms),
            scroll_settle: Duration::from_millis(config.scroll_settle_ms),
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
        }
    }

    async fn capture(&self, browser: &Browser, url: &str) -> Result<RenderedPage> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        tokio::time::timeout(self.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation timed out after {:?}", self.navigation_timeout))?
            .context("navigation failed")?;

        tokio::time::sleep(self.settle).await;

        page.evaluate(SCROLL_TO_BOTTOM)
            .await
            .context("scroll failed")?;
        tokio::time::sleep(self.scroll_settle).await;

        let markup: String = page
            .evaluate(OUTER_HTML)
            .await
            .context("failed to get HTML")?
            .into_value()
            .map_err(|e| anyhow!("failed to convert HTML result: {e:?}"))?;

        let buffered: serde_json::Value = page
            .evaluate(MESSAGE_BUFFER)
            .await
            .context("failed to read message buffer")?
            .into_value()
            .map_err(|e| anyhow!("failed to convert message buffer: {e:?}"))?;

        let messages = match buffered {
            serde_json::Value::Array(entries) => entries,
            serde_json::Value::Null => Vec::new(),
            other => vec![other],
        };

        let _ = page.close().await;

        Ok(RenderedPage { markup, messages })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.capture(&browser, url).await;

        if let Err(e) = browser.close().await {
            tracing::debug!("Browser did not close cleanly: {}", e);
        }
        handler_task.abort();

        result
    }
}
