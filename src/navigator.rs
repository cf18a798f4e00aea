use anyhow::Result;
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::{Locators, Timing};
use crate::error::RunError;
use crate::pacer::Pacer;

/// Search-results navigation on top of one browser session.
pub struct Navigator<S> {
    session: S,
    locators: Locators,
    timing: Timing,
    pacer: Pacer,
}

impl<S: BrowserSession> Navigator<S> {
    pub fn new(session: S, locators: Locators, timing: Timing) -> Self {
        let pacer = Pacer::new(&timing);
        Self {
            session,
            locators,
            timing,
            pacer,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Best-effort visit before the real navigation; failures are ignored.
    pub async fn warm_up(&self, url: &str) {
        match self.session.goto(url, self.timing.load_timeout).await {
            Ok(()) => debug!("Warm-up page loaded: {}", url),
            Err(e) => warn!("Warm-up navigation failed, continuing: {:#}", e),
        }
    }

    /// Load `url`, retrying once after a short wait.
    pub async fn open(&self, url: &str) -> Result<(), RunError> {
        if let Err(first) = self.session.goto(url, self.timing.load_timeout).await {
            warn!(
                "Navigation failed ({:#}), retrying in {:.1}s",
                first,
                self.timing.retry_wait.as_secs_f64()
            );
            tokio::time::sleep(self.timing.retry_wait).await;
            self.session
                .goto(url, self.timing.load_timeout)
                .await
                .map_err(|e| RunError::Navigation {
                    url: url.to_string(),
                    reason: format!("{:#}", e),
                })?;
        }
        info!("Loaded {}", url);
        tokio::time::sleep(self.timing.post_load_settle).await;
        Ok(())
    }

    /// Scroll the results list so lazily rendered cards appear.
    pub async fn scroll_results(&self) {
        self.pacer
            .scroll(&self.session, self.timing.scroll_burst)
            .await;
    }

    /// Number of job cards on screen; 0 means the results ran out.
    pub async fn cards(&self) -> usize {
        match self
            .session
            .wait_for_count(self.locators.job_card, self.timing.card_wait)
            .await
        {
            Ok(0) => {
                warn!("No job cards appeared within {:?}", self.timing.card_wait);
                0
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Job card lookup failed: {:#}", e);
                0
            }
        }
    }

    /// Open the detail view of card `index`.
    pub async fn activate(&self, index: usize) -> Result<()> {
        self.session
            .click_nth(self.locators.job_card, index)
            .await?;
        self.pacer.pause(&self.timing.post_click_ms).await;
        Ok(())
    }

    /// Go to the next results page. `false` means there is none.
    pub async fn advance(&self) -> bool {
        let selector = self.locators.next_page;
        match self.session.is_enabled(selector).await {
            Ok(Some(true)) => {}
            Ok(Some(false)) => {
                info!("Next page button disabled");
                return false;
            }
            Ok(None) => {
                info!("No next page button");
                return false;
            }
            Err(e) => {
                warn!("Next page check failed: {:#}", e);
                return false;
            }
        }

        if let Err(e) = self.session.click(selector).await {
            warn!("Next page click failed: {:#}", e);
            return false;
        }
        self.pacer.pause(&self.timing.next_page_ms).await;
        info!("Moved to next results page");
        true
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            warn!("Browser close failed: {:#}", e);
        }
    }
}
