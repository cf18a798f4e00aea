use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde::Deserialize;
use tracing::{debug, info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

const JS_TEXT: &str = "function() { return this.textContent; }";
const JS_INNER_HTML: &str = "function() { return this.innerHTML; }";
const JS_VISIBLE: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    return this.offsetParent !== null && r.width > 0 && r.height > 0; }";
const JS_ENABLED: &str = "function() { \
    return !this.disabled && this.getAttribute('aria-disabled') !== 'true'; }";

/// The page-level operations the scraper needs from a browsing session.
/// One session drives one tab; nothing here is safe to run concurrently.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and wait for the load, failing after `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn scroll_by(&self, delta: i64) -> Result<()>;

    /// Wait up to `timeout` for `selector` to match, then count the matches.
    /// Returns 0 if nothing appeared in time.
    async fn wait_for_count(&self, selector: &str, timeout: Duration) -> Result<usize>;

    /// Scroll the `index`-th match of `selector` into view and click it.
    async fn click_nth(&self, selector: &str, index: usize) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Text content of the first match, `None` if nothing matches.
    async fn text(&self, selector: &str) -> Result<Option<String>>;

    /// Inner HTML of the first match, `None` if nothing matches.
    async fn inner_html(&self, selector: &str) -> Result<Option<String>>;

    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// `None` when the element is absent.
    async fn is_enabled(&self, selector: &str) -> Result<Option<bool>>;

    async fn current_url(&self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

// ── Cookies ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub same_site: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CookieFile {
    State { cookies: Vec<Cookie> },
    List(Vec<Cookie>),
}

pub fn parse_cookies(json: &str) -> Result<Vec<Cookie>> {
    let file: CookieFile = serde_json::from_str(json).context("Invalid cookie JSON")?;
    let cookies = match file {
        CookieFile::State { cookies } | CookieFile::List(cookies) => cookies,
    };
    if cookies.is_empty() {
        return Err(anyhow!("Cookie file contains no cookies"));
    }
    Ok(cookies)
}

pub fn load_cookies(path: &Path) -> Result<Vec<Cookie>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_cookies(&json)
}

fn same_site(value: Option<&str>) -> Option<Network::CookieSameSite> {
    match value?.to_ascii_lowercase().as_str() {
        "strict" => Some(Network::CookieSameSite::Strict),
        "lax" => Some(Network::CookieSameSite::Lax),
        "none" | "no_restriction" => Some(Network::CookieSameSite::None),
        _ => None,
    }
}

// ── Headless Chrome ──

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub fn launch(headless: bool) -> Result<Self> {
        let options = LaunchOptions {
            headless,
            sandbox: false,
            idle_browser_timeout: IDLE_TIMEOUT,
            ..Default::default()
        };
        let browser = Browser::new(options)?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(DEFAULT_TIMEOUT);
        info!("Browser launched (headless: {})", headless);
        Ok(Self {
            browser: Some(browser),
            tab,
        })
    }

    /// Set cookies on the fresh context before any navigation.
    pub fn inject_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        let mut failed = 0usize;
        for cookie in cookies {
            let result = self.tab.call_method(Network::SetCookie {
                name: cookie.name.clone(),
                value: cookie.value.clone(),
                url: None,
                domain: Some(cookie.domain.clone()),
                path: Some(cookie.path.clone()),
                secure: Some(cookie.secure),
                http_only: Some(cookie.http_only),
                same_site: same_site(cookie.same_site.as_deref()),
                expires: cookie.expires.filter(|e| *e > 0.0),
                priority: None,
                same_party: None,
                source_scheme: None,
                source_port: None,
                partition_key: None,
            });
            if let Err(e) = result {
                warn!("Failed to set cookie {}: {}", cookie.name, e);
                failed += 1;
            }
        }
        if failed == cookies.len() {
            return Err(anyhow!("None of the {} cookies could be set", cookies.len()));
        }
        info!("Injected {} cookies", cookies.len() - failed);
        Ok(())
    }

    fn first(&self, selector: &str) -> Option<Element<'_>> {
        match self.tab.find_element(selector) {
            Ok(el) => Some(el),
            Err(e) => {
                debug!("No match for {}: {}", selector, e);
                None
            }
        }
    }
}

fn js_value(el: &Element<'_>, function: &str) -> Result<serde_json::Value> {
    el.call_js_fn(function, vec![], false)?
        .value
        .ok_or_else(|| anyhow!("JS call returned no value"))
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        let result = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ());
        self.tab.set_default_timeout(DEFAULT_TIMEOUT);
        result.with_context(|| format!("Navigation to {} failed", url))
    }

    async fn scroll_by(&self, delta: i64) -> Result<()> {
        self.tab
            .evaluate(&format!("window.scrollBy(0, {});", delta), false)?;
        Ok(())
    }

    async fn wait_for_count(&self, selector: &str, timeout: Duration) -> Result<usize> {
        if let Err(e) = self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
            debug!("Wait for {} ended: {}", selector, e);
            return Ok(0);
        }
        Ok(self.tab.find_elements(selector)?.len())
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        let elements = self.tab.find_elements(selector)?;
        let el = elements
            .get(index)
            .ok_or_else(|| anyhow!("{} has no match at index {}", selector, index))?;
        el.scroll_into_view()?;
        el.click()?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.tab.find_element(selector)?.click()?;
        Ok(())
    }

    async fn text(&self, selector: &str) -> Result<Option<String>> {
        let Some(el) = self.first(selector) else {
            return Ok(None);
        };
        Ok(js_value(&el, JS_TEXT)?.as_str().map(String::from))
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>> {
        let Some(el) = self.first(selector) else {
            return Ok(None);
        };
        Ok(js_value(&el, JS_INNER_HTML)?.as_str().map(String::from))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let Some(el) = self.first(selector) else {
            return Ok(false);
        };
        Ok(js_value(&el, JS_VISIBLE)?.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, selector: &str) -> Result<Option<bool>> {
        let Some(el) = self.first(selector) else {
            return Ok(None);
        };
        Ok(Some(js_value(&el, JS_ENABLED)?.as_bool().unwrap_or(false)))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn close(&mut self) -> Result<()> {
        let closed = self.tab.close(false);
        // Dropping the browser kills the Chrome process.
        self.browser.take();
        closed?;
        info!("Browser closed");
        Ok(())
    }
}
