use std::ops::RangeInclusive;
use std::time::Duration;

pub const FEED_URL: &str = "https://www.linkedin.com/feed/";
const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/?keywords=";

pub const DEFAULT_KEYWORDS: &str = "python developer";
pub const DEFAULT_COOKIES_PATH: &str = "cookies.json";
pub const DEFAULT_TARGET: usize = 100;

/// Build the job search URL for the given keywords.
pub fn search_url(keywords: &str) -> String {
    format!("{}{}", SEARCH_URL, urlencoding::encode(keywords.trim()))
}

/// Every wait the scraper performs, bounded.
#[derive(Debug, Clone)]
pub struct Timing {
    pub load_timeout: Duration,
    pub retry_wait: Duration,
    pub post_load_settle: Duration,
    pub card_wait: Duration,
    pub expand_wait: Duration,
    pub scroll_burst: Duration,
    /// Milliseconds, drawn uniformly.
    pub post_click_ms: RangeInclusive<u64>,
    pub next_page_ms: RangeInclusive<u64>,
    pub scroll_pause_ms: RangeInclusive<u64>,
    pub scroll_delta: RangeInclusive<i64>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(60),
            retry_wait: Duration::from_secs(5),
            post_load_settle: Duration::from_secs(5),
            card_wait: Duration::from_secs(15),
            expand_wait: Duration::from_millis(1500),
            scroll_burst: Duration::from_secs(6),
            post_click_ms: 3000..=4000,
            next_page_ms: 4000..=6000,
            scroll_pause_ms: 1000..=1500,
            scroll_delta: 300..=600,
        }
    }
}

#[cfg(test)]
impl Timing {
    /// No sleeping at all; scroll bursts are skipped.
    pub fn instant() -> Self {
        Self {
            load_timeout: Duration::ZERO,
            retry_wait: Duration::ZERO,
            post_load_settle: Duration::ZERO,
            card_wait: Duration::ZERO,
            expand_wait: Duration::ZERO,
            scroll_burst: Duration::ZERO,
            post_click_ms: 0..=0,
            next_page_ms: 0..=0,
            scroll_pause_ms: 0..=0,
            scroll_delta: 300..=600,
        }
    }
}

/// CSS locators for the search results page and the job detail panel.
/// Field chains are tried in order; the first non-empty match wins.
#[derive(Debug, Clone)]
pub struct Locators {
    pub job_card: &'static str,
    pub next_page: &'static str,
    pub title: &'static [&'static str],
    pub company: &'static [&'static str],
    pub meta: &'static [&'static str],
    pub show_more: &'static [&'static str],
    pub description_expanded: &'static [&'static str],
    pub description_plain: &'static [&'static str],
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            job_card: ".job-card-container--clickable",
            next_page: "button.jobs-search-pagination__button--next",
            title: &[
                "h1.t-24",
                ".job-details-jobs-unified-top-card__job-title h1",
                ".jobs-unified-top-card__job-title",
            ],
            company: &[
                "div.job-details-jobs-unified-top-card__company-name a",
                "div.job-details-jobs-unified-top-card__company-name",
                ".jobs-unified-top-card__company-name a",
            ],
            meta: &[
                "div.job-details-jobs-unified-top-card__primary-description-container",
                "div.job-details-jobs-unified-top-card__tertiary-description-container",
                ".jobs-unified-top-card__primary-description",
            ],
            show_more: &[
                "button.jobs-description__footer-button",
                "button.show-more-less-html__button--more",
            ],
            description_expanded: &[
                "div.jobs-description__content",
                "div.show-more-less-html__markup",
            ],
            description_plain: &[
                "div.jobs-description-content__text--stretch",
                "div.jobs-description-content__text",
            ],
        }
    }
}
