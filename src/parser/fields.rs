use std::time::Duration;

use tracing::debug;

use crate::browser::BrowserSession;
use crate::config::Locators;
use crate::parser::{description, posted};

pub const UNKNOWN: &str = "Unknown";
pub const NO_DESCRIPTION: &str = "No description found.";

const META_SEPARATOR: char = '·';

/// Outcome of reading one field through its locator chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Found(String),
    Missing,
}

impl Field {
    pub fn or(self, sentinel: &str) -> String {
        match self {
            Field::Found(value) => value,
            Field::Missing => sentinel.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Query {
    Text,
    Html,
}

/// A job as read from the detail view, before it is stamped and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub time_posted: String,
    pub description: String,
    pub link: String,
}

/// Split "Remote · 3 days ago · 40 applicants" into location and raw phrase.
/// Anything past the second part is dropped.
pub fn split_meta(raw: &str) -> (String, Option<String>) {
    let mut parts = raw.split(META_SEPARATOR).map(str::trim);
    let location = parts.next().unwrap_or_default().to_string();
    let posted = parts.next().filter(|p| !p.is_empty()).map(String::from);
    (location, posted)
}

pub struct FieldExtractor {
    locators: Locators,
    expand_wait: Duration,
}

impl FieldExtractor {
    pub fn new(locators: Locators, expand_wait: Duration) -> Self {
        Self {
            locators,
            expand_wait,
        }
    }

    /// Read every field of the open detail view. A field that can't be read
    /// gets its sentinel; the other fields are unaffected.
    pub async fn extract<S>(&self, view: &S) -> ExtractedJob
    where
        S: BrowserSession + ?Sized,
    {
        let title = first_match(view, self.locators.title, Query::Text).await.or(UNKNOWN);
        let company = first_match(view, self.locators.company, Query::Text).await.or(UNKNOWN);

        let (location, time_posted) = match first_match(view, self.locators.meta, Query::Text).await {
            Field::Found(raw) => {
                let (location, phrase) = split_meta(&raw);
                let location = if location.is_empty() { UNKNOWN.to_string() } else { location };
                let time_posted = phrase.map_or_else(|| UNKNOWN.to_string(), |p| posted::normalize(&p));
                (location, time_posted)
            }
            Field::Missing => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        };

        let description = self.description(view).await;

        let link = match view.current_url().await {
            Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
            Ok(_) => UNKNOWN.to_string(),
            Err(e) => {
                debug!("Could not read page URL: {}", e);
                UNKNOWN.to_string()
            }
        };

        ExtractedJob {
            title,
            company,
            location,
            time_posted,
            description,
            link,
        }
    }

    async fn description<S>(&self, view: &S) -> String
    where
        S: BrowserSession + ?Sized,
    {
        self.expand(view).await;

        let html = match first_match(view, self.locators.description_expanded, Query::Html).await {
            Field::Found(html) => html,
            Field::Missing => {
                match first_match(view, self.locators.description_plain, Query::Html).await {
                    Field::Found(html) => html,
                    Field::Missing => return NO_DESCRIPTION.to_string(),
                }
            }
        };

        description::extract(&html)
    }

    /// Click "show more" if it is on screen.
    async fn expand<S>(&self, view: &S)
    where
        S: BrowserSession + ?Sized,
    {
        for selector in self.locators.show_more {
            match view.is_visible(selector).await {
                Ok(true) => {
                    match view.click(selector).await {
                        Ok(()) => tokio::time::sleep(self.expand_wait).await,
                        Err(e) => debug!("Show more click failed: {}", e),
                    }
                    return;
                }
                Ok(false) => {}
                Err(e) => debug!("Show more check failed for {}: {}", selector, e),
            }
        }
    }
}

async fn first_match<S>(view: &S, chain: &[&str], query: Query) -> Field
where
    S: BrowserSession + ?Sized,
{
    for selector in chain {
        let result = match query {
            Query::Text => view.text(selector).await,
            Query::Html => view.inner_html(selector).await,
        };
        match result {
            Ok(Some(value)) if !value.trim().is_empty() => {
                return Field::Found(value.trim().to_string());
            }
            Ok(_) => debug!("{} is empty", selector),
            Err(e) => debug!("Query {} failed: {}", selector, e),
        }
    }
    Field::Missing
}
