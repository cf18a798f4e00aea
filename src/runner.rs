use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::{self, BrowserSession, ChromeSession};
use crate::config::{self, Locators, Timing};
use crate::db::{JobRecord, JobStore};
use crate::error::RunError;
use crate::navigator::Navigator;
use crate::parser::fields::FieldExtractor;

/// What the caller of a run gets back, success or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scraped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub target: usize,
    pub search_url: String,
    pub warm_up_url: Option<String>,
    pub cookies: PathBuf,
    pub headless: bool,
    pub timing: Timing,
    pub locators: Locators,
}

impl ScrapeOptions {
    pub fn new(target: usize, keywords: &str, cookies: PathBuf) -> Self {
        Self {
            target,
            search_url: config::search_url(keywords),
            warm_up_url: Some(config::FEED_URL.to_string()),
            cookies,
            headless: true,
            timing: Timing::default(),
            locators: Locators::default(),
        }
    }
}

/// Load cookies, start Chrome and scrape until the target or the results
/// run out. Never fails: errors end up in the summary.
pub async fn run_scrape<St: JobStore>(opts: ScrapeOptions, store: &St) -> RunSummary {
    let cookies = match browser::load_cookies(&opts.cookies) {
        Ok(c) => c,
        Err(e) => {
            return failed(RunError::Credentials {
                path: opts.cookies.display().to_string(),
                reason: format!("{:#}", e),
            })
        }
    };

    let mut session = match ChromeSession::launch(opts.headless) {
        Ok(s) => s,
        Err(e) => return failed(RunError::Launch(format!("{:#}", e))),
    };

    if let Err(e) = session.inject_cookies(&cookies) {
        if let Err(close_err) = session.close().await {
            warn!("Browser close failed: {:#}", close_err);
        }
        return failed(RunError::Credentials {
            path: opts.cookies.display().to_string(),
            reason: format!("{:#}", e),
        });
    }

    let pb = ProgressBar::new(opts.target as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} jobs ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let summary = Scraper::new(session, store, &opts).with_progress(pb.clone()).run().await;
    pb.finish_and_clear();
    summary
}

fn failed(err: RunError) -> RunSummary {
    warn!("Run failed: {}", err);
    RunSummary {
        scraped: 0,
        error: Some(err.to_string()),
    }
}

/// Per-run bookkeeping: which titles were stored and how many.
#[derive(Debug)]
pub struct RunState {
    seen_titles: HashSet<String>,
    total_scraped: usize,
    target_count: usize,
}

impl RunState {
    pub fn new(target_count: usize) -> Self {
        Self {
            seen_titles: HashSet::new(),
            total_scraped: 0,
            target_count,
        }
    }

    pub fn is_duplicate(&self, title: &str) -> bool {
        self.seen_titles.contains(title)
    }

    pub fn record(&mut self, title: String) {
        self.seen_titles.insert(title);
        self.total_scraped += 1;
    }

    pub fn target_reached(&self) -> bool {
        self.total_scraped >= self.target_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Init,
    PageLoaded,
    CardsEnumerated(usize),
    PageDone,
    Exhausted,
    TargetReached,
    Failed(String),
}

/// Drives one run over an open browser session.
pub struct Scraper<'a, S, St> {
    nav: Navigator<S>,
    extractor: FieldExtractor,
    store: &'a St,
    run: RunState,
    search_url: String,
    warm_up_url: Option<String>,
    progress: ProgressBar,
}

impl<'a, S: BrowserSession, St: JobStore> Scraper<'a, S, St> {
    pub fn new(session: S, store: &'a St, opts: &ScrapeOptions) -> Self {
        Self {
            nav: Navigator::new(session, opts.locators.clone(), opts.timing.clone()),
            extractor: FieldExtractor::new(opts.locators.clone(), opts.timing.expand_wait),
            store,
            run: RunState::new(opts.target),
            search_url: opts.search_url.clone(),
            warm_up_url: opts.warm_up_url.clone(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run to completion. The session is closed exactly once, whichever way
    /// the run ends.
    pub async fn run(mut self) -> RunSummary {
        let mut state = State::Init;
        let error = loop {
            state = match state {
                State::Init => self.load().await,
                State::PageLoaded => self.enumerate().await,
                State::CardsEnumerated(count) => self.visit_cards(count).await,
                State::PageDone => self.next_page().await,
                State::Exhausted => {
                    info!("Results exhausted after {} jobs", self.run.total_scraped);
                    break None;
                }
                State::TargetReached => {
                    info!("Target of {} jobs reached", self.run.target_count);
                    break None;
                }
                State::Failed(reason) => {
                    warn!("Run failed: {}", reason);
                    break Some(reason);
                }
            };
        };

        self.nav.close().await;
        RunSummary {
            scraped: self.run.total_scraped,
            error,
        }
    }

    async fn load(&self) -> State {
        if let Some(url) = &self.warm_up_url {
            self.nav.warm_up(url).await;
        }
        match self.nav.open(&self.search_url).await {
            Ok(()) => State::PageLoaded,
            Err(e) => State::Failed(e.to_string()),
        }
    }

    async fn enumerate(&self) -> State {
        self.nav.scroll_results().await;
        match self.nav.cards().await {
            0 => State::Exhausted,
            n => {
                info!("Found {} job cards", n);
                State::CardsEnumerated(n)
            }
        }
    }

    async fn visit_cards(&mut self, count: usize) -> State {
        for index in 0..count {
            if self.run.target_reached() {
                return State::TargetReached;
            }
            self.visit(index).await;
        }
        if self.run.target_reached() {
            State::TargetReached
        } else {
            State::PageDone
        }
    }

    async fn next_page(&self) -> State {
        if self.nav.advance().await {
            State::PageLoaded
        } else {
            State::Exhausted
        }
    }

    /// Click one card, read it and store it unless its title was seen.
    /// Failures skip the card.
    async fn visit(&mut self, index: usize) {
        if let Err(e) = self.nav.activate(index).await {
            warn!("Skipping card {}: {:#}", index + 1, e);
            return;
        }

        let job = self.extractor.extract(self.nav.session()).await;
        if self.run.is_duplicate(&job.title) {
            debug!("Duplicate title, skipping: {}", job.title);
            return;
        }

        let record = JobRecord::stamp(job, Local::now());
        match self.store.create_job(&record) {
            Ok(()) => {
                self.run.record(record.title.clone());
                self.progress.inc(1);
                info!(
                    "Scraped {}: {} at {}",
                    self.run.total_scraped, record.title, record.company
                );
            }
            Err(e) => warn!("Failed to save {}: {:#}", record.title, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use anyhow::{anyhow, Result};

    use super::*;
    use crate::browser::fake::{FakeCard, FakeSession};
    use crate::parser::fields::UNKNOWN;

    #[derive(Default)]
    struct MemoryStore {
        jobs: RefCell<Vec<JobRecord>>,
        failures: Cell<usize>,
    }

    impl MemoryStore {
        fn failing(times: usize) -> Self {
            let store = Self::default();
            store.failures.set(times);
            store
        }

        fn titles(&self) -> Vec<String> {
            self.jobs.borrow().iter().map(|j| j.title.clone()).collect()
        }
    }

    impl JobStore for MemoryStore {
        fn create_job(&self, job: &JobRecord) -> Result<()> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(anyhow!("database is locked"));
            }
            self.jobs.borrow_mut().push(job.clone());
            Ok(())
        }
    }

    fn options(target: usize) -> ScrapeOptions {
        ScrapeOptions {
            warm_up_url: None,
            timing: Timing::instant(),
            ..ScrapeOptions::new(target, "rust", PathBuf::from("cookies.json"))
        }
    }

    fn cards(titles: &[&str]) -> Vec<FakeCard> {
        titles.iter().map(|t| FakeCard::titled(t)).collect()
    }

    async fn run(session: &FakeSession, store: &MemoryStore, target: usize) -> RunSummary {
        Scraper::new(session.clone(), store, &options(target)).run().await
    }

    #[tokio::test]
    async fn duplicate_titles_recorded_once() {
        let session = FakeSession::new(vec![cards(&["A", "A", "B"])]);
        let store = MemoryStore::default();
        let summary = run(&session, &store, 10).await;
        assert_eq!(summary, RunSummary { scraped: 2, error: None });
        assert_eq!(store.titles(), vec!["A", "B"]);
        assert_eq!(session.closes(), 1);
    }

    #[tokio::test]
    async fn stops_mid_page_at_target() {
        let session = FakeSession::new(vec![cards(&["A", "B", "C", "D", "E"])]);
        let store = MemoryStore::default();
        let summary = run(&session, &store, 3).await;
        assert_eq!(summary.scraped, 3);
        assert_eq!(store.titles(), vec!["A", "B", "C"]);
        assert_eq!(session.state().clicks.len(), 3);
        assert_eq!(session.closes(), 1);
    }

    #[tokio::test]
    async fn follows_pages_until_target() {
        let session = FakeSession::new(vec![cards(&["A", "B"]), cards(&["C", "D"])]);
        let store = MemoryStore::default();
        let summary = run(&session, &store, 3).await;
        assert_eq!(summary.scraped, 3);
        assert_eq!(store.titles(), vec!["A", "B", "C"]);
        assert_eq!(session.state().page, 1);
    }

    #[tokio::test]
    async fn exhausts_when_pages_run_out() {
        let session = FakeSession::new(vec![cards(&["A"]), cards(&["A", "B"])]);
        let store = MemoryStore::default();
        let summary = run(&session, &store, 100).await;
        assert_eq!(summary, RunSummary { scraped: 2, error: None });
        assert_eq!(session.closes(), 1);
    }

    #[tokio::test]
    async fn bad_cards_do_not_stop_the_run() {
        let loc = Locators::default();
        let pages = vec![vec![
            FakeCard::titled("A"),
            FakeCard::titled("B").unclickable(),
            FakeCard::titled("C").failing(loc.company[0]).failing(loc.meta[0]),
            FakeCard::titled("D"),
        ]];
        let session = FakeSession::new(pages);
        let store = MemoryStore::default();
        let summary = run(&session, &store, 10).await;
        assert_eq!(summary.scraped, 3);
        assert_eq!(store.titles(), vec!["A", "C", "D"]);
        let jobs = store.jobs.borrow();
        let c = &jobs[1];
        assert_eq!(c.company, UNKNOWN);
        assert_eq!(c.location, UNKNOWN);
        assert_eq!(c.description, "Build things.");
    }

    #[tokio::test]
    async fn no_cards_is_exhaustion_not_error() {
        let session = FakeSession::new(vec![vec![]]);
        let store = MemoryStore::default();
        let summary = run(&session, &store, 10).await;
        assert_eq!(summary, RunSummary { scraped: 0, error: None });
        assert_eq!(session.closes(), 1);
    }

    #[tokio::test]
    async fn navigation_failure_reports_error_and_closes() {
        let session = FakeSession::new(vec![cards(&["A"])]).failing_goto(2);
        let store = MemoryStore::default();
        let summary = run(&session, &store, 10).await;
        assert_eq!(summary.scraped, 0);
        assert!(summary.error.unwrap().contains("Navigation"));
        assert!(store.titles().is_empty());
        assert_eq!(session.closes(), 1);
    }

    #[tokio::test]
    async fn navigation_recovers_on_retry() {
        let session = FakeSession::new(vec![cards(&["A"])]).failing_goto(1);
        let store = MemoryStore::default();
        assert_eq!(run(&session, &store, 10).await.scraped, 1);
    }

    #[tokio::test]
    async fn pagination_error_ends_run() {
        let session = FakeSession::new(vec![cards(&["A"]), cards(&["B"])]).failing_next_page();
        let store = MemoryStore::default();
        let summary = run(&session, &store, 10).await;
        assert_eq!(summary, RunSummary { scraped: 1, error: None });
    }

    #[tokio::test]
    async fn failed_save_is_not_counted_or_marked_seen() {
        let session = FakeSession::new(vec![cards(&["A", "A", "B"])]);
        let store = MemoryStore::failing(1);
        let summary = run(&session, &store, 10).await;
        assert_eq!(summary.scraped, 2);
        assert_eq!(store.titles(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn warm_up_visits_feed_first() {
        let session = FakeSession::new(vec![cards(&["A"])]).failing_goto(1);
        let store = MemoryStore::default();
        let opts = ScrapeOptions {
            warm_up_url: Some(config::FEED_URL.to_string()),
            ..options(10)
        };
        let summary = Scraper::new(session.clone(), &store, &opts).run().await;
        assert_eq!(summary.scraped, 1);
        assert_eq!(
            session.state().gotos,
            vec![config::FEED_URL.to_string(), config::search_url("rust")]
        );
    }

    #[tokio::test]
    async fn zero_target_records_nothing() {
        let session = FakeSession::new(vec![cards(&["A"])]);
        let store = MemoryStore::default();
        assert_eq!(run(&session, &store, 0).await.scraped, 0);
        assert!(session.state().clicks.is_empty());
    }

    #[tokio::test]
    async fn unreadable_cookies_fail_before_launch() {
        let store = MemoryStore::default();
        let opts = ScrapeOptions::new(10, "rust", PathBuf::from("tests/fixtures/missing.json"));
        let summary = run_scrape(opts, &store).await;
        assert_eq!(summary.scraped, 0);
        assert!(summary.error.unwrap().contains("Failed to load cookies"));
    }

    #[test]
    fn summary_json_shape() {
        let ok = RunSummary { scraped: 2, error: None };
        assert_eq!(serde_json::to_value(&ok).unwrap(), serde_json::json!({ "scraped": 2 }));
        let err = RunSummary { scraped: 0, error: Some("boom".into()) };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({ "scraped": 0, "error": "boom" })
        );
    }

    #[test]
    fn run_state_counts_unique_titles() {
        let mut state = RunState::new(2);
        assert!(!state.is_duplicate("A"));
        state.record("A".into());
        assert!(state.is_duplicate("A"));
        assert!(!state.target_reached());
        state.record("B".into());
        assert!(state.target_reached());
    }
}
