use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Timelike};
use rusqlite::Connection;

use crate::parser::fields::ExtractedJob;

const DB_PATH: &str = "data/jobs.sqlite";

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;

pub fn connect() -> Result<Connection> {
    if let Some(dir) = Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id           INTEGER PRIMARY KEY,
            title        TEXT NOT NULL,
            company      TEXT NOT NULL,
            location     TEXT NOT NULL,
            time_posted  TEXT NOT NULL,
            description  TEXT NOT NULL,
            link         TEXT NOT NULL,
            scraped_date TEXT NOT NULL,
            scraped_time TEXT NOT NULL,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company);
        ",
    )?;
    Ok(())
}

// ── Records ──

/// A fully populated job, stamped with when it was scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub time_posted: String,
    pub description: String,
    pub link: String,
    pub scraped_date: NaiveDate,
    pub scraped_time: NaiveTime,
}

impl JobRecord {
    pub fn stamp(job: ExtractedJob, at: DateTime<Local>) -> Self {
        Self {
            title: job.title,
            company: job.company,
            location: job.location,
            time_posted: job.time_posted,
            description: job.description,
            link: job.link,
            scraped_date: at.date_naive(),
            scraped_time: at.time().with_nanosecond(0).unwrap_or_else(|| at.time()),
        }
    }
}

/// Where accepted jobs go. One call per job, append only.
pub trait JobStore {
    fn create_job(&self, job: &JobRecord) -> Result<()>;
}

impl JobStore for Connection {
    fn create_job(&self, job: &JobRecord) -> Result<()> {
        insert_job(self, job)?;
        Ok(())
    }
}

pub fn insert_job(conn: &Connection, job: &JobRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO jobs
         (title, company, location, time_posted, description, link, scraped_date, scraped_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            job.title,
            job.company,
            job.location,
            job.time_posted,
            job.description,
            job.link,
            job.scraped_date.format("%Y-%m-%d").to_string(),
            job.scraped_time.format("%H:%M:%S").to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Listing ──

pub struct StoredJob {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub time_posted: String,
    pub description: String,
    pub link: String,
    pub scraped_date: String,
    pub scraped_time: String,
}

pub struct JobPage {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub jobs: Vec<StoredJob>,
}

impl JobPage {
    pub fn pages(&self) -> usize {
        self.total.div_ceil(self.page_size).max(1)
    }
}

/// One page of stored jobs, newest first. Pages start at 1; the page size
/// is capped at `MAX_PAGE_SIZE`.
pub fn fetch_jobs(conn: &Connection, page: usize, page_size: usize) -> Result<JobPage> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total = count(conn, "SELECT COUNT(*) FROM jobs")?;

    let mut stmt = conn.prepare(
        "SELECT id, title, company, location, time_posted, description, link,
                scraped_date, scraped_time
         FROM jobs
         ORDER BY id DESC
         LIMIT ?1 OFFSET ?2",
    )?;
    let jobs = stmt
        .query_map(
            rusqlite::params![page_size as i64, ((page - 1) * page_size) as i64],
            |row| {
                Ok(StoredJob {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    company: row.get(2)?,
                    location: row.get(3)?,
                    time_posted: row.get(4)?,
                    description: row.get(5)?,
                    link: row.get(6)?,
                    scraped_date: row.get(7)?,
                    scraped_time: row.get(8)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(JobPage {
        total,
        page,
        page_size,
        jobs,
    })
}

// ── Stats ──

fn count(conn: &Connection, sql: &str) -> Result<usize> {
    let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
    Ok(n.max(0) as usize)
}

pub struct Stats {
    pub total: usize,
    pub companies: usize,
    pub unknown_titles: usize,
    pub last_scraped: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total = count(conn, "SELECT COUNT(*) FROM jobs")?;
    let companies = count(
        conn,
        "SELECT COUNT(DISTINCT company) FROM jobs WHERE company != 'Unknown'",
    )?;
    let unknown_titles = count(conn, "SELECT COUNT(*) FROM jobs WHERE title = 'Unknown'")?;
    let last_scraped: Option<String> = conn.query_row(
        "SELECT MAX(scraped_date || ' ' || scraped_time) FROM jobs",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        companies,
        unknown_titles,
        last_scraped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(title: &str, company: &str) -> JobRecord {
        let at = Local.with_ymd_and_hms(2026, 10, 19, 14, 5, 9).unwrap();
        JobRecord::stamp(
            ExtractedJob {
                title: title.to_string(),
                company: company.to_string(),
                location: "Remote".to_string(),
                time_posted: "19 October".to_string(),
                description: "About the job\nShip it".to_string(),
                link: "https://www.linkedin.com/jobs/view/1".to_string(),
            },
            at,
        )
    }

    #[test]
    fn stamp_keeps_fields_and_splits_timestamp() {
        let r = record("Rust Dev", "Acme");
        assert_eq!(r.title, "Rust Dev");
        assert_eq!(r.scraped_date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(r.scraped_time, NaiveTime::from_hms_opt(14, 5, 9).unwrap());
    }

    #[test]
    fn create_and_list_newest_first() {
        let conn = memory_db();
        for i in 0..3 {
            conn.create_job(&record(&format!("Job {}", i), "Acme")).unwrap();
        }
        let page = fetch_jobs(&conn, 1, 10).unwrap();
        assert_eq!(page.total, 3);
        let titles: Vec<&str> = page.jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Job 2", "Job 1", "Job 0"]);
        assert_eq!(page.jobs[0].scraped_date, "2026-10-19");
        assert_eq!(page.jobs[0].scraped_time, "14:05:09");
    }

    #[test]
    fn pagination_and_page_size_cap() {
        let conn = memory_db();
        for i in 0..60 {
            insert_job(&conn, &record(&format!("Job {}", i), "Acme")).unwrap();
        }
        let capped = fetch_jobs(&conn, 1, 500).unwrap();
        assert_eq!(capped.page_size, MAX_PAGE_SIZE);
        assert_eq!(capped.jobs.len(), 50);
        assert_eq!(capped.pages(), 2);

        let second = fetch_jobs(&conn, 2, DEFAULT_PAGE_SIZE).unwrap();
        assert_eq!(second.jobs.len(), 10);
        assert_eq!(second.jobs[0].title, "Job 49");

        let past_end = fetch_jobs(&conn, 99, DEFAULT_PAGE_SIZE).unwrap();
        assert!(past_end.jobs.is_empty());

        let zero = fetch_jobs(&conn, 0, 0).unwrap();
        assert_eq!((zero.page, zero.page_size), (1, 1));
    }

    #[test]
    fn stats_counts() {
        let conn = memory_db();
        let empty = get_stats(&conn).unwrap();
        assert_eq!(empty.total, 0);
        assert!(empty.last_scraped.is_none());

        insert_job(&conn, &record("A", "Acme")).unwrap();
        insert_job(&conn, &record("B", "Acme")).unwrap();
        insert_job(&conn, &record("Unknown", "Unknown")).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.companies, 1);
        assert_eq!(s.unknown_titles, 1);
        assert_eq!(s.last_scraped.as_deref(), Some("2026-10-19 14:05:09"));
    }
}
