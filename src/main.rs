mod browser;
mod config;
mod db;
mod error;
mod navigator;
mod pacer;
mod parser;
mod runner;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::runner::ScrapeOptions;

#[derive(Parser)]
#[command(name = "job_scraper", about = "LinkedIn job search scraper via headless Chrome")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape job postings from a search and save them
    Scrape {
        /// Stop after this many new jobs
        #[arg(short = 'n', long, default_value_t = config::DEFAULT_TARGET)]
        target: usize,
        /// Search keywords
        #[arg(short, long, default_value = config::DEFAULT_KEYWORDS)]
        keywords: String,
        /// Cookie file from a logged-in browser session
        #[arg(short, long, default_value = config::DEFAULT_COOKIES_PATH)]
        cookies: PathBuf,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Skip the feed visit before searching
        #[arg(long)]
        no_warm_up: bool,
    },
    /// List saved jobs, newest first
    List {
        #[arg(short, long, default_value = "1")]
        page: usize,
        /// Jobs per page (max 50)
        #[arg(short = 's', long, default_value_t = db::DEFAULT_PAGE_SIZE)]
        page_size: usize,
        /// Print descriptions and links too
        #[arg(long)]
        full: bool,
    },
    /// Show totals for saved jobs
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape {
            target,
            keywords,
            cookies,
            headed,
            no_warm_up,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;

            let mut opts = ScrapeOptions::new(target, &keywords, cookies);
            opts.headless = !headed;
            if no_warm_up {
                opts.warm_up_url = None;
            }

            println!("Scraping up to {} jobs for \"{}\"...", target, keywords.trim());
            let summary = runner::run_scrape(opts, &conn).await;
            println!("{}", serde_json::to_string(&summary)?);
            Ok(())
        }
        Commands::List {
            page,
            page_size,
            full,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let jobs = db::fetch_jobs(&conn, page, page_size)?;
            if jobs.jobs.is_empty() {
                println!("No jobs on page {}. Run 'scrape' first.", jobs.page);
                return Ok(());
            }

            println!(
                "{:>5} | {:<32} | {:<20} | {:<20} | {:<14} | {:<10}",
                "ID", "Title", "Company", "Location", "Posted", "Scraped"
            );
            println!("{}", "-".repeat(116));
            for j in &jobs.jobs {
                println!(
                    "{:>5} | {:<32} | {:<20} | {:<20} | {:<14} | {:<10}",
                    j.id,
                    truncate(&j.title, 32),
                    truncate(&j.company, 20),
                    truncate(&j.location, 20),
                    truncate(&j.time_posted, 14),
                    j.scraped_date,
                );
                if full {
                    println!("      {} (scraped {} {})", j.link, j.scraped_date, j.scraped_time);
                    for line in j.description.lines() {
                        println!("      {}", line);
                    }
                    println!();
                }
            }

            println!(
                "\nPage {}/{} | {} jobs total | {} per page",
                jobs.page,
                jobs.pages(),
                jobs.total,
                jobs.page_size
            );
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Jobs:           {}", s.total);
            println!("Companies:      {}", s.companies);
            println!("Unknown titles: {}", s.unknown_titles);
            println!("Last scraped:   {}", s.last_scraped.as_deref().unwrap_or("-"));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
