mod db;
mod error;
mod parser;
mod scraper;
mod settings;
mod summarizer;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use parser::events::{NoopObserver, Observer, TracingObserver};
use parser::thread::ThreadResult;
use settings::Settings;
use summarizer::{Summarizer, Summary};

#[derive(Parser)]
#[command(name = "thread_digest", about = "Reconstruct and summarize X/Twitter threads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue thread URLs for scraping
    Add {
        /// Status URLs on twitter.com or x.com
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Scrape queued threads via spider.cloud
    Scrape {
        /// Max threads to scrape (default: all queued)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Reconstruct posts from scraped pages
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape, reconstruct and summarize one thread
    Run {
        url: String,
        /// Skip the LLM summary
        #[arg(long)]
        no_summary: bool,
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },
    /// Reconstruct posts from a local markdown dump
    Parse {
        file: PathBuf,
        /// Source URL, used for the thread id
        #[arg(long, default_value = "")]
        url: String,
        #[arg(long)]
        json: bool,
        /// Suppress engine diagnostics
        #[arg(short, long)]
        quiet: bool,
    },
    /// Summarize a stored thread
    Summarize { url: String },
    /// Show pipeline statistics
    Stats,
    /// List configured summary providers
    Providers,
}

#[derive(Serialize)]
struct Report<'a> {
    url: &'a str,
    generated_at: DateTime<Utc>,
    thread: &'a ThreadResult,
    summary: Option<&'a Summary>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Add { urls } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let mut valid = Vec::new();
            for url in urls {
                match scraper::extract_thread_id(&url) {
                    Some(id) => valid.push((url.trim().to_string(), Some(id))),
                    None => warn!("Skipping invalid thread URL: {}", url),
                }
            }
            let inserted = db::insert_urls(&conn, &valid)?;
            println!("Queued {} new thread URLs ({} valid).", inserted, valid.len());
            Ok(())
        }
        Commands::Scrape { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No queued threads. Run 'add' first or all threads are scraped.");
                return Ok(());
            }
            println!("Scraping {} threads (streaming to DB)...", pages.len());
            let stats = scraper::scrape_pages_streaming(&conn, pages, &settings).await?;
            println!(
                "Done: {} scraped ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unprocessed(&conn, limit)?;
            if pages.is_empty() {
                println!("No unprocessed pages. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Run { url, no_summary, json } => {
            if !scraper::validate_thread_url(&url) {
                anyhow::bail!("Not a thread URL: {}", url);
            }
            let t_scrape = Instant::now();
            let markdown = scraper::scrape_single_page(&url, &settings).await?;
            if !json {
                println!("Scraped in {:.1}s", t_scrape.elapsed().as_secs_f64());
            }
            let thread = parser::process_document(&markdown, &url, &mut TracingObserver)?;

            let summary = if no_summary {
                None
            } else {
                let summarizer = Summarizer::from_settings(&settings)?;
                Some(summarizer.summarize(&thread).await?)
            };
            emit(&url, &thread, summary.as_ref(), json)
        }
        Commands::Parse { file, url, json, quiet } => {
            let markdown = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut observer: Box<dyn Observer> = if quiet {
                Box::new(NoopObserver)
            } else {
                Box::new(TracingObserver)
            };
            let thread = parser::process_document(&markdown, &url, observer.as_mut())?;
            emit(&url, &thread, None, json)
        }
        Commands::Summarize { url } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let stored = db::fetch_thread(&conn, &url)?
                .with_context(|| format!("No processed thread stored for {}", url))?;
            let summarizer = Summarizer::from_settings(&settings)?;
            let summary = summarizer.summarize(&stored.thread).await?;
            db::save_summary(&conn, stored.page_id, &summary)?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Queued:     {}", s.total);
            println!("Visited:    {}", s.visited);
            println!("Unvisited:  {}", s.unvisited);
            println!("Scraped:    {}", s.scraped);
            println!("Errors:     {}", s.errors);
            println!("Processed:  {}", s.processed);
            println!("Failed:     {}", s.failed_extractions);
            println!("Posts:      {}", s.posts);
            println!("Summaries:  {}", s.summaries);
            Ok(())
        }
        Commands::Providers => {
            for (i, (name, model, available)) in summarizer::provider_status(&settings).iter().enumerate() {
                let state = if *available { "ready" } else { "no API key" };
                println!("{}. {:<8} {:<16} {}", i + 1, name, model, state);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn emit(url: &str, thread: &ThreadResult, summary: Option<&Summary>, json: bool) -> anyhow::Result<()> {
    if json {
        let report = Report {
            url,
            generated_at: Utc::now(),
            thread,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Thread by @{} ({} posts{})",
        thread.author(),
        thread.total_count(),
        thread
            .thread_id
            .as_deref()
            .map(|id| format!(", id {}", id))
            .unwrap_or_default()
    );
    println!("{}", "-".repeat(60));
    for (i, post) in thread.posts().iter().enumerate() {
        let label = if post.sequence_label.is_empty() {
            format!("#{}", i + 1)
        } else {
            post.sequence_label.clone()
        };
        println!("{:>16} | {}", truncate(&label, 16), truncate(&post.text, 100));
    }
    if let Some(summary) = summary {
        println!();
        print_summary(summary);
    }
    Ok(())
}

fn print_summary(summary: &Summary) {
    println!(
        "Summary of @{} ({} posts, via {}):",
        summary.author, summary.post_count, summary.provider
    );
    for point in &summary.bullet_points {
        println!("  • {}", point);
    }
}

struct ProcessCounts {
    threads: usize,
    posts: usize,
    failed: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} threads, {} posts ({} pages failed).",
            self.threads, self.posts, self.failed,
        );
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    pages: &[db::ScrapedThread],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        threads: 0,
        posts: 0,
        failed: 0,
    };

    for chunk in pages.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|page| (page.page_id, parser::process_page(page)))
            .collect();

        for (page_id, result) in results {
            match result {
                Ok(thread) => {
                    counts.posts += db::save_thread(conn, page_id, &thread)?;
                    counts.threads += 1;
                }
                Err(e) => {
                    warn!("Page {} yielded no thread: {}", page_id, e);
                    db::save_extract_failure(conn, page_id, &e.to_string())?;
                    counts.failed += 1;
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
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
