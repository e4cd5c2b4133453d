use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::parser::thread::{Post, ThreadResult};
use crate::summarizer::Summary;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS threads (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            thread_id  TEXT,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_threads_visited ON threads(visited);

        CREATE TABLE IF NOT EXISTS thread_pages (
            id            INTEGER PRIMARY KEY,
            thread_row    INTEGER NOT NULL REFERENCES threads(id),
            url           TEXT NOT NULL,
            markdown      TEXT,
            status        INTEGER,
            error         TEXT,
            latency_ms    INTEGER,
            extract_error TEXT,
            scraped_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_thread_pages_url ON thread_pages(url);

        CREATE TABLE IF NOT EXISTS posts (
            id             INTEGER PRIMARY KEY,
            page_id        INTEGER NOT NULL REFERENCES thread_pages(id),
            position       INTEGER NOT NULL,
            text           TEXT NOT NULL,
            author         TEXT NOT NULL,
            sequence_label TEXT NOT NULL,
            UNIQUE(page_id, position)
        );

        CREATE TABLE IF NOT EXISTS summaries (
            id            INTEGER PRIMARY KEY,
            page_id       INTEGER NOT NULL REFERENCES thread_pages(id),
            provider      TEXT NOT NULL,
            bullet_points TEXT NOT NULL,
            raw_summary   TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_summaries_page ON summaries(page_id);
        ",
    )?;
    Ok(())
}

// ── Queue ──

/// Queue `(url, thread_id)` pairs; already-known URLs are ignored.
pub fn insert_urls(conn: &Connection, urls: &[(String, Option<String>)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO threads (url, thread_id) VALUES (?1, ?2)")?;
        for (url, thread_id) in urls {
            count += stmt.execute(rusqlite::params![url, thread_id])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let sql = format!(
        "SELECT id, url FROM threads WHERE visited = 0 ORDER BY id{}",
        limit_clause(limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Scraping ──

pub struct ScrapeRow {
    pub thread_row: i64,
    pub url: String,
    pub markdown: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Store one scrape attempt and mark its thread visited. Returns the page id.
pub fn save_scrape(conn: &Connection, row: &ScrapeRow) -> Result<i64> {
    conn.prepare_cached(
        "INSERT INTO thread_pages (thread_row, url, markdown, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?
    .execute(rusqlite::params![
        row.thread_row, row.url, row.markdown, row.status, row.error, row.latency_ms,
    ])?;
    let page_id = conn.last_insert_rowid();
    conn.prepare_cached("UPDATE threads SET visited = 1, visited_at = datetime('now') WHERE id = ?1")?
        .execute(rusqlite::params![row.thread_row])?;
    Ok(page_id)
}

// ── Processing ──

pub struct ScrapedThread {
    pub page_id: i64,
    pub url: String,
    pub markdown: String,
}

/// Pages with markdown that have neither posts nor a recorded extraction failure.
pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<ScrapedThread>> {
    let sql = format!(
        "SELECT tp.id, tp.url, tp.markdown
         FROM thread_pages tp
         WHERE tp.markdown IS NOT NULL
           AND tp.extract_error IS NULL
           AND NOT EXISTS (SELECT 1 FROM posts p WHERE p.page_id = tp.id)
         ORDER BY tp.id{}",
        limit_clause(limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ScrapedThread {
                page_id: row.get(0)?,
                url: row.get(1)?,
                markdown: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace the stored posts of a page. Returns the number written.
pub fn save_thread(conn: &Connection, page_id: i64, thread: &ThreadResult) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute("DELETE FROM posts WHERE page_id = ?1", [page_id])?;
        let mut stmt = tx.prepare(
            "INSERT INTO posts (page_id, position, text, author, sequence_label)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, p) in thread.posts().iter().enumerate() {
            count += stmt.execute(rusqlite::params![
                page_id, position as i64, p.text, p.author, p.sequence_label,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn save_extract_failure(conn: &Connection, page_id: i64, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE thread_pages SET extract_error = ?1 WHERE id = ?2",
        rusqlite::params![error, page_id],
    )?;
    Ok(())
}

pub struct StoredThread {
    pub page_id: i64,
    pub thread: ThreadResult,
}

/// Posts of the most recent processed page for `url`.
pub fn fetch_thread(conn: &Connection, url: &str) -> Result<Option<StoredThread>> {
    let found: Option<(i64, Option<String>)> = conn
        .query_row(
            "SELECT tp.id, t.thread_id
             FROM thread_pages tp
             JOIN threads t ON t.id = tp.thread_row
             WHERE tp.url = ?1
               AND EXISTS (SELECT 1 FROM posts p WHERE p.page_id = tp.id)
             ORDER BY tp.id DESC
             LIMIT 1",
            [url],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((page_id, thread_id)) = found else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT text, author, sequence_label FROM posts WHERE page_id = ?1 ORDER BY position",
    )?;
    let posts = stmt
        .query_map([page_id], |row| {
            Ok(Post {
                text: row.get(0)?,
                author: row.get(1)?,
                sequence_label: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(StoredThread {
        page_id,
        thread: ThreadResult::new(thread_id, posts),
    }))
}

// ── Summaries ──

pub fn save_summary(conn: &Connection, page_id: i64, summary: &Summary) -> Result<i64> {
    let bullets = serde_json::to_string(&summary.bullet_points)?;
    conn.execute(
        "INSERT INTO summaries (page_id, provider, bullet_points, raw_summary)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![page_id, summary.provider, bullets, summary.raw_summary],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub scraped: usize,
    pub errors: usize,
    pub processed: usize,
    pub failed_extractions: usize,
    pub posts: usize,
    pub summaries: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

    let total = count("SELECT COUNT(*) FROM threads")?;
    let visited = count("SELECT COUNT(*) FROM threads WHERE visited = 1")?;
    Ok(Stats {
        total,
        visited,
        unvisited: total - visited,
        scraped: count("SELECT COUNT(*) FROM thread_pages")?,
        errors: count("SELECT COUNT(*) FROM thread_pages WHERE error IS NOT NULL")?,
        processed: count("SELECT COUNT(DISTINCT page_id) FROM posts")?,
        failed_extractions: count("SELECT COUNT(*) FROM thread_pages WHERE extract_error IS NOT NULL")?,
        posts: count("SELECT COUNT(*) FROM posts")?,
        summaries: count("SELECT COUNT(*) FROM summaries")?,
    })
}

fn limit_clause(limit: Option<usize>) -> String {
    match limit {
        Some(n) => format!(" LIMIT {}", n),
        None => String::new(),
    }
}

// ── Tests ──
