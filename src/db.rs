use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS quotes (
            id     INTEGER PRIMARY KEY ASC,
            quote  TEXT,
            author TEXT
        );

        CREATE TABLE IF NOT EXISTS tags (
            tag      TEXT,
            quote_id INTEGER,
            FOREIGN KEY(quote_id) REFERENCES quotes(id)
        );
        ",
    )?;
    Ok(())
}

// ── Import ──

/// One scraped quote as stored in the crawl output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub text: Option<String>,
    pub author: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

fn null_as_empty<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(de)?.unwrap_or_default())
}

pub fn load_records(path: &str) -> Result<Vec<QuoteRecord>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let records: Vec<QuoteRecord> =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path))?;
    Ok(records)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub quotes: usize,
    pub tags: usize,
}

/// Insert each record as one `quotes` row followed by its `tags` rows.
/// Runs in a single transaction.
pub fn import_quotes(conn: &Connection, records: &[QuoteRecord]) -> Result<ImportCounts> {
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let tx = conn.unchecked_transaction()?;
    let mut counts = ImportCounts::default();
    {
        let mut q_stmt = tx.prepare("INSERT INTO quotes (quote, author) VALUES (?1, ?2)")?;
        let mut t_stmt = tx.prepare("INSERT INTO tags (tag, quote_id) VALUES (?1, ?2)")?;
        for r in records {
            let quote_id = q_stmt.insert(rusqlite::params![r.text, r.author])?;
            counts.quotes += 1;
            for tag in &r.tags {
                t_stmt.execute(rusqlite::params![tag, quote_id])?;
                counts.tags += 1;
            }
            pb.inc(1);
        }
    }
    tx.commit()?;

    pb.finish_and_clear();
    info!("Imported {} quotes, {} tags", counts.quotes, counts.tags);
    Ok(counts)
}

// ── Listing ──

pub struct QuoteRow {
    pub id: i64,
    pub quote: String,
    pub author: String,
    pub tags: String,
}

pub fn fetch_quotes(
    conn: &Connection,
    author: Option<&str>,
    tag: Option<&str>,
    limit: usize,
) -> Result<Vec<QuoteRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(a) = author {
        conditions.push(format!("q.author = ?{}", params.len() + 1));
        params.push(Box::new(a.to_string()));
    }
    if let Some(t) = tag {
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM tags ft WHERE ft.quote_id = q.id AND ft.tag = ?{})",
            params.len() + 1
        ));
        params.push(Box::new(t.to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT q.id, COALESCE(q.quote,''), COALESCE(q.author,''),
                COALESCE((SELECT GROUP_CONCAT(t.tag, ', ') FROM tags t WHERE t.quote_id = q.id), '')
         FROM quotes q{}
         ORDER BY q.id
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(QuoteRow {
                id: row.get(0)?,
                quote: row.get(1)?,
                author: row.get(2)?,
                tags: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub quotes: usize,
    pub tags: usize,
    pub authors: usize,
    pub distinct_tags: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let quotes: usize = conn.query_row("SELECT COUNT(*) FROM quotes", [], |r| r.get(0))?;
    let tags: usize = conn.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))?;
    let authors: usize =
        conn.query_row("SELECT COUNT(DISTINCT author) FROM quotes", [], |r| r.get(0))?;
    let distinct_tags: usize =
        conn.query_row("SELECT COUNT(DISTINCT tag) FROM tags", [], |r| r.get(0))?;
    Ok(Stats {
        quotes,
        tags,
        authors,
        distinct_tags,
    })
}

// ── Tests ──
