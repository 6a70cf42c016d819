mod config;
mod db;
mod spider;
mod vision;

use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use config::Settings;
use spider::{CssQuotes, HttpFetcher, MicrodataQuotes, Strategy};
use vision::Detect;

#[derive(Parser)]
#[command(
    name = "vision_quotes",
    about = "Cloud Vision sample reports and a quotes.toscrape.com crawler/importer"
)]
struct Cli {
    /// SQLite database path (overrides VQ_DB_PATH)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate an image and print the detection report (default: every detection in turn)
    Vision {
        #[arg(value_enum)]
        detect: Option<Detect>,
        /// Image URI (gs:// or https://) instead of the sample image
        #[arg(long)]
        uri: Option<String>,
        /// Minimum landmark score to print
        #[arg(long, default_value = "0.5")]
        min_score: f32,
    },
    /// Crawl quote pages, following "next" links, and write a JSON array
    Crawl {
        /// Selector set to use
        #[arg(short, long, value_enum, default_value_t = Strategy::Css)]
        strategy: Strategy,
        /// Output file (overrides VQ_JSON_PATH)
        #[arg(short, long)]
        out: Option<String>,
        /// First page to fetch (overrides VQ_START_URL)
        #[arg(long)]
        start_url: Option<String>,
        /// Max pages to fetch (default: until no next link)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Import a crawl JSON file into the quotes/tags tables
    Import {
        /// Input file (overrides VQ_JSON_PATH)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Show row counts
    Stats,
    /// List imported quotes
    List {
        /// Filter by exact author name
        #[arg(short, long)]
        author: Option<String>,
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
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
    let settings = Settings::load()?;
    let db_path = cli.db.unwrap_or_else(|| settings.db_path.clone());

    let result = match cli.command {
        Commands::Vision {
            detect,
            uri,
            min_score,
        } => {
            let client = vision::Client::from_settings(&settings)?;
            let targets = match detect {
                Some(d) => vec![d],
                None => Detect::EVERY.to_vec(),
            };
            for d in targets {
                let report = vision::run(&client, d, uri.as_deref(), min_score)
                    .await
                    .with_context(|| format!("{:?} detection failed", d))?;
                print!("{}", report);
            }
            Ok(())
        }
        Commands::Crawl {
            strategy,
            out,
            start_url,
            limit,
        } => {
            let out = out.unwrap_or_else(|| settings.json_path.clone());
            let start = start_url.unwrap_or_else(|| settings.start_url.clone());
            let fetcher = HttpFetcher::new(&settings.user_agent)?;
            let crawl = match strategy {
                Strategy::Css => spider::crawl(&fetcher, &CssQuotes, &start, limit).await?,
                Strategy::Microdata => {
                    spider::crawl(&fetcher, &MicrodataQuotes, &start, limit).await?
                }
            };
            spider::write_json(&out, &crawl.items)?;
            println!(
                "Wrote {} quotes from {} pages to {}",
                crawl.items.len(),
                crawl.pages,
                out
            );
            Ok(())
        }
        Commands::Import { input } => {
            let input = input.unwrap_or_else(|| settings.json_path.clone());
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let records = db::load_records(&input)?;
            if records.is_empty() {
                println!("No quotes in {}.", input);
                return Ok(());
            }
            info!("Importing {} records from {}", records.len(), input);
            let counts = db::import_quotes(&conn, &records)?;
            println!("Imported {} quotes, {} tags into {}.", counts.quotes, counts.tags, db_path);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Quotes:  {}", s.quotes);
            println!("Authors: {}", s.authors);
            println!("Tags:    {} ({} distinct)", s.tags, s.distinct_tags);
            Ok(())
        }
        Commands::List { author, tag, limit } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_quotes(&conn, author.as_deref(), tag.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No quotes found. Run 'import' first.");
                return Ok(());
            }

            println!("{:>4} | {:<22} | {:<60} | {}", "#", "Author", "Quote", "Tags");
            println!("{}", "-".repeat(110));
            for r in &rows {
                println!(
                    "{:>4} | {:<22} | {:<60} | {}",
                    r.id,
                    truncate(&r.author, 22),
                    truncate(&r.quote, 57),
                    r.tags
                );
            }
            println!("\n{} quotes", rows.len());
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_long_and_short() {
        assert_eq!(truncate("Albert Einstein", 22), "Albert Einstein");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(std::time::Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["vision_quotes", "crawl", "-s", "microdata", "-n", "3"]).unwrap();
        match cli.command {
            Commands::Crawl { strategy, limit, .. } => {
                assert_eq!(strategy, Strategy::Microdata);
                assert_eq!(limit, Some(3));
            }
            _ => panic!("expected crawl"),
        }

        let cli = Cli::try_parse_from(["vision_quotes", "vision", "landmarks", "--min-score", "0.2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Vision { detect: Some(Detect::Landmarks), .. }
        ));

        let cli = Cli::try_parse_from(["vision_quotes", "stats", "--db", "/tmp/x.sqlite"]).unwrap();
        assert_eq!(cli.db.as_deref(), Some("/tmp/x.sqlite"));
    }
}
