pub mod extract;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

pub use extract::{CssQuotes, Extractor, MicrodataQuotes};

/// One quote block scraped from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub author: Option<String>,
    pub text: Option<String>,
    pub tags: Vec<String>,
}

/// Which selector set the crawl uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    Css,
    Microdata,
}

/// Source of page bodies for the crawl loop.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn get(&self, url: &Url) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<String> {
        let body = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()?
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(body)
    }
}

/// Crawl result: all items in page order plus the number of pages fetched.
pub struct Crawl {
    pub items: Vec<QuoteItem>,
    pub pages: usize,
}

/// Fetch `start_url`, extract its quotes, and follow the next-page link until
/// there is none. A URL is never requested twice; `limit` caps the page count.
/// Only a failure on the start page is an error; a later failed page ends the
/// crawl with the items gathered so far.
pub async fn crawl<F, E>(
    fetcher: &F,
    extractor: &E,
    start_url: &str,
    limit: Option<usize>,
) -> Result<Crawl>
where
    F: Fetcher,
    E: Extractor,
{
    let mut next = Some(Url::parse(start_url).with_context(|| format!("Bad start URL {}", start_url))?);
    let mut seen: HashSet<Url> = HashSet::new();
    let mut items = Vec::new();
    let mut pages = 0usize;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}")?);

    info!("Spider {} starting at {}", extractor.name(), start_url);

    while let Some(url) = next.take() {
        if limit.is_some_and(|n| pages >= n) {
            info!("Page limit reached ({} pages)", pages);
            break;
        }
        if !seen.insert(url.clone()) {
            debug!("Already visited {}, stopping", url);
            break;
        }

        let body = match fetcher.get(&url).await {
            Ok(body) => body,
            Err(e) if pages > 0 => {
                warn!("Request for {} failed, stopping: {:#}", url, e);
                break;
            }
            Err(e) => return Err(e),
        };
        pages += 1;

        // Html is not Send; keep it out of the await points.
        let (found, href) = {
            let doc = Html::parse_document(&body);
            (extractor.items(&doc), extractor.next_page(&doc))
        };
        debug!("{}: {} quotes", url, found.len());
        items.extend(found);

        next = match href {
            Some(h) => Some(url.join(&h).with_context(|| format!("Bad next link {:?} on {}", h, url))?),
            None => None,
        };

        pb.set_message(format!("{} pages, {} quotes", pages, items.len()));
        pb.tick();
    }

    pb.finish_and_clear();
    info!("Crawled {} pages, {} quotes", pages, items.len());
    Ok(Crawl { items, pages })
}

/// Write items as a pretty-printed JSON array.
pub fn write_json(path: &str, items: &[QuoteItem]) -> Result<()> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let json = serde_json::to_string_pretty(items)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// Serves fixture pages from memory and records every request.
    struct FixtureFetcher {
        pages: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl FixtureFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            let pages = pages
                .iter()
                .map(|(url, file)| {
                    let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", file)).unwrap();
                    (url.to_string(), html)
                })
                .collect();
            Self {
                pages,
                requested: RefCell::new(Vec::new()),
            }
        }

        fn from_html(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, h)| (u.to_string(), h.to_string())).collect(),
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetcher for FixtureFetcher {
        async fn get(&self, url: &Url) -> Result<String> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 {}", url))
        }
    }

    const PAGE1: &str = "https://quotes.toscrape.com/page/1/";
    const PAGE2: &str = "https://quotes.toscrape.com/page/2/";

    #[tokio::test]
    async fn follows_next_until_absent() {
        let f = FixtureFetcher::new(&[(PAGE1, "quotes_page1"), (PAGE2, "quotes_page2")]);
        let c = crawl(&f, &CssQuotes, PAGE1, None).await.unwrap();
        assert_eq!(c.pages, 2);
        assert_eq!(c.items.len(), 5);
        assert_eq!(*f.requested.borrow(), vec![PAGE1, PAGE2]);
        assert_eq!(c.items[3].author.as_deref(), Some("André Gide"));
    }

    #[tokio::test]
    async fn microdata_spider_same_result() {
        let f = FixtureFetcher::new(&[(PAGE1, "quotes_page1"), (PAGE2, "quotes_page2")]);
        let css = crawl(&f, &CssQuotes, PAGE1, None).await.unwrap();
        let md = crawl(&f, &MicrodataQuotes, PAGE1, None).await.unwrap();
        assert_eq!(css.items, md.items);
    }

    #[tokio::test]
    async fn page_limit_stops_early() {
        let f = FixtureFetcher::new(&[(PAGE1, "quotes_page1"), (PAGE2, "quotes_page2")]);
        let c = crawl(&f, &CssQuotes, PAGE1, Some(1)).await.unwrap();
        assert_eq!(c.pages, 1);
        assert_eq!(c.items.len(), 3);
        assert_eq!(f.requested.borrow().len(), 1);
    }

    #[tokio::test]
    async fn visited_url_is_not_requested_again() {
        let looping = r#"<div class="quote"><span class="text">loop</span></div>
            <ul><li class="next"><a href="./">Next</a></li></ul>"#;
        let f = FixtureFetcher::from_html(&[("https://example.com/a/", looping)]);
        let c = crawl(&f, &CssQuotes, "https://example.com/a/", None).await.unwrap();
        assert_eq!(c.pages, 1);
        assert_eq!(f.requested.borrow().len(), 1);
    }

    #[tokio::test]
    async fn failed_follow_keeps_earlier_items() {
        let f = FixtureFetcher::new(&[(PAGE1, "quotes_page1")]);
        let c = crawl(&f, &CssQuotes, PAGE1, None).await.unwrap();
        assert_eq!(c.pages, 1);
        assert_eq!(c.items.len(), 3);
        assert_eq!(*f.requested.borrow(), vec![PAGE1, PAGE2]);
    }

    #[tokio::test]
    async fn failed_start_page_is_an_error() {
        let f = FixtureFetcher::from_html(&[]);
        assert!(crawl(&f, &CssQuotes, PAGE1, None).await.is_err());
    }

    #[tokio::test]
    async fn bad_start_url_is_an_error() {
        let f = FixtureFetcher::from_html(&[]);
        assert!(crawl(&f, &CssQuotes, "not a url", None).await.is_err());
    }

    #[test]
    fn output_file_loads_into_importer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/quotes.json");
        let path = path.to_str().unwrap();
        let items = vec![QuoteItem {
            author: Some("Steve Martin".into()),
            text: Some("“A day without sunshine is like, you know, night.”".into()),
            tags: vec!["humor".into()],
        }];
        write_json(path, &items).unwrap();

        let records = crate::db::load_records(path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].author, items[0].author);
        assert_eq!(records[0].text, items[0].text);
        assert_eq!(records[0].tags, items[0].tags);
    }
}
