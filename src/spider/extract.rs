use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::QuoteItem;

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static CSS_QUOTE: LazyLock<Selector> = LazyLock::new(|| sel("div.quote"));
static CSS_AUTHOR: LazyLock<Selector> = LazyLock::new(|| sel("span small"));
static CSS_TEXT: LazyLock<Selector> = LazyLock::new(|| sel("span.text"));
static CSS_TAG: LazyLock<Selector> = LazyLock::new(|| sel("div.tags a.tag"));
static CSS_NEXT: LazyLock<Selector> = LazyLock::new(|| sel("li.next a[href]"));

static MD_QUOTE: LazyLock<Selector> = LazyLock::new(|| sel("div[itemscope]"));
static MD_AUTHOR: LazyLock<Selector> = LazyLock::new(|| sel("small"));
static MD_ANCHOR: LazyLock<Selector> = LazyLock::new(|| sel("a"));
static MD_NEXT: LazyLock<Selector> = LazyLock::new(|| sel(r#"li[class="next"] > a[href]"#));

/// Selector set for one quotes spider.
pub trait Extractor {
    fn name(&self) -> &'static str;

    /// Quote blocks on the page, in document order.
    fn items(&self, doc: &Html) -> Vec<QuoteItem>;

    /// Raw `href` of the next-page link, if any.
    fn next_page(&self, doc: &Html) -> Option<String>;
}

/// Class-based selectors (`div.quote`, `span.text`, `li.next a`).
pub struct CssQuotes;

impl Extractor for CssQuotes {
    fn name(&self) -> &'static str {
        "toscrape-css"
    }

    fn items(&self, doc: &Html) -> Vec<QuoteItem> {
        doc.select(&CSS_QUOTE)
            .map(|quote| QuoteItem {
                author: first_text(quote, &CSS_AUTHOR),
                text: first_text(quote, &CSS_TEXT),
                tags: quote.select(&CSS_TAG).flat_map(own_texts).collect(),
            })
            .collect()
    }

    fn next_page(&self, doc: &Html) -> Option<String> {
        href(doc, &CSS_NEXT)
    }
}

/// Structure-based selectors keyed on schema.org microdata (`itemscope`, `itemprop`).
pub struct MicrodataQuotes;

impl Extractor for MicrodataQuotes {
    fn name(&self) -> &'static str {
        "toscrape-microdata"
    }

    fn items(&self, doc: &Html) -> Vec<QuoteItem> {
        doc.select(&MD_QUOTE)
            .map(|quote| QuoteItem {
                author: first_text(quote, &MD_AUTHOR),
                text: child_elements(quote, "span")
                    .filter(|s| s.value().attr("itemprop") == Some("text"))
                    .flat_map(own_texts)
                    .next(),
                tags: child_elements(quote, "div")
                    .flat_map(|div| div.select(&MD_ANCHOR).flat_map(own_texts).collect::<Vec<_>>())
                    .collect(),
            })
            .collect()
    }

    fn next_page(&self, doc: &Html) -> Option<String> {
        href(doc, &MD_NEXT)
    }
}

/// Direct text children of `el`; text inside nested elements is not included.
fn own_texts(el: ElementRef) -> impl Iterator<Item = String> + '_ {
    el.children()
        .filter_map(|n| n.value().as_text())
        .map(|t| String::from(&**t))
}

/// First direct text node among the matches, `None` when every match is empty.
fn first_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    scope.select(selector).flat_map(own_texts).next()
}

fn href(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .find_map(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn child_elements<'a>(
    el: ElementRef<'a>,
    name: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(move |c| c.value().name() == name)
}
