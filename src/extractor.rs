//! Article URL → plain body text.
//!
//! The page is fetched once and parsed with `scraper`. Body text is taken
//! from the paragraphs of the first container that has any, tried in this
//! order:
//!
//! 1. `article p`
//! 2. `[itemprop=articleBody] p`
//! 3. `main p`
//! 4. `p`
//!
//! Any failure (network error, non-success status, non-HTML document)
//! collapses to [`Extraction::NotExtractable`]. A page that parses but has no
//! paragraph text is returned as empty [`Extraction::Text`].

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{info, instrument, warn};
use url::Url;

use crate::models::Extraction;

const PARAGRAPH_SELECTORS: [&str; 4] = ["article p", "[itemprop=articleBody] p", "main p", "p"];

/// Maps a URL to plain article text.
pub trait Extractor {
    /// Never fails: fetch and parse errors come back as [`Extraction::NotExtractable`].
    async fn extract(&self, url: &Url) -> Extraction;
}

/// Extractor that downloads HTML and keeps paragraph text.
#[derive(Debug, Clone)]
pub struct HtmlArticleExtractor {
    client: Client,
}

impl HtmlArticleExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &Url) -> Result<String, Box<dyn Error>> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}").into());
        }
        if let Some(content_type) = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_html(content_type) {
                return Err(format!("unsupported document type {content_type}").into());
            }
        }
        Ok(resp.text().await?)
    }
}

impl Extractor for HtmlArticleExtractor {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn extract(&self, url: &Url) -> Extraction {
        match self.download(url).await {
            Ok(html) => {
                let text = article_text(&html);
                info!(bytes = text.len(), "Parsed article");
                Extraction::Text(text)
            }
            Err(e) => {
                warn!(error = %e, "Error extracting article text");
                Extraction::NotExtractable
            }
        }
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Paragraph text of the main article body, paragraphs separated by blank lines.
pub fn article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for css in PARAGRAPH_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(|p| normalize_whitespace(&p.text().collect::<String>()))
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n\n");
        }
    }
    String::new()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
