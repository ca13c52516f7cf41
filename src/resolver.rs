//! Title → article URL resolution via web search.
//!
//! A single lookup is issued per title and only the first hit is used. Any
//! failure (transport, status, parse) is logged and collapsed into
//! [`Resolution::NotFound`]. There are no retries.
//!
//! # Backends
//!
//! | Engine | Endpoint | Parsing |
//! |--------|----------|---------|
//! | DuckDuckGo | `html.duckduckgo.com/html/` | `a.result__a` via `scraper`, unwrapping `/l/?uddg=` redirects |
//! | Bing | `www.bing.com/search?format=rss` | RSS `<item><link>` via `quick-xml` |

use rand::{Rng, rng};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{SearchEngine, SearchSettings};
use crate::models::Resolution;

/// Maps a title to a candidate article URL.
pub trait Resolver {
    /// Never fails: lookup errors come back as [`Resolution::NotFound`].
    async fn resolve(&self, title: &str) -> Resolution;
}

/// Resolver backed by a public web search engine.
#[derive(Debug, Clone)]
pub struct WebSearchResolver {
    client: Client,
    engine: SearchEngine,
    endpoint: String,
    pause: Duration,
}

impl WebSearchResolver {
    /// Build a resolver for the configured engine and endpoint.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client; its timeout bounds each lookup
    /// * `settings` - Engine choice, endpoint override and polite pause
    pub fn new(client: Client, settings: &SearchSettings) -> Self {
        Self {
            client,
            engine: settings.engine,
            endpoint: settings.endpoint().to_string(),
            pause: Duration::from_millis(settings.pause_ms),
        }
    }

    /// Sleep before hitting the search engine so runs stay polite.
    async fn polite_pause(&self) {
        if self.pause.is_zero() {
            return;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        sleep(self.pause + Duration::from_millis(jitter_ms)).await;
    }

    async fn first_hit(&self, title: &str) -> Result<Option<Url>, Box<dyn Error>> {
        match self.engine {
            SearchEngine::DuckDuckGo => {
                let url = format!("{}?q={}", self.endpoint, urlencoding::encode(title));
                let body = self.fetch(&url).await?;
                Ok(first_duckduckgo_result(&body))
            }
            SearchEngine::Bing => {
                let url = format!(
                    "{}?format=rss&count=1&q={}",
                    self.endpoint,
                    urlencoding::encode(title)
                );
                let body = self.fetch(&url).await?;
                first_bing_rss_result(&body)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("search returned HTTP {status}").into());
        }
        Ok(resp.text().await?)
    }
}

impl Resolver for WebSearchResolver {
    #[instrument(level = "info", skip_all, fields(engine = ?self.engine))]
    async fn resolve(&self, title: &str) -> Resolution {
        self.polite_pause().await;
        match self.first_hit(title).await {
            Ok(Some(url)) => {
                info!(%url, "Found URL");
                Resolution::Found(url)
            }
            Ok(None) => {
                info!(%title, "Search returned no results");
                Resolution::NotFound
            }
            Err(e) => {
                warn!(%title, error = %e, "Search error");
                Resolution::NotFound
            }
        }
    }
}

/// First organic result on a DuckDuckGo HTML results page.
pub fn first_duckduckgo_result(html: &str) -> Option<Url> {
    let document = Html::parse_document(html);
    let result_selector = Selector::parse("a.result__a[href]").ok()?;
    let base = Url::parse("https://duckduckgo.com").ok()?;

    document
        .select(&result_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .find_map(unwrap_duckduckgo_redirect)
}

/// `//duckduckgo.com/l/?uddg=<target>` → `<target>`; direct links pass through.
///
/// Other DuckDuckGo-hosted links (sponsored `y.js` results) yield `None`.
fn unwrap_duckduckgo_redirect(url: Url) -> Option<Url> {
    if url.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        let target = url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?;
        debug!(%target, "Unwrapped DuckDuckGo redirect");
        return Url::parse(&target).ok();
    }
    Some(url)
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    link: Option<String>,
}

/// First `<item><link>` in a Bing RSS results feed.
pub fn first_bing_rss_result(xml: &str) -> Result<Option<Url>, Box<dyn Error>> {
    let rss: Rss = quick_xml::de::from_str(xml)?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| item.link)
        .find_map(|link| Url::parse(link.trim()).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDG_PAGE: &str = r#"
        <html><body>
          <div class="result results_links">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.example.com%2Fnews%2Fstory%3Fid%3D7&amp;rut=abc">Story</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://second.example.org/other">Other</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_duckduckgo_unwraps_redirect() {
        let url = first_duckduckgo_result(DDG_PAGE).unwrap();
        assert_eq!(url.as_str(), "https://www.example.com/news/story?id=7");
    }

    #[test]
    fn test_duckduckgo_skips_ads() {
        let page = r#"
            <a class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x">Ad</a>
            <a class="result__a" href="https://real.example.com/a">Real</a>
        "#;
        let url = first_duckduckgo_result(page).unwrap();
        assert_eq!(url.host_str(), Some("real.example.com"));
    }

    #[test]
    fn test_duckduckgo_no_results() {
        assert!(first_duckduckgo_result("<html><body>No results.</body></html>").is_none());
    }

    #[test]
    fn test_bing_rss_first_link() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
            <rss version="2.0"><channel>
              <title>Bing: headline</title>
              <link>https://www.bing.com/search?q=headline</link>
              <item>
                <title>Headline</title>
                <link>https://news.example.com/2024/01/headline?a=1&amp;b=2</link>
                <description>desc</description>
              </item>
              <item><title>Two</title><link>https://two.example.com/</link></item>
            </channel></rss>"#;
        let url = first_bing_rss_result(xml).unwrap().unwrap();
        assert_eq!(url.as_str(), "https://news.example.com/2024/01/headline?a=1&b=2");
    }

    #[test]
    fn test_bing_rss_without_items() {
        let xml = r#"<rss version="2.0"><channel><title>Bing</title></channel></rss>"#;
        assert!(first_bing_rss_result(xml).unwrap().is_none());
    }

    #[test]
    fn test_bing_rss_malformed() {
        assert!(first_bing_rss_result("<html>not rss").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_search_is_not_found() {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        for engine in [SearchEngine::DuckDuckGo, SearchEngine::Bing] {
            let settings = SearchSettings {
                engine,
                pause_ms: 0,
                endpoint: Some("http://127.0.0.1:9/search".into()),
            };
            let resolver = WebSearchResolver::new(client.clone(), &settings);
            assert_eq!(resolver.resolve("Any headline").await, Resolution::NotFound);
        }
    }
}
