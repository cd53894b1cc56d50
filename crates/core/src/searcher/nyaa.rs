//! Nyaa listing scraper.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::config::IndexConfig;

use super::{IndexSearcher, RawRow, SearchError};

/// Searches a Nyaa-style index by scraping its HTML listing.
pub struct NyaaScraper {
    client: Client,
    config: IndexConfig,
}

impl NyaaScraper {
    pub fn new(config: IndexConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl IndexSearcher for NyaaScraper {
    fn name(&self) -> &str {
        "nyaa"
    }

    async fn search(&self, query: &str) -> Result<Vec<RawRow>, SearchError> {
        debug!(query = %query, "Searching nyaa");

        let response = self
            .client
            .get(&self.config.url)
            .query(&[
                ("f", self.config.filter.as_str()),
                ("c", self.config.category.as_str()),
                ("q", query),
                ("p", "1"),
            ])
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let html = response.text().await.map_err(SearchError::from_reqwest)?;
        let rows = parse_listing(&html)?;

        debug!(query = %query, rows = rows.len(), "Nyaa search complete");
        Ok(rows)
    }
}

fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::ParseError(e.to_string()))
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Extract rows from a listing page.
///
/// A page without the listing table is an empty result, not an error. Rows
/// missing a title or magnet link come back with empty fields and are
/// dropped later by the normalizer.
pub fn parse_listing(html: &str) -> Result<Vec<RawRow>, SearchError> {
    let document = Html::parse_document(html);
    let row_selector = selector("table.torrent-list tbody tr")?;
    let cell_selector = selector("td")?;
    let link_selector = selector("a")?;
    let magnet_selector = selector(r#"a[href^="magnet:"]"#)?;

    let mut rows = Vec::new();

    for tr in document.select(&row_selector) {
        let cells: Vec<ElementRef<'_>> = tr.select(&cell_selector).collect();
        if cells.len() < 6 {
            continue;
        }

        // The name cell may start with a comments link; the title is the last
        // plain link.
        let title = cells[1]
            .select(&link_selector)
            .filter(|a| !a.value().classes().any(|c| c == "comments"))
            .last()
            .map(|a| {
                a.value()
                    .attr("title")
                    .map(str::to_string)
                    .unwrap_or_else(|| cell_text(&a))
            })
            .unwrap_or_default();

        let magnet_uri = cells[2]
            .select(&magnet_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        rows.push(RawRow {
            title: title.trim().to_string(),
            magnet_uri,
            size_text: Some(cell_text(&cells[3])),
            seeders_text: Some(cell_text(&cells[5])),
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
<table class="table torrent-list">
  <thead><tr><th>Category</th><th>Name</th><th>Link</th><th>Size</th><th>Date</th><th>S</th><th>L</th><th>C</th></tr></thead>
  <tbody>
    <tr class="default">
      <td><a href="/?c=1_2" title="Anime - English-translated"><img src="/c.png"></a></td>
      <td colspan="2">
        <a href="/view/1#comments" class="comments" title="3 comments">3</a>
        <a href="/view/1" title="[SubsPlease] Show - 01 (1080p) [AAAA].mkv">[SubsPlease] Show - 01 (1080p) [AAAA].mkv</a>
      </td>
      <td class="text-center">
        <a href="/download/1.torrent"><i class="fa fa-download"></i></a>
        <a href="magnet:?xt=urn:btih:aaaa&amp;dn=show"><i class="fa fa-magnet"></i></a>
      </td>
      <td class="text-center">1.4 GiB</td>
      <td class="text-center">2024-01-01 12:00</td>
      <td class="text-center">120</td>
      <td class="text-center">4</td>
      <td class="text-center">900</td>
    </tr>
    <tr class="success">
      <td><a href="/?c=1_2"></a></td>
      <td colspan="2"><a href="/view/2">[Erai-raws] Show - 02 [720p]</a></td>
      <td class="text-center">
        <a href="magnet:?xt=urn:btih:bbbb"></a>
      </td>
      <td class="text-center">350.0 MiB</td>
      <td class="text-center">2024-01-08 12:00</td>
      <td class="text-center">n/a</td>
      <td class="text-center">0</td>
      <td class="text-center">10</td>
    </tr>
  </tbody>
</table>
</body></html>
"#;

    #[test]
    fn test_parse_listing() {
        let rows = parse_listing(LISTING).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].title, "[SubsPlease] Show - 01 (1080p) [AAAA].mkv");
        assert_eq!(rows[0].magnet_uri, "magnet:?xt=urn:btih:aaaa&dn=show");
        assert_eq!(rows[0].size_text.as_deref(), Some("1.4 GiB"));
        assert_eq!(rows[0].seeders_text.as_deref(), Some("120"));

        assert_eq!(rows[1].title, "[Erai-raws] Show - 02 [720p]");
        assert_eq!(rows[1].seeders_text.as_deref(), Some("n/a"));
    }

    #[test]
    fn test_parse_listing_without_table() {
        let rows = parse_listing("<html><body><h3>No results found</h3></body></html>").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_scraper_name() {
        let scraper = NyaaScraper::new(IndexConfig::default()).unwrap();
        assert_eq!(scraper.name(), "nyaa");
    }
}
