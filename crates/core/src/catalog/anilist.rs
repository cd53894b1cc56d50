//! AniList GraphQL client.
//!
//! Anonymous access, no API key. AniList allows around 90 requests per minute;
//! one search plus one detail lookup per user interaction stays well below.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::types::{CatalogError, CatalogLookup, CatalogTitle, MediaDetails};
use crate::config::CatalogConfig;
use crate::text::similarity;

/// Minimum similarity for a candidate to be promoted to the top of the list.
const PROMOTE_THRESHOLD: f64 = 0.6;

const SEARCH_QUERY: &str = r#"
query ($search: String, $perPage: Int) {
  Page(page: 1, perPage: $perPage) {
    media(type: ANIME, search: $search, sort: [SEARCH_MATCH, POPULARITY_DESC]) {
      id
      title { romaji english native }
      synonyms
    }
  }
}
"#;

const DETAILS_QUERY: &str = r#"
query ($id: Int) {
  Media(id: $id, type: ANIME) {
    id
    title { romaji english native }
    description(asHtml: false)
    coverImage { large medium }
    siteUrl
    format
    status
    episodes
    duration
    season
    seasonYear
    averageScore
    meanScore
    genres
  }
}
"#;

/// AniList API client.
pub struct AniListClient {
    client: Client,
    config: CatalogConfig,
}

impl AniListClient {
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| CatalogError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, CatalogError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(CatalogError::from_reqwest)?;

        let status = response.status();
        if status == 404 {
            return Err(CatalogError::NotFound(variables.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let envelope: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        envelope.into_data()
    }
}

#[async_trait]
impl CatalogLookup for AniListClient {
    fn name(&self) -> &str {
        "anilist"
    }

    async fn search_titles(&self, text: &str) -> Result<Vec<CatalogTitle>, CatalogError> {
        debug!(text = %text, "AniList title search");

        let page: PageData = self
            .post(
                SEARCH_QUERY,
                json!({ "search": text, "perPage": self.config.max_titles }),
            )
            .await?;

        let mut titles: Vec<CatalogTitle> = page.page.media.into_iter().map(Into::into).collect();
        promote_closest(&mut titles, text);
        titles.truncate(self.config.max_titles);

        debug!(text = %text, results = titles.len(), "AniList title search complete");
        Ok(titles)
    }

    async fn fetch_details(&self, id: u64) -> Result<MediaDetails, CatalogError> {
        debug!(id = id, "AniList details lookup");

        let data: MediaData = self.post(DETAILS_QUERY, json!({ "id": id })).await?;
        data.media
            .map(Into::into)
            .ok_or_else(|| CatalogError::NotFound(format!("Media ID {}", id)))
    }
}

/// Move the candidate whose display name is closest to `text` to the front,
/// if it is close enough. The rest keep the catalog's ranking.
pub(crate) fn promote_closest(titles: &mut Vec<CatalogTitle>, text: &str) {
    let needle = text.to_lowercase();
    let best = titles
        .iter()
        .enumerate()
        .map(|(i, t)| (i, similarity(&needle, &t.display.to_lowercase())))
        .filter(|(_, score)| *score >= PROMOTE_THRESHOLD)
        .fold(None::<(usize, f64)>, |best, (i, score)| match best {
            Some((_, s)) if s >= score => best,
            _ => Some((i, score)),
        });

    if let Some((idx, _)) = best {
        let title = titles.remove(idx);
        titles.insert(0, title);
    }
}

// ============================================================================
// AniList API response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    status: Option<u16>,
}

impl<T> GraphQlResponse<T> {
    fn into_data(self) -> Result<T, CatalogError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(match err.status {
                Some(404) => CatalogError::NotFound(err.message),
                status => CatalogError::ApiError {
                    status: status.unwrap_or(200),
                    message: err.message,
                },
            });
        }
        self.data
            .ok_or_else(|| CatalogError::ParseError("response has no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: AlPage,
}

#[derive(Debug, Deserialize)]
struct AlPage {
    #[serde(default)]
    media: Vec<AlMedia>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<AlMediaDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct AlTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

impl AlTitle {
    fn names(&self) -> impl Iterator<Item = &str> {
        [&self.english, &self.romaji, &self.native]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct AlMedia {
    id: u64,
    #[serde(default)]
    title: AlTitle,
    #[serde(default)]
    synonyms: Option<Vec<String>>,
}

impl From<AlMedia> for CatalogTitle {
    fn from(m: AlMedia) -> Self {
        let display = m
            .title
            .names()
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| m.id.to_string());

        let mut queries: Vec<String> = Vec::new();
        let synonyms = m.synonyms.unwrap_or_default();
        for name in m.title.names().chain(synonyms.iter().map(|s| s.trim())) {
            if !name.is_empty() && !queries.iter().any(|q| q == name) {
                queries.push(name.to_string());
            }
        }
        if queries.is_empty() {
            queries.push(display.clone());
        }

        CatalogTitle {
            id: m.id,
            display,
            queries,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlMediaDetails {
    id: u64,
    #[serde(default)]
    title: AlTitle,
    description: Option<String>,
    cover_image: Option<AlCoverImage>,
    site_url: Option<String>,
    format: Option<String>,
    status: Option<String>,
    episodes: Option<u32>,
    duration: Option<u32>,
    season: Option<String>,
    season_year: Option<u32>,
    average_score: Option<u32>,
    mean_score: Option<u32>,
    #[serde(default)]
    genres: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AlCoverImage {
    large: Option<String>,
    medium: Option<String>,
}

impl From<AlMediaDetails> for MediaDetails {
    fn from(d: AlMediaDetails) -> Self {
        let title = d
            .title
            .names()
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| d.id.to_string());

        MediaDetails {
            id: d.id,
            title,
            description: d.description,
            cover_image: d.cover_image.and_then(|c| c.large.or(c.medium)),
            site_url: d.site_url,
            format: d.format,
            status: d.status,
            episodes: d.episodes,
            duration: d.duration,
            season: d.season,
            season_year: d.season_year,
            score: d.average_score.or(d.mean_score),
            genres: d.genres.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(display: &str) -> CatalogTitle {
        CatalogTitle {
            id: 1,
            display: display.to_string(),
            queries: vec![display.to_string()],
        }
    }

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "data": {
                "Page": {
                    "media": [
                        {
                            "id": 21,
                            "title": { "romaji": "One Piece", "english": "ONE PIECE", "native": "ワンピース" },
                            "synonyms": ["OP", "ONE PIECE"]
                        },
                        {
                            "id": 99,
                            "title": { "romaji": "Only Romaji", "english": null, "native": null },
                            "synonyms": null
                        }
                    ]
                }
            }
        }"#;

        let response: GraphQlResponse<PageData> = serde_json::from_str(json).unwrap();
        let titles: Vec<CatalogTitle> = response
            .into_data()
            .unwrap()
            .page
            .media
            .into_iter()
            .map(Into::into)
            .collect();

        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].display, "ONE PIECE");
        assert_eq!(
            titles[0].queries,
            vec!["ONE PIECE", "One Piece", "ワンピース", "OP"]
        );
        assert_eq!(titles[1].display, "Only Romaji");
        assert_eq!(titles[1].queries, vec!["Only Romaji"]);
    }

    #[test]
    fn test_parse_details_response() {
        let json = r#"{
            "data": {
                "Media": {
                    "id": 5114,
                    "title": { "romaji": "Hagane no Renkinjutsushi", "english": "Fullmetal Alchemist: Brotherhood", "native": null },
                    "description": "Two brothers.<br>Alchemy.",
                    "coverImage": { "large": "https://img/large.jpg", "medium": "https://img/medium.jpg" },
                    "siteUrl": "https://anilist.co/anime/5114",
                    "format": "TV",
                    "status": "FINISHED",
                    "episodes": 64,
                    "duration": 24,
                    "season": "SPRING",
                    "seasonYear": 2009,
                    "averageScore": null,
                    "meanScore": 90,
                    "genres": ["Action", "Adventure"]
                }
            }
        }"#;

        let response: GraphQlResponse<MediaData> = serde_json::from_str(json).unwrap();
        let details: MediaDetails = response.into_data().unwrap().media.unwrap().into();

        assert_eq!(details.title, "Fullmetal Alchemist: Brotherhood");
        assert_eq!(details.cover_image.as_deref(), Some("https://img/large.jpg"));
        assert_eq!(details.score, Some(90));
        assert_eq!(details.episodes, Some(64));
        assert_eq!(details.season_year, Some(2009));
        assert_eq!(details.genres, vec!["Action", "Adventure"]);
    }

    #[test]
    fn test_graphql_error_is_reported() {
        let json = r#"{ "data": null, "errors": [{ "message": "Not Found.", "status": 404 }] }"#;
        let response: GraphQlResponse<MediaData> = serde_json::from_str(json).unwrap();
        assert!(matches!(response.into_data(), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_promote_closest() {
        let mut titles = vec![
            title("Naruto Shippuden"),
            title("Boruto"),
            title("Naruto"),
        ];
        promote_closest(&mut titles, "naruto");

        let names: Vec<_> = titles.iter().map(|t| t.display.as_str()).collect();
        assert_eq!(names, vec!["Naruto", "Naruto Shippuden", "Boruto"]);
    }

    #[test]
    fn test_promote_closest_below_threshold_keeps_order() {
        let mut titles = vec![title("Alpha"), title("Beta")];
        promote_closest(&mut titles, "something else entirely");

        assert_eq!(titles[0].display, "Alpha");
        assert_eq!(titles[1].display, "Beta");
    }
}
