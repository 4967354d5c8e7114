//! OpenAlex client
//!
//! Every request is paced by a shared token bucket and retried with
//! exponential backoff on transport errors, 429 and 5xx. Searches select
//! `referenced_works` as well, so the outbound list of any returned work
//! is remembered and later lookups skip the network.

use super::BibliographicDb;
use crate::config::{ConcurrencyConfig, OpenAlexConfig};
use crate::errors::{AppError, Result};
use crate::metrics::UpstreamTimer;
use crate::models::{Candidate, SearchQuery};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const SERVICE: &str = "openalex";
const WORK_FIELDS: &str = "id,display_name,publication_year,doi,authorships,referenced_works";

/// Rate limiter shared by all requests of one client
type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

#[derive(Debug, Deserialize)]
struct WorksPage {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    #[serde(default)]
    id: String,
    display_name: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    #[serde(default)]
    referenced_works: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<AuthorRef>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReferencedWorks {
    #[serde(default)]
    referenced_works: Vec<String>,
}

impl OpenAlexWork {
    fn to_candidate(&self) -> Candidate {
        Candidate {
            external_id: self.id.clone(),
            title: self.display_name.clone().unwrap_or_default(),
            authors: self
                .authorships
                .iter()
                .filter_map(|a| a.author.as_ref()?.display_name.clone())
                .collect(),
            year: self.publication_year,
            doi: self
                .doi
                .as_deref()
                .map(|d| d.trim_start_matches("https://doi.org/").to_lowercase()),
        }
    }
}

/// OpenAlex works API client
pub struct OpenAlexClient {
    client: reqwest::Client,
    config: OpenAlexConfig,
    limiter: DirectRateLimiter,
    referenced: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl OpenAlexClient {
    /// Create a new OpenAlex client
    pub fn new(config: &OpenAlexConfig, concurrency: &ConcurrencyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        let quota = Quota::per_second(
            NonZeroU32::new(concurrency.requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(concurrency.burst).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            config: config.clone(),
            limiter: RateLimiter::direct(quota),
            referenced: RwLock::new(HashMap::new()),
        })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// OpenAlex ids come back as URLs; the API path wants the short form
    fn short_id(external_id: &str) -> &str {
        external_id.rsplit('/').next().unwrap_or(external_id)
    }

    async fn remember(&self, works: &[OpenAlexWork]) {
        let mut referenced = self.referenced.write().await;
        for work in works.iter().filter(|w| !w.id.is_empty()) {
            referenced.insert(
                work.id.clone(),
                work.referenced_works.iter().cloned().collect(),
            );
        }
    }

    /// GET with retry; `Ok(None)` on 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let max_attempts = self.config.max_retries.max(1);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(
                Duration::from_secs(self.config.timeout_secs) * max_attempts,
            ))
            .build();

        let mut attempt = 0u32;
        retry(policy, || {
            attempt += 1;
            let current = attempt;
            async move {
                match self.send_once(operation, url, params).await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_transient() && current < max_attempts => {
                        warn!(
                            attempt = current,
                            max_attempts,
                            operation,
                            error = %e,
                            "OpenAlex request failed, retrying"
                        );
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        self.limiter.until_ready().await;
        let timer = UpstreamTimer::start(operation);

        let mut request = self.client.get(url).query(params);
        if let Some(mailto) = &self.config.mailto {
            request = request.query(&[("mailto", mailto)]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                timer.finish(false);
                return Err(if e.is_timeout() {
                    AppError::UpstreamTimeout {
                        service: SERVICE.to_string(),
                        timeout_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    AppError::Upstream {
                        service: SERVICE.to_string(),
                        message: e.to_string(),
                    }
                });
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            timer.finish(true);
            debug!(url, "OpenAlex returned 404");
            return Ok(None);
        }

        if !status.is_success() {
            timer.finish(false);
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed = response.json::<T>().await.map_err(|e| AppError::InvalidFormat {
            message: format!("Failed to parse OpenAlex response: {}", e),
        });
        timer.finish(parsed.is_ok());
        parsed.map(Some)
    }
}

#[async_trait]
impl BibliographicDb for OpenAlexClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>> {
        if query.text.trim().is_empty() {
            return Err(AppError::Validation {
                message: "empty search query".to_string(),
                field: Some("text".to_string()),
            });
        }

        let mut params = vec![
            ("search", query.text.clone()),
            ("per-page", query.limit.min(self.config.per_page).max(1).to_string()),
            ("select", WORK_FIELDS.to_string()),
        ];
        if let Some(year) = query.year {
            params.push((
                "filter",
                format!(
                    "from_publication_date:{}-01-01,to_publication_date:{}-12-31",
                    year - 1,
                    year + 1
                ),
            ));
        }

        let url = format!("{}/works", self.base());
        let page: Option<WorksPage> = self.get_json("search", &url, &params).await?;
        let works = page.map(|p| p.results).unwrap_or_default();

        self.remember(&works).await;
        debug!(query = %query.text, hits = works.len(), "OpenAlex search");

        Ok(works
            .iter()
            .filter(|w| !w.id.is_empty())
            .map(OpenAlexWork::to_candidate)
            .collect())
    }

    async fn get_outbound_citations(&self, external_id: &str) -> Result<BTreeSet<String>> {
        if let Some(known) = self.referenced.read().await.get(external_id) {
            return Ok(known.clone());
        }

        let url = format!("{}/works/{}", self.base(), Self::short_id(external_id));
        let params = [("select", "referenced_works".to_string())];
        let works: Option<ReferencedWorks> =
            self.get_json("outbound_citations", &url, &params).await?;

        let cited: BTreeSet<String> = works
            .map(|w| w.referenced_works.into_iter().collect())
            .unwrap_or_default();

        self.referenced
            .write()
            .await
            .insert(external_id.to_string(), cited.clone());

        Ok(cited)
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Candidate>> {
        let url = format!("{}/works/https://doi.org/{}", self.base(), doi);
        let params = [("select", WORK_FIELDS.to_string())];
        let work: Option<OpenAlexWork> = self.get_json("doi_lookup", &url, &params).await?;

        match work {
            Some(work) if !work.id.is_empty() => {
                self.remember(std::slice::from_ref(&work)).await;
                Ok(Some(work.to_candidate()))
            }
            _ => Ok(None),
        }
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(
            OpenAlexClient::short_id("https://openalex.org/W2741809807"),
            "W2741809807"
        );
        assert_eq!(OpenAlexClient::short_id("W1"), "W1");
    }

    #[test]
    fn test_work_to_candidate() {
        let json = r#"{
            "id": "https://openalex.org/W1",
            "display_name": "Collective dynamics of small-world networks",
            "publication_year": 1998,
            "doi": "https://doi.org/10.1038/30918",
            "authorships": [
                {"author": {"display_name": "Duncan J. Watts"}},
                {"author": {"display_name": "Steven H. Strogatz"}}
            ],
            "referenced_works": ["https://openalex.org/W2"]
        }"#;
        let work: OpenAlexWork = serde_json::from_str(json).unwrap();
        let candidate = work.to_candidate();

        assert_eq!(candidate.year, Some(1998));
        assert_eq!(candidate.doi.as_deref(), Some("10.1038/30918"));
        assert_eq!(candidate.authors.len(), 2);
        assert_eq!(work.referenced_works.len(), 1);
    }

    #[test]
    fn test_sparse_work_deserializes() {
        let page: WorksPage = serde_json::from_str(r#"{"results": [{"id": "W9"}]}"#).unwrap();
        let candidate = page.results[0].to_candidate();
        assert!(candidate.title.is_empty());
        assert!(candidate.authors.is_empty());
    }

    #[tokio::test]
    async fn test_remembered_citations_skip_network() {
        let client = OpenAlexClient::new(
            &OpenAlexConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                ..OpenAlexConfig::default()
            },
            &ConcurrencyConfig::default(),
        )
        .unwrap();

        let work: OpenAlexWork = serde_json::from_str(
            r#"{"id": "W1", "referenced_works": ["W2", "W3"]}"#,
        )
        .unwrap();
        client.remember(&[work]).await;

        let cited = client.get_outbound_citations("W1").await.unwrap();
        assert_eq!(cited.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let client =
            OpenAlexClient::new(&OpenAlexConfig::default(), &ConcurrencyConfig::default()).unwrap();
        let query = SearchQuery {
            text: "  ".to_string(),
            year: None,
            limit: 5,
        };
        assert!(matches!(
            client.search(&query).await,
            Err(AppError::Validation { .. })
        ));
    }
}
