//! Firecrawl search-and-scrape research.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::ResearchProvider;
use crate::config::ResearchConfig;
use crate::core::bundle::{ResearchBundle, Source};
use crate::error::{ForgeError, Result};

static DOCS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)docs\.|/docs/|documentation\.|readthedocs\.io|\.dev/docs|learn\.|guide\.")
        .unwrap()
});

/// Hosts never treated as official documentation.
const NON_DOCS_HOSTS: [&str; 5] = [
    "wikipedia.org",
    "github.com",
    "youtube.com",
    "reddit.com",
    "linkedin.com",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    markdown: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    data: Option<ScrapeData>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
}

/// Search the web for a topic, scrape the top hits, fall back to snippets.
pub struct FirecrawlResearcher {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    max_results: usize,
    max_scrape: usize,
    max_chars: usize,
}

impl std::fmt::Debug for FirecrawlResearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirecrawlResearcher")
            .field("base_url", &self.base_url)
            .field("max_results", &self.max_results)
            .field("max_scrape", &self.max_scrape)
            .finish_non_exhaustive()
    }
}

impl FirecrawlResearcher {
    /// Build from config, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ForgeError::MissingConfig(format!(
                    "{} environment variable is required for research",
                    config.api_key_env
                ))
            })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ResearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ForgeError::Config(format!("research http client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results: config.max_results,
            max_scrape: config.max_scrape,
            max_chars: config.max_chars,
        })
    }

    fn search(&self, topic: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(format!("{}/v1/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "query": topic, "limit": self.max_results }))
            .send()
            .map_err(|err| ForgeError::Research(format!("search request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(ForgeError::Research(format!(
                "search HTTP {}",
                response.status()
            )));
        }
        let body: SearchResponse = response
            .json()
            .map_err(|err| ForgeError::Research(format!("search response parse: {err}")))?;
        Ok(body.data)
    }

    /// Page markdown, or `None` when the page cannot be scraped.
    fn scrape(&self, url: &str) -> Option<String> {
        let result = self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "url": url, "formats": ["markdown"] }))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::json::<ScrapeResponse>);
        match result {
            Ok(body) => body
                .data
                .and_then(|data| data.markdown)
                .filter(|text| !text.trim().is_empty())
                .map(|text| truncate_chars(&text, self.max_chars)),
            Err(err) => {
                warn!(url, error = %err, "failed to scrape page");
                None
            }
        }
    }
}

impl ResearchProvider for FirecrawlResearcher {
    fn research(&self, topic: &str) -> Result<ResearchBundle> {
        info!(topic, "searching");
        let hits = self.search(topic)?;

        let mut sources: Vec<Source> = Vec::new();
        for (idx, hit) in hits.into_iter().take(self.max_results).enumerate() {
            if hit.url.is_empty() || sources.iter().any(|s| s.origin == hit.url) {
                continue;
            }
            let scraped = if idx < self.max_scrape {
                debug!(url = %hit.url, "scraping");
                self.scrape(&hit.url)
            } else {
                None
            };
            let content = scraped
                .or(hit.markdown.filter(|text| !text.trim().is_empty()))
                .unwrap_or(hit.description);
            if content.trim().is_empty() {
                continue;
            }
            let header = if hit.title.is_empty() {
                format!("# Source: {}", hit.url)
            } else {
                format!("# {}\n{}", hit.title, hit.url)
            };
            sources.push(Source::new(hit.url, format!("{header}\n\n{content}")));
        }

        let origins: Vec<String> = sources.iter().map(|s| s.origin.clone()).collect();
        if let Some(docs) = find_docs_url(&origins) {
            if !origins.contains(&docs) {
                if let Some(content) = self.scrape(&docs) {
                    sources.push(Source::new(
                        docs.clone(),
                        format!("## Documentation: {docs}\n\n{content}"),
                    ));
                }
            }
        }

        info!(topic, sources = sources.len(), "research complete");
        Ok(ResearchBundle::new(topic, sources))
    }
}

/// Best documentation entry point among `urls`.
///
/// Prefers a URL that already looks like docs, else `<scheme>://<host>/docs/`
/// of the first non-aggregator result.
#[must_use]
pub fn find_docs_url(urls: &[String]) -> Option<String> {
    if let Some(url) = urls.iter().find(|url| DOCS_URL_RE.is_match(url)) {
        return Some(url.clone());
    }
    urls.iter()
        .filter(|url| !NON_DOCS_HOSTS.iter().any(|host| url.contains(host)))
        .find_map(|url| {
            let (scheme, rest) = url.split_once("://")?;
            let host = rest.split(['/', '?', '#']).next()?;
            (!host.is_empty()).then(|| format!("{scheme}://{host}/docs/"))
        })
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn researcher(server: &MockServer) -> FirecrawlResearcher {
        let config = ResearchConfig {
            base_url: server.base_url(),
            max_results: 5,
            max_scrape: 1,
            max_chars: 10,
            ..ResearchConfig::default()
        };
        FirecrawlResearcher::new(&config, "test-key").unwrap()
    }

    #[test]
    fn scrapes_top_hits_and_falls_back_to_snippets() {
        let server = MockServer::start();
        let search = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/search")
                .header("authorization", "Bearer test-key");
            then.status(200).json_body(json!({
                "success": true,
                "data": [
                    {"url": "https://docs.docker.com/get-started/", "title": "Get started", "description": "snippet one"},
                    {"url": "https://example.com/blog", "title": "", "description": "snippet two"},
                    {"url": "https://example.com/blog", "title": "dup", "description": "dup"}
                ]
            }));
        });
        let scrape = server.mock(|when, then| {
            when.method(POST).path("/v1/scrape");
            then.status(200).json_body(json!({
                "success": true,
                "data": {"markdown": "0123456789abcdef"}
            }));
        });

        let bundle = researcher(&server).research("docker").unwrap();

        search.assert();
        scrape.assert();
        assert_eq!(bundle.count(), 2);
        assert_eq!(
            bundle.origins(),
            vec!["https://docs.docker.com/get-started/", "https://example.com/blog"]
        );
        assert!(bundle.sources[0].text.contains("0123456789"));
        assert!(!bundle.sources[0].text.contains("abcdef"));
        assert!(bundle.sources[1].text.starts_with("# Source: https://example.com/blog"));
        assert!(bundle.sources[1].text.contains("snippet two"));
    }

    #[test]
    fn failed_search_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/search");
            then.status(500);
        });
        let err = researcher(&server).research("docker").unwrap_err();
        assert!(matches!(err, ForgeError::Research(_)));
    }

    #[test]
    fn no_hits_gives_empty_bundle() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/search");
            then.status(200).json_body(json!({"success": true, "data": []}));
        });
        let bundle = researcher(&server).research("nothing").unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn docs_url_detection() {
        let urls = vec![
            "https://en.wikipedia.org/wiki/Docker".to_string(),
            "https://www.docker.com/why".to_string(),
        ];
        assert_eq!(
            find_docs_url(&urls).as_deref(),
            Some("https://www.docker.com/docs/")
        );
        let urls = vec!["https://kubernetes.io/docs/home".to_string()];
        assert_eq!(
            find_docs_url(&urls).as_deref(),
            Some("https://kubernetes.io/docs/home")
        );
        assert_eq!(find_docs_url(&["https://github.com/x".to_string()]), None);
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
