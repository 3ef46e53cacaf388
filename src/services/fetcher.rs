//! Release listing fetcher.
//!
//! Downloads the listing page and pulls the raw fields out of every candidate
//! block with the configured CSS selectors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{ListingSelectors, RawCandidate, SourceConfig};
use crate::utils::http::{create_client, fetch_text, with_deadline};

/// Source of raw candidate blocks.
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Fetch the listing and return every candidate block found.
    async fn fetch(&self) -> Result<Vec<RawCandidate>>;

    /// URL the listing is read from; relative links resolve against it.
    fn source_url(&self) -> &str;
}

/// Compiled listing selectors.
#[derive(Debug, Clone)]
pub struct ListingParser {
    card: Selector,
    title: Selector,
    link_attr: String,
    detail: Selector,
    time: Selector,
    time_attr: String,
}

impl ListingParser {
    pub fn new(selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            card: parse_selector(&selectors.card_selector)?,
            title: parse_selector(&selectors.title_selector)?,
            link_attr: selectors.link_attr.clone(),
            detail: parse_selector(&selectors.detail_selector)?,
            time: parse_selector(&selectors.time_selector)?,
            time_attr: selectors.time_attr.clone(),
        })
    }

    /// Collect the raw fields of every candidate block in a document.
    pub fn parse(&self, html: &str) -> Vec<RawCandidate> {
        let document = Html::parse_document(html);
        document
            .select(&self.card)
            .map(|card| self.parse_card(&card))
            .collect()
    }

    fn parse_card(&self, card: &ElementRef) -> RawCandidate {
        let title_elem = card.select(&self.title).next();

        RawCandidate {
            title: title_elem.map(element_text).unwrap_or_default(),
            link: title_elem
                .and_then(|e| e.value().attr(&self.link_attr))
                .unwrap_or("")
                .trim()
                .to_string(),
            detail_title: card
                .select(&self.detail)
                .next()
                .map(element_text)
                .unwrap_or_default(),
            timestamp: card
                .select(&self.time)
                .next()
                .and_then(|e| e.value().attr(&self.time_attr))
                .unwrap_or("")
                .trim()
                .to_string(),
        }
    }
}

/// Fetcher that scrapes the listing page over HTTP.
pub struct HttpFetcher {
    client: Client,
    url: String,
    timeout: Duration,
    parser: ListingParser,
}

impl HttpFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            parser: ListingParser::new(&config.selectors)?,
        })
    }
}

#[async_trait]
impl ReleaseFetcher for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        log::debug!("Fetching release listing {}", self.url);
        let html = with_deadline(
            "fetch",
            self.timeout,
            fetch_text(&self.client, &self.url),
        )
        .await?;

        let candidates = self.parser.parse(&html);
        log::debug!("Found {} candidate blocks", candidates.len());
        Ok(candidates)
    }

    fn source_url(&self) -> &str {
        &self.url
    }
}

fn element_text(elem: ElementRef) -> String {
    elem.text().collect::<String>().trim().to_string()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
