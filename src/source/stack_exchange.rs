//! Paged fetch of top-voted questions with their accepted answers.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::SourceConfig;
use crate::models::RawRecord;

/// Stop before the daily quota is fully spent.
const MIN_QUOTA_REMAINING: u32 = 2;

pub struct StackExchangeClient {
    client: reqwest::Client,
    config: SourceConfig,
}

#[derive(Debug, Deserialize)]
struct Page {
    items: Option<Vec<Item>>,
    #[serde(default)]
    has_more: bool,
    quota_remaining: Option<u32>,
    error_id: Option<i64>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    question_id: u64,
    title: Option<String>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    answer_count: u32,
    accepted_answer_score: Option<i64>,
    accepted_answer: Option<AcceptedAnswer>,
}

#[derive(Debug, Deserialize)]
struct AcceptedAnswer {
    body: Option<String>,
}

impl From<Item> for RawRecord {
    fn from(item: Item) -> Self {
        RawRecord {
            id: item.question_id,
            title: item.title,
            link: item.link,
            answer_count: item.answer_count,
            accepted_answer_score: item.accepted_answer_score.unwrap_or(0),
            accepted_answer_body: item.accepted_answer.and_then(|a| a.body),
        }
    }
}

#[derive(Debug)]
enum PageOutcome {
    /// Records from this page, and whether to request the next one
    Items(Vec<RawRecord>, bool),
    /// API-level error; keep what was fetched so far
    Error(String),
}

fn parse_page(body: &str) -> Result<PageOutcome> {
    let page: Page = serde_json::from_str(body).context("Malformed Stack Exchange response")?;

    if let Some(id) = page.error_id {
        let message = page.error_message.unwrap_or_default();
        return Ok(PageOutcome::Error(format!("error {id}: {message}")));
    }
    let Some(items) = page.items else {
        return Ok(PageOutcome::Error("response has no items".to_string()));
    };

    let quota_ok = page.quota_remaining.unwrap_or(0) >= MIN_QUOTA_REMAINING;
    let records = items.into_iter().map(RawRecord::from).collect();
    Ok(PageOutcome::Items(records, page.has_more && quota_ok))
}

impl StackExchangeClient {
    pub fn new(client: reqwest::Client, config: SourceConfig) -> Self {
        Self { client, config }
    }

    /// Fetch up to `max_pages` pages of questions tagged `tag`, most voted
    /// first. An API error part-way through keeps the pages already fetched.
    pub async fn fetch(&self, tag: &str, max_pages: u32) -> Result<Vec<RawRecord>> {
        let mut records: Vec<RawRecord> = Vec::new();

        for page in 1..=max_pages {
            let outcome = match self
                .fetch_page(tag, page)
                .await
                .and_then(|body| parse_page(&body))
            {
                Ok(outcome) => outcome,
                Err(e) if records.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!("Stopping Stack Exchange fetch at page {page}: {e:#}");
                    break;
                }
            };

            match outcome {
                PageOutcome::Items(items, more) => {
                    tracing::info!("Fetched page {page}/{max_pages} for '{tag}' ({} questions)", items.len());
                    records.extend(items);
                    if !more {
                        break;
                    }
                }
                PageOutcome::Error(message) => {
                    tracing::warn!(
                        "Stack Exchange API {message}; continuing with {} questions",
                        records.len()
                    );
                    break;
                }
            }
        }

        tracing::info!("Fetched {} questions tagged '{tag}'", records.len());
        Ok(records)
    }

    async fn fetch_page(&self, tag: &str, page: u32) -> Result<String> {
        let page = page.to_string();
        let page_size = self.config.page_size.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("order", "desc"),
            ("sort", "votes"),
            ("tagged", tag),
            ("site", &self.config.site),
            ("filter", &self.config.filter),
            ("pagesize", &page_size),
            ("page", &page),
        ];
        if let Some(key) = self.config.api_key.as_deref() {
            params.push(("key", key));
        }

        // error responses carry a JSON body with error_id, so read it regardless of status
        let resp = self
            .client
            .get(&self.config.api_url)
            .query(&params)
            .send()
            .await
            .context("Failed to call Stack Exchange API")?;

        resp.text()
            .await
            .context("Failed to read Stack Exchange response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_items() {
        let body = r#"{
            "items": [
                {"question_id": 1, "title": "Why is &quot;x&quot; slow?", "link": "https://stackoverflow.com/q/1",
                 "answer_count": 5, "accepted_answer_score": 42,
                 "accepted_answer": {"body": "<p>Because.</p>"}},
                {"question_id": 2, "title": "No accepted answer", "link": "https://stackoverflow.com/q/2",
                 "answer_count": 0}
            ],
            "has_more": true,
            "quota_remaining": 250
        }"#;

        let PageOutcome::Items(records, more) = parse_page(body).unwrap() else {
            panic!("expected items");
        };
        assert!(more);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].accepted_answer_score, 42);
        assert_eq!(records[0].accepted_answer_body.as_deref(), Some("<p>Because.</p>"));
        assert_eq!(records[1].accepted_answer_score, 0);
        assert!(records[1].accepted_answer_body.is_none());
    }

    #[test]
    fn test_last_page_stops() {
        let body = r#"{"items": [], "has_more": false, "quota_remaining": 100}"#;
        assert!(matches!(parse_page(body).unwrap(), PageOutcome::Items(_, false)));
    }

    #[test]
    fn test_low_quota_stops() {
        let body = r#"{"items": [], "has_more": true, "quota_remaining": 1}"#;
        assert!(matches!(parse_page(body).unwrap(), PageOutcome::Items(_, false)));
    }

    #[test]
    fn test_api_error_reported() {
        let body = r#"{"error_id": 502, "error_message": "too many requests from this IP", "error_name": "throttle_violation"}"#;
        let PageOutcome::Error(message) = parse_page(body).unwrap() else {
            panic!("expected error");
        };
        assert!(message.contains("502"));
    }

    #[test]
    fn test_missing_items_is_error() {
        let body = r#"{"has_more": false}"#;
        assert!(matches!(parse_page(body).unwrap(), PageOutcome::Error(_)));
    }

    #[test]
    fn test_malformed_body_errors() {
        assert!(parse_page("<html>bad gateway</html>").is_err());
    }
}
