use std::time::Duration;

use log::{debug, warn};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{FocusError, FocusResult};

use super::models::{Board, Card, Column, Identity};

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Upper bound on closed-card pages fetched in one call.
const MAX_CLOSED_PAGES: u32 = 200;
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    pub board_id: Option<String>,
    pub assignee_id: Option<String>,
}

/// Bearer-token client for the task-board API.
#[derive(Clone)]
pub struct BoardClient {
    http: Client,
    base_url: String,
    token: String,
}

fn slug_path(slug: &str) -> &str {
    slug.trim_matches('/')
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Map a non-success status to the error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> Option<FocusError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FocusError::Authentication(format!(
            "task board rejected the token ({status})"
        )),
        StatusCode::NOT_FOUND => FocusError::NotFound(format!("task board returned {status}")),
        _ => FocusError::Network(format!(
            "task board returned {status}: {}",
            excerpt(body.trim())
        )),
    })
}

pub fn decode<T: DeserializeOwned>(body: &str) -> FocusResult<T> {
    serde_json::from_str(body)
        .map_err(|err| FocusError::Parse(format!("unexpected task board response: {err}")))
}

impl BoardClient {
    pub fn new(base_url: &str, token: &str) -> FocusResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(FocusError::configuration("an access token is required"));
        }
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(FocusError::configuration("task board URL is not configured"));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("focusboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| FocusError::configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            token: token.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> FocusResult<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|err| FocusError::Network(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| FocusError::Network(format!("failed to read response body: {err}")))?;

        if let Some(err) = status_error(status, &body) {
            return Err(err);
        }
        decode(&body)
    }

    pub async fn get_identity(&self) -> FocusResult<Identity> {
        self.get_json("my/identity.json", &[]).await
    }

    pub async fn get_boards(&self, slug: &str) -> FocusResult<Vec<Board>> {
        self.get_json(&format!("{}/boards.json", slug_path(slug)), &[])
            .await
    }

    pub async fn get_columns(&self, slug: &str, board_id: &str) -> FocusResult<Vec<Column>> {
        self.get_json(
            &format!("{}/boards/{board_id}/columns.json", slug_path(slug)),
            &[],
        )
        .await
    }

    pub async fn get_cards(&self, slug: &str, filter: &CardFilter) -> FocusResult<Vec<Card>> {
        let mut query = Vec::new();
        if let Some(board_id) = &filter.board_id {
            query.push(("board_ids[]", board_id.clone()));
        }
        if let Some(assignee_id) = &filter.assignee_id {
            query.push(("assignee_ids[]", assignee_id.clone()));
        }
        self.get_json(&format!("{}/cards.json", slug_path(slug)), &query)
            .await
    }

    /// Every closed card, fetched page by page until an empty page.
    pub async fn get_closed_cards(
        &self,
        slug: &str,
        assignee_id: Option<&str>,
    ) -> FocusResult<Vec<Card>> {
        let path = format!("{}/cards.json", slug_path(slug));
        let mut cards = Vec::new();

        for page in 1..=MAX_CLOSED_PAGES {
            let mut query = vec![("indexed_by", "closed".to_string()), ("page", page.to_string())];
            if let Some(assignee_id) = assignee_id {
                query.push(("assignee_ids[]", assignee_id.to_string()));
            }

            let batch: Vec<Card> = self.get_json(&path, &query).await?;
            if batch.is_empty() {
                return Ok(cards);
            }
            cards.extend(batch);
        }

        warn!("Stopped fetching closed cards after {MAX_CLOSED_PAGES} pages");
        Ok(cards)
    }

    pub async fn get_card(&self, slug: &str, number: i64) -> FocusResult<Card> {
        self.get_json(&format!("{}/cards/{number}.json", slug_path(slug)), &[])
            .await
    }
}
