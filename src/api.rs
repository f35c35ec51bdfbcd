#![forbid(unsafe_code)]

//! Thin blocking client for the two YouTube Data API v3 endpoints the
//! exporter touches: `search` (to enumerate a channel) and `videos` (to read
//! per-video metadata).
//!
//! The exporter only depends on the [`SearchClient`] and [`DetailClient`]
//! traits so tests can swap in scripted fakes.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Upper bound the search endpoint accepts for `maxResults`.
pub const SEARCH_PAGE_SIZE: u32 = 50;
pub const DETAIL_PARTS: &str = "snippet,contentDetails,player,statistics,status";

/// Failure talking to the API. Every variant aborts the export.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{endpoint} request failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },
    #[error("{endpoint} request returned HTTP {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: u16,
        message: String,
    },
    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

pub trait SearchClient {
    /// Fetches one page of videos published by `channel_id`. `page_token` is
    /// `None` for the first page.
    fn search_page(&self, channel_id: &str, page_token: Option<&str>)
    -> Result<SearchPage, ApiError>;
}

pub trait DetailClient {
    /// Returns the raw `items` of a `videos.list` call for a single id. The
    /// list is empty when the video is gone or private.
    fn video_details(&self, video_id: &str) -> Result<Vec<Value>, ApiError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: SearchResultId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultId {
    video_id: String,
}

impl From<SearchListResponse> for SearchPage {
    fn from(response: SearchListResponse) -> Self {
        Self {
            video_ids: response
                .items
                .into_iter()
                .map(|item| item.id.video_id)
                .collect(),
            next_page_token: response.next_page_token.filter(|token| !token.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
}

/// Pulls the human readable message out of a Google API error body, falling
/// back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.trim().to_string(),
    }
}

/// API-key authenticated client. Construct once per run and pass it by
/// reference to the enumerator and the collector.
pub struct YouTubeClient {
    agent: ureq::Agent,
    api_base: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn get_json<T>(&self, endpoint: &'static str, params: &[(&str, &str)]) -> Result<T, ApiError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.api_base, endpoint);
        let mut request = self.agent.get(&url).query("key", &self.api_key);
        for (name, value) in params {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => response
                .into_json::<T>()
                .map_err(|source| ApiError::Decode { endpoint, source }),
            Err(ureq::Error::Status(status, response)) => {
                let status_text = response.status_text().to_string();
                let message = match response.into_string() {
                    Ok(body) if !body.trim().is_empty() => error_message(&body),
                    Ok(_) => status_text,
                    Err(err) => format!("{status_text} (error body unreadable: {err})"),
                };
                Err(ApiError::Status {
                    endpoint,
                    status,
                    message,
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(ApiError::Transport {
                endpoint,
                message: transport.to_string(),
            }),
        }
    }
}

impl SearchClient for YouTubeClient {
    fn search_page(
        &self,
        channel_id: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, ApiError> {
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let mut params = vec![
            ("part", "id"),
            ("channelId", channel_id),
            ("maxResults", page_size.as_str()),
            ("type", "video"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let response: SearchListResponse = self.get_json("search", &params)?;
        let page = SearchPage::from(response);
        debug!(
            channel_id,
            results = page.video_ids.len(),
            has_next = page.next_page_token.is_some(),
            "search page received"
        );
        Ok(page)
    }
}

impl DetailClient for YouTubeClient {
    fn video_details(&self, video_id: &str) -> Result<Vec<Value>, ApiError> {
        let response: VideoListResponse =
            self.get_json("videos", &[("part", DETAIL_PARTS), ("id", video_id)])?;
        Ok(response.items)
    }
}
