#![forbid(unsafe_code)]

//! Typed view of one `videos.list` item and its fixed CSV projection.

use serde_json::Value;
use thiserror::Error;

/// Column order of the exported file.
pub const HEADER: [&str; 13] = [
    "id",
    "title",
    "publishedAt",
    "duration",
    "definition",
    "caption",
    "licensedContent",
    "viewCount",
    "likeCount",
    "commentCount",
    "description",
    "embeddable",
    "player",
];

/// Written in place of a statistic the API did not return (hidden likes,
/// disabled comments, ...).
pub const MISSING_STATISTIC: &str = "N/A";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("video {video_id}: missing required field `{field}`")]
pub struct MissingFieldError {
    pub video_id: String,
    pub field: &'static str,
}

/// Metadata persisted for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub published_at: String,
    /// ISO 8601 duration as returned by the API, e.g. `PT4M13S`.
    pub duration: String,
    pub definition: String,
    /// `"true"`/`"false"`; the API reports this one as a string.
    pub caption: String,
    pub licensed_content: bool,
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
    pub description: String,
    pub embeddable: bool,
    pub player_embed_html: String,
}

impl VideoRecord {
    /// Decodes a raw API item. `requested_id` names the video in errors when
    /// the item itself lacks an id.
    pub fn from_api_item(item: &Value, requested_id: &str) -> Result<Self, MissingFieldError> {
        let video_id = item
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(requested_id);
        let missing = |field: &'static str| MissingFieldError {
            video_id: video_id.to_string(),
            field,
        };
        let text = |pointer: &str, field: &'static str| {
            item.pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| missing(field))
        };
        let flag = |pointer: &str, field: &'static str| {
            item.pointer(pointer)
                .and_then(Value::as_bool)
                .ok_or_else(|| missing(field))
        };

        let statistics = item.get("statistics");
        Ok(Self {
            id: text("/id", "id")?,
            title: text("/snippet/title", "snippet.title")?,
            published_at: text("/snippet/publishedAt", "snippet.publishedAt")?,
            duration: text("/contentDetails/duration", "contentDetails.duration")?,
            definition: text("/contentDetails/definition", "contentDetails.definition")?,
            caption: text("/contentDetails/caption", "contentDetails.caption")?,
            licensed_content: flag(
                "/contentDetails/licensedContent",
                "contentDetails.licensedContent",
            )?,
            view_count: statistic(statistics, "viewCount"),
            like_count: statistic(statistics, "likeCount"),
            comment_count: statistic(statistics, "commentCount"),
            description: text("/snippet/description", "snippet.description")?,
            embeddable: flag("/status/embeddable", "status.embeddable")?,
            player_embed_html: text("/player/embedHtml", "player.embedHtml")?,
        })
    }

    /// Cells in [`HEADER`] order.
    pub fn to_row(&self) -> [String; 13] {
        [
            self.id.clone(),
            self.title.clone(),
            self.published_at.clone(),
            self.duration.clone(),
            self.definition.clone(),
            self.caption.clone(),
            flag_cell(self.licensed_content),
            statistic_cell(&self.view_count),
            statistic_cell(&self.like_count),
            statistic_cell(&self.comment_count),
            self.description.clone(),
            flag_cell(self.embeddable),
            self.player_embed_html.clone(),
        ]
    }
}

// Counts come back as decimal strings; plain numbers are accepted too.
fn statistic(statistics: Option<&Value>, key: &str) -> Option<String> {
    match statistics?.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn flag_cell(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

fn statistic_cell(value: &Option<String>) -> String {
    value
        .clone()
        .unwrap_or_else(|| MISSING_STATISTIC.to_string())
}
