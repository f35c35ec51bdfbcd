#![forbid(unsafe_code)]

use crate::api::{ApiError, SearchClient};
use tracing::{debug, warn};

/// Walks the channel's search results page by page until the API stops
/// returning a continuation token, keeping ids in the order they arrive.
///
/// Duplicates are kept. With `max_pages` set, enumeration also stops after
/// that many pages even if the API offers more.
pub fn enumerate_video_ids(
    client: &impl SearchClient,
    channel_id: &str,
    max_pages: Option<usize>,
) -> Result<Vec<String>, ApiError> {
    let mut video_ids = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = client.search_page(channel_id, page_token.as_deref())?;
        pages += 1;
        debug!(
            page = pages,
            results = page.video_ids.len(),
            "collected search page"
        );
        video_ids.extend(page.video_ids);

        let Some(next) = page.next_page_token else {
            break;
        };
        if max_pages.is_some_and(|limit| pages >= limit) {
            warn!(
                pages,
                collected = video_ids.len(),
                "page limit reached before the last search page; stopping early"
            );
            break;
        }
        page_token = Some(next);
    }

    Ok(video_ids)
}
