#![forbid(unsafe_code)]

//! Second phase of an export: resolve every enumerated id into a
//! [`VideoRecord`] and persist the lot as one CSV file.
//!
//! Nothing touches the filesystem until every record has been fetched and
//! decoded, so a failed run never leaves a half-written file behind. Once
//! writing starts, an I/O error may still leave a truncated file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::{DetailClient, SearchClient};
use crate::enumerate::enumerate_video_ids;
use crate::record::{HEADER, VideoRecord};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Optional ceiling on search pages; `None` follows the cursor to the end.
    pub max_pages: Option<usize>,
}

/// Milestones reported while an export runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportEvent {
    Enumerated { videos: usize },
    Fetched { done: usize, total: usize },
    Written { rows: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
}

/// Fetches details for each id, one request per id, in the given order.
/// Ids that resolve to no item (deleted or private videos) produce no record.
pub fn collect_records(
    client: &impl DetailClient,
    video_ids: &[String],
    mut on_fetched: impl FnMut(usize, usize),
) -> Result<Vec<VideoRecord>> {
    let mut records = Vec::with_capacity(video_ids.len());
    for (index, video_id) in video_ids.iter().enumerate() {
        let items = client
            .video_details(video_id)
            .with_context(|| format!("fetching details for {video_id}"))?;
        if items.is_empty() {
            debug!(video_id = %video_id, "no details returned");
        }
        for item in &items {
            records.push(VideoRecord::from_api_item(item, video_id)?);
        }
        on_fetched(index + 1, video_ids.len());
    }
    Ok(records)
}

/// Writes the header plus one row per record, replacing any existing file.
pub fn write_csv(path: &Path, records: &[VideoRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(HEADER)
        .with_context(|| format!("writing header to {}", path.display()))?;
    for record in records {
        writer
            .write_record(record.to_row())
            .with_context(|| format!("writing row {} to {}", record.id, path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// `<dir>/<channel_name>.csv`. Path separators in the display name would
/// escape `dir`, so they are replaced.
pub fn output_path(dir: &Path, channel_name: &str) -> PathBuf {
    let file_stem: String = channel_name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' => '_',
            other => other,
        })
        .collect();
    dir.join(format!("{file_stem}.csv"))
}

/// Runs both phases for `channel_id` and writes the result to `path`.
pub fn export_channel<C>(
    client: &C,
    channel_id: &str,
    path: &Path,
    options: ExportOptions,
    mut on_event: impl FnMut(ExportEvent),
) -> Result<ExportSummary>
where
    C: SearchClient + DetailClient,
{
    let video_ids = enumerate_video_ids(client, channel_id, options.max_pages)
        .with_context(|| format!("listing videos of channel {channel_id}"))?;
    info!(channel_id, videos = video_ids.len(), "enumerated channel");
    on_event(ExportEvent::Enumerated {
        videos: video_ids.len(),
    });

    let records = collect_records(client, &video_ids, |done, total| {
        on_event(ExportEvent::Fetched { done, total })
    })?;

    write_csv(path, &records)?;
    info!(path = %path.display(), rows = records.len(), "wrote export");
    on_event(ExportEvent::Written {
        rows: records.len(),
    });

    Ok(ExportSummary {
        path: path.to_path_buf(),
        rows: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, SearchPage};
    use crate::enumerate::tests::ScriptedSearch;
    use crate::record::MissingFieldError;
    use crate::record::tests::sample_item;
    use serde_json::Value;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    /// Answers every id with `sample_item(id)` unless told otherwise.
    struct FakeDetails {
        fail_on: Option<&'static str>,
        empty_for: Option<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeDetails {
        fn new() -> Self {
            Self {
                fail_on: None,
                empty_for: None,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl DetailClient for FakeDetails {
        fn video_details(&self, video_id: &str) -> Result<Vec<Value>, ApiError> {
            self.calls.borrow_mut().push(video_id.to_string());
            if self.fail_on == Some(video_id) {
                return Err(ApiError::Transport {
                    endpoint: "videos",
                    message: "connection reset".into(),
                });
            }
            if self.empty_for == Some(video_id) {
                return Ok(Vec::new());
            }
            Ok(vec![sample_item(video_id)])
        }
    }

    /// Search and details behind one handle, like `YouTubeClient`.
    struct FakeApi {
        search: ScriptedSearch,
        details: FakeDetails,
    }

    impl SearchClient for FakeApi {
        fn search_page(
            &self,
            channel_id: &str,
            page_token: Option<&str>,
        ) -> Result<SearchPage, ApiError> {
            self.search.search_page(channel_id, page_token)
        }
    }

    impl DetailClient for FakeApi {
        fn video_details(&self, video_id: &str) -> Result<Vec<Value>, ApiError> {
            self.details.video_details(video_id)
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn records_for(values: &[&str]) -> Vec<VideoRecord> {
        collect_records(&FakeDetails::new(), &ids(values), |_, _| {}).unwrap()
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|row| row.unwrap().iter().map(str::to_owned).collect())
            .collect()
    }

    #[test]
    fn collect_records_keeps_request_order() {
        let client = FakeDetails::new();
        let mut progress = Vec::new();

        let records =
            collect_records(&client, &ids(&["c", "a", "b"]), |done, total| {
                progress.push((done, total))
            })
            .unwrap();

        let order: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(*client.calls.borrow(), vec!["c", "a", "b"]);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn collect_records_skips_videos_without_items() {
        let client = FakeDetails {
            empty_for: Some("gone"),
            ..FakeDetails::new()
        };

        let records = collect_records(&client, &ids(&["a", "gone", "b"]), |_, _| {}).unwrap();

        assert_eq!(records.len(), 2);
    }

    #[test]
    fn collect_records_surfaces_missing_fields() {
        struct Broken;
        impl DetailClient for Broken {
            fn video_details(&self, video_id: &str) -> Result<Vec<Value>, ApiError> {
                let mut item = sample_item(video_id);
                item["contentDetails"]
                    .as_object_mut()
                    .unwrap()
                    .remove("duration");
                Ok(vec![item])
            }
        }

        let err = collect_records(&Broken, &ids(&["a"]), |_, _| {}).unwrap_err();

        let missing = err.downcast_ref::<MissingFieldError>().unwrap();
        assert_eq!(missing.field, "contentDetails.duration");
    }

    #[test]
    fn write_csv_emits_header_then_one_row_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_csv(&path, &records_for(&["a", "b", "c", "d"])).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], HEADER);
        assert!(rows.iter().all(|row| row.len() == HEADER.len()));
        assert_eq!(rows[1][0], "a");
        assert_eq!(rows[4][0], "d");
    }

    #[test]
    fn write_csv_line_count_matches_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut records = records_for(&["a", "b", "c"]);
        for record in &mut records {
            record.description = "plain".into();
        }

        write_csv(&path, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert_eq!(
            content.lines().next().unwrap(),
            "id,title,publishedAt,duration,definition,caption,licensedContent,viewCount,likeCount,commentCount,description,embeddable,player"
        );
        assert_eq!(content.matches("\r\n").count(), 4);
        assert!(content.ends_with("True,\"<iframe width=\"\"480\"\" height=\"\"270\"\" src=\"\"//www.youtube.com/embed/c\"\"></iframe>\"\r\n"));
    }

    #[test]
    fn write_csv_quotes_commas_newlines_and_quotes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_csv(&path, &records_for(&["a"])).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"Line one\nLine two, with a comma\""));
        assert!(content.contains("\"<iframe width=\"\"480\"\""));
        let rows = read_rows(&path);
        assert_eq!(rows[1][10], "Line one\nLine two, with a comma");
    }

    #[test]
    fn write_csv_writes_sentinels_for_missing_statistics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut records = records_for(&["a"]);
        records[0].view_count = None;
        records[0].like_count = None;
        records[0].comment_count = None;

        write_csv(&path, &records).unwrap();

        let rows = read_rows(&path);
        assert_eq!(&rows[1][7..10], &["N/A", "N/A", "N/A"]);
    }

    #[test]
    fn write_csv_overwrites_previous_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let fresh = dir.path().join("fresh.csv");

        write_csv(&path, &records_for(&["a", "b", "c"])).unwrap();
        write_csv(&path, &records_for(&["z"])).unwrap();
        write_csv(&fresh, &records_for(&["z"])).unwrap();

        assert_eq!(fs::read(&path).unwrap(), fs::read(&fresh).unwrap());
        assert_eq!(read_rows(&path).len(), 2);
    }

    #[test]
    fn write_csv_is_deterministic() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        let records = records_for(&["a", "b"]);

        write_csv(&first, &records).unwrap();
        write_csv(&second, &records).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn write_csv_reports_unwritable_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");

        let err = write_csv(&path, &records_for(&["a"])).unwrap_err();

        assert!(err.to_string().contains("creating"));
    }

    #[test]
    fn output_path_uses_channel_name() {
        let dir = Path::new("/exports");
        assert_eq!(
            output_path(dir, "李子柒 Liziqi"),
            PathBuf::from("/exports/李子柒 Liziqi.csv")
        );
        assert_eq!(
            output_path(dir, "../AC/DC"),
            PathBuf::from("/exports/.._AC_DC.csv")
        );
    }

    #[test]
    fn export_channel_runs_both_phases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channel.csv");
        let api = FakeApi {
            search: ScriptedSearch::paged(&[&["a", "b"], &["c"]]),
            details: FakeDetails::new(),
        };
        let mut events = Vec::new();

        let summary = export_channel(&api, "UC123", &path, ExportOptions::default(), |event| {
            events.push(event)
        })
        .unwrap();

        assert_eq!(summary, ExportSummary { path: path.clone(), rows: 3 });
        let rows = read_rows(&path);
        let exported: Vec<&str> = rows[1..].iter().map(|row| row[0].as_str()).collect();
        assert_eq!(exported, vec!["a", "b", "c"]);
        assert_eq!(events.first(), Some(&ExportEvent::Enumerated { videos: 3 }));
        assert_eq!(events.last(), Some(&ExportEvent::Written { rows: 3 }));
    }

    #[test]
    fn export_channel_writes_nothing_when_a_detail_fetch_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channel.csv");
        let api = FakeApi {
            search: ScriptedSearch::paged(&[&["v1", "v2", "v3", "v4", "v5"]]),
            details: FakeDetails {
                fail_on: Some("v3"),
                ..FakeDetails::new()
            },
        };

        let err =
            export_channel(&api, "UC123", &path, ExportOptions::default(), |_| {}).unwrap_err();

        assert!(!path.exists());
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Transport { .. })
        ));
        assert_eq!(*api.details.calls.borrow(), vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn export_channel_keeps_previous_file_when_enumeration_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channel.csv");
        fs::write(&path, "previous run\n").unwrap();
        let api = FakeApi {
            search: ScriptedSearch::new(vec![Err(ApiError::Status {
                endpoint: "search",
                status: 400,
                message: "Invalid channel".into(),
            })]),
            details: FakeDetails::new(),
        };

        let err =
            export_channel(&api, "UC123", &path, ExportOptions::default(), |_| {}).unwrap_err();

        assert!(format!("{err:#}").contains("Invalid channel"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous run\n");
        assert!(api.details.calls.borrow().is_empty());
    }
}
