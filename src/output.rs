//! Bulk output artifacts
//!
//! `<prefix>.ndjson` carries one record per line; `<prefix>.txt` is a
//! skimmable summary of the same batch.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::error::Result;
use crate::schemas::VideoRecord;

/// Longest description excerpt in the text summary
const DESCRIPTION_EXCERPT_CHARS: usize = 240;

/// Paths and count of written artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub count: usize,
    pub ndjson_path: PathBuf,
    pub text_path: PathBuf,
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

fn format_count(count: Option<u64>) -> String {
    count.map_or_else(|| "-".to_string(), |c| c.to_string())
}

/// Renders the human-readable block for one record
pub fn summarize(record: &VideoRecord) -> String {
    let mut out = String::new();
    let date = record
        .published_at
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_else(|| "?".to_string());
    let channel = record.channel_title.as_deref().unwrap_or("?");
    let title = record.title.trim().replace('\n', " ");

    let _ = writeln!(out, "[{}] {} - {}", date, channel, title);
    let _ = writeln!(out, "URL: {}", record.video_url);

    if let Some(first_line) = record.description.trim().lines().next() {
        let excerpt: String = first_line.chars().take(DESCRIPTION_EXCERPT_CHARS).collect();
        let _ = writeln!(out, "Desc: {}", excerpt);
    }

    let mut info = Vec::new();
    if let Some(seconds) = record.duration_seconds {
        info.push(format!("duration={}s", seconds));
    }
    if let Some(stats) = &record.stats {
        info.push(format!(
            "views={} likes={} comments={}",
            format_count(stats.views),
            format_count(stats.likes),
            format_count(stats.comments)
        ));
    }
    if !info.is_empty() {
        let _ = writeln!(out, "Info: {}", info.join(" "));
    }

    out.push_str("---\n");
    out
}

/// Writes both artifacts for `records`, creating the parent directory
pub async fn write_outputs(records: &[VideoRecord], prefix: &Path) -> Result<OutputFiles> {
    if let Some(parent) = prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let ndjson_path = with_suffix(prefix, ".ndjson");
    let text_path = with_suffix(prefix, ".txt");

    let mut ndjson = String::new();
    let mut text = String::new();
    for record in records {
        ndjson.push_str(&serde_json::to_string(record)?);
        ndjson.push('\n');
        text.push_str(&summarize(record));
    }

    fs::write(&ndjson_path, ndjson).await?;
    fs::write(&text_path, text).await?;

    info!(
        count = records.len(),
        ndjson = %ndjson_path.display(),
        text = %text_path.display(),
        "Outputs written"
    );

    Ok(OutputFiles {
        count: records.len(),
        ndjson_path,
        text_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::VideoStats;
    use chrono::TimeZone;

    fn sample() -> VideoRecord {
        let mut record = VideoRecord::new("abc");
        record.title = "Title\nwith break".to_string();
        record.description = format!("{}\nsecond line", "x".repeat(300));
        record.channel_title = Some("Kids Channel".to_string());
        record.published_at = Some(chrono::Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap());
        record
    }

    #[test]
    fn test_summary_block() {
        let mut record = sample();
        record.duration_seconds = Some(130);
        record.stats = Some(VideoStats {
            views: Some(100),
            likes: None,
            comments: Some(2),
        });

        let block = summarize(&record);
        let lines: Vec<&str> = block.lines().collect();

        assert_eq!(lines[0], "[2024-03-09] Kids Channel - Title with break");
        assert_eq!(lines[1], "URL: https://www.youtube.com/watch?v=abc");
        assert_eq!(lines[2].len(), "Desc: ".len() + 240);
        assert_eq!(lines[3], "Info: duration=130s views=100 likes=- comments=2");
        assert_eq!(lines[4], "---");
    }

    #[test]
    fn test_summary_without_enrichment() {
        let block = summarize(&VideoRecord::new("v"));
        assert_eq!(block, "[?] ? - \nURL: https://www.youtube.com/watch?v=v\n---\n");
    }

    #[tokio::test]
    async fn test_write_outputs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let prefix = temp_dir.path().join("out").join("yt_videos");

        let files = write_outputs(&[sample(), VideoRecord::new("def")], &prefix)
            .await
            .unwrap();

        assert_eq!(files.count, 2);
        assert!(files.ndjson_path.ends_with("yt_videos.ndjson"));
        let ndjson = std::fs::read_to_string(&files.ndjson_path).unwrap();
        let lines: Vec<&str> = ndjson.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: VideoRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, sample());

        let text = std::fs::read_to_string(&files.text_path).unwrap();
        assert!(text.contains("Title with break"));
        assert_eq!(text.matches("---").count(), 2);
    }
}
