use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use futures_util::StreamExt;
use reqwest::Client;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{PrimitiveDateTime, UtcOffset};
use tokio::io::AsyncWriteExt;
use url::Url;

const CREATE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid create time {value:?}: {source}")]
    BadTimestamp {
        value: String,
        source: time::error::Parse,
    },
}

#[derive(Clone, Default)]
pub struct DownloadClient {
    http: Client,
}

impl DownloadClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// Streams a download URL to `target` in chunks, via a `.partial`
    /// sibling so an interrupted transfer never leaves a truncated file at
    /// the final path.
    pub async fn download_to_path(&self, href: &str, target: &Path) -> Result<(), TransferError> {
        let url = Url::parse(href)?;
        let response = self.http.get(url).send().await?.error_for_status()?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        tokio::fs::rename(partial, target).await?;
        Ok(())
    }
}

/// Parses the gateway's `YYYYMMDDHHMMSS` create time into unix seconds,
/// read as UTC or as local wall-clock time depending on configuration.
pub fn parse_create_time(value: &str, utc: bool) -> Result<i64, TransferError> {
    let parsed = PrimitiveDateTime::parse(value, CREATE_TIME_FORMAT).map_err(|source| {
        TransferError::BadTimestamp {
            value: value.to_string(),
            source,
        }
    })?;
    let offset = if utc {
        UtcOffset::UTC
    } else {
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
    };
    Ok(parsed.assume_offset(offset).unix_timestamp())
}

/// Sets both access and modification time of `target`.
pub fn set_file_times(target: &Path, unix_secs: i64) -> io::Result<()> {
    let when = if unix_secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(unix_secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(unix_secs.unsigned_abs())
    };
    let times = std::fs::FileTimes::new()
        .set_accessed(when)
        .set_modified(when);
    std::fs::OpenOptions::new()
        .write(true)
        .open(target)?
        .set_times(times)
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}
