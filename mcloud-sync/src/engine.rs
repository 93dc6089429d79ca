use std::path::PathBuf;

use mcloud_core::{McloudClient, McloudError};
use thiserror::Error;

use crate::digest;
use crate::transfer::{self, DownloadClient, TransferError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("api error: {0}")]
    Api(#[from] McloudError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unusable remote file name {0:?}")]
    BadFileName(String),
}

/// Per-file outcomes of one mirror run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub listed: usize,
    pub up_to_date: usize,
    pub downloaded: usize,
}

pub struct SyncEngine {
    client: McloudClient,
    transfer: DownloadClient,
    target_root: PathBuf,
    create_time_utc: bool,
}

impl SyncEngine {
    pub fn new(client: McloudClient, target_root: PathBuf, create_time_utc: bool) -> Self {
        Self {
            client,
            transfer: DownloadClient::new(),
            target_root,
            create_time_utc,
        }
    }

    /// Mirrors the remote catalog once, sequentially, in enumeration order.
    ///
    /// Files whose local content already matches the remote digest are
    /// skipped; everything else is (re)downloaded and gets its access and
    /// modification time set to the remote create time. Any remote or
    /// local failure aborts the whole run; a re-run picks up where content
    /// already matches.
    pub async fn run(&self) -> Result<SyncReport, EngineError> {
        let files = self.client.list_catalog().await?;
        let mut report = SyncReport {
            listed: files.len(),
            ..SyncReport::default()
        };
        eprintln!("[mcloud-sync] {} files listed", files.len());

        for file in &files {
            let target = self.target_path(&file.name)?;

            if tokio::fs::try_exists(&target).await? {
                let local = digest::sha256_file(&target).await?;
                if local.eq_ignore_ascii_case(&file.digest) {
                    report.up_to_date += 1;
                    eprintln!("[mcloud-sync] up to date: {}", file.name);
                    continue;
                }
                eprintln!("[mcloud-sync] digest changed, refetching: {}", file.name);
            }

            let url = self.client.download_url(&file.id, &file.parent_id).await?;
            self.transfer.download_to_path(&url, &target).await?;
            if !file.create_time.is_empty() {
                let unix = transfer::parse_create_time(&file.create_time, self.create_time_utc)?;
                transfer::set_file_times(&target, unix)?;
            }
            report.downloaded += 1;
            eprintln!("[mcloud-sync] downloaded: {}", file.name);
        }

        Ok(report)
    }

    // Remote display names are plain file names; anything that would
    // escape the target root is refused.
    fn target_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(EngineError::BadFileName(name.to_string()));
        }
        Ok(self.target_root.join(name))
    }
}
