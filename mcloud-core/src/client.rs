use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::credential::Credential;
use crate::sign;

const DEFAULT_BASE_URL: &str = "https://yun.139.com";
const QUERY_CONTENT_PATH: &str =
    "/orchestration/familyCloud-rebuild/photoContent/v1.0/queryContentInfo";
const DOWNLOAD_URL_PATH: &str =
    "/orchestration/familyCloud-rebuild/content/v1.0/getFileDownLoadURL";

const PAGE_SIZE: u64 = 100;

/// Image and video suffixes the listing call is filtered to.
const CONTENT_SUFFIX: &str = "bmp|ilbm|png|gif|jpeg|jpg|mng|ppm|AVI|MPEG|MPG|DAT|DIVX|XVID|RM|RMVB|MOV|QT|ASF|WMV|nAVI|vob|3gp|mp4|flv|AVS|MKV|ogm|ts|tp|nsv|swf|heic|HEIC|heif|HEIF|livp";

#[derive(Debug, Error)]
pub enum McloudError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("remote error: {message}")]
    Remote { message: String },
    #[error("request body serialization failed: {0}")]
    Body(#[from] serde_json::Error),
}

/// Whether the session targets a shared family catalog or a personal one;
/// selects the `x-SvcType` discriminator on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMode {
    Family,
    Personal,
}

impl CatalogMode {
    fn svc_type(self) -> &'static str {
        match self {
            CatalogMode::Family => "2",
            CatalogMode::Personal => "1",
        }
    }
}

/// Immutable per-run session bundle consumed by [`McloudClient`].
#[derive(Debug, Clone)]
pub struct Session {
    pub credential: Credential,
    pub account: String,
    pub cloud_id: String,
    pub catalog_id: String,
    pub mode: CatalogMode,
}

/// Metadata for one remote file, sufficient to compare, resolve and fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub size: u64,
    /// SHA-256 of the content as reported by the remote, hex.
    pub digest: String,
    /// `YYYYMMDDHHMMSS` creation time as reported by the remote.
    pub create_time: String,
}

#[derive(Clone)]
pub struct McloudClient {
    http: Client,
    base_url: Url,
    session: Session,
}

impl McloudClient {
    pub fn new(session: Session) -> Result<Self, McloudError> {
        Self::with_base_url(DEFAULT_BASE_URL, session)
    }

    pub fn with_base_url(base_url: &str, session: Session) -> Result<Self, McloudError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Lists every file in the session's catalog, page by page, until the
    /// remote-reported node count is exhausted.
    pub async fn list_catalog(&self) -> Result<Vec<FileDescriptor>, McloudError> {
        let mut start = 0u64;
        let mut end = PAGE_SIZE;
        let mut files = Vec::new();

        loop {
            let body = self.common_body(json!({
                "isSumnum": 1,
                "contentSuffix": CONTENT_SUFFIX,
                "contentSortType": 5,
                "sortDirection": 1,
                "startNumber": start,
                "endNumber": end,
                "catalogID": self.session.catalog_id,
            }));
            let page: QueryContentData = self.post(QUERY_CONTENT_PATH, Some(&body)).await?;
            let result = page.get_disk_result;

            files.extend(result.content_list.into_iter().map(|entry| FileDescriptor {
                id: entry.content_id,
                name: entry.content_name,
                parent_id: entry.parent_catalog_id,
                size: entry.content_size,
                digest: entry.digest,
                create_time: entry.exif.create_time,
            }));

            // Strictly greater: when the total is an exact multiple of the
            // page size this fetches one final empty page before stopping.
            if end > result.node_count {
                break;
            }
            start += PAGE_SIZE;
            end += PAGE_SIZE;
        }

        Ok(files)
    }

    /// Exchanges a file id for a time-limited direct download URL.
    pub async fn download_url(
        &self,
        content_id: &str,
        parent_id: &str,
    ) -> Result<String, McloudError> {
        let body = self.common_body(json!({
            "contentID": content_id,
            "path": format!("root:/{parent_id}/{content_id}"),
        }));
        let data: DownloadData = self.post(DOWNLOAD_URL_PATH, Some(&body)).await?;
        data.download_url.ok_or(McloudError::Remote {
            message: "response is missing downloadURL".to_string(),
        })
    }

    /// Sends one signed envelope and decodes the `{success, message, data}`
    /// wrapper. Timestamp, nonce and signature are regenerated per call;
    /// the exact signed string is what goes on the wire.
    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, McloudError> {
        let url = self.base_url.join(path)?;
        let body_text = match body {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };
        let timestamp = sign::timestamp_now();
        let nonce = sign::nonce();
        let signature = sign::sign(&body_text, &timestamp, &nonce);

        let response = self
            .http
            .post(url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Content-Type", "application/json;charset=UTF-8")
            .header("CMS-DEVICE", "default")
            .header(
                "Authorization",
                format!("Basic {}", self.session.credential.encode()),
            )
            .header("mcloud-channel", "1000101")
            .header("mcloud-client", "10701")
            .header("mcloud-sign", format!("{timestamp},{nonce},{signature}"))
            .header("mcloud-version", "7.14.0")
            .header("Origin", "https://yun.139.com")
            .header("Referer", "https://yun.139.com/w/")
            .header(
                "x-DeviceInfo",
                "||9|7.14.0|chrome|120.0.0.0|||windows 10||zh-CN|||",
            )
            .header("x-huawei-channelSrc", "10000034")
            .header("x-inner-ntwk", "2")
            .header("x-m4c-caller", "PC")
            .header("x-m4c-src", "10002")
            .header("x-SvcType", self.session.mode.svc_type())
            .header("Inner-Hcy-Router-Https", "1")
            .body(body_text)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McloudError::Api { status, body });
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.success {
            return Err(McloudError::Remote {
                message: envelope
                    .message
                    .unwrap_or_else(|| "remote call failed".to_string()),
            });
        }
        envelope.data.ok_or(McloudError::Remote {
            message: "response is missing data".to_string(),
        })
    }

    /// Account and cloud fields every orchestration call carries.
    fn common_body(&self, extra: Value) -> Value {
        let mut body = json!({
            "catalogType": 3,
            "cloudID": self.session.cloud_id,
            "cloudType": 1,
            "commonAccountInfo": {
                "account": self.session.account,
                "accountType": 1,
            },
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut body, extra) {
            base.extend(extra);
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct QueryContentData {
    #[serde(rename = "getDiskResult")]
    get_disk_result: DiskResult,
}

#[derive(Debug, Deserialize)]
struct DiskResult {
    #[serde(rename = "nodeCount")]
    node_count: u64,
    #[serde(rename = "contentList", default)]
    content_list: Vec<ContentEntry>,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    #[serde(rename = "contentID")]
    content_id: String,
    #[serde(rename = "contentName")]
    content_name: String,
    #[serde(rename = "parentCatalogId")]
    parent_catalog_id: String,
    #[serde(rename = "contentSize")]
    content_size: u64,
    digest: String,
    #[serde(default)]
    exif: Exif,
}

#[derive(Debug, Default, Deserialize)]
struct Exif {
    #[serde(rename = "createTime", default)]
    create_time: String,
}

#[derive(Debug, Deserialize)]
struct DownloadData {
    #[serde(rename = "downloadURL")]
    download_url: Option<String>,
}
