use reqwest::Client;
use thiserror::Error;
use url::Url;

use crate::credential::{Credential, CredentialError};

const DEFAULT_BASE_URL: &str = "https://aas.caiyun.feixin.10086.cn:443";
const REFRESH_PATH: &str = "/tellin/authTokenRefresh.do";
const CLIENT_TYPE: &str = "656";

/// Refresh ahead of expiry only once the credential is inside this window.
const REFRESH_AHEAD_MS: i64 = 1000 * 60 * 60 * 24 * 15;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("token refresh failed: credential has already expired")]
    Expired,
    #[error("token refresh failed: rejected by remote: {desc}")]
    Rejected { desc: String },
    #[error("token refresh failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token refresh failed: invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("token refresh failed: response is missing the <{field}> field")]
    MalformedResponse { field: &'static str },
    #[error("token refresh failed: refreshed credential is invalid: {0}")]
    Credential(#[from] CredentialError),
}

/// Client for the token refresh endpoint, which lives on its own host and
/// speaks tag-delimited text rather than the JSON envelope of the main API.
#[derive(Clone)]
pub struct RefreshClient {
    http: Client,
    base_url: Url,
}

impl RefreshClient {
    pub fn new() -> Result<Self, RefreshError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, RefreshError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Exchanges the credential for a fresh one when it is close to expiry.
    ///
    /// Returns `Ok(None)` while more than 15 days of validity remain; no
    /// network call is made in that case. An already-expired credential
    /// also skips the network: the endpoint only accepts tokens that are
    /// still valid, so this fails with [`RefreshError::Expired`] instead.
    pub async fn ensure_fresh(
        &self,
        credential: &Credential,
        now_ms: i64,
    ) -> Result<Option<Credential>, RefreshError> {
        let remaining = credential.remaining_ms(now_ms);
        if remaining > REFRESH_AHEAD_MS {
            return Ok(None);
        }
        if remaining < 0 {
            return Err(RefreshError::Expired);
        }

        let url = self.base_url.join(REFRESH_PATH)?;
        let body = format!(
            "<root><token>{}</token><account>{}</account><clienttype>{CLIENT_TYPE}</clienttype></root>",
            credential.token(),
            credential.account(),
        );
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/xml")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;

        if !text.contains("<return>0</return>") {
            let desc = extract_tag(&text, "desc").unwrap_or("unknown error");
            return Err(RefreshError::Rejected {
                desc: desc.to_string(),
            });
        }
        let token =
            extract_tag(&text, "token").ok_or(RefreshError::MalformedResponse { field: "token" })?;
        Ok(Some(credential.with_token(token)?))
    }

    /// [`Self::ensure_fresh`] against the current wall clock.
    pub async fn ensure_fresh_now(
        &self,
        credential: &Credential,
    ) -> Result<Option<Credential>, RefreshError> {
        self.ensure_fresh(credential, now_ms()).await
    }
}

fn extract_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(&body[start..end])
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tag_finds_first_occurrence() {
        let body = "<root><return>0</return><token>abc</token></root>";
        assert_eq!(extract_tag(body, "return"), Some("0"));
        assert_eq!(extract_tag(body, "token"), Some("abc"));
        assert_eq!(extract_tag(body, "desc"), None);
    }

    #[test]
    fn extract_tag_handles_unclosed_tags() {
        assert_eq!(extract_tag("<token>abc", "token"), None);
    }
}
