use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("credential is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("credential must contain device, account and token fields")]
    MissingFields,
    #[error("credential token record has fewer than 4 fields")]
    MalformedToken,
    #[error("credential expiry is not a millisecond timestamp")]
    BadExpiry,
}

/// The decoded bearer credential: `device:account:token`, where the token
/// is itself a pipe-delimited record carrying an epoch-millisecond expiry
/// in its fourth field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    device: String,
    account: String,
    token: String,
    expires_at_ms: i64,
}

impl Credential {
    /// Parses the base64 form the config file and the `Authorization`
    /// header carry. Arity is validated up front so later consumers never
    /// index into a short record.
    pub fn parse(encoded: &str) -> Result<Self, CredentialError> {
        let decoded = String::from_utf8(BASE64.decode(encoded.trim())?)?;
        let mut fields = decoded.splitn(3, ':');
        let device = fields.next().ok_or(CredentialError::MissingFields)?;
        let account = fields.next().ok_or(CredentialError::MissingFields)?;
        let token = fields.next().ok_or(CredentialError::MissingFields)?;
        let expires_at_ms = token_expiry(token)?;
        Ok(Self {
            device: device.to_string(),
            account: account.to_string(),
            token: token.to_string(),
            expires_at_ms,
        })
    }

    /// Same credential with the token swapped out, as the refresh exchange
    /// produces. Device and account fields are kept verbatim.
    pub fn with_token(&self, token: &str) -> Result<Self, CredentialError> {
        let expires_at_ms = token_expiry(token)?;
        Ok(Self {
            device: self.device.clone(),
            account: self.account.clone(),
            token: token.to_string(),
            expires_at_ms,
        })
    }

    pub fn encode(&self) -> String {
        BASE64.encode(format!("{}:{}:{}", self.device, self.account, self.token))
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.expires_at_ms - now_ms
    }
}

fn token_expiry(token: &str) -> Result<i64, CredentialError> {
    let fields: Vec<&str> = token.split('|').collect();
    if fields.len() < 4 {
        return Err(CredentialError::MalformedToken);
    }
    fields[3].parse().map_err(|_| CredentialError::BadExpiry)
}
