mod client;
mod credential;
mod refresh;
mod sign;

pub use client::{CatalogMode, FileDescriptor, McloudClient, McloudError, Session};
pub use credential::{Credential, CredentialError};
pub use refresh::{RefreshClient, RefreshError};
pub use sign::{nonce, sign, timestamp_now};
