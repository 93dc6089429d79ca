use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

/// Component-style escaping with `! ( ) * '` additionally left bare; the
/// gateway verifies signatures against exactly this alphabet. Spaces come
/// out as `%20`, never `+`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'\'');

const NONCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NONCE_LEN: usize = 16;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Computes the `mcloud-sign` request signature.
///
/// The scheme is a legacy checksum the gateway insists on, not a security
/// boundary: the percent-encoded body is sorted character-wise, base64'd,
/// and folded through MD5 together with the timestamp/nonce pair. It must
/// be reproduced bit-for-bit or every call is rejected.
pub fn sign(body: &str, timestamp: &str, nonce: &str) -> String {
    let encoded = encode_component(body);
    let mut chars: Vec<char> = encoded.chars().collect();
    chars.sort_unstable();
    let sorted: String = chars.into_iter().collect();
    let b64 = BASE64.encode(sorted.as_bytes());

    let h1 = format!("{:x}", md5::compute(b64.as_bytes()));
    let h2 = format!("{:x}", md5::compute(format!("{timestamp}:{nonce}").as_bytes()));
    format!("{:x}", md5::compute(format!("{h1}{h2}").as_bytes())).to_uppercase()
}

/// Fresh 16-character lowercase alphanumeric nonce for one request.
pub fn nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LEN)
        .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

/// Wall-clock timestamp in the `YYYY-MM-DD HH:MM:SS` shape the gateway
/// echoes back in the signature header.
pub fn timestamp_now() -> String {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_default()
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}
