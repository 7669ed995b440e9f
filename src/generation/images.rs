use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::storage::StorageClient;

const KEY_PREFIX: &str = "recipes";
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

lazy_static! {
    static ref DATA_URL_RE: Regex = Regex::new(r"(?s)^data:([^\r\n]+);base64,(.*)$").unwrap();
}

pub struct DataUrl<'a> {
    pub mime: &'a str,
    pub payload: &'a str,
}

pub fn parse_data_url(s: &str) -> Option<DataUrl<'_>> {
    let caps = DATA_URL_RE.captures(s)?;
    Some(DataUrl {
        mime: caps.get(1)?.as_str(),
        payload: caps.get(2)?.as_str(),
    })
}

/// `image/svg+xml` -> `svg`; `png` when there is no subtype.
pub fn ext_from_mime(mime: &str) -> &str {
    let subtype = mime.split('/').nth(1).unwrap_or("");
    match subtype.split('+').next() {
        Some(ext) if !ext.is_empty() => ext,
        _ => "png",
    }
}

fn object_key(ext: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{KEY_PREFIX}/{millis}-{suffix}.{ext}")
}

/// Resolves the image reference for a generated recipe.
///
/// Data URLs are decoded and uploaded; anything else is taken as an already
/// hosted URL. Failures are logged and yield `None`.
pub async fn ingest_image(storage: &dyn StorageClient, image_data: Option<&str>) -> Option<String> {
    let image_data = image_data.map(str::trim).filter(|s| !s.is_empty())?;

    let Some(data_url) = parse_data_url(image_data) else {
        return Some(image_data.to_string());
    };

    // MIME-wrapped payloads carry line breaks
    let payload: String = data_url.payload.split_whitespace().collect();
    let bytes = match STANDARD.decode(payload) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, mime = data_url.mime, "image payload is not valid base64");
            return None;
        }
    };

    let key = object_key(ext_from_mime(data_url.mime));
    let size = bytes.len();
    match storage.put_object(&key, Bytes::from(bytes), data_url.mime).await {
        Ok(()) => {
            info!(%key, size, "uploaded recipe image");
            Some(storage.public_url(&key))
        }
        Err(e) => {
            error!(error = %e, %key, "storage upload error");
            None
        }
    }
}
