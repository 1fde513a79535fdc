//! One-shot fetch of the current screen.
//!
//! The endpoint answers with a bare, uncompressed `ScreenSync` encoding.

use bytes::Bytes;
use tracing::debug;

use pixelstrom_core::error::{Result, ViewerError};

pub async fn fetch_current_screen(
    http: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Result<Bytes> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| ViewerError::Channel(format!("bootstrap request to {url} failed: {e}")))?
        .error_for_status()
        .map_err(|e| ViewerError::Channel(format!("bootstrap request to {url} failed: {e}")))?;

    if let Some(len) = resp.content_length() {
        if len > max_bytes as u64 {
            return Err(ViewerError::Malformed(format!(
                "bootstrap body of {len} bytes exceeds max_message_bytes"
            )));
        }
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| ViewerError::Channel(format!("bootstrap body read failed: {e}")))?;
    if body.len() > max_bytes {
        return Err(ViewerError::Malformed(format!(
            "bootstrap body of {} bytes exceeds max_message_bytes",
            body.len()
        )));
    }

    debug!(bytes = body.len(), "bootstrap snapshot fetched");
    Ok(body)
}
