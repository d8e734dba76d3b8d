//! Opaque pagination tokens.
//!
//! A token is the compact JSON form of a per-mode cursor struct, encoded as
//! url-safe base64 without padding. The codec itself is generic and knows
//! nothing about the fields it carries.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CursorDecodeError;

/// Resume point for `score DESC, id DESC` scans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankedCursor {
    pub last_id: i64,
    pub last_score: f64,
}

/// Resume point for `id DESC` scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelineCursor {
    pub last_id: i64,
}

/// An unserializable cursor yields the empty token, which restarts paging.
pub fn encode<T: Serialize>(fields: &T) -> String {
    match serde_json::to_vec(fields) {
        Ok(raw) => URL_SAFE_NO_PAD.encode(raw),
        Err(e) => {
            warn!("Cursor could not be encoded: {}", e);
            String::new()
        }
    }
}

/// Never panics. Tolerates trailing `=` padding added by clients.
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T, CursorDecodeError> {
    let token = token.trim().trim_end_matches('=');
    if token.is_empty() {
        return Err(CursorDecodeError::Empty);
    }
    let raw = URL_SAFE_NO_PAD.decode(token)?;
    Ok(serde_json::from_slice(&raw)?)
}
