use serde::Serialize;

use crate::error::{ClientError, Result};

/// A fired watch: the path that changed and the token it was registered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchEvent {
    pub path: String,
    pub token: String,
}

impl WatchEvent {
    /// Parse a `path\0token\0` watch-event payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut fields = payload.split(|b| *b == 0);
        let path = fields.next().unwrap_or_default();
        let token = fields.next().ok_or_else(|| {
            ClientError::MalformedReply(format!(
                "watch event without token ({} bytes)",
                payload.len()
            ))
        })?;

        Ok(Self {
            path: std::str::from_utf8(path)?.to_string(),
            token: std::str::from_utf8(token)?.to_string(),
        })
    }
}
