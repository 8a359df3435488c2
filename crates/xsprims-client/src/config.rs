use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request id stamped on every request. Only one request is ever in flight,
/// so any fixed value works; this is the one xenstore firmware clients use.
pub const DEFAULT_REQUEST_ID: u32 = 222;

/// Controls client behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request id stamped on every request.
    pub request_id: u32,
    /// How long a single wait on the event channel may last.
    ///
    /// `None` blocks until the host answers, however long that takes.
    pub wait_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_id: DEFAULT_REQUEST_ID,
            wait_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blocks_forever() {
        let config = ClientConfig::default();
        assert_eq!(config.request_id, DEFAULT_REQUEST_ID);
        assert_eq!(config.wait_timeout, None);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"request_id": 7}"#).unwrap();
        assert_eq!(config.request_id, 7);
        assert_eq!(config.wait_timeout, None);
    }

    #[test]
    fn json_roundtrip() {
        let config = ClientConfig {
            request_id: 1,
            wait_timeout: Some(Duration::from_millis(1500)),
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: ClientConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
