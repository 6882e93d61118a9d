//! Streaming wire protocol.
//!
//! Every connection starts with one `init` text message. Each frame is then
//! sent as a `frame` text header immediately followed by one binary message
//! carrying the encoded image; the receiver pairs them by order.

use crate::types::Frame;
use serde::{Deserialize, Serialize};

/// Session metadata sent once per connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInit {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub surprise: Option<bool>,
    #[serde(
        rename = "productIds",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub product_ids: Option<Vec<String>>,
}

impl StreamInit {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_surprise(mut self, surprise: bool) -> Self {
        self.surprise = Some(surprise);
        self
    }

    pub fn with_product_ids(mut self, ids: Vec<String>) -> Self {
        self.product_ids = Some(ids);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub ts: i64,
    pub size: usize,
    pub mime: String,
}

impl From<&Frame> for FrameHeader {
    fn from(frame: &Frame) -> Self {
        Self {
            ts: frame.timestamp_ms,
            size: frame.size(),
            mime: frame.mime.clone(),
        }
    }
}

/// Text messages of the streaming protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Init(StreamInit),
    Frame(FrameHeader),
}

impl ControlMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_omits_unset_fields() {
        let msg = ControlMessage::Init(StreamInit::new("abc"));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "init", "sessionId": "abc"}));
    }

    #[test]
    fn test_init_with_context() {
        let init = StreamInit::new("s1")
            .with_category("sofa")
            .with_surprise(false)
            .with_product_ids(vec!["p1".into(), "p2".into()]);
        let value = serde_json::to_value(ControlMessage::Init(init)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "init",
                "sessionId": "s1",
                "category": "sofa",
                "surprise": false,
                "productIds": ["p1", "p2"]
            })
        );
    }

    #[test]
    fn test_frame_header_shape() {
        let frame = Frame::new(vec![0u8; 12], "image/webp", 1_700_000_000_123);
        let value = serde_json::to_value(ControlMessage::Frame(FrameHeader::from(&frame))).unwrap();
        assert_eq!(
            value,
            json!({"type": "frame", "ts": 1_700_000_000_123i64, "size": 12, "mime": "image/webp"})
        );
    }
}
