pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Resolve a file id to the platform's download path.
    async fn get_file_path(&self, file_id: &str) -> Result<String>;
    /// Download the raw bytes at a path returned by `get_file_path`.
    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>>;
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<()>;
}

/// One webhook delivery. Every field is optional so partial payloads parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<InboundMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: Option<String>,
    /// Sizes of one photo, smallest to largest.
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub id: Option<ChatId>,
}

/// Conversation key, passed back to the platform exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Int(i64),
    Str(String),
}

impl ChatId {
    fn is_empty(&self) -> bool {
        matches!(self, ChatId::Str(s) if s.is_empty())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatId::Int(id) => write!(f, "{}", id),
            ChatId::Str(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

/// What the bot has been asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Text { chat_id: ChatId, text: String },
    Photo { chat_id: ChatId, file_id: String },
}

impl Request {
    pub fn chat_id(&self) -> &ChatId {
        match self {
            Request::Text { chat_id, .. } | Request::Photo { chat_id, .. } => chat_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Text { .. } => "text",
            Request::Photo { .. } => "photo",
        }
    }
}

impl Update {
    /// Reduce the update to a request. A non-empty photo list wins over text,
    /// and the largest (last) photo size is used.
    pub fn into_request(self) -> Option<Request> {
        let message = self.message?;
        let chat_id = message.chat?.id.filter(|id| !id.is_empty())?;

        if let Some(photo) = message.photo.and_then(|sizes| sizes.into_iter().last()) {
            return Some(Request::Photo {
                chat_id,
                file_id: photo.file_id,
            });
        }

        match message.text {
            Some(text) if !text.is_empty() => Some(Request::Text { chat_id, text }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Option<Request> {
        serde_json::from_value::<Update>(value).unwrap().into_request()
    }

    #[test]
    fn test_text_message() {
        let request = parse(json!({
            "message": { "chat": { "id": 42 }, "text": "my leaves are yellow" }
        }));
        assert_eq!(
            request,
            Some(Request::Text {
                chat_id: ChatId::Int(42),
                text: "my leaves are yellow".to_string()
            })
        );
    }

    #[test]
    fn test_photo_uses_last_size() {
        let request = parse(json!({
            "message": {
                "chat": { "id": 9 },
                "photo": [{ "file_id": "a" }, { "file_id": "b" }]
            }
        }));
        assert_eq!(
            request,
            Some(Request::Photo {
                chat_id: ChatId::Int(9),
                file_id: "b".to_string()
            })
        );
    }

    #[test]
    fn test_photo_wins_over_text() {
        let request = parse(json!({
            "message": {
                "chat": { "id": 9 },
                "text": "look at me",
                "photo": [{ "file_id": "only" }]
            }
        }));
        assert_eq!(request.as_ref().map(Request::kind), Some("photo"));
    }

    #[test]
    fn test_empty_photo_list_falls_back_to_text() {
        let request = parse(json!({
            "message": { "chat": { "id": 3 }, "text": "hello", "photo": [] }
        }));
        assert_eq!(request.as_ref().map(Request::kind), Some("text"));
    }

    #[test]
    fn test_missing_chat_id_is_ignored() {
        assert!(parse(json!({ "message": { "text": "hi" } })).is_none());
        assert!(parse(json!({ "message": { "chat": {}, "text": "hi" } })).is_none());
        assert!(parse(json!({
            "message": { "photo": [{ "file_id": "a" }] }
        }))
        .is_none());
    }

    #[test]
    fn test_string_chat_id_is_kept() {
        let request = parse(json!({
            "message": { "chat": { "id": "42" }, "text": "my leaves are yellow" }
        }));
        assert_eq!(
            request,
            Some(Request::Text {
                chat_id: ChatId::Str("42".to_string()),
                text: "my leaves are yellow".to_string()
            })
        );
    }

    #[test]
    fn test_empty_string_chat_id_is_ignored() {
        assert!(parse(json!({ "message": { "chat": { "id": "" }, "text": "hi" } })).is_none());
    }

    #[test]
    fn test_chat_id_serializes_as_received() {
        assert_eq!(serde_json::to_value(ChatId::Int(42)).unwrap(), json!(42));
        assert_eq!(
            serde_json::to_value(ChatId::Str("@plants".to_string())).unwrap(),
            json!("@plants")
        );
        assert_eq!(ChatId::Int(-100123).to_string(), "-100123");
    }

    #[test]
    fn test_no_content_is_ignored() {
        assert!(parse(json!({ "message": { "chat": { "id": 7 } } })).is_none());
        assert!(parse(json!({ "message": { "chat": { "id": 7 }, "text": "" } })).is_none());
        assert!(parse(json!({ "message": { "chat": { "id": 7 }, "photo": [] } })).is_none());
    }

    #[test]
    fn test_non_message_update_is_ignored() {
        assert!(parse(json!({})).is_none());
        assert!(parse(json!({
            "update_id": 10,
            "edited_message": { "chat": { "id": 1 }, "text": "edit" }
        }))
        .is_none());
    }

    #[test]
    fn test_full_telegram_update_parses() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 1001,
            "message": {
                "message_id": 5,
                "date": 1700000000,
                "from": { "id": 77, "is_bot": false, "first_name": "Fern" },
                "chat": { "id": 77, "type": "private", "first_name": "Fern" },
                "text": "droopy"
            }
        }))
        .unwrap();
        assert_eq!(update.update_id, Some(1001));
        assert_eq!(
            update.into_request().map(|r| r.chat_id().clone()),
            Some(ChatId::Int(77))
        );
    }
}
