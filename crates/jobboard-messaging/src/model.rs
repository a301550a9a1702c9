use chrono::{DateTime, Utc};
use jobboard_client_core::ids::deserialize_id;
use serde::{Deserialize, Serialize};

/// Conversations that exist only locally, created by an offline send.
pub const EPHEMERAL_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    System,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
}

impl Participant {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            is_online: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub conversation_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub sender_id: String,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub recipient_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.id.starts_with(EPHEMERAL_PREFIX)
    }

    /// First participant who is not the local user.
    #[must_use]
    pub fn counterparty(&self, local_user_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|participant| participant.id != local_user_id)
    }

    #[must_use]
    pub fn includes_counterparty(&self, local_user_id: &str, user_id: &str) -> bool {
        user_id != local_user_id
            && self
                .participants
                .iter()
                .any(|participant| participant.id == user_id)
    }

    /// Moves `last_message` forward when `message` is at least as new.
    pub fn record_message(&mut self, message: &Message) {
        let newer = self
            .last_message
            .as_ref()
            .is_none_or(|current| current.timestamp <= message.timestamp);
        if newer {
            self.last_message = Some(message.clone());
        }
        if message.timestamp > self.updated_at {
            self.updated_at = message.timestamp;
        }
    }
}

/// Body of `POST /api/messages/send/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub recipient_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub client_message_id: String,
}

/// List endpoints answer with a bare array or a paginated `{results: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope<T> {
    Bare(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> ListEnvelope<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Paged { results: items } => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_decodes_camel_case_wire_format() {
        let conversation: Conversation = serde_json::from_str(
            r#"{
                "id": 12,
                "participants": [
                    {"id": 1, "name": "You"},
                    {"id": "44", "name": "Priya Nair", "isOnline": true}
                ],
                "lastMessage": {
                    "id": 900,
                    "conversationId": 12,
                    "senderId": 44,
                    "recipientId": 1,
                    "content": "Are you free Thursday?",
                    "timestamp": "2024-05-14T09:30:00Z",
                    "isRead": false,
                    "type": "text",
                    "clientMessageId": "c-1"
                },
                "unreadCount": 2,
                "updatedAt": "2024-05-14T09:30:00Z"
            }"#,
        )
        .expect("conversation");

        assert_eq!(conversation.id, "12");
        assert_eq!(conversation.unread_count, 2);
        assert_eq!(
            conversation.counterparty("1").map(|p| p.name.as_str()),
            Some("Priya Nair")
        );
        let last = conversation.last_message.expect("last message");
        assert_eq!(last.conversation_id, "12");
        assert_eq!(last.client_message_id.as_deref(), Some("c-1"));
        assert_eq!(last.kind, MessageKind::Text);
    }

    #[test]
    fn message_defaults_kind_and_read_flag() {
        let message: Message = serde_json::from_str(
            r#"{"id":"m1","conversationId":"c1","senderId":"u1","content":"hi","timestamp":"2024-05-14T09:30:00Z"}"#,
        )
        .expect("message");
        assert_eq!(message.kind, MessageKind::Text);
        assert!(!message.is_read);
        assert_eq!(message.recipient_id, "");
    }

    #[test]
    fn outgoing_message_uses_wire_names() {
        let body = serde_json::to_value(OutgoingMessage {
            recipient_id: "44".to_string(),
            content: "Thanks!".to_string(),
            kind: MessageKind::System,
            client_message_id: "abc".to_string(),
        })
        .expect("encode");
        assert_eq!(
            body,
            serde_json::json!({
                "recipientId": "44",
                "content": "Thanks!",
                "type": "system",
                "clientMessageId": "abc"
            })
        );
    }

    #[test]
    fn list_envelope_accepts_both_shapes() {
        let bare: ListEnvelope<Participant> =
            serde_json::from_str(r#"[{"id":1,"name":"A"}]"#).expect("bare");
        let paged: ListEnvelope<Participant> =
            serde_json::from_str(r#"{"count":1,"results":[{"id":1,"name":"A"}]}"#).expect("paged");
        assert_eq!(bare.into_vec(), paged.into_vec());
    }
}
