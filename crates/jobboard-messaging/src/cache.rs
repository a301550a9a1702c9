//! Last-known conversations and messages plus unconfirmed local echoes.
//!
//! Whatever a fetch returns (live or fixture) is treated as the base; pending
//! echoes are laid on top until a fetch carries their `client_message_id`.
//! An echo only ever sits in a conversation that includes its recipient.

use std::collections::{HashMap, HashSet};

use crate::model::{Conversation, EPHEMERAL_PREFIX, Message, Participant};

#[derive(Debug, Default)]
pub struct MessageCache {
    conversations: Vec<Conversation>,
    messages: HashMap<String, Vec<Message>>,
    pending: Vec<Message>,
}

impl MessageCache {
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    #[must_use]
    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.messages
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn pending(&self) -> &[Message] {
        &self.pending
    }

    #[must_use]
    pub fn has_conversations(&self) -> bool {
        !self.conversations.is_empty()
    }

    /// The cached conversation with `recipient_id`, else an ephemeral id for it.
    #[must_use]
    pub fn conversation_for(&self, local_user_id: &str, recipient_id: &str) -> String {
        self.conversations
            .iter()
            .find(|conversation| conversation.includes_counterparty(local_user_id, recipient_id))
            .map_or_else(
                || format!("{EPHEMERAL_PREFIX}{recipient_id}"),
                |conversation| conversation.id.clone(),
            )
    }

    pub fn apply_conversations(
        &mut self,
        local: &Participant,
        base: Vec<Conversation>,
    ) -> Vec<Conversation> {
        let confirmed = base
            .iter()
            .filter_map(|conversation| conversation.last_message.as_ref()?.client_message_id.clone())
            .collect::<HashSet<_>>();
        self.confirm(&confirmed);

        let mut merged = base;
        for echo in &mut self.pending {
            let home = home_for(&merged, &local.id, echo);
            if home != echo.conversation_id {
                tracing::debug!(
                    target: "jobboard.messaging",
                    from = %echo.conversation_id,
                    to = %home,
                    "local echo moved to the conversation with its recipient",
                );
                detach(&mut self.messages, echo);
                echo.conversation_id = home;
            }
        }
        for echo in &self.pending {
            overlay_echo(&mut merged, local, echo);
        }

        self.conversations.clone_from(&merged);
        merged
    }

    pub fn apply_messages(&mut self, conversation_id: &str, base: Vec<Message>) -> Vec<Message> {
        let confirmed = base
            .iter()
            .filter_map(|message| message.client_message_id.clone())
            .collect::<HashSet<_>>();
        self.confirm(&confirmed);

        let known_home = self
            .conversations
            .iter()
            .find(|conversation| conversation.id == conversation_id);
        let fits = |echo: &Message| {
            if base.is_empty() {
                return conversation_id.starts_with(EPHEMERAL_PREFIX)
                    || known_home.is_some_and(|conversation| {
                        conversation
                            .participants
                            .iter()
                            .any(|participant| participant.id == echo.recipient_id)
                    });
            }
            base.iter().any(|message| {
                message.sender_id == echo.recipient_id || message.recipient_id == echo.recipient_id
            })
        };
        let overlay = self
            .pending
            .iter()
            .filter(|echo| echo.conversation_id == conversation_id && fits(echo))
            .cloned()
            .collect::<Vec<_>>();

        let mut merged = base;
        merged.extend(overlay);
        self.messages
            .insert(conversation_id.to_string(), merged.clone());
        merged
    }

    /// Makes a locally synthesized message visible right away.
    pub fn record_echo(&mut self, local: &Participant, echo: Message) {
        overlay_echo(&mut self.conversations, local, &echo);
        self.messages
            .entry(echo.conversation_id.clone())
            .or_default()
            .push(echo.clone());
        self.pending.push(echo);
    }

    pub fn mark_read(&mut self, conversation_id: &str) {
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == conversation_id)
        {
            conversation.unread_count = 0;
            if let Some(last) = conversation.last_message.as_mut() {
                last.is_read = true;
            }
        }
        if let Some(messages) = self.messages.get_mut(conversation_id) {
            for message in messages {
                message.is_read = true;
            }
        }
        for echo in &mut self.pending {
            if echo.conversation_id == conversation_id {
                echo.is_read = true;
            }
        }
    }

    fn confirm(&mut self, confirmed: &HashSet<String>) {
        if confirmed.is_empty() || self.pending.is_empty() {
            return;
        }
        let before = self.pending.len();
        self.pending.retain(|echo| {
            echo.client_message_id
                .as_ref()
                .is_none_or(|key| !confirmed.contains(key))
        });
        let dropped = before - self.pending.len();
        if dropped > 0 {
            tracing::debug!(target: "jobboard.messaging", dropped, "local echoes confirmed by backend");
        }
    }
}

fn overlay_echo(conversations: &mut Vec<Conversation>, local: &Participant, echo: &Message) {
    if let Some(conversation) = conversations
        .iter_mut()
        .find(|conversation| conversation.id == echo.conversation_id)
    {
        if conversation.includes_counterparty(&local.id, &echo.recipient_id) {
            conversation.record_message(echo);
        }
        return;
    }
    conversations.insert(
        0,
        Conversation {
            id: echo.conversation_id.clone(),
            participants: vec![
                local.clone(),
                Participant::new(echo.recipient_id.clone(), echo.recipient_id.clone()),
            ],
            last_message: Some(echo.clone()),
            unread_count: 0,
            updated_at: echo.timestamp,
        },
    );
}

/// Where `echo` belongs in `conversations`: where it already is when that
/// conversation includes the recipient, else any conversation that does, else
/// an ephemeral one.
fn home_for(conversations: &[Conversation], local_user_id: &str, echo: &Message) -> String {
    let includes_recipient =
        |conversation: &&Conversation| conversation.includes_counterparty(local_user_id, &echo.recipient_id);
    conversations
        .iter()
        .filter(includes_recipient)
        .find(|conversation| conversation.id == echo.conversation_id)
        .or_else(|| conversations.iter().find(includes_recipient))
        .map_or_else(
            || format!("{EPHEMERAL_PREFIX}{}", echo.recipient_id),
            |conversation| conversation.id.clone(),
        )
}

fn detach(messages: &mut HashMap<String, Vec<Message>>, echo: &Message) {
    if let Some(thread) = messages.get_mut(&echo.conversation_id) {
        thread.retain(|message| message.client_message_id != echo.client_message_id);
        if thread.is_empty() {
            messages.remove(&echo.conversation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::fixtures::{self, LOCAL_USER_ID, local_participant};
    use crate::model::MessageKind;

    fn echo(conversation_id: &str, recipient_id: &str, key: &str) -> Message {
        Message {
            id: format!("local-{key}"),
            conversation_id: conversation_id.to_string(),
            sender_id: LOCAL_USER_ID.to_string(),
            recipient_id: recipient_id.to_string(),
            content: "On my way".to_string(),
            timestamp: Utc::now(),
            is_read: false,
            kind: MessageKind::Text,
            client_message_id: Some(key.to_string()),
        }
    }

    fn seeded() -> MessageCache {
        let mut cache = MessageCache::default();
        cache.apply_conversations(&local_participant(), fixtures::conversations());
        cache.apply_messages("1", fixtures::messages("1"));
        cache
    }

    #[test]
    fn echo_appends_one_unread_message_and_moves_updated_at() {
        let mut cache = seeded();
        let before = cache
            .conversations()
            .iter()
            .find(|c| c.id == "1")
            .map(|c| c.updated_at)
            .expect("fixture conversation");

        let conversation_id = cache.conversation_for(LOCAL_USER_ID, "2");
        assert_eq!(conversation_id, "1");
        cache.record_echo(&local_participant(), echo(&conversation_id, "2", "k1"));

        let messages = cache.messages("1");
        assert_eq!(messages.len(), fixtures::messages("1").len() + 1);
        assert!(!messages.last().expect("echo").is_read);
        let conversation = cache
            .conversations()
            .iter()
            .find(|c| c.id == "1")
            .expect("conversation");
        assert!(conversation.updated_at > before);
        assert_eq!(
            conversation
                .last_message
                .as_ref()
                .and_then(|m| m.client_message_id.as_deref()),
            Some("k1")
        );
    }

    #[test]
    fn unknown_recipient_gets_an_ephemeral_conversation() {
        let mut cache = seeded();
        let conversation_id = cache.conversation_for(LOCAL_USER_ID, "77");
        assert_eq!(conversation_id, "temp-77");
        cache.record_echo(&local_participant(), echo(&conversation_id, "77", "k2"));

        let first = &cache.conversations()[0];
        assert!(first.is_ephemeral());
        assert_eq!(first.counterparty(LOCAL_USER_ID).map(|p| p.id.as_str()), Some("77"));
        assert_eq!(cache.conversations().len(), fixtures::conversations().len() + 1);
    }

    #[test]
    fn refetch_does_not_duplicate_confirmed_echo() {
        let mut cache = seeded();
        cache.record_echo(&local_participant(), echo("1", "2", "k3"));

        let mut server = fixtures::messages("1");
        let mut confirmed = echo("1", "2", "k3");
        confirmed.id = "104".to_string();
        server.push(confirmed);

        let merged = cache.apply_messages("1", server);
        assert_eq!(
            merged
                .iter()
                .filter(|m| m.client_message_id.as_deref() == Some("k3"))
                .count(),
            1
        );
        assert_eq!(merged.last().map(|m| m.id.as_str()), Some("104"));
        assert!(cache.pending().is_empty());
    }

    #[test]
    fn unconfirmed_echo_survives_a_refetch() {
        let mut cache = seeded();
        cache.record_echo(&local_participant(), echo("1", "2", "k4"));
        let merged = cache.apply_messages("1", fixtures::messages("1"));
        assert_eq!(merged.len(), fixtures::messages("1").len() + 1);
        assert_eq!(cache.pending().len(), 1);
    }

    #[test]
    fn ephemeral_echo_moves_into_server_conversation_with_that_recipient() {
        let mut cache = MessageCache::default();
        cache.record_echo(&local_participant(), echo("temp-2", "2", "k5"));
        assert_eq!(cache.conversations()[0].id, "temp-2");

        let merged = cache.apply_conversations(&local_participant(), fixtures::conversations());
        assert!(merged.iter().all(|c| !c.is_ephemeral()));
        let home = merged.iter().find(|c| c.id == "1").expect("conversation");
        assert_eq!(
            home.last_message.as_ref().and_then(|m| m.client_message_id.as_deref()),
            Some("k5")
        );
        assert_eq!(cache.pending()[0].conversation_id, "1");
        assert!(cache.messages("temp-2").is_empty());
    }

    #[test]
    fn server_last_message_confirms_pending_echo() {
        let mut cache = MessageCache::default();
        cache.record_echo(&local_participant(), echo("1", "2", "k6"));

        let mut server = fixtures::conversations();
        let mut confirmed = echo("1", "2", "k6");
        confirmed.id = "104".to_string();
        confirmed.timestamp = server[1].updated_at + Duration::minutes(5);
        server[1].record_message(&confirmed);

        let merged = cache.apply_conversations(&local_participant(), server.clone());
        assert!(cache.pending().is_empty());
        assert_eq!(merged, server);
    }

    #[test]
    fn echo_leaves_a_conversation_that_lacks_its_recipient() {
        let mut cache = seeded();
        cache.record_echo(&local_participant(), echo("1", "2", "k7"));

        let mut server = fixtures::conversations();
        let reused = server
            .iter_mut()
            .find(|c| c.id == "1")
            .expect("conversation");
        reused.participants[1] = Participant::new("55", "Someone else");
        reused.last_message = None;

        let merged = cache.apply_conversations(&local_participant(), server);
        let reused = merged.iter().find(|c| c.id == "1").expect("conversation");
        assert_eq!(reused.last_message, None);
        assert_eq!(merged[0].id, "temp-2");
        assert_eq!(cache.pending()[0].conversation_id, "temp-2");
        assert!(cache.messages("1").iter().all(|m| m.client_message_id.is_none()));
    }

    #[test]
    fn echo_is_not_overlaid_on_a_thread_without_its_recipient() {
        let mut cache = MessageCache::default();
        cache.record_echo(&local_participant(), echo("1", "2", "k8"));

        let mut unrelated = fixtures::messages("3");
        for message in &mut unrelated {
            message.conversation_id = "1".to_string();
        }
        let merged = cache.apply_messages("1", unrelated.clone());
        assert_eq!(merged, unrelated);
        assert_eq!(cache.pending().len(), 1);
    }

    #[test]
    fn mark_read_clears_unread_state_locally() {
        let mut cache = seeded();
        cache.mark_read("1");
        let conversation = cache
            .conversations()
            .iter()
            .find(|c| c.id == "1")
            .expect("conversation");
        assert_eq!(conversation.unread_count, 0);
        assert!(conversation.last_message.as_ref().is_some_and(|m| m.is_read));
        assert!(cache.messages("1").iter().all(|m| m.is_read));
    }
}
