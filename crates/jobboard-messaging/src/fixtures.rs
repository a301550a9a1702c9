//! Built-in dataset served when the backend cannot be reached.
//!
//! Every call builds the same values from fixed timestamps, so two reads
//! always compare equal. The `_for` variants put the signed-in user in the
//! local seat; the plain ones use the anonymous local user.

use chrono::{DateTime, Duration, Utc};

use crate::model::{Conversation, Message, MessageKind, Participant};

pub const LOCAL_USER_ID: &str = "me";
pub const LOCAL_USER_NAME: &str = "You";

const EPOCH_SECS: i64 = 1_715_678_400;

fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(EPOCH_SECS, 0).unwrap_or_default() + Duration::minutes(minutes)
}

#[must_use]
pub fn local_participant() -> Participant {
    Participant::new(LOCAL_USER_ID, LOCAL_USER_NAME)
}

struct Line {
    id: &'static str,
    from_local: bool,
    content: &'static str,
    minutes: i64,
    read: bool,
    kind: MessageKind,
}

const fn incoming(id: &'static str, content: &'static str, minutes: i64, read: bool) -> Line {
    Line {
        id,
        from_local: false,
        content,
        minutes,
        read,
        kind: MessageKind::Text,
    }
}

const fn outgoing(id: &'static str, content: &'static str, minutes: i64) -> Line {
    Line {
        id,
        from_local: true,
        content,
        minutes,
        read: true,
        kind: MessageKind::Text,
    }
}

const JORDAN_LINES: &[Line] = &[
    Line {
        kind: MessageKind::System,
        ..incoming(
            "201",
            "Your application for Staff Data Engineer moved to the interview stage.",
            90,
            true,
        )
    },
    incoming("202", "Looking forward to meeting you next week.", 95, false),
    incoming("203", "Could you bring a short portfolio walkthrough?", 97, false),
];

const PRIYA_LINES: &[Line] = &[
    incoming(
        "101",
        "Hi! Thanks for applying to the Backend Engineer role at Acme Robotics.",
        0,
        true,
    ),
    outgoing("102", "Thanks for reaching out, happy to chat.", 10),
    incoming("103", "Are you free for a call on Thursday at 2pm?", 60, false),
];

const SAM_LINES: &[Line] = &[
    incoming(
        "301",
        "We received your referral for the Product Designer opening.",
        -1440,
        true,
    ),
    outgoing("302", "Great, thank you for the update.", -1430),
];

struct Thread {
    id: &'static str,
    counterparty: Participant,
    lines: &'static [Line],
}

fn threads() -> Vec<Thread> {
    vec![
        Thread {
            id: "2",
            counterparty: Participant {
                is_online: Some(true),
                ..Participant::new("3", "Jordan Lee")
            },
            lines: JORDAN_LINES,
        },
        Thread {
            id: "1",
            counterparty: Participant {
                avatar: Some("https://avatars.jobboard.test/priya.png".to_string()),
                is_online: Some(false),
                ..Participant::new("2", "Priya Nair")
            },
            lines: PRIYA_LINES,
        },
        Thread {
            id: "3",
            counterparty: Participant::new("4", "Sam Ortiz"),
            lines: SAM_LINES,
        },
    ]
}

fn thread_messages(thread: &Thread, local_id: &str) -> Vec<Message> {
    let counterparty = thread.counterparty.id.as_str();
    thread
        .lines
        .iter()
        .map(|line| {
            let (sender_id, recipient_id) = if line.from_local {
                (local_id, counterparty)
            } else {
                (counterparty, local_id)
            };
            Message {
                id: line.id.to_string(),
                conversation_id: thread.id.to_string(),
                sender_id: sender_id.to_string(),
                recipient_id: recipient_id.to_string(),
                content: line.content.to_string(),
                timestamp: at(line.minutes),
                is_read: line.read,
                kind: line.kind,
                client_message_id: None,
            }
        })
        .collect()
}

/// Conversations ordered by most recent activity.
#[must_use]
pub fn conversations() -> Vec<Conversation> {
    conversations_for(&local_participant())
}

#[must_use]
pub fn conversations_for(local: &Participant) -> Vec<Conversation> {
    threads()
        .into_iter()
        .map(|thread| {
            let messages = thread_messages(&thread, &local.id);
            let last_message = messages.last().cloned();
            let unread_count = messages
                .iter()
                .filter(|message| !message.is_read && message.sender_id != local.id)
                .count();
            Conversation {
                id: thread.id.to_string(),
                participants: vec![local.clone(), thread.counterparty],
                updated_at: last_message
                    .as_ref()
                    .map_or_else(|| at(0), |message| message.timestamp),
                last_message,
                unread_count: u32::try_from(unread_count).unwrap_or(u32::MAX),
            }
        })
        .collect()
}

/// Messages for a fixture conversation, oldest first; empty for unknown ids.
#[must_use]
pub fn messages(conversation_id: &str) -> Vec<Message> {
    messages_for(conversation_id, LOCAL_USER_ID)
}

#[must_use]
pub fn messages_for(conversation_id: &str, local_id: &str) -> Vec<Message> {
    threads()
        .iter()
        .find(|thread| thread.id == conversation_id)
        .map(|thread| thread_messages(thread, local_id))
        .unwrap_or_default()
}
