#![allow(clippy::print_stdout)]

use anyhow::Context;
use clap::Args;
use jobboard_messaging::fixtures::LOCAL_USER_ID;
use jobboard_messaging::{Conversation, DeliveryStatus, MessageKind};
use serde_json::json;

use crate::App;

#[derive(Args)]
pub struct MessagesArgs {
    /// Conversation id
    pub conversation_id: String,
}

#[derive(Args)]
pub struct SendArgs {
    /// Recipient user id
    pub recipient: String,
    /// Message text
    pub content: String,
    /// Send as a system notice instead of a text message
    #[arg(long)]
    pub system: bool,
}

#[derive(Args)]
pub struct MarkReadArgs {
    /// Conversation id
    pub conversation_id: String,
}

fn local_user_id(app: &App) -> String {
    app.core
        .session
        .current_identity()
        .map_or_else(|| LOCAL_USER_ID.to_string(), |identity| identity.user_id)
}

fn title(conversation: &Conversation, local_user_id: &str) -> String {
    conversation
        .counterparty(local_user_id)
        .map_or_else(|| conversation.id.clone(), |participant| participant.name.clone())
}

pub async fn conversations(app: &App) -> anyhow::Result<()> {
    app.core.gateway.set_location("/messages");
    let conversations = app
        .messaging
        .list_conversations()
        .await
        .context("list conversations")?;

    if app.json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!("No conversations");
        return Ok(());
    }
    let local = local_user_id(app);
    for conversation in &conversations {
        let unread = if conversation.unread_count > 0 {
            format!("  ({} unread)", conversation.unread_count)
        } else {
            String::new()
        };
        println!(
            "[{}] {}{}  {}",
            conversation.id,
            title(conversation, &local),
            unread,
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
        );
        if let Some(last) = &conversation.last_message {
            println!("    {}", last.content);
        }
    }
    Ok(())
}

pub async fn messages(app: &App, args: MessagesArgs) -> anyhow::Result<()> {
    app.core
        .gateway
        .set_location(format!("/messages?conversation={}", args.conversation_id));
    let messages = app
        .messaging
        .list_messages(&args.conversation_id)
        .await
        .with_context(|| format!("list messages for conversation {}", args.conversation_id))?;

    if app.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("No messages");
        return Ok(());
    }
    let local = local_user_id(app);
    for message in &messages {
        let sender = if message.sender_id == local {
            "You"
        } else {
            message.sender_id.as_str()
        };
        let marker = match (message.kind, message.is_read) {
            (MessageKind::System, _) => "[system] ",
            (MessageKind::Text, false) if message.sender_id != local => "* ",
            (MessageKind::Text, _) => "",
        };
        println!(
            "{} {marker}{sender}: {}",
            message.timestamp.format("%Y-%m-%d %H:%M"),
            message.content
        );
    }
    Ok(())
}

pub async fn send(app: &App, args: SendArgs) -> anyhow::Result<()> {
    let kind = if args.system {
        MessageKind::System
    } else {
        MessageKind::Text
    };
    let receipt = app
        .messaging
        .send_with_receipt(&args.recipient, &args.content, kind)
        .await
        .context("send message")?;

    if app.json {
        let json = json!({
            "status": receipt.status.as_str(),
            "message": receipt.message,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    match receipt.status {
        DeliveryStatus::Delivered => println!(
            "Delivered to conversation {}",
            receipt.message.conversation_id
        ),
        DeliveryStatus::LocalEcho => println!(
            "Backend unreachable; message shown locally in conversation {}",
            receipt.message.conversation_id
        ),
    }
    Ok(())
}

pub async fn mark_read(app: &App, args: MarkReadArgs) -> anyhow::Result<()> {
    app.messaging
        .mark_read(&args.conversation_id)
        .await
        .with_context(|| format!("mark conversation {} read", args.conversation_id))?;
    if app.json {
        println!("{}", json!({ "conversation_id": args.conversation_id, "read": true }));
    } else {
        println!("Marked conversation {} read", args.conversation_id);
    }
    Ok(())
}
