use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use jobboard_client_core::gateway::ensure_success;
use jobboard_client_core::{ApiEndpoints, ApiRequest, ClientCore, Gateway, GatewayError};
use uuid::Uuid;

use crate::breaker::{BreakerStatus, CircuitBreaker};
use crate::cache::MessageCache;
use crate::error::MessagingError;
use crate::fixtures::{self, LOCAL_USER_NAME};
use crate::model::{
    Conversation, EPHEMERAL_PREFIX, ListEnvelope, Message, MessageKind, OutgoingMessage,
    Participant,
};
use crate::settings::{DataSourceMode, MessagingSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Accepted by the backend.
    Delivered,
    /// Shown locally only; the backend could not be reached.
    LocalEcho,
}

impl DeliveryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::LocalEcho => "local_echo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message: Message,
    pub status: DeliveryStatus,
}

pub struct MessagingService {
    gateway: Arc<Gateway>,
    endpoints: ApiEndpoints,
    settings: MessagingSettings,
    breaker: CircuitBreaker,
    cache: Mutex<MessageCache>,
}

impl MessagingService {
    pub fn new(gateway: Arc<Gateway>, endpoints: ApiEndpoints, settings: MessagingSettings) -> Self {
        let breaker = CircuitBreaker::new(settings.breaker_threshold, settings.breaker_cooldown);
        tracing::debug!(
            target: "jobboard.messaging",
            mode = settings.mode.as_str(),
            source = %settings.mode_source,
            "messaging service ready",
        );
        Self {
            gateway,
            endpoints,
            settings,
            breaker,
            cache: Mutex::new(MessageCache::default()),
        }
    }

    pub fn from_core(core: &ClientCore, settings: MessagingSettings) -> Self {
        Self::new(
            Arc::clone(&core.gateway),
            core.config.endpoints.clone(),
            settings,
        )
    }

    #[must_use]
    pub fn mode(&self) -> DataSourceMode {
        self.settings.mode
    }

    #[must_use]
    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    #[must_use]
    pub fn cached_conversations(&self) -> Vec<Conversation> {
        self.cache().conversations().to_vec()
    }

    #[must_use]
    pub fn cached_messages(&self, conversation_id: &str) -> Vec<Message> {
        self.cache().messages(conversation_id).to_vec()
    }

    #[must_use]
    pub fn pending_echoes(&self) -> usize {
        self.cache().pending().len()
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, MessagingError> {
        let fetched = self
            .live("list_conversations", self.fetch_conversations())
            .await?;
        let local = self.local_participant();
        let base = fetched.unwrap_or_else(|| fixtures::conversations_for(&local));
        Ok(self.cache().apply_conversations(&local, base))
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, MessagingError> {
        let fetched = if conversation_id.starts_with(EPHEMERAL_PREFIX) {
            Some(Vec::new())
        } else {
            self.live("list_messages", self.fetch_messages(conversation_id))
                .await?
        };
        let base = fetched.unwrap_or_else(|| {
            fixtures::messages_for(conversation_id, &self.local_participant().id)
        });
        Ok(self.cache().apply_messages(conversation_id, base))
    }

    /// True when the message is visible to the user, delivered or echoed.
    pub async fn send(
        &self,
        recipient_id: &str,
        content: &str,
        kind: Option<MessageKind>,
    ) -> Result<bool, MessagingError> {
        match self
            .send_with_receipt(recipient_id, content, kind.unwrap_or_default())
            .await
        {
            Ok(_) => Ok(true),
            Err(error @ MessagingError::Reauth(_)) => Err(error),
            Err(error) => {
                tracing::warn!(target: "jobboard.messaging", error = %error, "message not sent");
                Ok(false)
            }
        }
    }

    pub async fn send_with_receipt(
        &self,
        recipient_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<SendReceipt, MessagingError> {
        let recipient_id = recipient_id.trim();
        if recipient_id.is_empty() {
            return Err(MessagingError::EmptyRecipient);
        }
        if content.trim().is_empty() {
            return Err(MessagingError::EmptyContent);
        }
        let draft = OutgoingMessage {
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
            kind,
            client_message_id: Uuid::new_v4().to_string(),
        };

        let Some(accepted) = self.live("send", self.post_message(&draft)).await? else {
            return Ok(self.echo_locally(&draft));
        };

        let refreshed = match self
            .live("list_conversations", self.fetch_conversations())
            .await
        {
            Ok(refreshed) => refreshed,
            Err(error) => {
                tracing::warn!(target: "jobboard.messaging", error = %error, "conversation refresh after send failed");
                None
            }
        };
        let local = self.local_participant();
        if let Some(conversations) = &refreshed {
            self.cache()
                .apply_conversations(&local, conversations.clone());
        }
        // Only live conversations can name the thread the backend stored it in.
        let message = accepted.unwrap_or_else(|| {
            let conversation_id = refreshed
                .iter()
                .flatten()
                .find(|conversation| conversation.includes_counterparty(&local.id, recipient_id))
                .map_or_else(
                    || format!("{EPHEMERAL_PREFIX}{recipient_id}"),
                    |conversation| conversation.id.clone(),
                );
            synthesize(&draft, &local, conversation_id)
        });
        tracing::info!(
            target: "jobboard.messaging",
            conversation_id = %message.conversation_id,
            client_message_id = %draft.client_message_id,
            "message delivered",
        );
        Ok(SendReceipt {
            message,
            status: DeliveryStatus::Delivered,
        })
    }

    /// Clears unread state locally, then tells the backend. Backend failures
    /// other than re-authentication are logged and dropped.
    pub async fn mark_read(&self, conversation_id: &str) -> Result<(), MessagingError> {
        self.cache().mark_read(conversation_id);
        if conversation_id.starts_with(EPHEMERAL_PREFIX) {
            return Ok(());
        }
        let path = self.endpoints.conversation_mark_read(conversation_id);
        let call = async {
            let response = self.gateway.request(ApiRequest::post(path.as_str())).await?;
            ensure_success(response).map(|_| ())
        };
        match self.live("mark_read", call).await {
            Ok(_) => Ok(()),
            Err(error @ MessagingError::Reauth(_)) => Err(error),
            Err(error) => {
                tracing::warn!(
                    target: "jobboard.messaging",
                    conversation_id,
                    error = %error,
                    "mark-read not acknowledged",
                );
                Ok(())
            }
        }
    }

    /// Runs `call` when the mode and breaker allow it. `Ok(None)` means the
    /// caller should serve fixture data instead.
    async fn live<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<Option<T>, MessagingError> {
        let mode = self.settings.mode;
        if !mode.uses_network() {
            return Ok(None);
        }
        if mode.falls_back() && !self.breaker.allow() {
            tracing::debug!(target: "jobboard.messaging", operation, "breaker open; serving fixtures");
            return Ok(None);
        }

        match call.await {
            Ok(value) => {
                self.breaker.record_success();
                Ok(Some(value))
            }
            Err(error) if error.is_reauth_required() => {
                self.breaker.record_success();
                Err(MessagingError::Reauth(error))
            }
            Err(error) if mode.falls_back() => {
                self.breaker.record_failure();
                tracing::warn!(
                    target: "jobboard.messaging",
                    operation,
                    error = %error,
                    "live call failed; serving fixtures",
                );
                Ok(None)
            }
            Err(error) => Err(MessagingError::Unavailable(error)),
        }
    }

    async fn fetch_conversations(&self) -> Result<Vec<Conversation>, GatewayError> {
        self.gateway
            .get_json::<ListEnvelope<Conversation>>(&self.endpoints.conversations)
            .await
            .map(ListEnvelope::into_vec)
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, GatewayError> {
        self.gateway
            .get_json::<ListEnvelope<Message>>(&self.endpoints.conversation_messages(conversation_id))
            .await
            .map(ListEnvelope::into_vec)
    }

    /// The backend may echo the stored message; anything else is accepted as-is.
    async fn post_message(&self, draft: &OutgoingMessage) -> Result<Option<Message>, GatewayError> {
        let response = self.gateway.post(&self.endpoints.send_message, draft).await?;
        Ok(response.json::<Message>().ok())
    }

    fn echo_locally(&self, draft: &OutgoingMessage) -> SendReceipt {
        let local = self.local_participant();
        let mut cache = self.cache();
        if !cache.has_conversations() {
            cache.apply_conversations(&local, fixtures::conversations_for(&local));
        }
        let conversation_id = cache.conversation_for(&local.id, &draft.recipient_id);
        let message = synthesize(draft, &local, conversation_id);
        cache.record_echo(&local, message.clone());
        tracing::info!(
            target: "jobboard.messaging",
            conversation_id = %message.conversation_id,
            client_message_id = %draft.client_message_id,
            "backend unreachable; message echoed locally",
        );
        SendReceipt {
            message,
            status: DeliveryStatus::LocalEcho,
        }
    }

    fn local_participant(&self) -> Participant {
        self.gateway
            .tokens()
            .current_identity()
            .map_or_else(fixtures::local_participant, |identity| {
                Participant::new(identity.user_id, LOCAL_USER_NAME)
            })
    }

    fn cache(&self) -> MutexGuard<'_, MessageCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn synthesize(draft: &OutgoingMessage, local: &Participant, conversation_id: String) -> Message {
    Message {
        id: format!("local-{}", draft.client_message_id),
        conversation_id,
        sender_id: local.id.clone(),
        recipient_id: draft.recipient_id.clone(),
        content: draft.content.clone(),
        timestamp: Utc::now(),
        is_read: false,
        kind: draft.kind,
        client_message_id: Some(draft.client_message_id.clone()),
    }
}
