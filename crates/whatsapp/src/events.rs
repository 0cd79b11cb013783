use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use relay_core::domain::session::ConversationId;
use relay_core::errors::InterfaceError;

use crate::twiml::MessagingResponse;

/// Form fields Twilio posts for an inbound WhatsApp message. Only the
/// fields the relay reads are declared; the rest are ignored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct TwilioWebhookForm {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub conversation_id: ConversationId,
    pub text: String,
    pub message_sid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    Message(InboundMessage),
    /// A delivery with no text (media only, or whitespace).
    Empty { conversation_id: ConversationId },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WebhookParseError {
    #[error("webhook payload is missing the `From` field")]
    MissingSender,
}

pub fn parse_webhook(form: TwilioWebhookForm) -> Result<WebhookEvent, WebhookParseError> {
    let sender = form
        .from
        .map(|from| from.trim().to_string())
        .filter(|from| !from.is_empty())
        .ok_or(WebhookParseError::MissingSender)?;
    let conversation_id = ConversationId(sender);

    let text = form.body.unwrap_or_default().trim().to_string();
    if text.is_empty() {
        return Ok(WebhookEvent::Empty { conversation_id });
    }

    Ok(WebhookEvent::Message(InboundMessage {
        conversation_id,
        text,
        message_sid: form.message_sid.filter(|sid| !sid.trim().is_empty()),
    }))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        message: &InboundMessage,
        ctx: &EventContext,
    ) -> Result<String, InterfaceError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Parse(#[from] WebhookParseError),
}

/// Turns a webhook delivery into a TwiML response. Service failures are
/// answered with their user-safe message so the sender always gets a reply.
pub struct WebhookDispatcher<S> {
    service: S,
}

impl<S> WebhookDispatcher<S>
where
    S: MessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn dispatch(
        &self,
        form: TwilioWebhookForm,
        ctx: &EventContext,
    ) -> Result<MessagingResponse, DispatchError> {
        let message = match parse_webhook(form)? {
            WebhookEvent::Message(message) => message,
            WebhookEvent::Empty { conversation_id } => {
                info!(
                    event_name = "ingress.whatsapp.empty_body_ignored",
                    correlation_id = %ctx.correlation_id,
                    conversation_id = conversation_id.as_str(),
                    "inbound message had no text"
                );
                return Ok(MessagingResponse::empty());
            }
        };

        info!(
            event_name = "ingress.whatsapp.message_received",
            correlation_id = %ctx.correlation_id,
            conversation_id = message.conversation_id.as_str(),
            chars = message.text.chars().count(),
            "inbound whatsapp message"
        );

        match self.service.handle_message(&message, ctx).await {
            Ok(reply) => Ok(MessagingResponse::with_message(reply)),
            Err(error) => {
                warn!(
                    event_name = "ingress.whatsapp.handler_failed",
                    correlation_id = %error.correlation_id(),
                    conversation_id = message.conversation_id.as_str(),
                    error = %error,
                    "message handling failed; replying with apology"
                );
                Ok(MessagingResponse::with_message(error.user_message()))
            }
        }
    }
}
