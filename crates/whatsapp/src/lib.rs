//! WhatsApp Integration - Twilio webhook interface
//!
//! This crate provides the inbound transport for the relay:
//! - **Events** (`events`) - Twilio form payload parsing, message service trait, dispatcher
//! - **TwiML** (`twiml`) - `<Response><Message>` reply documents
//!
//! # Architecture
//!
//! ```text
//! Twilio POST → WebhookDispatcher → MessageService → Agent Runtime
//!                     ↓
//!               TwiML reply ← text
//! ```
//!
//! The sender address (`From`, e.g. `whatsapp:+5215550001111`) is the
//! conversation identity.

pub mod events;
pub mod twiml;

pub use events::{
    parse_webhook, DispatchError, EventContext, InboundMessage, MessageService,
    TwilioWebhookForm, WebhookDispatcher, WebhookEvent, WebhookParseError,
};
pub use twiml::{MessagingResponse, TWIML_CONTENT_TYPE};
