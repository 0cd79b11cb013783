use std::sync::Arc;

use relay_core::domain::session::{Session, Style};

use crate::llm::{CompletionRequest, OracleClient};
use crate::prompts::{self, Clock};

/// What the router decided the reply should be made of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Text already produced by a structured path.
    Structured(String),
    /// A contextual chat reply over the whole history.
    FreeForm,
}

#[derive(Clone)]
pub struct ConversationResponder {
    oracle: OracleClient,
    clock: Arc<dyn Clock>,
    time_zone: String,
    chat_temperature: f32,
    max_output_tokens: u32,
}

impl ConversationResponder {
    pub fn new(
        oracle: OracleClient,
        clock: Arc<dyn Clock>,
        time_zone: impl Into<String>,
        chat_temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self { oracle, clock, time_zone: time_zone.into(), chat_temperature, max_output_tokens }
    }

    /// Produces the final reply and records it as the assistant turn.
    pub async fn respond(&self, session: &mut Session, reply: Reply) -> String {
        let text = match reply {
            Reply::Structured(text) => text,
            Reply::FreeForm => self.chat(session).await,
        };
        session.record_assistant(text.clone());
        text
    }

    async fn chat(&self, session: &Session) -> String {
        let tone = prompts::tone_instruction(
            Style::resolve(session.style()),
            self.clock.now(),
            &self.time_zone,
        );
        let request = CompletionRequest {
            messages: prompts::history_messages(tone, session.history()),
            temperature: self.chat_temperature,
            max_output_tokens: self.max_output_tokens,
        };
        self.oracle.ask(request, session.id().as_str(), "chat").await
    }
}
