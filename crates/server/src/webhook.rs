use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use relay_agent::AgentRuntime;
use relay_core::errors::InterfaceError;
use relay_whatsapp::{
    DispatchError, EventContext, InboundMessage, MessageService, TwilioWebhookForm,
    WebhookDispatcher, TWIML_CONTENT_TYPE,
};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::health;

pub const WELCOME_TEXT: &str = "¡Bienvenido! La aplicación está funcionando.";

/// Bridges the WhatsApp transport onto the agent runtime.
pub struct RelayService {
    runtime: Arc<AgentRuntime>,
}

impl RelayService {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl MessageService for RelayService {
    async fn handle_message(
        &self,
        message: &InboundMessage,
        ctx: &EventContext,
    ) -> Result<String, InterfaceError> {
        self.runtime
            .handle_message(&message.conversation_id, &message.text, &ctx.correlation_id)
            .await
            .map_err(|error| error.into_interface(ctx.correlation_id.clone()))
    }
}

#[derive(Clone)]
struct WebhookState {
    dispatcher: Arc<WebhookDispatcher<RelayService>>,
}

pub fn router(runtime: Arc<AgentRuntime>, webhook_path: &str) -> Router {
    let state = WebhookState {
        dispatcher: Arc::new(WebhookDispatcher::new(RelayService::new(runtime.clone()))),
    };

    Router::new()
        .route("/", get(home))
        .route(webhook_path, post(whatsapp_reply))
        .with_state(state)
        .merge(health::router(runtime))
        .layer(TraceLayer::new_for_http())
}

async fn home() -> &'static str {
    WELCOME_TEXT
}

async fn whatsapp_reply(
    State(state): State<WebhookState>,
    Form(form): Form<TwilioWebhookForm>,
) -> Response {
    let correlation_id = form
        .message_sid
        .clone()
        .filter(|sid| !sid.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = EventContext { correlation_id };

    match state.dispatcher.dispatch(form, &ctx).await {
        Ok(response) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)], response.to_xml())
                .into_response()
        }
        Err(DispatchError::Parse(error)) => {
            warn!(
                event_name = "ingress.whatsapp.bad_request",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "rejecting malformed webhook delivery"
            );
            (StatusCode::BAD_REQUEST, error.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use relay_agent::llm::ScriptedOracle;
    use relay_agent::prompts::FixedClock;
    use relay_agent::tools::{InMemoryCalendar, InMemorySpreadsheet};
    use relay_agent::{AgentRuntime, RuntimeDeps, RuntimeSettings};
    use relay_core::domain::session::ConversationId;
    use relay_db::{InMemorySessionRepository, SessionRepository};
    use tower::ServiceExt;

    use super::{router, WELCOME_TEXT};

    struct TestApp {
        router: Router,
        oracle: Arc<ScriptedOracle>,
        sessions: Arc<InMemorySessionRepository>,
    }

    fn app() -> TestApp {
        let oracle = Arc::new(ScriptedOracle::default());
        let sessions = Arc::new(InMemorySessionRepository::default());
        let runtime = Arc::new(AgentRuntime::new(
            RuntimeDeps {
                oracle: oracle.clone(),
                calendar: Arc::new(InMemoryCalendar::default()),
                sheets: Arc::new(InMemorySpreadsheet::default()),
                sessions: sessions.clone(),
                clock: Arc::new(FixedClock::parse("2025-03-10T09:00:00").expect("clock")),
            },
            RuntimeSettings::default(),
        ));
        TestApp { router: router(runtime, "/whatsapp"), oracle, sessions }
    }

    fn webhook(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/whatsapp")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn home_returns_welcome_text() {
        let response = app()
            .router
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, WELCOME_TEXT);
    }

    #[tokio::test]
    async fn message_is_answered_with_twiml() {
        let app = app();
        app.oracle.push_reply(r#"{"action":"other"}"#).await;
        app.oracle.push_reply(r#"{"action":"other"}"#).await;
        app.oracle.push_reply("Hola & welcome").await;

        let response = app
            .router
            .oneshot(webhook("From=whatsapp%3A%2B5215550001111&Body=+hola+&MessageSid=SM1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/xml")
        );
        let body = body_text(response).await;
        assert!(body.contains("<Response><Message>Hola &amp; welcome</Message></Response>"), "{body}");

        let session = app
            .sessions
            .get_or_create(&ConversationId("whatsapp:+5215550001111".to_string()))
            .await
            .expect("session");
        assert_eq!(session.history()[0].text, "hola");
    }

    #[tokio::test]
    async fn style_command_round_trips_through_the_webhook() {
        let app = app();

        let response = app
            .router
            .oneshot(webhook("From=whatsapp%3A%2B1&Body=configurar+estilo%3A+chistes"))
            .await
            .expect("response");

        let body = body_text(response).await;
        assert!(body.contains("<Message>Style updated to: chistes</Message>"), "{body}");
        assert_eq!(app.oracle.request_count().await, 0);
    }

    #[tokio::test]
    async fn oracle_outage_is_answered_with_the_spanish_apology() {
        let app = app();

        let response =
            app.router.oneshot(webhook("From=whatsapp%3A%2B1&Body=hola")).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(
            body.contains("<Message>Lo siento, hubo un error procesando tu solicitud.</Message>"),
            "{body}"
        );
    }

    #[tokio::test]
    async fn missing_sender_is_bad_request() {
        let response = app().router.oneshot(webhook("Body=hola")).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_body_gets_empty_response_and_no_session() {
        let app = app();

        let response =
            app.router.oneshot(webhook("From=whatsapp%3A%2B1&Body=")).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.ends_with("<Response/>"));
        assert!(app.sessions.is_empty().await);
        assert_eq!(app.oracle.request_count().await, 0);
    }

    #[tokio::test]
    async fn health_is_mounted() {
        let response = app()
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
