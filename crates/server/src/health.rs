use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use relay_agent::AgentRuntime;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub session_store: HealthCheck,
    pub oracle: HealthCheck,
    pub checked_at: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { runtime })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let session_store = session_store_check(&state.runtime).await;
    let ready = session_store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "relay-server runtime initialized".to_string(),
        },
        session_store,
        oracle: HealthCheck {
            status: "configured",
            detail: format!("{} oracle client", state.runtime.oracle_name()),
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn session_store_check(runtime: &AgentRuntime) -> HealthCheck {
    let backend = runtime.session_backend();
    match runtime.check_session_store().await {
        Ok(()) => HealthCheck { status: "ready", detail: format!("{backend} session store reachable") },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("{backend} session store check failed: {error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use relay_agent::llm::ScriptedOracle;
    use relay_agent::prompts::SystemClock;
    use relay_agent::tools::{InMemoryCalendar, InMemorySpreadsheet};
    use relay_agent::{AgentRuntime, RuntimeDeps, RuntimeSettings};
    use relay_db::{
        connect_with_settings, migrations, InMemorySessionRepository, SessionRepository,
        SqlSessionRepository,
    };

    use crate::health::{health, HealthState};

    fn runtime(sessions: Arc<dyn SessionRepository>) -> Arc<AgentRuntime> {
        Arc::new(AgentRuntime::new(
            RuntimeDeps {
                oracle: Arc::new(ScriptedOracle::default()),
                calendar: Arc::new(InMemoryCalendar::default()),
                sheets: Arc::new(InMemorySpreadsheet::default()),
                sessions,
                clock: Arc::new(SystemClock),
            },
            RuntimeSettings::default(),
        ))
    }

    #[tokio::test]
    async fn health_returns_ready_for_memory_store() {
        let state = HealthState { runtime: runtime(Arc::new(InMemorySessionRepository::default())) };

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.session_store.status, "ready");
        assert!(payload.oracle.detail.contains("scripted"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_closed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let state = HealthState { runtime: runtime(Arc::new(SqlSessionRepository::new(pool.clone()))) };
        pool.close().await;

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.session_store.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
