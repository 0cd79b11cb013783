use std::sync::Arc;

use relay_agent::llm::{LanguageOracle, OpenAiCompatibleOracle, OracleError};
use relay_agent::prompts::SystemClock;
use relay_agent::tools::{InMemoryCalendar, InMemorySpreadsheet};
use relay_agent::{AgentRuntime, RuntimeDeps, RuntimeSettings};
use relay_core::config::{AppConfig, ConfigError, LoadOptions, SessionStoreKind};
use relay_db::{
    connect_with_settings, migrations, DbPool, InMemorySessionRepository, SessionRepository,
    SqlSessionRepository,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: Option<DbPool>,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language oracle setup failed: {0}")]
    Oracle(#[source] OracleError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let oracle = OpenAiCompatibleOracle::from_config(&config.llm).map_err(BootstrapError::Oracle)?;
    info!(
        event_name = "system.bootstrap.oracle_ready",
        correlation_id = "bootstrap",
        provider = oracle.name(),
        model = %config.llm.model,
        endpoint = oracle.endpoint(),
        "language oracle client configured"
    );
    bootstrap_with_oracle(config, Arc::new(oracle)).await
}

pub async fn bootstrap_with_oracle(
    config: AppConfig,
    oracle: Arc<dyn LanguageOracle>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        session_store = ?config.session.store,
        "starting application bootstrap"
    );

    let (sessions, db_pool): (Arc<dyn SessionRepository>, Option<DbPool>) =
        match config.session.store {
            SessionStoreKind::Memory => (Arc::new(InMemorySessionRepository::default()), None),
            SessionStoreKind::Sqlite => {
                let pool = connect_with_settings(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.timeout_secs,
                )
                .await
                .map_err(BootstrapError::DatabaseConnect)?;
                info!(
                    event_name = "system.bootstrap.database_connected",
                    correlation_id = "bootstrap",
                    "database connection established"
                );

                migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
                info!(
                    event_name = "system.bootstrap.migrations_applied",
                    correlation_id = "bootstrap",
                    "database migrations applied"
                );
                (Arc::new(SqlSessionRepository::new(pool.clone())), Some(pool))
            }
        };

    let runtime = AgentRuntime::new(
        RuntimeDeps {
            oracle,
            calendar: Arc::new(InMemoryCalendar::default()),
            sheets: Arc::new(InMemorySpreadsheet::default()),
            sessions,
            clock: Arc::new(SystemClock),
        },
        RuntimeSettings::from_config(&config),
    );

    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        session_store = runtime.session_backend(),
        calendar = "in_memory",
        sheets = "in_memory",
        "application bootstrap complete"
    );

    Ok(Application { config, db_pool, runtime: Arc::new(runtime) })
}
