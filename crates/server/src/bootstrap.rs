use std::sync::Arc;

use opsdesk_agent::{client_from_config, LlmClient, LlmQualifier};
use opsdesk_core::config::{AppConfig, LlmProvider};
use opsdesk_core::outreach::{KeywordQualifier, Qualifier};
use opsdesk_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client could not be built: {0}")]
    Llm(String),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");

    let db_pool = connect_with_settings(
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

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let llm: Arc<dyn LlmClient> = client_from_config(&config.llm)
        .map_err(|error| BootstrapError::Llm(format!("{error:#}")))?
        .into();
    let qualifier: Arc<dyn Qualifier> = match config.llm.provider {
        LlmProvider::Offline => Arc::new(KeywordQualifier::default()),
        LlmProvider::Gemini => Arc::new(LlmQualifier::new(llm.clone())),
    };
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "language model client ready"
    );

    let state = AppState::new(config.clone(), &db_pool, llm, qualifier);
    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use opsdesk_core::config::{AppConfig, LlmProvider};

    use crate::bootstrap::bootstrap_with_config;

    #[tokio::test]
    async fn offline_bootstrap_migrates_schema() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config.llm.provider = LlmProvider::Offline;

        let app = bootstrap_with_config(config).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('product', 'orders', 'staff', 'supplier', 'lead')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 5);

        let status = app.state.sequencer.lock().await.status();
        assert_eq!(status.leads_loaded, 0);
        app.db_pool.close().await;
    }
}
