use std::sync::Arc;

use aura_agent::CognitiveRouter;
use aura_core::config::AppConfig;
use aura_core::knowledge::{KnowledgeBase, KnowledgeError};
use aura_core::store::CrmStore;
use aura_db::{connect, migrations, DbPool, SqlCrmStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<dyn CrmStore>,
    pub knowledge: Arc<KnowledgeBase>,
    pub router: Arc<CognitiveRouter>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("knowledge base could not be loaded: {0}")]
    Knowledge(#[from] KnowledgeError),
}

/// Connect, migrate, load the knowledge base, then build the router over the
/// SQLite store.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let knowledge = Arc::new(KnowledgeBase::load_or_default(config.knowledge.path.as_deref())?);
    info!(
        event_name = "system.bootstrap.knowledge_loaded",
        correlation_id = "bootstrap",
        source = config
            .knowledge
            .path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "built-in".to_string()),
        "knowledge base loaded"
    );

    let store: Arc<dyn CrmStore> = Arc::new(SqlCrmStore::new(db_pool.clone()));
    let router = Arc::new(CognitiveRouter::from_config(&config, store.clone(), knowledge.clone()));

    Ok(Application { config, db_pool, store, knowledge, router })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use aura_agent::{ConversationHistory, ReplyStatus, Tier};
    use aura_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options).expect("config should load")).await
    }

    fn offline_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                llm_provider: Some(LlmProvider::Offline),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_routes_offline() {
        let app = bootstrap(offline_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed offline");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('contacts', 'properties', 'deals', 'tasks')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected CRM tables after bootstrap");
        assert_eq!(table_count, 4);

        let reply = app.router.route("thanks", &ConversationHistory::new()).await;
        assert_eq!(reply.source_tier, Tier::FastPath);
        assert_eq!(reply.status, ReplyStatus::Answered);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_a_missing_knowledge_file() {
        let mut options = offline_options("sqlite::memory:");
        options.overrides.knowledge_path = Some(PathBuf::from("/nonexistent/knowledge.json"));

        let result = bootstrap(options).await;
        assert!(matches!(result, Err(BootstrapError::Knowledge(_))));
    }
}
