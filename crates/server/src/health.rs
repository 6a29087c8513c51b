use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use aura_core::config::LlmProvider;
use aura_db::DbPool;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    llm_provider: LlmProvider,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub language_model: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, llm_provider: LlmProvider) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, llm_provider })
}

/// Readiness follows the database only. An offline language model is a
/// supported mode, reported but never degrading.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        language_model: language_model_check(state.llm_provider),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts").fetch_one(pool).await {
        Ok(contacts) => HealthCheck {
            status: "ready",
            detail: format!("database reachable, {contacts} contacts"),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn language_model_check(provider: LlmProvider) -> HealthCheck {
    let detail = match provider {
        LlmProvider::Offline => "offline: keyword classification, no text generation".to_string(),
        other => format!("{} configured", other.as_str()),
    };
    HealthCheck { status: "ready", detail }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use aura_core::config::LlmProvider;
    use aura_db::{connect_with_settings, migrations};
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            llm_provider: LlmProvider::Offline,
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.detail, "database reachable, 0 contacts");
        assert!(payload.language_model.detail.starts_with("offline"));

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, llm_provider: LlmProvider::Gemini })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.language_model.detail, "gemini configured");
    }

    #[tokio::test]
    async fn health_route_is_mounted() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let response = router(pool, LlmProvider::Offline)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
