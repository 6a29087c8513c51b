//! JSON API over the router and the scoring workflows.
//!
//! Read endpoints always work on a fresh store snapshot. `/api/chat` never
//! fails for router-level problems: degraded replies are still `200 OK`
//! with a non-`answered` status.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use aura_agent::{workflows, CognitiveRouter, ConversationHistory, Reply};
use aura_core::analytics::{MarketInsights, PerformanceMetrics};
use aura_core::automation::{DailyBriefing, OverdueTask};
use aura_core::domain::contact::ContactId;
use aura_core::domain::deal::DealId;
use aura_core::domain::property::PropertyId;
use aura_core::errors::{ApplicationError, InterfaceError};
use aura_core::knowledge::KnowledgeBase;
use aura_core::scoring::{DealProbability, FollowUpPolicy, FollowUpTask, LeadScoreResult};
use aura_core::store::{CrmStore, StoreError};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn CrmStore>,
    pub knowledge: Arc<KnowledgeBase>,
    pub router: Arc<CognitiveRouter>,
    pub follow_up_policy: FollowUpPolicy,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: ConversationHistory,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    pub area: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactedResponse {
    pub contact_id: ContactId,
    pub contacted_at: DateTime<Utc>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/analytics/leads", get(lead_analytics))
        .route("/api/analytics/market", get(market_analytics))
        .route("/api/analytics/performance", get(performance_analytics))
        .route("/api/follow-ups", get(follow_ups))
        .route("/api/properties/{id}/buyers", get(property_buyers))
        .route("/api/deals/{id}/probability", get(deal_probability))
        .route("/api/daily-briefing", get(daily_briefing))
        .route("/api/tasks/overdue", get(overdue_tasks))
        .route("/api/contacts/{id}/contacted", post(mark_contacted))
        .with_state(state)
}

pub async fn chat(State(state): State<ApiState>, Json(request): Json<ChatRequest>) -> Json<Reply> {
    let reply = state.router.route(&request.message, &request.history).await;
    Json(reply)
}

pub async fn lead_analytics(State(state): State<ApiState>) -> ApiResult<Vec<LeadScoreResult>> {
    let leads = workflows::score_leads(state.store.as_ref(), &state.knowledge, Utc::now(), true)
        .await
        .map_err(|error| store_failure("lead_analytics", error))?;
    Ok(Json(leads))
}

pub async fn follow_ups(State(state): State<ApiState>) -> ApiResult<Vec<FollowUpTask>> {
    let due = workflows::follow_ups(state.store.as_ref(), &state.follow_up_policy, Utc::now())
        .await
        .map_err(|error| store_failure("follow_ups", error))?;
    Ok(Json(due))
}

pub async fn property_buyers(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let property = state
        .store
        .get_property(PropertyId(id))
        .await
        .map_err(|error| store_failure("property_buyers", error))?
        .ok_or_else(|| not_found(format!("property {id}")))?;
    let buyers =
        workflows::buyers_for_property(state.store.as_ref(), &state.knowledge, &property, Utc::now())
            .await
            .map_err(|error| store_failure("property_buyers", error))?;
    Ok(Json(json!({ "property": property, "buyers": buyers })))
}

pub async fn deal_probability(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<DealProbability> {
    workflows::deal_probability(state.store.as_ref(), &state.knowledge, DealId(id), Utc::now())
        .await
        .map_err(|error| store_failure("deal_probability", error))?
        .map(Json)
        .ok_or_else(|| not_found(format!("deal {id}")))
}

pub async fn daily_briefing(State(state): State<ApiState>) -> ApiResult<DailyBriefing> {
    let briefing = workflows::briefing(state.store.as_ref(), &state.follow_up_policy, Utc::now())
        .await
        .map_err(|error| store_failure("daily_briefing", error))?;
    Ok(Json(briefing))
}

pub async fn overdue_tasks(State(state): State<ApiState>) -> ApiResult<Vec<OverdueTask>> {
    let overdue = workflows::overdue(state.store.as_ref(), Utc::now())
        .await
        .map_err(|error| store_failure("overdue_tasks", error))?;
    Ok(Json(overdue))
}

pub async fn market_analytics(
    State(state): State<ApiState>,
    Query(query): Query<MarketQuery>,
) -> ApiResult<MarketInsights> {
    let insights = workflows::market(state.store.as_ref(), query.area.as_deref())
        .await
        .map_err(|error| store_failure("market_analytics", error))?;
    Ok(Json(insights))
}

pub async fn performance_analytics(State(state): State<ApiState>) -> ApiResult<PerformanceMetrics> {
    let metrics = workflows::performance(state.store.as_ref(), Utc::now())
        .await
        .map_err(|error| store_failure("performance_analytics", error))?;
    Ok(Json(metrics))
}

pub async fn mark_contacted(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<ContactedResponse> {
    let contacted_at = Utc::now();
    state
        .store
        .mark_contacted(ContactId(id), contacted_at)
        .await
        .map_err(|error| store_failure("mark_contacted", error))?;
    info!(
        event_name = "api.contact.contacted",
        contact_id = id,
        "contact marked as contacted"
    );
    Ok(Json(ContactedResponse { contact_id: ContactId(id), contacted_at }))
}

fn store_failure(endpoint: &'static str, error: StoreError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = Uuid::new_v4().to_string();
    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        endpoint,
        error = %error,
        "request failed"
    );
    interface_error(ApplicationError::from(error).into_interface(correlation_id))
}

fn not_found(what: String) -> (StatusCode, Json<ApiError>) {
    interface_error(InterfaceError::NotFound {
        message: format!("{what} does not exist"),
        correlation_id: Uuid::new_v4().to_string(),
    })
}

fn interface_error(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let detail = match &error {
        InterfaceError::BadRequest { message, .. }
        | InterfaceError::NotFound { message, .. }
        | InterfaceError::ServiceUnavailable { message, .. }
        | InterfaceError::Internal { message, .. } => message.clone(),
    };
    (
        status,
        Json(ApiError {
            error: error.user_message().to_string(),
            detail,
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}
