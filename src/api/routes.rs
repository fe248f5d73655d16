//! API route definitions.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::action::{ActionType, NewActionEntry, ParseActionTypeError};
use crate::templates::{NewTemplate, TemplateCategory, TemplateError, TemplatePlatform, TemplateUpdate};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/history", get(recent_history).post(record_action).delete(clear_history))
        .route("/history/stats", get(history_stats))
        .route("/history/product/{product_id}", get(product_history))
        .route("/favorites", get(list_favorites))
        .route("/favorites/top", get(most_used))
        .route("/favorites/{action}/toggle", post(toggle_favorite))
        .route("/actions/{action}/usage", post(increment_usage))
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{id}",
            get(get_template).patch(update_template).delete(delete_template),
        )
        .route("/templates/{id}/render", post(render_template))
        .route("/templates/{id}/duplicate", post(duplicate_template))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Query string or body the extractor could not decode.
    Rejected(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Rejected(status, m) => (status, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

/// `Query` whose rejection uses the `{"error": ...}` body.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

/// `Json` whose rejection uses the `{"error": ...}` body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

impl From<ParseActionTypeError> for ApiError {
    fn from(e: ParseActionTypeError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<TemplateError> for ApiError {
    fn from(e: TemplateError) -> Self {
        match e {
            TemplateError::NotFound(_) => ApiError::NotFound(e.to_string()),
            _ => ApiError::BadRequest(e.to_string()),
        }
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn parse_action(raw: &str) -> Result<ActionType, ApiError> {
    Ok(raw.parse::<ActionType>()?)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().await;
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "persistent": store.is_persistent(),
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn recent_history(State(state): State<AppState>, ApiQuery(q): ApiQuery<LimitQuery>) -> Json<Value> {
    let store = state.store.lock().await;
    let entries = store.recent_history(q.limit);
    Json(json!({ "data": entries, "meta": { "total": entries.len(), "stored": store.history_len() } }))
}

async fn record_action(
    State(state): State<AppState>,
    ApiJson(entry): ApiJson<NewActionEntry>,
) -> (StatusCode, Json<Value>) {
    let mut store = state.store.lock().await;
    let added = store.record_action(entry);
    let usage = store.usage_count(added.action_type());
    (
        StatusCode::CREATED,
        Json(json!({ "data": added, "meta": { "usageCount": usage } })),
    )
}

async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.store.lock().await.clear_history();
    StatusCode::NO_CONTENT
}

async fn history_stats(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().await;
    let by_action: BTreeMap<String, _> = store
        .count_by_action()
        .into_iter()
        .map(|(action, summary)| (action.to_string(), summary))
        .collect();
    Json(json!({
        "data": {
            "total": store.history_len(),
            "successRate": store.success_rate(None),
            "byAction": by_action,
        }
    }))
}

async fn product_history(State(state): State<AppState>, Path(product_id): Path<String>) -> Json<Value> {
    let store = state.store.lock().await;
    let entries = store.history_by_product(&product_id);
    Json(json!({
        "data": entries,
        "meta": { "total": entries.len(), "successRate": store.success_rate(Some(&product_id)) }
    }))
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

async fn list_favorites(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().await;
    let actions: Vec<Value> = ActionType::ALL
        .iter()
        .map(|&a| {
            json!({
                "id": a,
                "label": a.label(),
                "favorite": store.is_favorite(a),
                "usageCount": store.usage_count(a),
            })
        })
        .collect();
    Json(json!({ "data": actions, "meta": { "favorites": store.favorites() } }))
}

async fn most_used(State(state): State<AppState>, ApiQuery(q): ApiQuery<LimitQuery>) -> Json<Value> {
    let store = state.store.lock().await;
    let top = store.most_used(q.limit);
    Json(json!({ "data": top, "meta": { "total": top.len() } }))
}

async fn toggle_favorite(State(state): State<AppState>, Path(action): Path<String>) -> ApiResult {
    let action = parse_action(&action)?;
    let favorite = state.store.lock().await.toggle_favorite(action);
    Ok(Json(json!({ "data": { "id": action, "favorite": favorite } })))
}

async fn increment_usage(State(state): State<AppState>, Path(action): Path<String>) -> ApiResult {
    let action = parse_action(&action)?;
    let count = state.store.lock().await.increment_usage(action);
    Ok(Json(json!({ "data": { "id": action, "usageCount": count } })))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TemplateQuery {
    platform: Option<TemplatePlatform>,
    category: Option<TemplateCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest {
    #[serde(default)]
    variables: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    include_hashtags: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct DuplicateRequest {
    name: String,
}

async fn list_templates(State(state): State<AppState>, ApiQuery(q): ApiQuery<TemplateQuery>) -> Json<Value> {
    let store = state.store.lock().await;
    let templates = store.list_templates(q.platform, q.category);
    Json(json!({ "data": templates, "meta": { "total": templates.len() } }))
}

async fn create_template(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewTemplate>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = state.store.lock().await.create_template(new)?;
    Ok((StatusCode::CREATED, Json(json!({ "data": created }))))
}

async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let template = state.store.lock().await.template(&id)?;
    Ok(Json(json!({ "data": template })))
}

async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<TemplateUpdate>,
) -> ApiResult {
    let updated = state.store.lock().await.update_template(&id, update)?;
    Ok(Json(json!({ "data": updated })))
}

async fn delete_template(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    if state.store.lock().await.delete_template(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TemplateError::NotFound(id).into())
    }
}

async fn render_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RenderRequest>,
) -> ApiResult {
    let rendered = state
        .store
        .lock()
        .await
        .render_template(&id, &req.variables, req.include_hashtags)?;
    Ok(Json(json!({ "data": rendered })))
}

async fn duplicate_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DuplicateRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let copy = state.store.lock().await.duplicate_template(&id, &req.name)?;
    Ok((StatusCode::CREATED, Json(json!({ "data": copy }))))
}
