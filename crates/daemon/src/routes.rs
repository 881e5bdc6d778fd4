//! The HTTP facade: request/response mapping only.
//!
//! Every handler translates between the hook clients' wire shapes and the
//! component calls; no business logic lives here. Malformed bodies are
//! rejected by the extractors with 4xx, unknown paths 404, and store
//! trouble surfaces as a warning on `/health`.

use crate::predict;
use crate::state::{AppState, now_epoch};
use aoa_core::{IntentRecord, ProposedDomain, ToolName, is_path_token, strip_line_range};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Build the facade router
pub fn router(state: Arc<AppState>) -> axum::Router {
  axum::Router::new()
    .route("/health", get(health))
    .route("/intent", post(intent_append))
    .route("/intent/recent", get(intent_recent))
    .route("/predict", get(predict_files))
    .route("/predict/log", post(predict_log))
    .route("/predict/check", post(predict_check))
    .route("/metrics", get(metrics))
    .route("/domains/stats", get(domains_stats))
    .route("/domains/orphans", get(domains_orphans))
    .route("/domains/list", get(domains_list))
    .route("/domains/add", post(domains_add))
    .route("/domains/learned", post(domains_learned))
    .route("/domains/tune/math", post(domains_tune))
    .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
  match state.store.write_warning().await {
    Some(warning) => (StatusCode::OK, Json(serde_json::json!({ "warning": warning }))).into_response(),
    None => StatusCode::OK.into_response(),
  }
}

#[derive(Debug, Deserialize)]
struct IntentRequest {
  session_id: String,
  #[serde(default)]
  project_id: String,
  tool: String,
  #[serde(default)]
  files: Vec<String>,
  #[serde(default)]
  tags: Vec<String>,
  #[serde(default)]
  tool_use_id: Option<String>,
  #[serde(default)]
  file_sizes: HashMap<String, u64>,
  #[serde(default)]
  output_size: u64,
}

async fn intent_append(State(state): State<Arc<AppState>>, Json(body): Json<IntentRequest>) -> StatusCode {
  let now = now_epoch();
  let tool = ToolName::from(body.tool);

  let mut record = IntentRecord::new(now, body.session_id, tool);
  record.project_id = body.project_id;
  record.tool_use_id = body.tool_use_id;
  record.output_size = body.output_size;
  for file in body.files {
    record.push_file(file);
  }
  for tag in body.tags {
    record.push_tag(tag);
  }
  record.file_sizes = body
    .file_sizes
    .into_iter()
    .filter(|(token, _)| record.files.contains(token))
    .collect();

  debug!("Intent: {} with {} files", record.tool, record.files.len());

  state.store.append(record.clone()).await;

  // File-accessing tools count against outstanding predictions
  if record.tool.accesses_files() {
    for token in &record.files {
      if is_path_token(token) {
        state
          .predictions
          .check(&record.session_id, strip_line_range(token), now)
          .await;
      }
    }
  }

  state.learner.note_append(&record, &state.store, now).await;

  StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
  #[serde(default)]
  limit: Option<usize>,
  #[serde(default)]
  project_id: Option<String>,
}

async fn intent_recent(State(state): State<Arc<AppState>>, Query(query): Query<RecentQuery>) -> Json<serde_json::Value> {
  let limit = query.limit.unwrap_or(20);
  let records = state.store.recent(limit, query.project_id.as_deref()).await;
  let stats = state.store.stats().await;

  Json(serde_json::json!({
    "records": records,
    "stats": stats,
  }))
}

#[derive(Debug, Deserialize)]
struct PredictQuery {
  #[serde(default)]
  keywords: String,
  #[serde(default)]
  limit: Option<usize>,
  #[serde(default)]
  snippet_lines: Option<usize>,
}

async fn predict_files(State(state): State<Arc<AppState>>, Query(query): Query<PredictQuery>) -> Json<serde_json::Value> {
  let keywords: Vec<String> = query
    .keywords
    .split(',')
    .map(|k| k.trim().to_string())
    .filter(|k| !k.is_empty())
    .collect();

  let config = &state.config.predict;
  let limit = query.limit.unwrap_or(config.default_limit);
  let snippet_lines = query.snippet_lines.unwrap_or(config.snippet_lines);

  let files = predict::predict(&state.store, config, &keywords, limit, snippet_lines, now_epoch()).await;

  Json(serde_json::json!({ "files": files }))
}

#[derive(Debug, Deserialize)]
struct PredictLogRequest {
  session_id: String,
  #[serde(default)]
  predicted_files: Vec<String>,
  #[serde(default)]
  tags: Vec<String>,
  #[serde(default)]
  trigger_file: String,
  #[serde(default)]
  confidence: f64,
}

async fn predict_log(State(state): State<Arc<AppState>>, Json(body): Json<PredictLogRequest>) -> StatusCode {
  state
    .predictions
    .log(
      body.session_id,
      body.trigger_file,
      body.predicted_files,
      body.tags,
      body.confidence,
      now_epoch(),
    )
    .await;

  StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct PredictCheckRequest {
  session_id: String,
  #[serde(default)]
  #[allow(dead_code)]
  project_id: String,
  file: String,
}

async fn predict_check(State(state): State<Arc<AppState>>, Json(body): Json<PredictCheckRequest>) -> StatusCode {
  state.predictions.check(&body.session_id, &body.file, now_epoch()).await;
  StatusCode::NO_CONTENT
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
  let rolling = state.predictions.metrics().await;
  Json(serde_json::json!({ "rolling": rolling }))
}

#[derive(Debug, Deserialize)]
struct ProjectQuery {
  #[serde(default)]
  #[allow(dead_code)]
  project: Option<String>,
  #[serde(default)]
  limit: Option<usize>,
}

async fn domains_stats(State(state): State<Arc<AppState>>, Query(_query): Query<ProjectQuery>) -> Json<serde_json::Value> {
  let stats = state.learner.stats().await;
  Json(serde_json::to_value(stats).unwrap_or_default())
}

async fn domains_orphans(
  State(state): State<Arc<AppState>>,
  Query(query): Query<ProjectQuery>,
) -> Json<serde_json::Value> {
  let limit = query.limit.unwrap_or(20);
  let orphans: Vec<serde_json::Value> = state
    .learner
    .orphans(limit)
    .await
    .into_iter()
    .map(|(tag, count)| serde_json::json!({ "tag": tag, "count": count }))
    .collect();

  match state.learner.snapshot().await {
    Some(snapshot) => Json(serde_json::json!({ "orphans": orphans, "snapshot": snapshot })),
    None => Json(serde_json::json!({ "orphans": orphans })),
  }
}

async fn domains_list(State(state): State<Arc<AppState>>, Query(query): Query<ProjectQuery>) -> Json<serde_json::Value> {
  let limit = query.limit.unwrap_or(50);
  let domains = state.learner.list(limit).await;
  Json(serde_json::json!({ "domains": domains }))
}

#[derive(Debug, Deserialize)]
struct DomainsAddRequest {
  #[serde(default)]
  #[allow(dead_code)]
  project: String,
  domains: Vec<ProposedDomain>,
}

async fn domains_add(State(state): State<Arc<AppState>>, Json(body): Json<DomainsAddRequest>) -> Response {
  match state.learner.accept(body.domains).await {
    Ok(added) => (
      StatusCode::OK,
      Json(serde_json::json!({ "success": true, "added": added })),
    )
      .into_response(),
    Err(message) => (
      StatusCode::UNPROCESSABLE_ENTITY,
      Json(serde_json::json!({ "success": false, "error": message })),
    )
      .into_response(),
  }
}

#[derive(Debug, Deserialize)]
struct ProjectBody {
  #[serde(default)]
  #[allow(dead_code)]
  project: String,
}

async fn domains_learned(State(state): State<Arc<AppState>>, Json(_body): Json<ProjectBody>) -> StatusCode {
  state.learner.mark_learned().await;
  StatusCode::NO_CONTENT
}

async fn domains_tune(State(state): State<Arc<AppState>>, Json(_body): Json<ProjectBody>) -> Json<serde_json::Value> {
  let outcome = state.learner.tune(&state.store).await;
  Json(serde_json::to_value(outcome).unwrap_or_default())
}
