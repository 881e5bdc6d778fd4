//! End-to-end tests for the aoa daemon facade.
//!
//! Each test drives the axum router the way the hook clients do: envelopes
//! are parsed and tagged client-side (the extract crate), then posted to
//! `/intent`; predictions and domain learning flow through the HTTP surface.

use aoa_core::{Config, DomainState, PatternLibrary};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use daemon::{AppState, DomainLearner, router};
use http_body_util::BodyExt;
use std::sync::Arc;
use store::{DomainStore, IntentStore, PredictionLog};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_state(temp: &TempDir) -> Arc<AppState> {
  let config = Config::default();
  let store = Arc::new(IntentStore::open(
    temp.path().join("intent-data.json"),
    config.store.max_records,
  ));
  let predictions = Arc::new(PredictionLog::new(&config.tracker));
  let learner = Arc::new(DomainLearner::new(
    config.learner.clone(),
    PatternLibrary::builtin(),
    DomainStore::open(DomainState::state_path(temp.path())),
  ));

  Arc::new(AppState::new(config, "proj-test", store, predictions, learner))
}

async fn request(
  state: &Arc<AppState>,
  method: &str,
  path: &str,
  body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
  let app = router(Arc::clone(state));

  let request = match body {
    Some(json) => Request::builder()
      .method(method)
      .uri(path)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => Request::builder().method(method).uri(path).body(Body::empty()).unwrap(),
  };

  let response = app.oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let value = if bytes.is_empty() {
    serde_json::Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
  };

  (status, value)
}

/// Parse an envelope the way the tool hook client does, then post it
async fn post_envelope(state: &Arc<AppState>, envelope: serde_json::Value) -> StatusCode {
  let parsed = extract::parse_envelope(&envelope);
  let library = state.learner.library().await;
  let tags = extract::infer_tags(&parsed.tool, &parsed.files, &library, parsed.search_tag.as_deref());

  let body = serde_json::json!({
    "session_id": parsed.session_id,
    "project_id": "proj-test",
    "tool": parsed.tool.as_str(),
    "files": parsed.files,
    "tags": tags,
    "tool_use_id": parsed.tool_use_id,
    "output_size": parsed.output_size,
  });

  request(state, "POST", "/intent", Some(body)).await.0
}

#[tokio::test]
async fn test_health_is_empty_200() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let (status, body) = request(&state, "GET", "/health", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, serde_json::Value::Null);
}

#[tokio::test]
async fn test_unknown_endpoint_is_404() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let (status, _) = request(&state, "GET", "/nope", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_envelope_stores_range_and_domain_tags() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let status = post_envelope(
    &state,
    serde_json::json!({
      "tool_name": "Read",
      "session_id": "s1",
      "tool_input": {"file_path": "/repo/svc/auth.py", "offset": 10, "limit": 20},
    }),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, body) = request(&state, "GET", "/intent/recent?limit=5", None).await;
  assert_eq!(status, StatusCode::OK);

  let record = &body["records"][0];
  assert_eq!(record["files"], serde_json::json!(["/repo/svc/auth.py:10-30"]));
  let tags: Vec<&str> = record["tags"].as_array().unwrap().iter().filter_map(|t| t.as_str()).collect();
  assert!(tags.contains(&"#reading"));
  assert!(tags.contains(&"#authentication"));

  assert_eq!(body["stats"]["total_records"], 1);
}

#[tokio::test]
async fn test_bash_wrapped_search_envelope() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  post_envelope(
    &state,
    serde_json::json!({
      "tool_name": "Bash",
      "session_id": "s1",
      "tool_input": {"command": "aoa grep -a user,session"},
      "tool_response": "3 hits │ 4ms",
    }),
  )
  .await;

  let (_, body) = request(&state, "GET", "/intent/recent?limit=1", None).await;
  let files = body["records"][0]["files"].as_array().unwrap();
  assert_eq!(files.len(), 1);
  assert_eq!(files[0], "cmd:aoa:multi-and:aoa grep -a user,session:3:4");

  // The cmd token is not a path and must not enter the file index
  assert_eq!(body["stats"]["unique_files"], 0);
}

#[tokio::test]
async fn test_predict_empty_below_minimum_then_confident() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let envelope = |i: u64| {
    serde_json::json!({
      "tool_name": "Read",
      "session_id": "s1",
      "tool_use_id": format!("tu_{}", i),
      "tool_input": {"file_path": "/repo/cache/lru.go"},
    })
  };

  for i in 0..4 {
    post_envelope(&state, envelope(i)).await;
  }
  let (_, body) = request(&state, "GET", "/predict?keywords=cache", None).await;
  assert_eq!(body["files"].as_array().unwrap().len(), 0, "below the minimum-data gate");

  for i in 4..10 {
    post_envelope(&state, envelope(i)).await;
  }
  let (status, body) = request(&state, "GET", "/predict?keywords=cache", None).await;
  assert_eq!(status, StatusCode::OK);

  let files = body["files"].as_array().unwrap();
  assert_eq!(files[0]["path"], "/repo/cache/lru.go");
  assert_eq!(files[0]["confidence"], 1.0);
}

#[tokio::test]
async fn test_predict_log_check_hit_idempotence() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let (status, _) = request(
    &state,
    "POST",
    "/predict/log",
    Some(serde_json::json!({
      "session_id": "s1",
      "predicted_files": ["/repo/a.py", "/repo/b.py"],
      "tags": ["#caching"],
      "trigger_file": "prompt",
      "confidence": 0.8,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let check = serde_json::json!({"session_id": "s1", "project_id": "proj-test", "file": "/repo/a.py"});
  let (status, _) = request(&state, "POST", "/predict/check", Some(check.clone())).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert_eq!(state.predictions.session_hits("s1").await, 1);

  // Replaying the same check leaves hits unchanged
  request(&state, "POST", "/predict/check", Some(check)).await;
  assert_eq!(state.predictions.session_hits("s1").await, 1);
}

#[tokio::test]
async fn test_intent_append_credits_predictions() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  request(
    &state,
    "POST",
    "/predict/log",
    Some(serde_json::json!({
      "session_id": "s1",
      "predicted_files": ["/repo/svc/auth.py"],
      "tags": [],
      "trigger_file": "prompt",
      "confidence": 0.9,
    })),
  )
  .await;

  // A Read of the predicted file (with a line range) counts as a hit
  post_envelope(
    &state,
    serde_json::json!({
      "tool_name": "Read",
      "session_id": "s1",
      "tool_input": {"file_path": "/repo/svc/auth.py", "offset": 1, "limit": 10},
    }),
  )
  .await;

  assert_eq!(state.predictions.session_hits("s1").await, 1);
}

#[tokio::test]
async fn test_metrics_calibrating_until_three_evaluated() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let (status, body) = request(&state, "GET", "/metrics", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["rolling"]["status"], "calibrating");
  assert_eq!(body["rolling"]["evaluated"], 0);

  for i in 0..3 {
    request(
      &state,
      "POST",
      "/predict/log",
      Some(serde_json::json!({
        "session_id": format!("s{}", i),
        "predicted_files": ["/repo/a.py"],
        "tags": [],
        "trigger_file": "prompt",
        "confidence": 0.5,
      })),
    )
    .await;
  }
  state.predictions.flush_all().await;

  let (_, body) = request(&state, "GET", "/metrics", None).await;
  assert_eq!(body["rolling"]["status"], "ok");
  assert_eq!(body["rolling"]["evaluated"], 3);
  assert_eq!(body["rolling"]["hit_at_5_pct"], 0.0);
}

#[tokio::test]
async fn test_learning_cycle_flag_accept_and_clear() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  // 100 appends carrying 6 distinct unmapped tags
  for i in 0..100 {
    let tag = format!("#orphan{}", i % 6);
    request(
      &state,
      "POST",
      "/intent",
      Some(serde_json::json!({
        "session_id": "s1",
        "project_id": "proj-test",
        "tool": "Read",
        "files": [format!("/repo/area{}/thing.py", i % 6)],
        "tags": ["#reading", tag],
      })),
    )
    .await;
  }

  let (_, stats) = request(&state, "GET", "/domains/stats?project=proj-test", None).await;
  assert_eq!(stats["learning_pending"], true);
  assert!(stats["orphan_count"].as_u64().unwrap() >= 5);

  // The frozen snapshot is exposed for the synthesizer
  let (_, orphans) = request(&state, "GET", "/domains/orphans?project=proj-test&limit=10", None).await;
  assert!(!orphans["orphans"].as_array().unwrap().is_empty());
  assert!(orphans["snapshot"].is_object());

  // Accept a proposed domain
  let (status, body) = request(
    &state,
    "POST",
    "/domains/add",
    Some(serde_json::json!({
      "project": "proj-test",
      "domains": [{"name": "@render", "terms": ["paint", "draw", "frame"]}],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);

  let (status, _) = request(
    &state,
    "POST",
    "/domains/learned",
    Some(serde_json::json!({"project": "proj-test"})),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, stats) = request(&state, "GET", "/domains/stats?project=proj-test", None).await;
  assert_eq!(stats["learning_pending"], false);

  let (_, list) = request(&state, "GET", "/domains/list?project=proj-test&limit=100", None).await;
  let names: Vec<&str> = list["domains"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|d| d["name"].as_str())
    .collect();
  assert!(names.contains(&"render"));
}

#[tokio::test]
async fn test_domains_add_validation_is_all_or_nothing() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let (status, body) = request(
    &state,
    "POST",
    "/domains/add",
    Some(serde_json::json!({
      "project": "proj-test",
      "domains": [
        {"name": "@render", "terms": ["paint", "draw", "frame"]},
        {"name": "@bad domain", "terms": ["aaa", "bbb", "ccc"]},
      ],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["success"], false);

  // The valid half was not applied either
  let (_, list) = request(&state, "GET", "/domains/list", None).await;
  let names: Vec<&str> = list["domains"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|d| d["name"].as_str())
    .collect();
  assert!(!names.contains(&"render"));
}

#[tokio::test]
async fn test_tune_math_prunes_broad_term() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  request(
    &state,
    "POST",
    "/domains/add",
    Some(serde_json::json!({
      "project": "proj-test",
      "domains": [{"name": "@journal", "terms": ["logbook", "ledger", "entries"]}],
    })),
  )
  .await;

  // "logbook" ends up in every record: far past the 30% match-rate
  for i in 0..10 {
    request(
      &state,
      "POST",
      "/intent",
      Some(serde_json::json!({
        "session_id": "s1",
        "project_id": "proj-test",
        "tool": "Read",
        "files": [format!("/repo/logbook/day{}.py", i)],
        "tags": ["#reading", "#journal"],
      })),
    )
    .await;
  }

  let (status, body) = request(
    &state,
    "POST",
    "/domains/tune/math",
    Some(serde_json::json!({"project": "proj-test"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
  assert!(body["terms_pruned"].as_u64().unwrap() >= 1);

  // The pruned term no longer appears among the domain's terms
  let (_, list) = request(&state, "GET", "/domains/list?limit=100", None).await;
  let journal = list["domains"]
    .as_array()
    .unwrap()
    .iter()
    .find(|d| d["name"] == "journal")
    .expect("journal domain still active");
  let terms: Vec<&str> = journal["terms"].as_array().unwrap().iter().filter_map(|t| t.as_str()).collect();
  assert!(!terms.contains(&"logbook"));
  assert!(terms.contains(&"ledger"));
}

#[tokio::test]
async fn test_malformed_intent_body_is_4xx() {
  let temp = TempDir::new().unwrap();
  let state = test_state(&temp);

  let app = router(Arc::clone(&state));
  let request = Request::builder()
    .method("POST")
    .uri("/intent")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();

  let response = app.oneshot(request).await.unwrap();
  assert!(response.status().is_client_error());
  assert_eq!(state.store.total_records().await, 0);
}
