//! End-to-end tests for the matching pipeline.
//!
//! Each test spins up an Axum server on a random port that stands in for the
//! OpenAI, HuggingFace and Slack HTTP APIs, then runs the real pipeline
//! against it.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::post;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use task_sync::config::AppConfig;
use task_sync::pipeline::TaskSyncPipeline;
use task_sync::pipeline::runner::{
    DELIVERY_DISABLED_NOTE, DELIVERY_OK_NOTE, DELIVERY_SKIPPED_NOTE,
};

const SHIP_V1: &str =
    r#"{"Task":"Ship v1","Priority":"High","Deadline":"2024-01-01","In-Charge":"Alice"}"#;

/// Everything the fake upstream saw, plus how it should answer.
struct FakeUpstream {
    base: String,
    openai_reply: String,
    slack_ok: bool,
    openai_requests: Mutex<Vec<(Option<String>, Value)>>,
    hf_requests: Mutex<Vec<Value>>,
    slack_posts: Mutex<Vec<Value>>,
    uploads: Mutex<Vec<String>>,
    completions: Mutex<Vec<Value>>,
}

type Shared = Arc<FakeUpstream>;

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn openai_chat(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state
        .openai_requests
        .lock()
        .unwrap()
        .push((bearer(&headers), body));
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": state.openai_reply } }]
    }))
}

async fn hf_generate(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["inputs"].as_str().unwrap_or_default().to_string();
    state.hf_requests.lock().unwrap().push(body);
    Json(json!([{ "generated_text": format!("{prompt}\n\n{{\"Unmatched\": \"n/a\"}}") }]))
}

async fn slack_post(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.slack_posts.lock().unwrap().push(body);
    if state.slack_ok {
        Json(json!({ "ok": true }))
    } else {
        Json(json!({ "ok": false, "error": "not_in_channel" }))
    }
}

async fn slack_upload_url(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    assert_eq!(params.get("filename").map(String::as_str), Some("task_summary.txt"));
    Json(json!({
        "ok": true,
        "upload_url": format!("{}/upload/F123", state.base),
        "file_id": "F123",
    }))
}

async fn slack_upload(State(state): State<Shared>, body: String) -> &'static str {
    state.uploads.lock().unwrap().push(body);
    "OK"
}

async fn slack_complete(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.completions.lock().unwrap().push(body);
    Json(json!({ "ok": true }))
}

/// Start the fake upstream on a random port.
async fn start_upstream(openai_reply: &str, slack_ok: bool) -> Shared {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let state = Arc::new(FakeUpstream {
        base: format!("http://127.0.0.1:{port}"),
        openai_reply: openai_reply.to_string(),
        slack_ok,
        openai_requests: Mutex::new(Vec::new()),
        hf_requests: Mutex::new(Vec::new()),
        slack_posts: Mutex::new(Vec::new()),
        uploads: Mutex::new(Vec::new()),
        completions: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/v1/chat/completions", post(openai_chat))
        .route("/hf/model", post(hf_generate))
        .route("/api/chat.postMessage", post(slack_post))
        .route("/api/files.getUploadURLExternal", post(slack_upload_url))
        .route("/upload/F123", post(slack_upload))
        .route("/api/files.completeUploadExternal", post(slack_complete))
        .with_state(Arc::clone(&state));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    state
}

fn write_registry(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn ship_registry() -> tempfile::NamedTempFile {
    write_registry("Task,Priority,Deadline,In-Charge\nShip v1,High,2024-01-01,Alice\n")
}

/// Config pointing every backend at the fake upstream.
fn config_for(upstream: &FakeUpstream, registry: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.registry_path = registry.to_path_buf();
    config.oracle_timeout = Duration::from_secs(5);
    config.openai.api_key = Some(SecretString::from("sk-test".to_string()));
    config.openai.base_url = format!("{}/v1", upstream.base);
    config.huggingface.api_key = Some(SecretString::from("hf-test".to_string()));
    config.huggingface.endpoint = format!("{}/hf/model", upstream.base);
    config.slack.bot_token = Some(SecretString::from("xoxb-test".to_string()));
    config.slack.channel = Some("U999".to_string());
    config.slack.api_base = format!("{}/api", upstream.base);
    config
}

/// Strip the code fence the sink wraps around each posted chunk.
fn posted_text(post: &Value) -> String {
    let text = post["text"].as_str().unwrap();
    text.strip_prefix("```\n")
        .and_then(|t| t.strip_suffix("\n```"))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn matched_message_is_reported_and_delivered() {
    let upstream = start_upstream(&format!("```json\n{SHIP_V1}\n```"), true).await;
    let registry = ship_registry();
    let pipeline = TaskSyncPipeline::from_config(&config_for(&upstream, registry.path())).unwrap();

    let output = pipeline
        .run(
            r#"[{"ts":"1700000000","user":"U1","text":"Ship v1 is done"}]"#,
            "OpenAI GPT (precise)",
        )
        .await;

    let rows: Vec<&str> = output.lines().filter(|l| l.starts_with("| Ship v1")).collect();
    assert_eq!(rows, ["| Ship v1 | High | 2024-01-01 | Alice |"]);
    assert!(output.contains("**Stats**: 1 matched, 0 unmatched"));
    assert!(output.ends_with(DELIVERY_OK_NOTE));

    // The oracle saw the registry and the message, with credentials.
    let requests = upstream.openai_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4o");
    let prompt = body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("Ship v1 is done"));
    assert!(prompt.contains("\"In-Charge\": \"Alice\""));

    // Slack got the report as a message and as a file.
    let report = output
        .strip_suffix(&format!("\n\n{DELIVERY_OK_NOTE}"))
        .unwrap();
    let posts = upstream.slack_posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["channel"], "U999");
    assert_eq!(posted_text(&posts[0]), report);
    assert_eq!(*upstream.uploads.lock().unwrap(), [report.to_string()]);
    let completions = upstream.completions.lock().unwrap();
    assert_eq!(completions[0]["channel_id"], "U999");
    assert_eq!(completions[0]["files"][0]["id"], "F123");
}

#[tokio::test]
async fn huggingface_echo_is_stripped_and_message_unmatched() {
    let upstream = start_upstream(SHIP_V1, true).await;
    let registry = ship_registry();
    let pipeline = TaskSyncPipeline::from_config(&config_for(&upstream, registry.path()))
        .unwrap()
        .without_delivery();

    let output = pipeline
        .run(
            r#"[{"ts":"1700000000","user":"U2","text":"Nice weather today"}]"#,
            "HuggingFace LLM (free)",
        )
        .await;

    assert!(output.contains("## No matching tasks found"));
    assert!(output.contains("| U2 | 2023-11-14 22:13 | Nice weather today |"));
    assert!(output.contains("**Stats**: 0 matched, 1 unmatched"));
    assert!(output.ends_with(DELIVERY_DISABLED_NOTE));

    let hf = upstream.hf_requests.lock().unwrap();
    assert_eq!(hf.len(), 1);
    assert_eq!(hf[0]["parameters"]["max_new_tokens"], 1024);
    assert!(upstream.openai_requests.lock().unwrap().is_empty());
    assert!(upstream.slack_posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_oracle_key_fails_each_message_without_aborting() {
    let upstream = start_upstream(SHIP_V1, true).await;
    let registry = ship_registry();
    let mut config = config_for(&upstream, registry.path());
    config.openai.api_key = None;
    let pipeline = TaskSyncPipeline::from_config(&config).unwrap().without_delivery();

    let output = pipeline
        .run(
            r#"[{"user":"U1","text":"Ship v1 is done"},{"user":"U2","text":"also done"}]"#,
            "openai",
        )
        .await;

    let errors = output
        .lines()
        .filter(|l| l.contains("| [AI error] OpenAI API key"))
        .count();
    assert_eq!(errors, 2);
    assert!(output.contains("**Stats**: 0 matched, 2 unmatched"));
    assert!(upstream.openai_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_registry_aborts_before_any_call() {
    let upstream = start_upstream(SHIP_V1, true).await;
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("sheet.csv");
    let pipeline = TaskSyncPipeline::from_config(&config_for(&upstream, &missing)).unwrap();

    let output = pipeline
        .run(r#"[{"text":"Ship v1 is done"}]"#, "openai")
        .await;

    assert!(output.starts_with("Task registry file not found:"));
    assert!(!output.contains('\n'));
    assert!(upstream.openai_requests.lock().unwrap().is_empty());
    assert!(upstream.slack_posts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_batch_aborts() {
    let upstream = start_upstream(SHIP_V1, true).await;
    let registry = ship_registry();
    let pipeline = TaskSyncPipeline::from_config(&config_for(&upstream, registry.path())).unwrap();

    let output = pipeline.run("[{\"text\": ", "openai").await;

    assert!(output.starts_with("Invalid message batch JSON"));
    assert!(upstream.openai_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn long_report_is_split_into_several_posts() {
    let upstream = start_upstream(r#"{"Unmatched":"x"}"#, true).await;
    let registry = ship_registry();
    let mut config = config_for(&upstream, registry.path());
    config.slack.max_message_length = 200;
    let pipeline = TaskSyncPipeline::from_config(&config).unwrap();

    let batch: Vec<Value> = (0..20)
        .map(|i| {
            json!({
                "ts": "1700000000",
                "user": format!("U{i}"),
                "text": format!("chatter number {i}"),
            })
        })
        .collect();
    let output = pipeline
        .run(&serde_json::to_string(&batch).unwrap(), "openai")
        .await;

    assert!(output.contains("**Stats**: 0 matched, 20 unmatched"));
    assert!(output.ends_with(DELIVERY_OK_NOTE));

    let posts = upstream.slack_posts.lock().unwrap();
    assert!(posts.len() > 1);
    for post in posts.iter() {
        let text = posted_text(post);
        assert!(!text.is_empty());
        assert!(text.chars().count() <= 200);
    }
    assert_eq!(upstream.uploads.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn slack_rejection_is_appended_to_report() {
    let upstream = start_upstream(SHIP_V1, false).await;
    let registry = ship_registry();
    let pipeline = TaskSyncPipeline::from_config(&config_for(&upstream, registry.path())).unwrap();

    let output = pipeline
        .run(r#"[{"text":"Ship v1 is done"}]"#, "openai")
        .await;

    assert!(output.contains("| Ship v1 | High | 2024-01-01 | Alice |"));
    assert!(output.ends_with(
        "Slack delivery failed: Channel slack rejected the request: \
         chat.postMessage: not_in_channel"
    ));
    assert!(upstream.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unconfigured_slack_is_reported_as_skipped() {
    let upstream = start_upstream(SHIP_V1, true).await;
    let registry = ship_registry();
    let mut config = config_for(&upstream, registry.path());
    config.slack.bot_token = None;
    let pipeline = TaskSyncPipeline::from_config(&config).unwrap();

    let output = pipeline
        .run(r#"[{"text":"Ship v1 is done"}]"#, "openai")
        .await;

    assert!(output.ends_with(DELIVERY_SKIPPED_NOTE));
    assert!(!output.contains(DELIVERY_DISABLED_NOTE));
    assert!(upstream.slack_posts.lock().unwrap().is_empty());
}
