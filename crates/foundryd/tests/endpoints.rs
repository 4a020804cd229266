//! End-to-end checks against a live listener on an ephemeral port.

use foundryd::{router, AppState};
use serde_json::{json, Value};

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(AppState::simulated()))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_post_task_is_acknowledged() {
    let base = spawn_server().await;

    let response = reqwest::Client::new()
        .post(format!("{base}/tasks/"))
        .json(&json!({"description": "Test task"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "Task received"}));
}

#[tokio::test]
async fn test_post_task_without_description_is_rejected() {
    let base = spawn_server().await;

    let response = reqwest::Client::new()
        .post(format!("{base}/tasks/"))
        .json(&json!({"title": "no description"}))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_health_reports_unconfigured_services() {
    let base = spawn_server().await;

    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["overall_status"], "healthy");
    assert_eq!(body["services"]["completion"], "not_configured");
    assert_eq!(body["unhealthy_services"], json!([]));
}

#[tokio::test]
async fn test_workflow_endpoint_runs_simulated_pipeline() {
    let base = spawn_server().await;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/workflows"))
        .json(&json!({"workflow_id": "http_wf", "require_validation": false}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["workflow_id"], "http_wf");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["agent_results"]["analyst"]["status"], "simulated");
    assert!(body["agent_results"].get("validator").is_none());
}
