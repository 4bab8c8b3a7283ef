//! Integration tests for the kairos-web server.
//!
//! These tests start a real axum server on a random port and exercise the
//! REST endpoints against a store written the way the agent writes it.

use chrono::{TimeDelta, TimeZone, Utc};
use kairos::state::{AgentStateStore, AgentStatus};
use kairos::{Decision, DecisionRecord, DecisionSource, Intent};
use kairos_web::{WebConfig, spawn_web};
use tokio_util::sync::CancellationToken;

/// Helper: spawn a test server on port 0 (random available port).
async fn spawn_test_server(capacity: usize) -> (AgentStateStore, String, CancellationToken) {
    let store = AgentStateStore::new(capacity);
    let cancel = CancellationToken::new();
    let config = WebConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
    };
    let addr = spawn_web(store.clone(), config, cancel.clone())
        .await
        .unwrap();
    (store, format!("http://{addr}"), cancel)
}

fn record(i: i64, nudge: bool) -> DecisionRecord {
    let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + TimeDelta::minutes(5 * i);
    let decision = if nudge {
        Decision::nudge(
            Intent::Unproductive,
            0.8,
            "Mostly video.",
            "Ready to get back to coding?",
            at,
        )
    } else {
        Decision::observe(Intent::Productive, 0.9, "Mostly IDE.", at)
    };
    DecisionRecord {
        decision,
        focus_context: format!("window {i}"),
        apps_observed: vec!["IDE".into()],
        source: DecisionSource::Local,
        suppressed: None,
    }
}

async fn get_json(url: String) -> serde_json::Value {
    let resp = reqwest::get(url).await.unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

// ── REST Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn state_starts_initializing() {
    let (_store, base, _cancel) = spawn_test_server(50).await;

    let json = get_json(format!("{base}/api/state")).await;
    assert_eq!(json["intent"], "unknown");
    assert_eq!(json["confidence"], 0.0);
    assert_eq!(json["focus_context"], "Initializing...");
    assert_eq!(json["status"], "initializing");
}

#[tokio::test]
async fn decision_is_pending_until_first_window() {
    let (store, base, _cancel) = spawn_test_server(50).await;

    let json = get_json(format!("{base}/api/decision")).await;
    assert_eq!(json["status"], "pending");
    assert_eq!(
        json["message"],
        "No decisions yet. The agent is still observing your first window."
    );

    store.update(record(1, true));

    let json = get_json(format!("{base}/api/decision")).await;
    assert_eq!(json["status"], "ready");
    assert_eq!(json["intent"], "unproductive");
    assert_eq!(json["action"], "nudge");
    assert_eq!(json["nudge_message"], "Ready to get back to coding?");
    assert_eq!(json["focus_context"], "window 1");
    assert_eq!(json["source"], "local");
}

#[tokio::test]
async fn state_reflects_latest_update() {
    let (store, base, _cancel) = spawn_test_server(50).await;
    store.update(record(1, false));

    let first = get_json(format!("{base}/api/state")).await;
    let second = get_json(format!("{base}/api/state")).await;
    assert_eq!(first, second);
    assert_eq!(first["intent"], "productive");
    assert_eq!(first["status"], "observing");
}

#[tokio::test]
async fn timeline_defaults_newest_first_and_caps_limit() {
    let (store, base, _cancel) = spawn_test_server(12).await;
    for i in 0..15 {
        store.update(record(i, false));
    }

    let json = get_json(format!("{base}/api/timeline")).await;
    assert_eq!(json["count"], 10);
    assert_eq!(json["capacity"], 12);
    let decisions = json["decisions"].as_array().unwrap();
    assert_eq!(decisions[0]["focus_context"], "window 14");
    assert_eq!(decisions[9]["focus_context"], "window 5");

    let json = get_json(format!("{base}/api/timeline?limit=100")).await;
    assert_eq!(json["count"], 12);

    let json = get_json(format!("{base}/api/timeline?limit=2")).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["decisions"][1]["focus_context"], "window 13");
}

#[tokio::test]
async fn stats_count_recorded_decisions() {
    let (store, base, _cancel) = spawn_test_server(50).await;
    store.update(record(0, false));
    store.update(record(1, true));

    let json = get_json(format!("{base}/api/stats")).await;
    assert_eq!(json["decisions_recorded"], 2);
    assert_eq!(json["nudges_emitted"], 1);
    assert_eq!(json["nudges_suppressed"], 0);
}

#[tokio::test]
async fn health_reports_agent_status() {
    let (store, base, _cancel) = spawn_test_server(50).await;

    let json = get_json(format!("{base}/api/health")).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["agent_status"], "initializing");

    store.set_status(AgentStatus::Stopped);
    let json = get_json(format!("{base}/api/health")).await;
    assert_eq!(json["agent_status"], "stopped");
}

#[tokio::test]
async fn routes_are_read_only() {
    let (_store, base, _cancel) = spawn_test_server(50).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/state"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let (_store, base, _cancel) = spawn_test_server(50).await;

    let resp = reqwest::Client::new()
        .get(format!("{base}/api/health"))
        .header("Origin", "http://dashboard.local")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn server_stops_on_cancel() {
    let (_store, base, cancel) = spawn_test_server(50).await;
    assert_eq!(
        reqwest::get(format!("{base}/api/health")).await.unwrap().status(),
        200
    );

    cancel.cancel();
    let mut refused = false;
    for _ in 0..50 {
        if reqwest::get(format!("{base}/api/health")).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(refused);
}
