use github_rate_limit_exporter::app;
use github_rate_limit_exporter::config::{ApiSettings, Config, User};
use httpmock::{Method::GET, MockServer};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn config(api_url: String) -> Config {
    Config {
        users: vec![
            User {
                name: "alice".into(),
                token: "t1".into(),
            },
            User {
                name: "bob".into(),
                token: "t2".into(),
            },
        ],
        listen_addr: "127.0.0.1:0".into(),
        metrics_path: "/metrics".into(),
        poll_interval: 30,
        api: ApiSettings {
            api_url,
            timeout_secs: 5,
            ..ApiSettings::default()
        },
    }
}

async fn get_text(url: &str) -> (reqwest::StatusCode, Option<String>, String) {
    let res = reqwest::get(url).await.unwrap();
    let status = res.status();
    let ct = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (status, ct, res.text().await.unwrap())
}

#[tokio::test]
async fn serves_metrics_health_and_index_then_shuts_down() {
    let server = MockServer::start_async().await;
    let body = serde_json::json!({
        "resources": {
            "core": {"limit": 5000, "used": 10, "remaining": 4990, "reset": 1700000000},
            "search": {"limit": 30, "used": 0, "remaining": 30, "reset": 1700000060}
        }
    });
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(200).json_body(body.clone());
        })
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let exporter = tokio::spawn(app::serve(config(server.base_url()), listener, async move {
        let _ = stop_rx.await;
    }));

    let (status, _, text) = get_text(&format!("{}/health", base)).await;
    assert_eq!(status, 200);
    assert_eq!(text, "OK");

    let (status, _, text) = get_text(&format!("{}/", base)).await;
    assert_eq!(status, 200);
    assert!(text.contains("<a href=\"/metrics\">Metrics</a>"));

    // The warm-up pass runs right after start; wait for it to land.
    let mut metrics = String::new();
    for _ in 0..100 {
        let (status, ct, text) = get_text(&format!("{}/metrics", base)).await;
        assert_eq!(status, 200);
        assert!(ct.unwrap_or_default().starts_with("text/plain"));
        metrics = text;
        if metrics.contains("user=\"bob\"") && metrics.contains("user=\"alice\"") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(metrics.contains("github_rate_limit_core_used{user=\"alice\"} 10"));
    assert!(metrics.contains("github_rate_limit_core_remaining{user=\"alice\"} 4990"));
    assert!(metrics.contains("github_rate_limit_search_used{user=\"alice\"} 0"));
    assert!(metrics.contains("github_rate_limit_core_reset_timestamp{user=\"bob\"} 1700000000"));

    let (status, _, _) = get_text(&format!("{}/nope", base)).await;
    assert_eq!(status, 404);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(15), exporter)
        .await
        .expect("exporter did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn custom_metrics_path_and_failing_upstream() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rate_limit");
            then.status(500).body("boom");
        })
        .await;

    let mut cfg = config(server.base_url());
    cfg.metrics_path = "/prom".into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let exporter = tokio::spawn(app::serve(cfg, listener, async move {
        let _ = stop_rx.await;
    }));

    // Give the warm-up pass time to fail.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let (status, _, text) = get_text(&format!("{}/prom", base)).await;
    assert_eq!(status, 200);
    assert!(!text.contains("user=\"alice\""));

    let (status, _, _) = get_text(&format!("{}/metrics", base)).await;
    assert_eq!(status, 404);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(15), exporter)
        .await
        .expect("exporter did not stop")
        .unwrap()
        .unwrap();
}
