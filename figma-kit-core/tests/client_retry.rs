use figma_kit_core::client::FigmaClient;
use figma_kit_core::config::{ClientConfig, RetryPolicy};
use figma_kit_core::contract::{FigmaApi, HttpResponse, ImageFormat, MockTransport};
use figma_kit_core::enrich::{enrich_nodes_response, ComponentTable};
use figma_kit_core::tokens::VariableLookup;
use figma_kit_core::FigmaError;
use mockall::predicate::*;
use mockall::Sequence;
use std::time::Duration;
use tokio::time::Instant;

fn config() -> ClientConfig {
    ClientConfig::new("figd_test").unwrap()
}

fn rate_limited(retry_after: Option<u64>) -> HttpResponse {
    HttpResponse {
        status: 429,
        retry_after: retry_after.map(Duration::from_secs),
        body: String::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limit_twice_then_success_honours_retry_after() {
    let mut transport = MockTransport::new();
    let mut seq = Sequence::new();
    transport
        .expect_get()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(rate_limited(Some(2))));
    transport
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(HttpResponse::ok(r#"{"meta": {"styles": []}}"#)));

    let client = FigmaClient::with_transport(config(), transport);
    let start = Instant::now();
    let styles = client.fetch_styles("KEY").await.unwrap();

    assert_eq!(styles["meta"]["styles"], serde_json::json!([]));
    assert!(start.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn missing_retry_after_uses_the_default_wait() {
    let mut transport = MockTransport::new();
    let mut seq = Sequence::new();
    transport
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(rate_limited(None)));
    transport
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(HttpResponse::ok("{}")));

    let client = FigmaClient::with_transport(config(), transport);
    let start = Instant::now();
    client.fetch_components("KEY").await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_gives_up_after_max_attempts() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .times(3)
        .returning(|_, _| Ok(rate_limited(Some(1))));

    let client = FigmaClient::with_transport(config(), transport);
    let err = client.fetch_styles("KEY").await.unwrap_err();

    assert!(err.is_transient());
    match err {
        FigmaError::RateLimited { attempts, url } => {
            assert_eq!(attempts, 3);
            assert!(url.ends_with("/files/KEY/styles"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_retried_with_the_configured_delay() {
    let mut transport = MockTransport::new();
    let mut seq = Sequence::new();
    transport
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(HttpResponse::status(502)));
    transport
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(HttpResponse::ok(r#"{"name": "File"}"#)));

    let retry = RetryPolicy {
        server_error_delay: Duration::from_millis(250),
        ..RetryPolicy::default()
    };
    let client = FigmaClient::with_transport(config().with_retry(retry), transport);
    let start = Instant::now();
    let file = client.fetch_file("KEY", None).await.unwrap();

    assert_eq!(file["name"], "File");
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn persistent_server_errors_escalate() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .times(3)
        .returning(|_, _| Ok(HttpResponse::status(500)));

    let client = FigmaClient::with_transport(config(), transport);
    let err = client.fetch_file("KEY", None).await.unwrap_err();
    assert!(matches!(err, FigmaError::Server { status: 500, attempts: 3, .. }));
}

#[tokio::test]
async fn not_found_is_fatal_without_retry() {
    let mut transport = MockTransport::new();
    transport.expect_get().times(1).returning(|_, _| {
        Ok(HttpResponse {
            status: 404,
            retry_after: None,
            body: r#"{"status":404,"err":"Not found"}"#.to_string(),
        })
    });

    let client = FigmaClient::with_transport(config(), transport);
    let err = client
        .fetch_nodes("KEY", &["1:2".to_string()], None)
        .await
        .unwrap_err();
    match err {
        FigmaError::Http { status, body, .. } => {
            assert_eq!(status, 404);
            assert!(body.contains("Not found"));
        }
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_variables_are_a_soft_none() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .times(1)
        .returning(|_, _| Ok(HttpResponse::status(403)));

    let client = FigmaClient::with_transport(config(), transport);
    assert_eq!(client.fetch_local_variables("KEY").await.unwrap(), None);
}

#[tokio::test]
async fn forbidden_elsewhere_is_an_error() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .times(1)
        .returning(|_, _| Ok(HttpResponse::status(403)));

    let client = FigmaClient::with_transport(config(), transport);
    let err = client.fetch_styles("KEY").await.unwrap_err();
    assert!(matches!(err, FigmaError::PermissionDenied { .. }));
}

#[tokio::test]
async fn invalid_json_body_is_a_decode_error() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .returning(|_, _| Ok(HttpResponse::ok("<html>")));

    let client = FigmaClient::with_transport(config(), transport);
    let err = client.fetch_components("KEY").await.unwrap_err();
    assert!(matches!(err, FigmaError::Decode { .. }));
}

#[tokio::test]
async fn node_requests_carry_ids_geometry_and_depth() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .with(
            eq("https://api.figma.com/v1/files/KEY/nodes"),
            function(|query: &[(String, String)]| {
                let has = |k: &str, v: &str| query.iter().any(|(qk, qv)| qk == k && qv == v);
                has("ids", "1:2,3:4")
                    && has("geometry", "paths")
                    && has("plugin_data", "shared")
                    && has("depth", "2")
            }),
        )
        .times(1)
        .returning(|_, _| Ok(HttpResponse::ok(r#"{"nodes": {}}"#)));

    let client = FigmaClient::with_transport(config(), transport);
    client
        .fetch_nodes("KEY", &["1:2".to_string(), "3:4".to_string()], Some(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn image_requests_carry_format_and_scale() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .with(
            eq("http://localhost:9000/v1/images/KEY"),
            function(|query: &[(String, String)]| {
                query.to_vec()
                    == vec![
                        ("ids".to_string(), "1:2".to_string()),
                        ("format".to_string(), "png".to_string()),
                        ("scale".to_string(), "2".to_string()),
                    ]
            }),
        )
        .times(1)
        .returning(|_, _| Ok(HttpResponse::ok(r#"{"images": {"1:2": "https://img"}}"#)));

    let client = FigmaClient::with_transport(
        config().with_base_url("http://localhost:9000/v1"),
        transport,
    );
    let urls = client
        .fetch_image_urls("KEY", &["1:2".to_string()], ImageFormat::Png, 2.0)
        .await
        .unwrap();
    assert_eq!(urls["images"]["1:2"], "https://img");
}

#[tokio::test]
async fn transport_failures_are_not_retried() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .times(1)
        .returning(|_, _| Err(FigmaError::Transport("connection refused".into())));

    let client = FigmaClient::with_transport(config(), transport);
    let err = client.fetch_styles("KEY").await.unwrap_err();
    assert!(matches!(err, FigmaError::Transport(_)));
}

fn nested_frames(depth: usize) -> serde_json::Value {
    let mut node = serde_json::json!({"id": format!("{depth}"), "name": "Leaf", "type": "RECTANGLE"});
    for level in (0..depth).rev() {
        node = serde_json::json!({
            "id": format!("{level}"),
            "name": format!("Level {level}"),
            "type": "FRAME",
            "children": [node]
        });
    }
    node
}

fn depth_of(mut node: &serde_json::Value) -> usize {
    let mut depth = 0;
    while let Some(child) = node["children"].get(0) {
        node = child;
        depth += 1;
    }
    depth
}

#[tokio::test]
async fn deeply_nested_node_trees_are_decoded_and_enriched() {
    let body = serde_json::json!({"nodes": {"0": {"document": nested_frames(200)}}}).to_string();
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .times(1)
        .returning(move |_, _| Ok(HttpResponse::ok(body.clone())));

    let client = FigmaClient::with_transport(config(), transport);
    let nodes = client
        .fetch_nodes("KEY", &["0".to_string()], None)
        .await
        .unwrap();
    assert_eq!(depth_of(&nodes["nodes"]["0"]["document"]), 200);

    let enriched = enrich_nodes_response(
        &nodes,
        &VariableLookup::unavailable("not fetched"),
        &ComponentTable::default(),
    )
    .unwrap();
    assert_eq!(depth_of(&enriched["nodes"]["0"]), 200);
}
