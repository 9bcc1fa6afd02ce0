mod common;

use std::time::Duration;

use common::app::{serve, spawn_test_server, spawn_with_limits};
use common::fixtures::{b64_frame, Scene};
use common::ws::{WsClient, OPCODE_CLOSE};
use drowsiness_vision::config::LimitsConfig;

fn frame_message(scene: Scene) -> String {
    serde_json::json!({ "jpeg_b64": b64_frame(scene) }).to_string()
}

#[tokio::test]
async fn it_ws_replies_to_each_frame_in_order() {
    let app = spawn_test_server().await;
    let addr = serve(app.app.clone()).await;
    let mut client = WsClient::connect(addr, "/vision/ws").await;

    client.send_text(&frame_message(Scene::EyesClosed)).await;
    client.send_text("not json").await;
    client.send_text(&frame_message(Scene::Empty)).await;

    let first = client.next_json().await;
    assert_eq!(first["status"], "Closed");
    assert_eq!(first["bbox"], serde_json::json!([182, 86, 394, 250]));
    let second = client.next_json().await;
    assert_eq!(second["error"]["code"], "INVALID_REQUEST_BODY");
    let third = client.next_json().await;
    assert_eq!(third, serde_json::json!({ "status": "No face", "bbox": null }));
}

#[tokio::test]
async fn it_ws_oversized_frame_ends_session_without_reply() {
    let app = spawn_with_limits(LimitsConfig {
        max_frame_bytes: 1024,
        ..LimitsConfig::default()
    })
    .await;
    let addr = serve(app.app.clone()).await;
    let mut client = WsClient::connect(addr, "/vision/ws").await;

    let oversized = serde_json::json!({ "jpeg_b64": "A".repeat(8 * 1024) }).to_string();
    client.send_text(&oversized).await;

    let next = tokio::time::timeout(Duration::from_secs(5), client.next_frame())
        .await
        .expect("server reacts to oversized frame");
    if let Some((opcode, _)) = next {
        assert_eq!(opcode, OPCODE_CLOSE, "oversized frame must not be classified");
    }
    assert_eq!(app.engine.metrics().snapshot().frames, 0);
}

#[tokio::test]
async fn it_ws_connections_are_bounded() {
    let app = spawn_with_limits(LimitsConfig {
        max_ws_connections: 1,
        ..LimitsConfig::default()
    })
    .await;
    let addr = serve(app.app.clone()).await;
    let _held = WsClient::connect(addr, "/vision/ws").await;

    let head = match WsClient::try_connect(addr, "/vision/ws").await {
        Ok(_) => panic!("second stream must be refused"),
        Err(head) => head,
    };
    assert!(head.starts_with("HTTP/1.1 429"), "unexpected response: {head}");
}
