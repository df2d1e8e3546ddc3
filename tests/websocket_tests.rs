// End-to-end signaling over real WebSocket connections.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use beacon_relay::{create_router, AppState, LocalMediaStorage, Relay};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn boot_server() -> Result<(String, Arc<Relay>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let relay = Arc::new(Relay::default());
    let storage = LocalMediaStorage::new(temp_dir.path(), "/recordings").await?;
    let state = AppState::new(Arc::clone(&relay), Arc::new(storage));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    Ok((format!("ws://{}", addr), relay, temp_dir))
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame as JSON, skipping pings
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Wait for the server to close the socket
async fn read_close(ws: &mut WsStream) {
    loop {
        match timeout(TIMEOUT, ws.next()).await.expect("timeout waiting for close") {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

#[tokio::test]
async fn e2e_broadcast_view_and_dashboard() -> Result<()> {
    let (base, relay, _temp_dir) = boot_server().await?;

    let mut dashboard = connect(&format!("{}/ws/dashboard", base)).await;
    let initial = read_json(&mut dashboard).await;
    assert_eq!(initial["type"], "stream_list");
    assert!(initial["streams"].as_array().unwrap().is_empty());

    let mut broadcaster = connect(&format!("{}/ws/broadcast/cam1", base)).await;
    send_json(
        &mut broadcaster,
        json!({"type": "start_stream", "latitude": 40.7, "longitude": -74.0, "notes": "corner"}),
    )
    .await;
    assert_eq!(read_json(&mut broadcaster).await["type"], "stream_started");

    let listed = read_json(&mut dashboard).await;
    assert_eq!(listed["streams"][0]["id"], "cam1");
    assert_eq!(listed["streams"][0]["latitude"], 40.7);

    let mut viewer = connect(&format!("{}/ws/view/cam1", base)).await;
    let joined = read_json(&mut broadcaster).await;
    assert_eq!(joined["type"], "viewer_joined");
    let viewer_id = joined["viewer_id"].clone();

    send_json(&mut broadcaster, json!({"type": "offer", "sdp": {"type": "offer", "sdp": "v=0"}})).await;
    let offer = read_json(&mut viewer).await;
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["stream_id"], "cam1");
    assert_eq!(offer["sdp"]["sdp"], "v=0");

    send_json(&mut viewer, json!({"type": "answer", "sdp": {"type": "answer", "sdp": "v=1"}})).await;
    let answer = read_json(&mut broadcaster).await;
    assert_eq!(answer["type"], "answer");
    assert_eq!(answer["viewer_id"], viewer_id);
    assert_eq!(answer["sdp"]["sdp"], "v=1");

    send_json(&mut viewer, json!({"type": "ice_candidate", "candidate": {"candidate": "c1"}})).await;
    let ice = read_json(&mut broadcaster).await;
    assert_eq!(ice["type"], "ice_candidate");
    assert_eq!(ice["viewer_id"], viewer_id);

    send_json(&mut broadcaster, json!({"type": "stop_stream"})).await;
    assert_eq!(read_json(&mut viewer).await["type"], "stream_ended");
    read_close(&mut broadcaster).await;

    let emptied = read_json(&mut dashboard).await;
    assert!(emptied["streams"].as_array().unwrap().is_empty());
    assert_eq!(relay.registry().active_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn e2e_viewer_for_unknown_stream() -> Result<()> {
    let (base, _relay, _temp_dir) = boot_server().await?;

    let mut viewer = connect(&format!("{}/ws/view/nobody", base)).await;
    let error = read_json(&mut viewer).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["message"], "Stream not found");
    read_close(&mut viewer).await;

    Ok(())
}

#[tokio::test]
async fn e2e_broadcaster_disconnect_ends_stream() -> Result<()> {
    let (base, relay, _temp_dir) = boot_server().await?;

    let mut broadcaster = connect(&format!("{}/ws/broadcast/cam2", base)).await;
    send_json(&mut broadcaster, json!({"type": "start_stream"})).await;
    assert_eq!(read_json(&mut broadcaster).await["type"], "stream_started");

    let mut viewer = connect(&format!("{}/ws/view/cam2", base)).await;
    assert_eq!(read_json(&mut broadcaster).await["type"], "viewer_joined");

    broadcaster.close(None).await?;
    drop(broadcaster);

    assert_eq!(read_json(&mut viewer).await["type"], "stream_ended");
    assert_eq!(relay.registry().active_count().await, 0);

    Ok(())
}
