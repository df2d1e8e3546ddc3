//! WebSocket transport for the three connection roles
//!
//! Each socket is split: a writer task drains the connection's outbound
//! queue into the sink (plus optional heartbeat pings), and the read half is
//! turned into a stream of text frames for the role's control loop. When the
//! writer dies the inbound stream ends too, so a dead peer tears down like a
//! disconnect.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::{BoxStream, SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval};
use tracing::debug;

use super::state::AppState;
use crate::relay::{BroadcasterConnection, DashboardConnection, ViewerConnection};

/// How long queued frames (`error`, `stream_ended`) may take to flush after
/// the control loop returns
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

enum Role {
    Broadcaster(String),
    Viewer(String),
    Dashboard,
}

/// GET /ws/broadcast/:stream_id
pub async fn broadcast_ws(
    ws: WebSocketUpgrade,
    Path(stream_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, Role::Broadcaster(stream_id)))
}

/// GET /ws/view/:stream_id
pub async fn view_ws(
    ws: WebSocketUpgrade,
    Path(stream_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, Role::Viewer(stream_id)))
}

/// GET /ws/dashboard
pub async fn dashboard_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, Role::Dashboard))
}

async fn serve_socket(socket: WebSocket, state: AppState, role: Role) {
    let relay = Arc::clone(&state.relay);
    let (peer, outbound) = relay.connect();
    let peer_id = peer.id();

    let (sink, stream) = socket.split();
    let (closed_tx, closed_rx) = oneshot::channel::<()>();
    let mut writer = tokio::spawn(write_frames(sink, outbound, state.heartbeat, closed_tx));
    let inbound = text_frames(stream, closed_rx);

    let reason = match role {
        Role::Broadcaster(stream_id) => {
            BroadcasterConnection::new(relay, stream_id, peer)
                .run(inbound)
                .await
        }
        Role::Viewer(stream_id) => ViewerConnection::new(relay, stream_id, peer).run(inbound).await,
        Role::Dashboard => DashboardConnection::new(relay, peer).run(inbound).await,
    };
    debug!(peer = %peer_id, ?reason, "Socket handler finished");

    // The loop dropped its handle; the writer closes the socket once the
    // queue drains.
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        debug!(peer = %peer_id, "Writer did not finish, aborting");
        writer.abort();
    }
}

/// Text frames until close, error, or the writer going away
fn text_frames(
    stream: SplitStream<WebSocket>,
    writer_closed: oneshot::Receiver<()>,
) -> BoxStream<'static, String> {
    stream
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text),
                _ => None,
            })
        })
        .take_until(writer_closed)
        .boxed()
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    heartbeat: Option<Duration>,
    _closed: oneshot::Sender<()>,
) {
    let mut ping = heartbeat.map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = next_tick(&mut ping) => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!("Heartbeat ping failed");
                    break;
                }
            }
        }
    }
}

async fn next_tick(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
