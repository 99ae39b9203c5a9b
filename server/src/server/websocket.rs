use crate::load::{LoadSimulator, medium_message};
use crate::protocol::{
    LoadRequest, LoadType, MEDIUM_COMPLETED_MESSAGE, SIMPLE_COMPLETED_MESSAGE, WsReply,
};
use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::{borrow::Cow, sync::Arc, time::Duration};
use tokio::sync::{
    mpsc::{self, error::SendError},
    oneshot, watch,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::AppState;

/// Capacity of the per-connection request and reply queues
const CHANNEL_CAPACITY: usize = 32;

/// How long the writer may take to flush the closing handshake
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());

    if !state.ws_config.origin_policy.allows(origin) {
        warn!("Rejecting WebSocket upgrade from origin {:?}", origin);
        return (StatusCode::FORBIDDEN, "Origin not allowed\n").into_response();
    }

    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// One read from the client side of the socket
enum Inbound {
    Frame(Message),
    Failed(axum::Error),
    Ended,
    IdleTimeout,
}

impl From<Option<Result<Message, axum::Error>>> for Inbound {
    fn from(next: Option<Result<Message, axum::Error>>) -> Self {
        match next {
            Some(Ok(msg)) => Inbound::Frame(msg),
            Some(Err(e)) => Inbound::Failed(e),
            None => Inbound::Ended,
        }
    }
}

/// Read the next frame. The idle clock only runs while no request is queued or
/// being worked on (`pending` counts both), so a long run never looks idle.
async fn read_frame(
    receiver: &mut SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
    pending: &mut watch::Receiver<usize>,
) -> Inbound {
    let Some(limit) = idle_timeout else {
        return receiver.next().await.into();
    };

    loop {
        if *pending.borrow() > 0 {
            tokio::select! {
                next = receiver.next() => return next.into(),
                drained = async { pending.wait_for(|n| *n == 0).await.is_ok() } => {
                    if !drained {
                        return receiver.next().await.into();
                    }
                    continue;
                }
            }
        }

        // Only the reader raises `pending`, so it stays zero for this whole window
        return match tokio::time::timeout(limit, receiver.next()).await {
            Ok(next) => next.into(),
            Err(_) => Inbound::IdleTimeout,
        };
    }
}

/// Close codes that count as an orderly shutdown by the client
fn is_expected_close(code: u16) -> bool {
    matches!(code, close_code::NORMAL | close_code::AWAY)
}

/// Forward replies to the socket until told to close or the worker goes away,
/// then finish the closing handshake.
async fn run_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut replies: mpsc::Receiver<WsReply>,
    mut close: oneshot::Receiver<Option<CloseFrame<'static>>>,
    connection_id: Uuid,
) {
    loop {
        tokio::select! {
            biased;
            frame = &mut close => {
                if let Ok(Some(frame)) = frame {
                    debug!("Sending close frame to {}: code={}", connection_id, frame.code);
                    if let Err(e) = ws_sender.send(Message::Close(Some(frame))).await {
                        debug!("Close frame to {} not delivered: {}", connection_id, e);
                    }
                }
                break;
            }
            reply = replies.recv() => {
                let Some(reply) = reply else { break };
                match serde_json::to_string(&reply) {
                    Ok(json) => {
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            warn!("Error writing message to {}: {}", connection_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize reply: {}", e);
                    }
                }
            }
        }
    }

    // Flushes the reply to a client-initiated close, or starts our own handshake
    if let Err(e) = ws_sender.close().await {
        debug!("Closing socket for {}: {}", connection_id, e);
    }
}

/// Handle a WebSocket connection.
///
/// The handler task reads frames; a worker task runs load requests one at a
/// time in arrival order; a writer task forwards replies to the socket. When the
/// reader stops, the worker is aborted (cancelling any simulation in flight) and
/// the writer completes the closing handshake.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!("WebSocket connection established: {}", connection_id);

    let (ws_sender, mut ws_receiver) = socket.split();
    let (reply_tx, reply_rx) = mpsc::channel::<WsReply>(CHANNEL_CAPACITY);
    let (request_tx, request_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
    let (close_tx, close_rx) = oneshot::channel::<Option<CloseFrame<'static>>>();
    let (pending_tx, mut pending_rx) = watch::channel(0usize);
    let pending_tx = Arc::new(pending_tx);

    let mut send_task = tokio::spawn(run_writer(ws_sender, reply_rx, close_rx, connection_id));

    // Spawn the sequential load worker
    let worker_task = tokio::spawn(run_worker(
        state.simulator.clone(),
        request_rx,
        reply_tx,
        pending_tx.clone(),
        connection_id,
    ));

    let idle_timeout = state.ws_config.idle_timeout;
    let mut writer_done = false;

    let close_frame = loop {
        let inbound = tokio::select! {
            inbound = read_frame(&mut ws_receiver, idle_timeout, &mut pending_rx) => inbound,
            _ = &mut send_task => {
                debug!("Writer for {} stopped, closing connection", connection_id);
                writer_done = true;
                break None;
            }
        };

        let payload = match inbound {
            Inbound::Frame(Message::Text(text)) => text.into_bytes(),
            Inbound::Frame(Message::Binary(data)) => data,
            Inbound::Frame(Message::Ping(_)) | Inbound::Frame(Message::Pong(_)) => {
                // Pings are answered by axum
                continue;
            }
            Inbound::Frame(Message::Close(frame)) => {
                match frame {
                    Some(frame) if !is_expected_close(frame.code) => {
                        warn!(
                            "Unexpected WebSocket close from {}: code={} reason={:?}",
                            connection_id, frame.code, frame.reason
                        );
                    }
                    _ => debug!("Client {} closed the connection", connection_id),
                }
                // The protocol layer queues the echo; the writer flushes it
                break None;
            }
            Inbound::Failed(e) => {
                warn!("Unexpected WebSocket error for {}: {}", connection_id, e);
                break None;
            }
            Inbound::Ended => {
                debug!("WebSocket stream for {} ended", connection_id);
                break None;
            }
            Inbound::IdleTimeout => {
                info!("Closing idle WebSocket connection {}", connection_id);
                break Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: Cow::Borrowed("idle timeout"),
                });
            }
        };

        pending_tx.send_modify(|n| *n += 1);
        if request_tx.send(payload).await.is_err() {
            // Worker only exits once its reply channel is closed
            break None;
        }
    };

    // Cleanup: close signal first so the writer does not wait on more replies
    let _ = close_tx.send(close_frame);
    worker_task.abort();

    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        debug!("Writer for {} did not finish closing in time", connection_id);
        send_task.abort();
    }

    info!("WebSocket connection closed: {}", connection_id);
}

/// Process queued requests one at a time until the reader or writer goes away
async fn run_worker(
    simulator: Arc<LoadSimulator>,
    mut requests: mpsc::Receiver<Vec<u8>>,
    replies: mpsc::Sender<WsReply>,
    pending: Arc<watch::Sender<usize>>,
    connection_id: Uuid,
) {
    while let Some(payload) = requests.recv().await {
        let result = handle_request(&simulator, &payload, &replies, connection_id).await;
        pending.send_modify(|n| *n = n.saturating_sub(1));
        if result.is_err() {
            debug!("Reply channel for {} closed, stopping worker", connection_id);
            break;
        }
    }
}

/// Decode one frame and stream the replies for it
async fn handle_request(
    simulator: &LoadSimulator,
    payload: &[u8],
    replies: &mpsc::Sender<WsReply>,
    connection_id: Uuid,
) -> Result<(), SendError<WsReply>> {
    let request = match serde_json::from_slice::<LoadRequest>(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!("Error unmarshaling JSON from {}: {}", connection_id, e);
            metrics::counter!(
                "loadsim_invalid_requests_total",
                "transport" => "websocket",
                "reason" => "invalid_json"
            )
            .increment(1);
            return replies.send(WsReply::invalid_json()).await;
        }
    };

    let load_type = match request.load_type() {
        Ok(load_type) => load_type,
        Err(e) => {
            info!("{} for WebSocket {}", e, connection_id);
            metrics::counter!(
                "loadsim_invalid_requests_total",
                "transport" => "websocket",
                "reason" => "invalid_load_type"
            )
            .increment(1);
            return replies.send(WsReply::invalid_load_type()).await;
        }
    };

    info!(
        "Simulating {} load for WebSocket {}",
        load_type, connection_id
    );
    metrics::counter!(
        "loadsim_load_runs_total",
        "transport" => "websocket",
        "load_type" => load_type.as_str()
    )
    .increment(1);

    match load_type {
        LoadType::Simple => {
            simulator.pause(1).await;
            replies.send(WsReply::new(SIMPLE_COMPLETED_MESSAGE)).await?;
        }
        LoadType::Medium => {
            for n in 1..=simulator.medium_steps() {
                simulator.pause(1).await;
                replies.send(WsReply::new(medium_message(n))).await?;
            }
            replies.send(WsReply::new(MEDIUM_COMPLETED_MESSAGE)).await?;
        }
    }

    debug!("Finished {} load for {}", load_type, connection_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadConfig;

    fn instant_simulator() -> LoadSimulator {
        LoadSimulator::new(LoadConfig {
            time_unit: Duration::ZERO,
            ..LoadConfig::default()
        })
    }

    async fn collect_replies(payload: &[u8]) -> Vec<WsReply> {
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        handle_request(&instant_simulator(), payload, &tx, Uuid::new_v4())
            .await
            .unwrap();
        drop(tx);

        let mut replies = Vec::new();
        while let Some(reply) = rx.recv().await {
            replies.push(reply);
        }
        replies
    }

    #[test]
    fn test_expected_close_codes() {
        assert!(is_expected_close(close_code::NORMAL));
        assert!(is_expected_close(close_code::AWAY));
        assert!(!is_expected_close(close_code::PROTOCOL));
        assert!(!is_expected_close(close_code::ERROR));
    }

    #[tokio::test]
    async fn test_simple_request_yields_one_reply() {
        let replies = collect_replies(br#"{"type":"simple"}"#).await;
        assert_eq!(replies, vec![WsReply::new(SIMPLE_COMPLETED_MESSAGE)]);
    }

    #[tokio::test]
    async fn test_medium_request_yields_eleven_replies() {
        let replies = collect_replies(br#"{"type":"medium"}"#).await;
        assert_eq!(replies.len(), 11);
        for (i, reply) in replies[..10].iter().enumerate() {
            assert_eq!(reply.message, medium_message(i + 1));
        }
        assert_eq!(replies[10].message, MEDIUM_COMPLETED_MESSAGE);
    }

    #[tokio::test]
    async fn test_malformed_json_yields_error_reply() {
        let replies = collect_replies(b"{not json").await;
        assert_eq!(replies, vec![WsReply::invalid_json()]);
    }

    #[tokio::test]
    async fn test_unknown_type_yields_error_reply() {
        let replies = collect_replies(br#"{"type":"heavy"}"#).await;
        assert_eq!(replies, vec![WsReply::invalid_load_type()]);
    }

    #[tokio::test]
    async fn test_closed_reply_channel_stops_medium_run() {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        drop(rx);
        let result =
            handle_request(&instant_simulator(), br#"{"type":"medium"}"#, &tx, Uuid::new_v4())
                .await;
        assert!(result.is_err());
    }
}
