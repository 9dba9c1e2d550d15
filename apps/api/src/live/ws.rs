use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::live::LiveHub;
use crate::state::AppState;

/// GET /api/v1/live/:channel
///
/// Upgrades to a websocket that receives every live update published on `channel`.
pub async fn handle_live_socket(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.live.clone();
    ws.on_upgrade(move |socket: WebSocket| {
        let (sink, incoming) = socket.split();
        forward_updates(sink, incoming, hub, channel)
    })
}

/// Pushes `channel`'s updates to `sink` until the client goes away.
///
/// Incoming frames are read only to notice a close or a dropped connection,
/// so a quiet channel still releases its hub subscription.
async fn forward_updates<S, R, E>(mut sink: S, mut incoming: R, hub: LiveHub, channel: String)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut rx = hub.subscribe();
    debug!(%channel, "Live subscriber connected");

    loop {
        tokio::select! {
            received = rx.recv() => {
                let update = match received {
                    Ok(update) => update,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%channel, skipped, "Live subscriber lagged; updates dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if update.channel != channel {
                    continue;
                }

                let text = match serde_json::to_string(&update) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%channel, error = %e, "Failed to serialize live update");
                        continue;
                    }
                };

                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            frame = incoming.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Err(e)) => {
                    debug!(%channel, error = %e, "Live socket read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(%channel, "Live subscriber disconnected");
}
