use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use shared::protocol::Envelope;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// Handle to one room-scoped relay channel.
///
/// Sends are fire-and-forget: the envelope is queued for a writer task and
/// may never arrive. Dropping the handle closes the channel and ends both
/// pump tasks.
pub struct RelayChannel {
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl RelayChannel {
    /// Best-effort broadcast to everyone else in the room.
    pub fn send(&self, env: Envelope) {
        let _ = self.outbound.send(env);
    }
}

/// Opens the broadcast channel for `room` on the relay and returns the
/// send handle plus the stream of inbound envelopes. Malformed frames are
/// dropped before they reach the state machine.
pub async fn connect(
    relay_url: &str,
    room: &str,
) -> Result<(RelayChannel, mpsc::UnboundedReceiver<Envelope>)> {
    let url = format!("{}/ws/{}", relay_url.trim_end_matches('/'), room);
    let (ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("open relay channel {url}"))?;
    let (mut sink, mut stream) = ws.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Envelope>();

    tokio::spawn(async move {
        while let Some(env) = out_rx.recv().await {
            match serde_json::to_string(&env) {
                Ok(text) => {
                    if sink.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Err(err) => warn!(?err, "dropping unencodable envelope"),
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(_) => break,
            };
            match frame {
                Message::Text(text) => match serde_json::from_str::<Envelope>(text.as_str()) {
                    Ok(env) => {
                        if in_tx.send(env).is_err() {
                            break;
                        }
                    }
                    Err(err) => debug!(?err, "dropping malformed relay frame"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    Ok((RelayChannel { outbound: out_tx }, in_rx))
}
