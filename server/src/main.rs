//! The relay. One WebSocket route per room: every well-formed envelope a
//! member publishes is re-broadcast to the whole room, sender included;
//! clients drop their own echoes by senderId. No race state lives here;
//! neither peer is authoritative and the relay least of all.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures::{sink::SinkExt, stream::StreamExt};
use shared::{protocol::Envelope, room_code};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Rooms = Arc<DashMap<String, RoomChannel>>;

/// Per-room broadcast fan-out. Created when the first peer subscribes,
/// dropped when the last one leaves.
struct RoomChannel {
    tx: broadcast::Sender<String>,
    members: usize,
}

impl RoomChannel {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx, members: 0 }
    }
}

fn subscribe(rooms: &Rooms, code: &str) -> broadcast::Receiver<String> {
    let mut room = rooms
        .entry(code.to_string())
        .or_insert_with(RoomChannel::new);
    room.members += 1;
    room.tx.subscribe()
}

fn unsubscribe(rooms: &Rooms, code: &str) {
    if let Some(mut room) = rooms.get_mut(code) {
        room.members = room.members.saturating_sub(1);
    }
    rooms.remove_if(code, |_, room| room.members == 0);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let rooms: Rooms = Arc::new(DashMap::new());
    let addr = std::env::var("RELAY_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let app = Router::new()
        .route("/ws/:room", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(rooms);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("relay listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(rooms): State<Rooms>,
) -> impl IntoResponse {
    let code = room_code::normalize(&room);
    ws.on_upgrade(move |socket| handle_socket(socket, rooms, code))
}

async fn handle_socket(socket: WebSocket, rooms: Rooms, code: String) {
    let conn = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut rx = subscribe(&rooms, &code);

    info!(%conn, room = %code, "peer subscribed");

    loop {
        tokio::select! {
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        // anything that is not a well-formed envelope is dropped here,
                        // so peers never see junk frames
                        match serde_json::from_str::<Envelope>(&text) {
                            Ok(env) => {
                                debug!(%conn, room = %code, sender = %env.sender_id, "relaying frame");
                                if let Some(room) = rooms.get(&code) {
                                    let _ = room.tx.send(text);
                                }
                            }
                            Err(err) => debug!(%conn, %err, "dropping malformed frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }

            relayed = rx.recv() => {
                match relayed {
                    Ok(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%conn, skipped, "relay receiver lagged");
                        continue;
                    }
                }
            }
        }
    }

    unsubscribe(&rooms, &code);
    info!(%conn, room = %code, "peer left");
}
