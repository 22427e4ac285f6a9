//! Server network layer: HTTP/WebSocket surface and the tick loop

use crate::client_manager::{ClientManager, Outbound};
use crate::game::GameState;
use crate::ServerConfig;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ClientEvent, PlayerId, ServerEvent};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tower_http::services::{ServeDir, ServeFile};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection tasks to the server loop
#[derive(Debug)]
pub enum ServerMessage {
    /// A socket was upgraded; the assigned id is sent back on `reply`
    Connected {
        addr: SocketAddr,
        sender: Outbound,
        reply: oneshot::Sender<PlayerId>,
    },
    Event {
        id: PlayerId,
        event: ClientEvent,
    },
    Disconnected {
        id: PlayerId,
    },
    Shutdown,
}

/// Router state handed to every WebSocket upgrade
#[derive(Clone)]
struct AppState {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

/// Owns the world and every connection; all mutation happens in `run`
pub struct Server {
    config: ServerConfig,
    game_state: GameState,
    clients: ClientManager,
    rng: StdRng,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Server {
            game_state: GameState::new(config.settings),
            clients: ClientManager::new(),
            rng: StdRng::from_entropy(),
            config,
            server_tx,
            server_rx,
        }
    }

    /// Handle for feeding messages into the loop, e.g. `Shutdown` on Ctrl+C
    pub fn sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Builds the HTTP router: `/ws` upgrades, `/` serves the entry page,
    /// everything else falls through to the static directory.
    pub fn router(&self) -> Router {
        let public_dir = &self.config.public_dir;

        Router::new()
            .route("/ws", get(ws_handler))
            .route_service("/", ServeFile::new(public_dir.join("index.html")))
            .fallback_service(ServeDir::new(public_dir))
            .with_state(AppState {
                server_tx: self.server_tx.clone(),
            })
    }

    /// Serves HTTP on `listener` and runs the tick loop until shutdown
    pub async fn run(mut self, listener: TcpListener) -> Result<(), BoxError> {
        let local_addr = listener.local_addr()?;
        let app = self.router();

        let mut http = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
        });

        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server running on http://{}", local_addr);
        info!(
            "Static files being served from: {}",
            self.config.public_dir.display()
        );

        let result: Result<(), BoxError> = loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break Ok(());
                        }
                        Some(message) => self.handle_message(message),
                    }
                },

                _ = tick_interval.tick() => {
                    self.tick();

                    if self.game_state.tick % 600 == 0 && !self.clients.is_empty() {
                        debug!(
                            "Tick {}: {} players",
                            self.game_state.tick,
                            self.game_state.len()
                        );
                    }
                },

                result = &mut http => {
                    break match result {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => {
                            error!("HTTP server error: {}", e);
                            Err(e.into())
                        }
                        Err(e) => {
                            error!("HTTP server task failed: {}", e);
                            Err(e.into())
                        }
                    };
                },
            }
        };

        http.abort();
        result
    }

    /// Applies one inbound message to the world
    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                addr,
                sender,
                reply,
            } => {
                let id = self.handle_connect(addr, sender);
                if reply.send(id.clone()).is_err() {
                    // The socket task is gone; its channel is reaped on the next send.
                    debug!("Connection {} closed before learning its id", id);
                }
            }
            ServerMessage::Event { id, event } => self.handle_event(&id, event),
            ServerMessage::Disconnected { id } => self.handle_disconnect(&id),
            // Consumed by `run`
            ServerMessage::Shutdown => {}
        }
    }

    /// Advances the simulation and broadcasts the full snapshot
    pub fn tick(&mut self) {
        self.game_state.update_positions();

        if self.clients.is_empty() {
            return;
        }

        let snapshot = ServerEvent::Update(self.game_state.players().clone());
        self.broadcast(&snapshot, None);
    }

    /// Registers the connection, spawns its player, sends `init` to it and
    /// `newPlayer` to everyone else. Returns the assigned id.
    pub fn handle_connect(&mut self, addr: SocketAddr, sender: Outbound) -> PlayerId {
        let id = self.clients.add_client(addr, sender);
        let player = self.game_state.add_player(id.clone(), &mut self.rng).clone();

        let init = ServerEvent::Init {
            player_id: id.clone(),
            settings: *self.game_state.settings(),
            players: self.game_state.players().clone(),
        };
        let delivered = encode(&init).map_or(false, |frame| self.clients.send_to(&id, frame));
        if !delivered {
            // Nobody has heard of this player yet, so there is nothing to announce.
            self.clients.remove_client(&id);
            self.game_state.remove_player(&id);
            return id;
        }

        let joined = ServerEvent::NewPlayer {
            id: id.clone(),
            player,
        };
        self.broadcast(&joined, Some(&id));
        id
    }

    fn handle_event(&mut self, id: &str, event: ClientEvent) {
        match event {
            ClientEvent::Move(input) => {
                if !self.game_state.apply_input(id, input) {
                    debug!("Dropping move from unknown player {}", id);
                }
            }
            ClientEvent::SetNickname(raw) => {
                let Some(player) = self.game_state.set_nickname(id, &raw).cloned() else {
                    debug!("Dropping nickname from unknown player {}", id);
                    return;
                };

                let changed = ServerEvent::PlayerUpdate {
                    id: id.to_string(),
                    player,
                };
                self.broadcast(&changed, None);
            }
        }
    }

    fn handle_disconnect(&mut self, id: &str) {
        self.clients.remove_client(id);

        if self.game_state.remove_player(id).is_some() {
            let left = ServerEvent::PlayerDisconnected(id.to_string());
            self.broadcast(&left, None);
        }
    }

    /// Sends to every client except `exclude`, disconnecting any whose
    /// socket turns out to be closed.
    fn broadcast(&mut self, event: &ServerEvent, exclude: Option<&str>) {
        let Some(frame) = encode(event) else {
            return;
        };

        for dead in self.clients.broadcast(&frame, exclude) {
            self.handle_disconnect(&dead);
        }
    }
}

fn encode(event: &ServerEvent) -> Option<Utf8Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Utf8Bytes::from(json)),
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            None
        }
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state.server_tx))
}

/// Drives one WebSocket connection until either direction closes
async fn handle_socket(
    socket: WebSocket,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Utf8Bytes>();
    let (reply_tx, reply_rx) = oneshot::channel();

    let connected = ServerMessage::Connected {
        addr,
        sender: out_tx,
        reply: reply_tx,
    };
    if server_tx.send(connected).is_err() {
        warn!("Server loop is gone, refusing connection from {}", addr);
        return;
    }
    let Ok(id) = reply_rx.await else {
        warn!("Server loop dropped connection from {} before assigning an id", addr);
        return;
    };

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut reader = {
        let id = id.clone();
        let server_tx = server_tx.clone();

        tokio::spawn(async move {
            while let Some(Ok(message)) = stream.next().await {
                match message {
                    Message::Text(text) => match ClientEvent::from_json(text.as_str()) {
                        Ok(event) => {
                            let forwarded = ServerMessage::Event {
                                id: id.clone(),
                                event,
                            };
                            if server_tx.send(forwarded).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Malformed frame from {}: {}", id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        })
    };

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    let _ = server_tx.send(ServerMessage::Disconnected { id });
}
