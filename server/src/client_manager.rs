//! Connection registry for the presence server
//!
//! Tracks every live WebSocket connection together with the outbound channel
//! its writer task drains. The server loop owns the single `ClientManager`,
//! so nothing here needs locking.
//!
//! Outbound payloads are pre-serialized JSON frames. A snapshot is encoded
//! once per tick and the same bytes are handed to every connection.

use axum::extract::ws::Utf8Bytes;
use log::{debug, info};
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Sending half of a connection's outbound frame queue
pub type Outbound = mpsc::UnboundedSender<Utf8Bytes>;

/// A connected client and the channel used to reach it
#[derive(Debug)]
pub struct Client {
    /// Identifier minted by `ClientManager::add_client`
    pub id: PlayerId,
    /// Remote peer address, for logging
    pub addr: SocketAddr,
    /// When the connection was registered
    pub connected_at: Instant,
    sender: Outbound,
}

impl Client {
    /// Creates a client record stamped with the current time
    pub fn new(id: PlayerId, addr: SocketAddr, sender: Outbound) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a frame for the writer task
    ///
    /// Returns false once the writer has gone away, which means the socket
    /// is closed and the client should be dropped.
    pub fn send(&self, frame: Utf8Bytes) -> bool {
        self.sender.send(frame).is_ok()
    }

    /// How long this client has been connected
    pub fn session_length(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Manages all connected clients and fans frames out to them
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
}

impl ClientManager {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Registers a new connection under a fresh UUID v4 and returns it
    pub fn add_client(&mut self, addr: SocketAddr, sender: Outbound) -> PlayerId {
        let mut id = Uuid::new_v4().to_string();
        while self.clients.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id.clone(), Client::new(id.clone(), addr, sender));
        id
    }

    /// Removes a client and drops its outbound channel
    ///
    /// Dropping the sender ends the writer task, which closes the socket.
    pub fn remove_client(&mut self, id: &str) -> bool {
        if let Some(client) = self.clients.remove(id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.session_length().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Returns true if `id` belongs to a live connection
    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    /// Sends a frame to a single client
    ///
    /// Returns false if the client is unknown or its socket has closed.
    pub fn send_to(&self, id: &str, frame: Utf8Bytes) -> bool {
        match self.clients.get(id) {
            Some(client) => client.send(frame),
            None => false,
        }
    }

    /// Sends a frame to every client except `exclude`
    ///
    /// Returns the ids whose channel has closed so the caller can run the
    /// regular disconnect path for them.
    pub fn broadcast(&self, frame: &Utf8Bytes, exclude: Option<&str>) -> Vec<PlayerId> {
        let mut dead = Vec::new();

        for (id, client) in &self.clients {
            if Some(id.as_str()) == exclude {
                continue;
            }

            if !client.send(frame.clone()) {
                debug!("Outbound channel for {} is closed", id);
                dead.push(id.clone());
            }
        }

        dead
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
