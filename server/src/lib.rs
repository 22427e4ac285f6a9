//! # Presence Server Library
//!
//! Authoritative server for a shared 2D world. Clients connect over a
//! WebSocket, are spawned at a random position, stream their movement
//! direction, and receive the full world snapshot on every tick.
//!
//! ## Architecture
//!
//! ### Single owner of world state
//! The [`network::Server`] value owns both the [`game::GameState`] and the
//! [`client_manager::ClientManager`]. Its `run` loop multiplexes inbound
//! connection events and the tick timer with `tokio::select!`, so every
//! mutation happens on one task and no locks are needed.
//!
//! ### Per-connection tasks
//! Each upgraded socket gets a reader task, which parses JSON frames and
//! forwards them to the server loop, and a writer task, which drains an
//! unbounded channel of pre-serialized frames into the socket. Closing
//! either side ends the connection and triggers the disconnect path.
//!
//! ### Tick loop
//! At the configured rate (60 Hz by default) every player moves by
//! `input * speed`, is clamped into the playable area, and the whole
//! mapping is broadcast as an `update` event.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection registry and frame fan-out
//! - `game`: the player mapping and per-tick integration
//! - `network`: HTTP/WebSocket surface and the server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{network::Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::default();
//!     let listener = tokio::net::TcpListener::bind(config.addr()).await?;
//!     Server::new(config).run(listener).await
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;

use shared::{WorldSettings, TICK_RATE};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Directory served over HTTP; must contain `index.html`.
    pub public_dir: PathBuf,
    /// World dimensions sent to every client.
    pub settings: WorldSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tick_rate: TICK_RATE,
            public_dir: PathBuf::from("public"),
            settings: WorldSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval between ticks; a zero rate is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
