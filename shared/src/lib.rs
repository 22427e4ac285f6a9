use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const WORLD_WIDTH: f64 = 2000.0;
pub const WORLD_HEIGHT: f64 = 2000.0;
pub const BOUNDARY_WIDTH: f64 = 50.0;
pub const PLAYER_RADIUS: f64 = 25.0;
pub const PLAYER_SPEED: f64 = 5.0;
pub const TICK_RATE: u32 = 60;
pub const MAX_NICKNAME_LEN: usize = 16;

/// Connection identifier, also used as the player key.
pub type PlayerId = String;

/// Full player mapping as it travels on the wire.
pub type PlayerMap = HashMap<PlayerId, Player>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorldSettings {
    pub width: f64,
    pub height: f64,
    pub boundary_width: f64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            boundary_width: BOUNDARY_WIDTH,
        }
    }
}

impl WorldSettings {
    /// Allowed range for a circle center of `radius` along an axis of `extent`.
    pub fn axis_bounds(&self, extent: f64, radius: f64) -> (f64, f64) {
        (
            radius + self.boundary_width,
            extent - radius - self.boundary_width,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: String,
    pub speed: f64,
    pub dx: f64,
    pub dy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Player {
    pub fn new(x: f64, y: f64, color: String) -> Self {
        Self {
            x,
            y,
            radius: PLAYER_RADIUS,
            color,
            speed: PLAYER_SPEED,
            dx: 0.0,
            dy: 0.0,
            nickname: None,
        }
    }

    pub fn set_input(&mut self, input: MoveInput) {
        self.dx = input.dx;
        self.dy = input.dy;
    }

    /// Advances one tick along the input vector and clamps into the playable area.
    pub fn step(&mut self, settings: &WorldSettings) {
        let (min_x, max_x) = settings.axis_bounds(settings.width, self.radius);
        let (min_y, max_y) = settings.axis_bounds(settings.height, self.radius);

        self.x = (self.x + self.dx * self.speed).min(max_x).max(min_x);
        self.y = (self.y + self.dy * self.speed).min(max_y).max(min_y);
        debug_assert!(self.in_bounds(settings));
    }

    /// Returns true if the center lies inside the playable area
    pub fn in_bounds(&self, settings: &WorldSettings) -> bool {
        let (min_x, max_x) = settings.axis_bounds(settings.width, self.radius);
        let (min_y, max_y) = settings.axis_bounds(settings.height, self.radius);
        (min_x..=max_x).contains(&self.x) && (min_y..=max_y).contains(&self.y)
    }
}

/// Direction payload of a `move` event.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct MoveInput {
    pub dx: f64,
    pub dy: f64,
}

impl MoveInput {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Returns a finite vector with magnitude at most 1.
    ///
    /// Non-finite components are zeroed. Anything longer than a unit vector
    /// is rescaled onto the unit circle, keeping its direction, so each
    /// component ends up in [-1, 1].
    pub fn sanitized(self) -> Self {
        let dx = if self.dx.is_finite() { self.dx } else { 0.0 };
        let dy = if self.dy.is_finite() { self.dy } else { 0.0 };

        let magnitude = dx.hypot(dy);
        if magnitude > 1.0 {
            Self {
                dx: dx / magnitude,
                dy: dy / magnitude,
            }
        } else {
            Self { dx, dy }
        }
    }
}

/// Trims a requested display name and strips control characters.
/// Returns None when nothing printable is left.
pub fn sanitize_nickname(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NICKNAME_LEN)
        .collect();
    let cleaned = cleaned.trim_end().to_string();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Messages pushed from the server to clients.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Init {
        player_id: PlayerId,
        settings: WorldSettings,
        players: PlayerMap,
    },
    NewPlayer {
        id: PlayerId,
        player: Player,
    },
    PlayerDisconnected(PlayerId),
    Update(PlayerMap),
    PlayerUpdate {
        id: PlayerId,
        player: Player,
    },
}

/// Messages sent from clients to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Move(MoveInput),
    SetNickname(String),
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
