use log::{debug, info};
use rand::Rng;
use shared::{sanitize_nickname, MoveInput, Player, PlayerId, PlayerMap, WorldSettings};

/// Authoritative world state: every connected player keyed by connection id.
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    settings: WorldSettings,
    players: PlayerMap,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

impl GameState {
    /// Creates an empty world with the given settings
    pub fn new(settings: WorldSettings) -> Self {
        Self {
            tick: 0,
            settings,
            players: PlayerMap::new(),
        }
    }

    /// World dimensions sent to clients in `init`
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Every player keyed by connection id
    pub fn players(&self) -> &PlayerMap {
        &self.players
    }

    /// Looks up a single player
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    /// Returns the number of players in the world
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns true if nobody is connected
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Spawns a player anywhere in the world rectangle.
    ///
    /// The spawn point is not clamped to the playable area; the next tick
    /// pulls it inside the boundary.
    pub fn add_player<R: Rng>(&mut self, id: PlayerId, rng: &mut R) -> &Player {
        let x = rng.gen_range(0.0..=self.settings.width);
        let y = rng.gen_range(0.0..=self.settings.height);
        let player = Player::new(x, y, random_color(rng));

        info!("Added player {} at ({:.1}, {:.1})", id, player.x, player.y);
        self.players.entry(id).or_insert(player)
    }

    /// Removes a player, returning its record if it existed
    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let removed = self.players.remove(id);
        if removed.is_some() {
            info!("Removed player {}", id);
        }
        removed
    }

    /// Stores the latest movement direction for a player.
    ///
    /// Returns false if the player does not exist.
    pub fn apply_input(&mut self, id: &str, input: MoveInput) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.set_input(input.sanitized());
                true
            }
            None => false,
        }
    }

    /// Updates a player's display name and returns the changed record.
    pub fn set_nickname(&mut self, id: &str, raw: &str) -> Option<&Player> {
        let player = self.players.get_mut(id)?;
        player.nickname = sanitize_nickname(raw);
        debug!("Player {} nickname is now {:?}", id, player.nickname);
        Some(player)
    }

    /// Integrates every player one tick along its input vector.
    pub fn update_positions(&mut self) {
        for player in self.players.values_mut() {
            player.step(&self.settings);
        }
        self.tick += 1;
    }
}

/// Random `#rrggbb` color.
pub fn random_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..=0xFF_FFFFu32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn state_with_player(id: &str) -> GameState {
        let mut state = GameState::default();
        state.add_player(id.to_string(), &mut seeded());
        state
    }

    fn place(state: &mut GameState, id: &str, x: f64, y: f64) {
        let player = state.players.get_mut(id).unwrap();
        player.x = x;
        player.y = y;
    }

    #[test]
    fn test_add_player_spawns_inside_world() {
        let mut state = GameState::default();
        let mut rng = seeded();

        for i in 0..100 {
            let player = state.add_player(format!("p{}", i), &mut rng).clone();
            assert!((0.0..=2000.0).contains(&player.x));
            assert!((0.0..=2000.0).contains(&player.y));
            assert_eq!(player.radius, 25.0);
            assert_eq!(player.speed, 5.0);
            assert_eq!((player.dx, player.dy), (0.0, 0.0));
        }
        assert_eq!(state.len(), 100);
    }

    #[test]
    fn test_two_players_get_independent_records() {
        let mut state = GameState::default();
        let mut rng = seeded();

        let a = state.add_player("a".to_string(), &mut rng).clone();
        let b = state.add_player("b".to_string(), &mut rng).clone();

        assert_eq!(state.len(), 2);
        assert_ne!((a.x, a.y), (b.x, b.y));
        assert_ne!(a.color, b.color);
    }

    #[test]
    fn test_random_color_format() {
        let mut rng = seeded();
        for _ in 0..50 {
            let color = random_color(&mut rng);
            assert_eq!(color.len(), 7);
            assert!(color.starts_with('#'));
            assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_remove_player() {
        let mut state = state_with_player("a");
        assert!(state.remove_player("a").is_some());
        assert!(state.is_empty());
        assert!(state.remove_player("a").is_none());
    }

    #[test]
    fn test_move_right_one_tick() {
        let mut state = state_with_player("a");
        place(&mut state, "a", 500.0, 500.0);

        assert!(state.apply_input("a", MoveInput::new(1.0, 0.0)));
        state.update_positions();

        let player = state.player("a").unwrap();
        assert_eq!(player.x, 505.0);
        assert_eq!(player.y, 500.0);
        assert_eq!(state.tick, 1);
    }

    #[test]
    fn test_move_diagonal_one_tick() {
        let mut state = state_with_player("a");
        place(&mut state, "a", 500.0, 500.0);

        state.apply_input("a", MoveInput::new(0.7071, 0.7071));
        state.update_positions();

        let player = state.player("a").unwrap();
        assert_approx_eq!(player.x - 500.0, 3.54, 0.01);
        assert_approx_eq!(player.y - 500.0, 3.54, 0.01);
    }

    #[test]
    fn test_oversized_input_is_normalized() {
        let mut state = state_with_player("a");
        place(&mut state, "a", 500.0, 500.0);

        state.apply_input("a", MoveInput::new(100.0, 0.0));
        state.update_positions();

        assert_eq!(state.player("a").unwrap().x, 505.0);
    }

    #[test]
    fn test_input_for_unknown_player() {
        let mut state = GameState::default();
        assert!(!state.apply_input("ghost", MoveInput::new(1.0, 0.0)));
    }

    #[test]
    fn test_positions_stay_in_bounds() {
        let mut state = GameState::default();
        let mut rng = seeded();
        let directions = [
            MoveInput::new(1.0, 0.0),
            MoveInput::new(-1.0, 0.0),
            MoveInput::new(0.0, 1.0),
            MoveInput::new(0.0, -1.0),
            MoveInput::new(0.7071, -0.7071),
        ];

        for i in 0..directions.len() {
            state.add_player(format!("p{}", i), &mut rng);
        }
        for (i, input) in directions.iter().enumerate() {
            state.apply_input(&format!("p{}", i), *input);
        }

        for _ in 0..500 {
            state.update_positions();
            for player in state.players().values() {
                assert!(player.in_bounds(state.settings()));
            }
        }
    }

    #[test]
    fn test_set_nickname() {
        let mut state = state_with_player("a");

        let player = state.set_nickname("a", "  racer  ").unwrap();
        assert_eq!(player.nickname.as_deref(), Some("racer"));

        let player = state.set_nickname("a", "").unwrap();
        assert!(player.nickname.is_none());

        assert!(state.set_nickname("ghost", "boo").is_none());
    }
}
