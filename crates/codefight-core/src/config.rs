//! Static game configuration and its validation.

use serde::{Deserialize, Serialize};

use crate::init::InitializationMode;
use crate::{EngineError, MAX_MEMORY_SIZE, MIN_MEMORY_SIZE, MIN_PLAYERS};

/// Static configuration for a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    /// Number of cells in the circular arena.
    pub memory_size: usize,
    /// Upper bound on AIs selected for one battle.
    pub max_players: usize,
    /// Filler used for cells no program occupies.
    pub init_mode: InitializationMode,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            memory_size: 1024,
            max_players: 4,
            init_mode: InitializationMode::Stop,
        }
    }
}

impl GameConfig {
    /// Config with the default filler.
    #[must_use]
    pub fn new(memory_size: usize, max_players: usize) -> Self {
        Self {
            memory_size,
            max_players,
            init_mode: InitializationMode::default(),
        }
    }

    /// Builder-style filler override.
    #[must_use]
    pub fn with_init_mode(mut self, init_mode: InitializationMode) -> Self {
        self.init_mode = init_mode;
        self
    }

    /// Check bounds on every field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(MIN_MEMORY_SIZE..=MAX_MEMORY_SIZE).contains(&self.memory_size) {
            return Err(EngineError::ArgumentInvalid(format!(
                "memory size must be between {MIN_MEMORY_SIZE} and {MAX_MEMORY_SIZE}, got {}",
                self.memory_size
            )));
        }
        if self.max_players < MIN_PLAYERS {
            return Err(EngineError::ArgumentInvalid(format!(
                "at least {MIN_PLAYERS} players must be allowed, got {}",
                self.max_players
            )));
        }
        self.init_mode.validate()
    }
}
