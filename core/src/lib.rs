use serde::{Deserialize, Serialize};

pub use engine::*;
pub use error::*;
pub use grid::*;
pub use sink::*;
pub use target::*;
pub use types::*;

mod engine;
mod error;
mod grid;
mod sink;
mod target;
mod types;

/// Session shape: field size, round count, timing, and the fail limit.
/// Delays of zero are legal (rounds resolve on the next timer tick); a zero
/// round count is legal and finalizes immediately on start.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub grid_size: Coord2,
    pub rounds: u32,
    pub show_delay_ms: u32,
    pub hide_delay_ms: u32,
    pub max_fails: u32,
}

impl GameConfig {
    pub const fn new_unchecked(
        grid_size: Coord2,
        rounds: u32,
        show_delay_ms: u32,
        hide_delay_ms: u32,
        max_fails: u32,
    ) -> Self {
        Self {
            grid_size,
            rounds,
            show_delay_ms,
            hide_delay_ms,
            max_fails,
        }
    }

    pub fn new(
        grid_size: Coord2,
        rounds: u32,
        show_delay_ms: u32,
        hide_delay_ms: u32,
        max_fails: u32,
    ) -> Result<Self> {
        let config = Self::new_unchecked(grid_size, rounds, show_delay_ms, hide_delay_ms, max_fails);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_cells() == 0 {
            return Err(GameError::EmptyField);
        }
        if self.max_fails == 0 {
            return Err(GameError::ZeroFailLimit);
        }
        Ok(())
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.grid_size.0, self.grid_size.1)
    }

    pub const fn quick() -> Self {
        Self::new_unchecked((4, 4), 10, 500, 1000, 5)
    }

    pub const fn standard() -> Self {
        Self::new_unchecked((4, 4), 20, 450, 850, 5)
    }

    pub const fn marathon() -> Self {
        Self::new_unchecked((5, 5), 40, 350, 700, 3)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new_unchecked((4, 4), 1, 500, 1000, 5)
    }
}

/// When a miss is charged against the fail counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailAccounting {
    /// Every click outside the target charges a fail on the spot.
    Immediate,
    /// Fails surface only at round end, one per round with no hit.
    RoundEnd,
}

/// Which end-of-game surface the presentation layer should raise.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndOfGameUi {
    Modal,
    Notification,
}

/// The two observed controller behaviors folded into one configurable
/// machine.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GamePolicy {
    pub fail_accounting: FailAccounting,
    pub inter_round_gap: bool,
    pub end_of_game_ui: EndOfGameUi,
}

impl GamePolicy {
    /// Misses charge immediately; rounds are separated by a gap; the session
    /// ends with a plain notification.
    pub const fn immediate() -> Self {
        Self {
            fail_accounting: FailAccounting::Immediate,
            inter_round_gap: true,
            end_of_game_ui: EndOfGameUi::Notification,
        }
    }

    /// Fails surface at round end; rounds run back to back; the session ends
    /// with a modal dialog.
    pub const fn deferred() -> Self {
        Self {
            fail_accounting: FailAccounting::RoundEnd,
            inter_round_gap: false,
            end_of_game_ui: EndOfGameUi::Modal,
        }
    }
}

impl Default for GamePolicy {
    fn default() -> Self {
        Self::deferred()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_zero_fail_limit() {
        assert_eq!(
            GameConfig::new((4, 4), 10, 500, 1000, 0).unwrap_err(),
            GameError::ZeroFailLimit
        );
    }

    #[test]
    fn config_rejects_empty_field() {
        assert_eq!(
            GameConfig::new((0, 4), 10, 500, 1000, 5).unwrap_err(),
            GameError::EmptyField
        );
    }

    #[test]
    fn zero_rounds_and_zero_delays_are_legal() {
        assert!(GameConfig::new((4, 4), 0, 0, 0, 1).is_ok());
    }

    #[test]
    fn presets_are_valid() {
        for preset in [
            GameConfig::quick(),
            GameConfig::standard(),
            GameConfig::marathon(),
            GameConfig::default(),
        ] {
            preset.validate().unwrap();
        }
    }
}
