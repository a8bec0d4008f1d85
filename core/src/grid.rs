use rand::prelude::*;

use crate::*;

/// Fixed-shape playing field plus the no-repeat random cell selector. Shape is
/// immutable after construction; only the last-pick memory mutates.
#[derive(Clone, Debug)]
pub struct Grid {
    size: Coord2,
    last_pick: Option<CellCount>,
    rng: SmallRng,
}

impl Grid {
    pub fn new(size: Coord2, seed: u64) -> Result<Self> {
        if mult(size.0, size.1) == 0 {
            return Err(GameError::EmptyField);
        }
        Ok(Self {
            size,
            last_pick: None,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    pub fn size(&self) -> Coord2 {
        self.size
    }

    pub fn cell_count(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }

    pub fn contains(&self, (x, y): Coord2) -> bool {
        x < self.size.0 && y < self.size.1
    }

    /// Draws a uniformly random cell, redrawing while it matches the previous
    /// pick and more than one cell exists. The rejection loop terminates with
    /// probability 1 and in practice within a couple of draws on any real
    /// field size.
    pub fn random_cell(&mut self) -> Coord2 {
        let cells = self.cell_count();
        let mut pick;
        loop {
            pick = self.rng.random_range(0..cells);
            if cells == 1 || Some(pick) != self.last_pick {
                break;
            }
        }
        self.last_pick = Some(pick);
        from_flat(pick, self.size.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_is_rejected_at_construction() {
        assert_eq!(Grid::new((0, 4), 1).unwrap_err(), GameError::EmptyField);
        assert_eq!(Grid::new((4, 0), 1).unwrap_err(), GameError::EmptyField);
    }

    #[test]
    fn consecutive_picks_never_repeat_on_multi_cell_fields() {
        let mut grid = Grid::new((4, 4), 42).unwrap();
        let mut prev = grid.random_cell();
        for _ in 0..500 {
            let next = grid.random_cell();
            assert_ne!(next, prev);
            prev = next;
        }
    }

    #[test]
    fn single_cell_field_always_returns_that_cell() {
        let mut grid = Grid::new((1, 1), 7).unwrap();
        for _ in 0..10 {
            assert_eq!(grid.random_cell(), (0, 0));
        }
    }

    #[test]
    fn picks_stay_inside_the_field() {
        let mut grid = Grid::new((3, 2), 9).unwrap();
        for _ in 0..100 {
            let cell = grid.random_cell();
            assert!(grid.contains(cell));
        }
    }

    #[test]
    fn two_cell_field_alternates() {
        // with only two cells the no-repeat rule forces strict alternation
        let mut grid = Grid::new((2, 1), 3).unwrap();
        let first = grid.random_cell();
        let second = grid.random_cell();
        assert_ne!(first, second);
        assert_eq!(grid.random_cell(), first);
    }
}
