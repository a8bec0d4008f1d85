use ndarray::Array2;

use crate::*;

/// Per-cell "the goblin is here" marker mask. The mask itself has no opinion
/// on how many cells are marked; the controller keeps it to at most one.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetMask {
    marks: Array2<bool>,
}

impl TargetMask {
    pub fn new(size: Coord2) -> Self {
        Self {
            marks: Array2::default(size.to_nd_index()),
        }
    }

    /// Stable identity of the marker. The web layer uses it verbatim as the
    /// cell class, so it stays dot-free.
    pub const fn marker_tag() -> &'static str {
        "goblin-here"
    }

    /// Marks `cell` as occupied. Marking an already-marked cell is a no-op in
    /// effect.
    pub fn show(&mut self, cell: Coord2) {
        self.marks[cell.to_nd_index()] = true;
    }

    /// Unmarks `cell`; idempotent when the cell is not marked.
    pub fn hide(&mut self, cell: Coord2) {
        self.marks[cell.to_nd_index()] = false;
    }

    pub fn is_marked(&self, cell: Coord2) -> bool {
        self.marks[cell.to_nd_index()]
    }

    pub fn marked_cell(&self) -> Option<Coord2> {
        self.marks
            .indexed_iter()
            .find(|&(_, &marked)| marked)
            .map(|((x, y), _)| (x as Coord, y as Coord))
    }

    /// Unmarks every cell, reporting whether any mark was present.
    pub fn clear_all(&mut self) -> bool {
        let any = self.marks.iter().any(|&marked| marked);
        self.marks.fill(false);
        any
    }
}
