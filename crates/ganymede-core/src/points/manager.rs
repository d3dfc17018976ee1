use crate::error::Result;
use crate::points::grid::AlignmentPointGrid;
use crate::points::point::AlignmentPoint;

/// Owning façade over the alignment point grid.
///
/// Interactive callers go through the manager to add, remove and look up
/// points; the registration pipeline borrows the grid directly.
pub struct AlignmentPointManager {
    grid: AlignmentPointGrid,
}

impl AlignmentPointManager {
    pub fn new(grid: AlignmentPointGrid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &AlignmentPointGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut AlignmentPointGrid {
        &mut self.grid
    }

    pub fn into_grid(self) -> AlignmentPointGrid {
        self.grid
    }

    pub fn points(&self) -> &[AlignmentPoint] {
        &self.grid.points
    }

    pub fn standard_count(&self) -> usize {
        self.grid.standard_count
    }

    /// Add a point at a user-chosen center. Returns its id.
    pub fn add_point(&mut self, y: usize, x: usize) -> Result<usize> {
        self.grid.add_user_point(y, x)
    }

    /// Remove a point by id; false when the id is unknown (or was already
    /// removed).
    pub fn remove_point(&mut self, id: usize) -> bool {
        self.grid.remove_alignment_point(id)
    }

    pub fn point_by_id(&self, id: usize) -> Option<&AlignmentPoint> {
        self.grid.points.iter().find(|p| p.id == id)
    }

    /// Surviving points whose centers lie inside the inclusive bounds.
    pub fn find_points(
        &self,
        y_low: usize,
        y_high: usize,
        x_low: usize,
        x_high: usize,
    ) -> Vec<&AlignmentPoint> {
        self.grid
            .find_alignment_points(y_low, y_high, x_low, x_high)
            .into_iter()
            .map(|idx| &self.grid.points[idx])
            .collect()
    }
}
