use ndarray::{Array2, ArrayView2};
use tracing::{debug, info};

use crate::config::RegistrationConfig;
use crate::error::{GanymedeError, Result};
use crate::points::point::AlignmentPoint;

/// Structure measure applied to a point's reference box during grid
/// construction.
pub type StructureMeasure = fn(&ArrayView2<f32>) -> f64;

/// Regular grid of alignment points over the mean frame, filtered down to
/// the points with enough signal to track.
///
/// Candidates rejected at admission (too dark or too flat) land in the
/// dim-dropped arena; admitted points whose normalized structure falls below
/// the threshold land in the structure-dropped arena. Dropped points are
/// kept so [`resolve_neighbors`](Self::resolve_neighbors) can delegate their
/// image area to the nearest survivor.
pub struct AlignmentPointGrid {
    reference: Array2<f32>,
    is_color: bool,
    config: RegistrationConfig,
    measure: StructureMeasure,
    structure_normalizer: f64,
    /// Surviving points; grid-generated survivors first, user-added after.
    pub points: Vec<AlignmentPoint>,
    /// Number of grid-generated survivors at the front of `points`.
    pub standard_count: usize,
    /// Arena of candidates that failed brightness or contrast admission.
    pub dim_dropped: Vec<AlignmentPoint>,
    /// Arena of admitted points filtered out for low structure.
    pub structure_dropped: Vec<AlignmentPoint>,
    next_id: usize,
    neighbors_resolved: bool,
}

impl AlignmentPointGrid {
    /// Center coordinates along one axis.
    ///
    /// A margin of `half_box_width + search_width` is reserved at both ends
    /// so every point's displaced box stays inside the frame. The interior
    /// is divided into `ceil(interior / step_size)` equal cells; even rows
    /// place points on cell boundaries (one more point than cells), odd rows
    /// at cell centers, producing the staggered layout.
    pub fn axis_locations(
        num_pixels: usize,
        half_box_width: usize,
        search_width: usize,
        step_size: usize,
        even: bool,
    ) -> Vec<usize> {
        let margin = half_box_width + search_width;
        let interior = num_pixels as i64 - 2 * margin as i64;
        if interior <= 0 || step_size == 0 {
            return Vec::new();
        }

        let count = (interior as f64 / step_size as f64).ceil() as usize;
        let spacing = interior as f64 / count as f64;

        if even {
            (0..=count)
                .map(|k| margin + (k as f64 * spacing).round() as usize)
                .collect()
        } else {
            (0..count)
                .map(|k| margin + (spacing / 2.0 + k as f64 * spacing).round() as usize)
                .collect()
        }
    }

    /// Build the grid over the mean frame.
    ///
    /// `reference` is the mean frame in intersection coordinates; `measure`
    /// scores a reference box's structure. The grid keeps a copy of both so
    /// points added later go through the same construction path.
    pub fn build(
        reference: Array2<f32>,
        is_color: bool,
        config: &RegistrationConfig,
        measure: StructureMeasure,
    ) -> Result<Self> {
        let (num_y, num_x) = reference.dim();
        let margin = config.half_box_width + config.search_width;
        if num_y <= 2 * margin || num_x <= 2 * margin {
            return Err(GanymedeError::Pipeline(format!(
                "mean frame {}x{} too small for alignment point margins of {}",
                num_y, num_x, margin
            )));
        }

        let y_locations = Self::axis_locations(
            num_y,
            config.half_box_width,
            config.search_width,
            config.step_size,
            true,
        );
        let x_even = Self::axis_locations(
            num_x,
            config.half_box_width,
            config.search_width,
            config.step_size,
            true,
        );
        let x_odd = Self::axis_locations(
            num_x,
            config.half_box_width,
            config.search_width,
            config.step_size,
            false,
        );
        if y_locations.is_empty() || x_even.is_empty() || x_odd.is_empty() {
            return Err(GanymedeError::Pipeline(
                "mean frame leaves no room for alignment points".into(),
            ));
        }

        let mut grid = Self {
            reference,
            is_color,
            config: config.clone(),
            measure,
            structure_normalizer: 0.0,
            points: Vec::new(),
            standard_count: 0,
            dim_dropped: Vec::new(),
            structure_dropped: Vec::new(),
            next_id: 0,
            neighbors_resolved: false,
        };

        for (row, &y) in y_locations.iter().enumerate() {
            let even_row = row % 2 == 0;
            let x_locations = if even_row { &x_even } else { &x_odd };
            let last = x_locations.len() - 1;
            for (col, &x) in x_locations.iter().enumerate() {
                // Odd rows are inset by half a cell; their outermost patches
                // are extended flush to the frame edge to keep coverage.
                let extend_left = !even_row && col == 0;
                let extend_right = !even_row && col == last;
                grid.insert_candidate(y, x, extend_left, extend_right);
            }
        }

        grid.normalize_structure();
        grid.filter_structure();
        grid.standard_count = grid.points.len();

        info!(
            surviving = grid.points.len(),
            dim_dropped = grid.dim_dropped.len(),
            structure_dropped = grid.structure_dropped.len(),
            "alignment point grid built"
        );
        Ok(grid)
    }

    pub fn reference(&self) -> &Array2<f32> {
        &self.reference
    }

    pub fn is_color(&self) -> bool {
        self.is_color
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Construct a candidate, run admission, recentre if needed, and file it
    /// into the surviving or dim-dropped list.
    fn insert_candidate(&mut self, y: usize, x: usize, extend_left: bool, extend_right: bool) {
        let id = self.next_id;
        self.next_id += 1;

        let mut point = AlignmentPoint::new(
            id,
            &self.reference,
            self.is_color,
            y,
            x,
            self.config.half_box_width,
            self.config.half_patch_width,
            self.config.search_width,
            extend_left,
            extend_right,
        );

        let bright = point.max_brightness > self.config.brightness_threshold;
        let contrasted =
            point.max_brightness - point.min_brightness > self.config.contrast_threshold;
        if !bright || !contrasted {
            self.dim_dropped.push(point);
            return;
        }

        // A mostly dark box tracks poorly; move it onto the bright feature
        // and widen it so the feature stays inside after the move.
        if point.dim_pixel_fraction(self.config.brightness_threshold)
            > self.config.dim_fraction_threshold
        {
            if let Some((cy, cx)) = point.brightness_centroid() {
                if (cy, cx) != (point.y, point.x) {
                    let magnitude = (cy as i64 - point.y as i64)
                        .abs()
                        .max((cx as i64 - point.x as i64).abs())
                        as usize;
                    debug!(id, from_y = point.y, from_x = point.x, to_y = cy, to_x = cx,
                        "recentring alignment point");
                    point = AlignmentPoint::new(
                        id,
                        &self.reference,
                        self.is_color,
                        cy,
                        cx,
                        self.config.half_box_width + magnitude,
                        self.config.half_patch_width + magnitude,
                        self.config.search_width,
                        extend_left,
                        extend_right,
                    );
                }
            }
        }

        point.structure = (self.measure)(&point.reference_box.view());
        self.points.push(point);
    }

    /// Normalize raw structure scores by the maximum over admitted points.
    fn normalize_structure(&mut self) {
        let max_raw = self
            .points
            .iter()
            .map(|p| p.structure)
            .fold(0.0f64, f64::max);
        self.structure_normalizer = max_raw;
        if max_raw > 0.0 {
            for point in &mut self.points {
                point.structure /= max_raw;
            }
        }
    }

    /// Single order-preserving pass moving points below the structure
    /// threshold into the structure-dropped arena.
    fn filter_structure(&mut self) {
        let threshold = self.config.structure_threshold;
        let mut survivors = Vec::with_capacity(self.points.len());
        for point in self.points.drain(..) {
            if point.structure < threshold {
                self.structure_dropped.push(point);
            } else {
                survivors.push(point);
            }
        }
        self.points = survivors;
    }

    /// Add a point at a user-chosen center, bypassing admission and
    /// structure filtering. Returns the new point's id.
    pub fn add_user_point(&mut self, y: usize, x: usize) -> Result<usize> {
        let (num_y, num_x) = self.reference.dim();
        if y >= num_y || x >= num_x {
            return Err(GanymedeError::InvalidConfig(format!(
                "alignment point center ({}, {}) outside the {}x{} mean frame",
                y, x, num_y, num_x
            )));
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut point = AlignmentPoint::new(
            id,
            &self.reference,
            self.is_color,
            y,
            x,
            self.config.half_box_width,
            self.config.half_patch_width,
            self.config.search_width,
            false,
            false,
        );
        point.structure = if self.structure_normalizer > 0.0 {
            (self.measure)(&point.reference_box.view()) / self.structure_normalizer
        } else {
            (self.measure)(&point.reference_box.view())
        };
        self.points.push(point);
        Ok(id)
    }

    /// Remove a surviving point by id. Returns false when no such point
    /// exists, so removing the same id twice fails the second time.
    ///
    /// Grid-generated points move to the dim-dropped arena so their image
    /// area can still be delegated; user-added points are discarded.
    pub fn remove_alignment_point(&mut self, id: usize) -> bool {
        let position = match self.points.iter().position(|p| p.id == id) {
            Some(p) => p,
            None => return false,
        };
        let point = self.points.remove(position);
        if position < self.standard_count {
            self.standard_count -= 1;
            self.dim_dropped.push(point);
        }
        true
    }

    /// Indices of surviving points whose centers lie inside the inclusive
    /// bounds.
    pub fn find_alignment_points(
        &self,
        y_low: usize,
        y_high: usize,
        x_low: usize,
        x_high: usize,
    ) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.y >= y_low && p.y <= y_high && p.x >= x_low && p.x <= x_high)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Delegate every dropped point to its nearest surviving point (squared
    /// Euclidean center distance, first survivor wins ties).
    ///
    /// Runs once per grid; a second call is a fatal ordering error.
    pub fn resolve_neighbors(&mut self) -> Result<()> {
        if self.neighbors_resolved {
            return Err(GanymedeError::WrongOrdering(
                "resolve_neighbors already ran for this grid".into(),
            ));
        }
        if self.dim_dropped.is_empty() && self.structure_dropped.is_empty() {
            self.neighbors_resolved = true;
            return Ok(());
        }
        if self.points.is_empty() {
            return Err(GanymedeError::Pipeline(
                "dropped alignment points cannot be delegated without survivors".into(),
            ));
        }
        self.neighbors_resolved = true;

        let dim_winners: Vec<usize> = self
            .dim_dropped
            .iter()
            .map(|dropped| self.nearest_survivor(dropped))
            .collect();
        let structure_winners: Vec<usize> = self
            .structure_dropped
            .iter()
            .map(|dropped| self.nearest_survivor(dropped))
            .collect();

        for (arena_index, winner) in dim_winners.into_iter().enumerate() {
            self.points[winner].dim_delegates.push(arena_index);
        }
        for (arena_index, winner) in structure_winners.into_iter().enumerate() {
            self.points[winner]
                .low_structure_delegates
                .push(arena_index);
        }
        Ok(())
    }

    fn nearest_survivor(&self, dropped: &AlignmentPoint) -> usize {
        let mut best = 0;
        let mut best_distance = u64::MAX;
        for (idx, point) in self.points.iter().enumerate() {
            let distance = point.center_distance_squared(dropped);
            if distance < best_distance {
                best_distance = distance;
                best = idx;
            }
        }
        best
    }
}
