use ndarray::{s, Array2, Array3};

use crate::consts::{COLOR_CHANNEL_COUNT, MONO_CHANNEL_COUNT};
use crate::frame::Rect;

/// A local region of the scene tracked independently for de-warp shift
/// estimation and stacking.
///
/// The `box` bounds delimit the region used to *measure* the local shift;
/// the (normally larger) `patch` bounds delimit the region used to *stack*
/// pixels into the output.
#[derive(Clone, Debug)]
pub struct AlignmentPoint {
    /// Stable identity, assigned by the owning grid.
    pub id: usize,
    /// Center row in reference-image coordinates.
    pub y: usize,
    /// Center column in reference-image coordinates.
    pub x: usize,
    /// Current box half width (enlarged when the point was recentred).
    pub half_box_width: usize,
    /// Current patch half width (enlarged when the point was recentred).
    pub half_patch_width: usize,
    /// Shift-measurement bounds, clamped to leave the search margin.
    pub box_bounds: Rect,
    /// Stacking bounds, clamped to the frame (or extended flush to it).
    pub patch_bounds: Rect,
    /// Snapshot of the reference-image pixels inside the box.
    pub reference_box: Array2<f32>,
    /// Structure score; raw after construction, normalized to [0, 1] by the
    /// grid once all candidates exist.
    pub structure: f64,
    pub max_brightness: f32,
    pub min_brightness: f32,
    /// Indices into the grid's dim-dropped arena of points delegated here.
    pub dim_delegates: Vec<usize>,
    /// Indices into the grid's structure-dropped arena of points delegated
    /// here.
    pub low_structure_delegates: Vec<usize>,
    /// Per-frame local contrast qualities, filled by the frame ranker.
    pub frame_qualities: Vec<f64>,
    /// Frame indices selected for stacking at this point, best first.
    pub best_frame_indices: Vec<usize>,
    /// Zero-initialized accumulation buffer, shape (patch_h, patch_w,
    /// channels), written only by the stacking phase.
    pub stack_buffer: Array3<f32>,
}

impl AlignmentPoint {
    /// Pure constructor: clamp box and patch bounds, snapshot the reference
    /// pixels, allocate the accumulation buffer.
    ///
    /// Box bounds are clamped into `[0, axis_len - search_width]` so every
    /// in-range displacement of the box stays addressable; patch bounds are
    /// clamped into `[0, axis_len]`, with `extend_left` / `extend_right`
    /// forcing the respective patch bound flush to the frame edge.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        reference_image: &Array2<f32>,
        is_color: bool,
        y: usize,
        x: usize,
        half_box_width: usize,
        half_patch_width: usize,
        search_width: usize,
        extend_left: bool,
        extend_right: bool,
    ) -> Self {
        let (num_pixels_y, num_pixels_x) = reference_image.dim();

        let box_limit_y = num_pixels_y.saturating_sub(search_width);
        let box_limit_x = num_pixels_x.saturating_sub(search_width);
        let box_bounds = Rect {
            y_low: clamp_axis(y as i64 - half_box_width as i64, box_limit_y),
            y_high: clamp_axis(y as i64 + half_box_width as i64, box_limit_y),
            x_low: clamp_axis(x as i64 - half_box_width as i64, box_limit_x),
            x_high: clamp_axis(x as i64 + half_box_width as i64, box_limit_x),
        };

        let patch_bounds = Rect {
            y_low: clamp_axis(y as i64 - half_patch_width as i64, num_pixels_y),
            y_high: clamp_axis(y as i64 + half_patch_width as i64, num_pixels_y),
            x_low: if extend_left {
                0
            } else {
                clamp_axis(x as i64 - half_patch_width as i64, num_pixels_x)
            },
            x_high: if extend_right {
                num_pixels_x
            } else {
                clamp_axis(x as i64 + half_patch_width as i64, num_pixels_x)
            },
        };

        let reference_box = reference_image
            .slice(s![
                box_bounds.y_low..box_bounds.y_high,
                box_bounds.x_low..box_bounds.x_high
            ])
            .to_owned();

        let mut max_brightness = f32::NEG_INFINITY;
        let mut min_brightness = f32::INFINITY;
        for &v in reference_box.iter() {
            max_brightness = max_brightness.max(v);
            min_brightness = min_brightness.min(v);
        }

        let channels = if is_color {
            COLOR_CHANNEL_COUNT
        } else {
            MONO_CHANNEL_COUNT
        };
        let stack_buffer =
            Array3::<f32>::zeros((patch_bounds.height(), patch_bounds.width(), channels));

        Self {
            id,
            y,
            x,
            half_box_width,
            half_patch_width,
            box_bounds,
            patch_bounds,
            reference_box,
            structure: 0.0,
            max_brightness,
            min_brightness,
            dim_delegates: Vec::new(),
            low_structure_delegates: Vec::new(),
            frame_qualities: Vec::new(),
            best_frame_indices: Vec::new(),
            stack_buffer,
        }
    }

    /// Squared Euclidean distance between this point's center and another.
    pub fn center_distance_squared(&self, other: &AlignmentPoint) -> u64 {
        let dy = self.y as i64 - other.y as i64;
        let dx = self.x as i64 - other.x as i64;
        (dy * dy + dx * dx) as u64
    }

    /// Fraction of reference-box pixels below the given brightness.
    pub fn dim_pixel_fraction(&self, brightness_threshold: f32) -> f64 {
        let total = self.reference_box.len();
        if total == 0 {
            return 0.0;
        }
        let dim = self
            .reference_box
            .iter()
            .filter(|&&v| v < brightness_threshold)
            .count();
        dim as f64 / total as f64
    }

    /// Intensity centroid of the reference box in reference-image
    /// coordinates, or `None` for an all-zero box.
    pub fn brightness_centroid(&self) -> Option<(usize, usize)> {
        let mut weight = 0.0f64;
        let mut moment_y = 0.0f64;
        let mut moment_x = 0.0f64;
        for ((row, col), &v) in self.reference_box.indexed_iter() {
            weight += v as f64;
            moment_y += row as f64 * v as f64;
            moment_x += col as f64 * v as f64;
        }
        if weight <= 0.0 {
            return None;
        }
        let cy = self.box_bounds.y_low + (moment_y / weight).round() as usize;
        let cx = self.box_bounds.x_low + (moment_x / weight).round() as usize;
        Some((cy, cx))
    }
}

fn clamp_axis(value: i64, limit: usize) -> usize {
    value.clamp(0, limit as i64) as usize
}
