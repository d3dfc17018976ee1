//! Local warp measurement around alignment points.
//!
//! Once frames are rigidly registered, atmospheric seeing still displaces
//! small regions of the image independently. For each alignment point and
//! frame this module measures that residual shift by comparing the frame's
//! pixels under the point's box against the reference box snapshot.

use ndarray::{s, Array2};

use crate::config::{AlignmentMethod, RegistrationConfig};
use crate::consts::SUBPIXEL_UPSAMPLE_FACTOR;
use crate::error::{GanymedeError, Result};
use crate::frame::{Frame, GlobalShift, Rect, ShiftVector};
use crate::points::AlignmentPoint;

use super::phase_correlation::compute_offset_integer;
use super::subpixel::register_translation_subpixel;

/// Residual local shift of one alignment point in one frame.
///
/// `error` and `diff_phase` are diagnostics produced only by the
/// [`AlignmentMethod::Subpixel`] method.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocalShift {
    pub shift: ShiftVector,
    pub error: Option<f64>,
    pub diff_phase: Option<f64>,
}

impl LocalShift {
    fn integer(dy: i64, dx: i64) -> Self {
        Self {
            shift: ShiftVector {
                dy: dy as f64,
                dx: dx as f64,
            },
            error: None,
            diff_phase: None,
        }
    }
}

/// Measure the residual shift of `point` in `frame`.
///
/// `global_shift` is the frame's rigid shift and `intersection` the common
/// region all frames cover; together they place the point's box (given in
/// mean-frame coordinates) inside the raw frame. With `de_warp` disabled the
/// result is always zero and no pixels are touched.
pub fn compute_shift(
    frame: &Frame,
    point: &AlignmentPoint,
    global_shift: GlobalShift,
    intersection: &Rect,
    config: &RegistrationConfig,
    de_warp: bool,
) -> Result<LocalShift> {
    if !de_warp {
        return Ok(LocalShift::default());
    }

    let offset_y = intersection.y_low as i64 - global_shift.dy;
    let offset_x = intersection.x_low as i64 - global_shift.dx;

    match config.alignment_method {
        AlignmentMethod::RadialSearch => Ok(radial_search(
            &frame.data,
            point,
            offset_y,
            offset_x,
            config.search_width,
            config.local_subpixel_refinement,
        )),
        AlignmentMethod::SteepestDescent => Ok(steepest_descent(
            &frame.data,
            point,
            offset_y,
            offset_x,
            config.search_width,
        )),
        AlignmentMethod::Subpixel => {
            let window = frame_box(&frame.data, point, offset_y, offset_x)?;
            let registration = register_translation_subpixel(
                &point.reference_box,
                &window,
                SUBPIXEL_UPSAMPLE_FACTOR,
            )?;
            Ok(LocalShift {
                shift: registration.shift,
                error: Some(registration.error),
                diff_phase: Some(registration.diff_phase),
            })
        }
        AlignmentMethod::CrossCorrelation => {
            let window = frame_box(&frame.data, point, offset_y, offset_x)?;
            let (dy, dx) = compute_offset_integer(&point.reference_box, &window)?;
            Ok(LocalShift::integer(dy, dx))
        }
    }
}

/// Extract the frame pixels under the point's box at zero displacement.
fn frame_box(
    frame_data: &Array2<f32>,
    point: &AlignmentPoint,
    offset_y: i64,
    offset_x: i64,
) -> Result<Array2<f32>> {
    let (h, w) = frame_data.dim();
    let bounds = point.box_bounds;
    let y_low = bounds.y_low as i64 + offset_y;
    let y_high = bounds.y_high as i64 + offset_y;
    let x_low = bounds.x_low as i64 + offset_x;
    let x_high = bounds.x_high as i64 + offset_x;

    if y_low < 0 || x_low < 0 || y_high > h as i64 || x_high > w as i64 {
        return Err(GanymedeError::Pipeline(format!(
            "alignment point {} box falls outside the frame after shifting",
            point.id
        )));
    }

    Ok(frame_data
        .slice(s![
            y_low as usize..y_high as usize,
            x_low as usize..x_high as usize
        ])
        .to_owned())
}

/// Sum of absolute differences between the reference box and the frame box
/// displaced by `(dy, dx)`, or `None` when the displaced box leaves the
/// frame.
///
/// Content displaced by `(dy, dx)` in the sign convention lands at pixel
/// coordinates lowered by the same amount, hence the subtraction.
fn box_deviation(
    frame_data: &Array2<f32>,
    point: &AlignmentPoint,
    offset_y: i64,
    offset_x: i64,
    dy: i64,
    dx: i64,
) -> Option<f32> {
    let (h, w) = frame_data.dim();
    let bounds = point.box_bounds;
    let y_low = bounds.y_low as i64 + offset_y - dy;
    let y_high = bounds.y_high as i64 + offset_y - dy;
    let x_low = bounds.x_low as i64 + offset_x - dx;
    let x_high = bounds.x_high as i64 + offset_x - dx;

    if y_low < 0 || x_low < 0 || y_high > h as i64 || x_high > w as i64 {
        return None;
    }

    let window = frame_data.slice(s![
        y_low as usize..y_high as usize,
        x_low as usize..x_high as usize
    ]);

    let mut deviation = 0.0f32;
    for (a, b) in window.iter().zip(point.reference_box.iter()) {
        deviation += (a - b).abs();
    }
    Some(deviation)
}

/// Walk the square ring of Chebyshev radius `radius` in a fixed order: top
/// edge left to right, right edge downwards, bottom edge right to left, left
/// edge upwards.
fn chebyshev_ring(radius: i64) -> Vec<(i64, i64)> {
    let mut ring = Vec::with_capacity((8 * radius) as usize);
    for dx in -radius..=radius {
        ring.push((-radius, dx));
    }
    for dy in -radius + 1..=radius {
        ring.push((dy, radius));
    }
    for dx in (-radius..radius).rev() {
        ring.push((radius, dx));
    }
    for dy in (-radius + 1..radius).rev() {
        ring.push((dy, -radius));
    }
    ring
}

/// Expanding-ring minimum search over the deviation surface.
///
/// Rings of growing Chebyshev radius are evaluated until a ring's minimum no
/// longer improves on the previous ring's; the previous ring's best
/// displacement is then the result. Exhausting `search_width` without such a
/// divergence means the surface has no usable minimum, and the shift falls
/// back to zero.
fn radial_search(
    frame_data: &Array2<f32>,
    point: &AlignmentPoint,
    offset_y: i64,
    offset_x: i64,
    search_width: usize,
    subpixel_refinement: bool,
) -> LocalShift {
    let center = match box_deviation(frame_data, point, offset_y, offset_x, 0, 0) {
        Some(v) => v,
        None => return LocalShift::default(),
    };

    let mut best = (0i64, 0i64);
    let mut min_prev = center;
    let mut converged = false;

    for radius in 1..=search_width as i64 {
        let mut min_ring = f32::INFINITY;
        let mut best_ring = (0i64, 0i64);
        for (dy, dx) in chebyshev_ring(radius) {
            if let Some(dev) = box_deviation(frame_data, point, offset_y, offset_x, dy, dx) {
                if dev < min_ring {
                    min_ring = dev;
                    best_ring = (dy, dx);
                }
            }
        }
        if min_ring >= min_prev {
            converged = true;
            break;
        }
        min_prev = min_ring;
        best = best_ring;
    }

    if !converged {
        return LocalShift::default();
    }

    let (dy, dx) = best;
    if !subpixel_refinement {
        return LocalShift::integer(dy, dx);
    }

    let fit = |prev: Option<f32>, curr: f32, next: Option<f32>| -> f64 {
        match (prev, next) {
            (Some(p), Some(n)) => {
                let denom = (p - 2.0 * curr + n) as f64;
                if denom.abs() > 1e-12 {
                    (((p - n) as f64) / (2.0 * denom)).clamp(-0.5, 0.5)
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    };

    // Deviation at the winner is needed for the parabola vertex; it was
    // already computed inside the ring scan but not retained.
    let curr = match box_deviation(frame_data, point, offset_y, offset_x, dy, dx) {
        Some(v) => v,
        None => return LocalShift::integer(dy, dx),
    };
    let sub_dy = fit(
        box_deviation(frame_data, point, offset_y, offset_x, dy - 1, dx),
        curr,
        box_deviation(frame_data, point, offset_y, offset_x, dy + 1, dx),
    );
    let sub_dx = fit(
        box_deviation(frame_data, point, offset_y, offset_x, dy, dx - 1),
        curr,
        box_deviation(frame_data, point, offset_y, offset_x, dy, dx + 1),
    );

    LocalShift {
        shift: ShiftVector {
            dy: dy as f64 + sub_dy,
            dx: dx as f64 + sub_dx,
        },
        error: None,
        diff_phase: None,
    }
}

/// Greedy descent over the deviation surface: from zero displacement, move
/// to the best strictly improving 8-connected neighbor until none improves
/// or the search boundary is reached. Integer result only.
fn steepest_descent(
    frame_data: &Array2<f32>,
    point: &AlignmentPoint,
    offset_y: i64,
    offset_x: i64,
    search_width: usize,
) -> LocalShift {
    const NEIGHBORS: [(i64, i64); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];

    let mut current = (0i64, 0i64);
    let mut current_dev = match box_deviation(frame_data, point, offset_y, offset_x, 0, 0) {
        Some(v) => v,
        None => return LocalShift::default(),
    };
    let limit = search_width as i64;

    loop {
        let mut best_dev = current_dev;
        let mut best_step = None;
        for (step_y, step_x) in NEIGHBORS {
            let dy = current.0 + step_y;
            let dx = current.1 + step_x;
            if dy.abs() > limit || dx.abs() > limit {
                continue;
            }
            if let Some(dev) = box_deviation(frame_data, point, offset_y, offset_x, dy, dx) {
                if dev < best_dev {
                    best_dev = dev;
                    best_step = Some((dy, dx));
                }
            }
        }
        match best_step {
            Some(next) => {
                current = next;
                current_dev = best_dev;
            }
            None => break,
        }
    }

    LocalShift::integer(current.0, current.1)
}
