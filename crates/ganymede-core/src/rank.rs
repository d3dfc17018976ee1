//! Per-point frame ranking.
//!
//! Seeing quality varies across the field of view, so each alignment point
//! ranks the frame sequence independently: the patch region under the point
//! is scored with the configured contrast measure in every frame, and the
//! best `stack_size` frames per point are selected for stacking.

use std::cmp::Ordering;

use ndarray::s;
use rayon::prelude::*;
use tracing::info;

use crate::config::RegistrationConfig;
use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{GanymedeError, Result};
use crate::frame::{Frame, GlobalShift, Rect};
use crate::points::AlignmentPointGrid;
use crate::quality::{score_from_map, score_region};

/// Outcome of ranking the frame sequence at every alignment point.
#[derive(Clone, Debug)]
pub struct FrameRanking {
    /// Number of frames stacked per point.
    pub stack_size: usize,
    /// Reverse index: for each frame, the indices of the points whose best
    /// `stack_size` frames include it.
    pub points_per_frame: Vec<Vec<usize>>,
}

/// Rank all frames at every surviving alignment point.
///
/// Fills each point's `frame_qualities` and `best_frame_indices` (the
/// `stack_size` best frames, best first, stable order on ties) and returns
/// the stack size and the frame-to-points reverse index.
///
/// When every frame carries a contrast map computed with the configured
/// measure at a common downsample factor, scores are read from the maps
/// instead of recomputing the measure per patch.
pub fn compute_frame_qualities(
    frames: &[Frame],
    grid: &mut AlignmentPointGrid,
    shifts: &[GlobalShift],
    intersection: &Rect,
    config: &RegistrationConfig,
) -> Result<FrameRanking> {
    if frames.is_empty() {
        return Err(GanymedeError::EmptySequence);
    }
    if frames.len() != shifts.len() {
        return Err(GanymedeError::Pipeline(format!(
            "frame count ({}) and shift count ({}) differ",
            frames.len(),
            shifts.len()
        )));
    }

    let n = frames.len();
    let stack_size =
        ((n as f64 * config.stack_percent / 100.0).ceil() as usize).clamp(1, n);

    let offsets: Vec<(i64, i64)> = shifts
        .iter()
        .map(|shift| {
            (
                intersection.y_low as i64 - shift.dy,
                intersection.x_low as i64 - shift.dx,
            )
        })
        .collect();

    let cached_downsample = cached_map_downsample(frames, config);
    let rank_method = config.rank_method;

    let score_point = |point: &mut crate::points::AlignmentPoint| {
        let mut qualities = Vec::with_capacity(n);
        for (frame, &(off_y, off_x)) in frames.iter().zip(offsets.iter()) {
            let (h, w) = frame.data.dim();
            let region = clip_region(&point.patch_bounds, off_y, off_x, h, w);
            let cached = cached_downsample
                .and_then(|downsample| frame.contrast_map.as_ref().map(|m| (downsample, m)));
            let quality = match (region, cached) {
                (None, _) => 0.0,
                (Some(r), Some((downsample, map))) => {
                    let (mh, mw) = map.data.dim();
                    let my_low = (r.y_low / downsample).min(mh);
                    let my_high = (r.y_high / downsample).min(mh);
                    let mx_low = (r.x_low / downsample).min(mw);
                    let mx_high = (r.x_high / downsample).min(mw);
                    if my_low >= my_high || mx_low >= mx_high {
                        0.0
                    } else {
                        let view = map.data.slice(s![my_low..my_high, mx_low..mx_high]);
                        score_from_map(&view, rank_method)
                    }
                }
                (Some(r), None) => {
                    let view = frame
                        .data
                        .slice(s![r.y_low..r.y_high, r.x_low..r.x_high]);
                    score_region(&view, rank_method)
                }
            };
            qualities.push(quality);
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            qualities[b]
                .partial_cmp(&qualities[a])
                .unwrap_or(Ordering::Equal)
        });
        order.truncate(stack_size);

        point.frame_qualities = qualities;
        point.best_frame_indices = order;
    };

    if grid.points.len() >= PARALLEL_FRAME_THRESHOLD {
        grid.points.par_iter_mut().for_each(score_point);
    } else {
        grid.points.iter_mut().for_each(score_point);
    }

    let mut points_per_frame = vec![Vec::new(); n];
    for (point_index, point) in grid.points.iter().enumerate() {
        for &frame_index in &point.best_frame_indices {
            points_per_frame[frame_index].push(point_index);
        }
    }

    info!(
        points = grid.points.len(),
        frames = n,
        stack_size,
        cached = cached_downsample.is_some(),
        "frame ranking complete"
    );
    Ok(FrameRanking {
        stack_size,
        points_per_frame,
    })
}

/// Common contrast-map downsample factor when every frame carries a map
/// built with the configured measure; `None` forces the direct scoring path.
fn cached_map_downsample(frames: &[Frame], config: &RegistrationConfig) -> Option<usize> {
    let first = frames.first()?.contrast_map.as_ref()?;
    if first.method != config.rank_method {
        return None;
    }
    let downsample = first.downsample;
    for frame in frames {
        match &frame.contrast_map {
            Some(map) if map.method == config.rank_method && map.downsample == downsample => {}
            _ => return None,
        }
    }
    Some(downsample)
}

/// Map a patch rectangle from mean-frame to raw-frame coordinates and clip
/// it to the frame; `None` when nothing remains.
fn clip_region(patch: &Rect, off_y: i64, off_x: i64, h: usize, w: usize) -> Option<Rect> {
    let y_low = (patch.y_low as i64 + off_y).clamp(0, h as i64) as usize;
    let y_high = (patch.y_high as i64 + off_y).clamp(0, h as i64) as usize;
    let x_low = (patch.x_low as i64 + off_x).clamp(0, w as i64) as usize;
    let x_high = (patch.x_high as i64 + off_x).clamp(0, w as i64) as usize;
    if y_low >= y_high || x_low >= x_high {
        return None;
    }
    Some(Rect {
        y_low,
        y_high,
        x_low,
        x_high,
    })
}
