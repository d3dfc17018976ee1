//! End-to-end registration pipeline.
//!
//! Ties the phases together in their mandatory order: whole-frame quality
//! ranking, rigid alignment against the best frame, mean-frame synthesis,
//! alignment point grid construction, and per-point frame ranking. The
//! stacking phase itself consumes the outcome and is out of scope here.

use std::cmp::Ordering;

use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;

use crate::align::GlobalAligner;
use crate::config::{RankMethod, RegistrationConfig};
use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{GanymedeError, Result};
use crate::frame::{Frame, GlobalShift, Rect};
use crate::points::{AlignmentPointGrid, AlignmentPointManager, StructureMeasure};
use crate::quality::{gradient_score, laplacian_variance, sobel_score};
use crate::rank::{compute_frame_qualities, FrameRanking};

/// Everything the stacking phase needs about a registered sequence.
pub struct RegistrationOutcome {
    /// Index of the sharpest frame, the origin of all shifts.
    pub reference_index: usize,
    /// Rigid shift per frame, in sequence order.
    pub shifts: Vec<GlobalShift>,
    /// Region every shifted frame covers, in reference coordinates.
    pub intersection: Rect,
    /// Mean of the best frames over the intersection; the image the
    /// alignment point grid was built on.
    pub mean_frame: Array2<f32>,
    /// Alignment points with per-frame qualities and rankings filled in.
    pub manager: AlignmentPointManager,
    /// Stack size and frame-to-points reverse index.
    pub ranking: FrameRanking,
}

/// Register a frame sequence: global alignment, alignment point grid, and
/// per-point frame ranking.
pub fn register_sequence(
    frames: &[Frame],
    config: &RegistrationConfig,
    is_color: bool,
) -> Result<RegistrationOutcome> {
    config.validate()?;
    if frames.is_empty() {
        return Err(GanymedeError::EmptySequence);
    }

    let frame_scores = whole_frame_scores(frames, config.rank_method);
    // Strictly-greater comparison keeps the earliest frame on ties.
    let mut reference_index = 0;
    for (idx, &score) in frame_scores.iter().enumerate() {
        if score > frame_scores[reference_index] {
            reference_index = idx;
        }
    }
    info!(reference_index, "reference frame selected");

    let mut aligner = GlobalAligner::new(frames, reference_index)?;
    let measure = structure_measure(config.rank_method);
    aligner.select_alignment_rect(frames, config.rectangle_scale_factor, measure)?;
    aligner.align_frames(frames)?;

    let shifts = match aligner.shifts() {
        Some(s) => s.to_vec(),
        None => {
            return Err(GanymedeError::Pipeline(
                "global alignment produced no shifts".into(),
            ))
        }
    };
    let intersection = match aligner.intersection() {
        Some(rect) => rect,
        None => {
            return Err(GanymedeError::Pipeline(
                "global alignment produced no intersection".into(),
            ))
        }
    };

    let mean_frame = mean_of_best_frames(&aligner, frames, &shifts, &frame_scores, config)?;

    let grid = AlignmentPointGrid::build(mean_frame.clone(), is_color, config, measure)?;
    let mut manager = AlignmentPointManager::new(grid);
    manager.grid_mut().resolve_neighbors()?;

    let ranking =
        compute_frame_qualities(frames, manager.grid_mut(), &shifts, &intersection, config)?;

    Ok(RegistrationOutcome {
        reference_index,
        shifts,
        intersection,
        mean_frame,
        manager,
        ranking,
    })
}

/// Contrast score of every whole frame with the configured measure.
fn whole_frame_scores(frames: &[Frame], method: RankMethod) -> Vec<f64> {
    let measure = structure_measure(method);
    let score = |frame: &Frame| measure(&frame.data.view());
    if frames.len() >= PARALLEL_FRAME_THRESHOLD {
        frames.par_iter().map(score).collect()
    } else {
        frames.iter().map(score).collect()
    }
}

/// Mean of the best `average_frame_percent` of frames, each cropped to the
/// intersection under its own shift.
fn mean_of_best_frames(
    aligner: &GlobalAligner,
    frames: &[Frame],
    shifts: &[GlobalShift],
    frame_scores: &[f64],
    config: &RegistrationConfig,
) -> Result<Array2<f32>> {
    let n = frames.len();
    let average_count =
        ((n as f64 * config.average_frame_percent / 100.0).ceil() as usize).clamp(1, n);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        frame_scores[b]
            .partial_cmp(&frame_scores[a])
            .unwrap_or(Ordering::Equal)
    });

    let best = &order[..average_count];
    let frame_subset: Vec<&Frame> = best.iter().map(|&idx| &frames[idx]).collect();
    let shift_subset: Vec<GlobalShift> = best.iter().map(|&idx| shifts[idx]).collect();

    info!(average_count, "computing mean frame");
    aligner.average_frame(&frame_subset, &shift_subset)
}

/// The structure measure matching a rank method, as a plain function for
/// storage inside the grid.
fn structure_measure(method: RankMethod) -> StructureMeasure {
    match method {
        RankMethod::Gradient => gradient_score,
        RankMethod::Laplace => laplacian_variance,
        RankMethod::Sobel => sobel_score,
    }
}
