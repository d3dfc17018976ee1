use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{GanymedeError, Result};
use crate::frame::{Frame, GlobalShift, Rect};

use super::phase_correlation::compute_offset_array;

/// Rigid per-frame registration against the best-quality frame.
///
/// Phase order: [`select_alignment_rect`](Self::select_alignment_rect) →
/// [`align_frames`](Self::align_frames) →
/// [`average_frame`](Self::average_frame). Calling out of order is a fatal
/// [`GanymedeError::WrongOrdering`].
#[derive(Debug)]
pub struct GlobalAligner {
    reference_index: usize,
    frame_height: usize,
    frame_width: usize,
    alignment_rect: Option<Rect>,
    shifts: Option<Vec<GlobalShift>>,
    intersection: Option<Rect>,
}

impl GlobalAligner {
    /// Create an aligner for a sequence of equally sized frames.
    /// `reference_index` is the best-quality frame all shifts refer to.
    pub fn new(frames: &[Frame], reference_index: usize) -> Result<Self> {
        if frames.is_empty() {
            return Err(GanymedeError::EmptySequence);
        }
        if reference_index >= frames.len() {
            return Err(GanymedeError::FrameIndexOutOfRange {
                index: reference_index,
                total: frames.len(),
            });
        }

        let (h, w) = frames[0].data.dim();
        for frame in frames {
            let (fh, fw) = frame.data.dim();
            if fh != h || fw != w {
                return Err(GanymedeError::DimensionMismatch {
                    expected_h: h,
                    expected_w: w,
                    actual_h: fh,
                    actual_w: fw,
                });
            }
        }

        Ok(Self {
            reference_index,
            frame_height: h,
            frame_width: w,
            alignment_rect: None,
            shifts: None,
            intersection: None,
        })
    }

    pub fn reference_index(&self) -> usize {
        self.reference_index
    }

    pub fn alignment_rect(&self) -> Option<Rect> {
        self.alignment_rect
    }

    pub fn shifts(&self) -> Option<&[GlobalShift]> {
        self.shifts.as_deref()
    }

    pub fn intersection(&self) -> Option<Rect> {
        self.intersection
    }

    /// Partition the reference frame into a row-major grid of
    /// `scale_factor x scale_factor`-sized tiles and keep the tile with the
    /// strictly greatest structure score (first encountered wins ties).
    ///
    /// The winning rectangle becomes the comparison window for
    /// [`align_frames`](Self::align_frames).
    pub fn select_alignment_rect<F>(
        &mut self,
        frames: &[Frame],
        scale_factor: usize,
        measure: F,
    ) -> Result<Rect>
    where
        F: Fn(&ArrayView2<f32>) -> f64,
    {
        if scale_factor == 0 {
            return Err(GanymedeError::InvalidConfig(
                "rectangle scale factor must be >= 1".into(),
            ));
        }
        let rect_h = self.frame_height / scale_factor;
        let rect_w = self.frame_width / scale_factor;
        if rect_h == 0 || rect_w == 0 {
            return Err(GanymedeError::InvalidConfig(format!(
                "rectangle scale factor {} exceeds frame dimensions {}x{}",
                scale_factor, self.frame_height, self.frame_width
            )));
        }

        let reference = &frames[self.reference_index].data;
        let mut best_rect = None;
        let mut best_quality = f64::NEG_INFINITY;

        let mut y_low = 0;
        while y_low + rect_h <= self.frame_height {
            let mut x_low = 0;
            while x_low + rect_w <= self.frame_width {
                let tile = reference.slice(s![y_low..y_low + rect_h, x_low..x_low + rect_w]);
                let quality = measure(&tile);
                if quality > best_quality {
                    best_quality = quality;
                    best_rect = Some(Rect {
                        y_low,
                        y_high: y_low + rect_h,
                        x_low,
                        x_high: x_low + rect_w,
                    });
                }
                x_low += rect_w;
            }
            y_low += rect_h;
        }

        // At least one tile always fits, so best_rect is present here.
        let rect = best_rect.ok_or_else(|| {
            GanymedeError::Pipeline("no alignment rectangle candidate fits the frame".into())
        })?;
        debug!(
            y_low = rect.y_low,
            x_low = rect.x_low,
            quality = best_quality,
            "selected alignment rectangle"
        );
        self.alignment_rect = Some(rect);
        Ok(rect)
    }

    /// Compute one rigid shift per frame relative to the reference frame and
    /// the intersection region common to all shifted frames.
    pub fn align_frames(&mut self, frames: &[Frame]) -> Result<()> {
        let rect = self.alignment_rect.ok_or_else(|| {
            GanymedeError::WrongOrdering(
                "align_frames called before select_alignment_rect".into(),
            )
        })?;

        let reference_window = frames[self.reference_index]
            .data
            .slice(s![rect.y_low..rect.y_high, rect.x_low..rect.x_high])
            .to_owned();

        let compute = |(position, frame): (usize, &Frame)| -> Result<GlobalShift> {
            if position == self.reference_index {
                return Ok(GlobalShift::default());
            }
            let window = frame
                .data
                .slice(s![rect.y_low..rect.y_high, rect.x_low..rect.x_high])
                .to_owned();
            let offset = compute_offset_array(&reference_window, &window)?;
            Ok(GlobalShift {
                dy: offset.dy.round() as i64,
                dx: offset.dx.round() as i64,
            })
        };

        let results: Vec<Result<GlobalShift>> = if frames.len() >= PARALLEL_FRAME_THRESHOLD {
            frames.par_iter().enumerate().map(compute).collect()
        } else {
            frames.iter().enumerate().map(compute).collect()
        };
        let shifts: Vec<GlobalShift> = results.into_iter().collect::<Result<_>>()?;

        let intersection = self.compute_intersection(&shifts)?;
        info!(
            frames = frames.len(),
            intersection_h = intersection.height(),
            intersection_w = intersection.width(),
            "global alignment complete"
        );
        self.shifts = Some(shifts);
        self.intersection = Some(intersection);
        Ok(())
    }

    /// Pixel-wise mean of a frame subset, each cropped to the intersection
    /// region offset by its own shift. This is the reference image consumed
    /// by alignment point grid construction.
    pub fn average_frame(&self, frames: &[&Frame], shifts: &[GlobalShift]) -> Result<Array2<f32>> {
        let intersection = self.intersection.ok_or_else(|| {
            GanymedeError::WrongOrdering("average_frame called before align_frames".into())
        })?;
        if frames.is_empty() {
            return Err(GanymedeError::EmptySequence);
        }
        if frames.len() != shifts.len() {
            return Err(GanymedeError::Pipeline(format!(
                "frame subset ({}) and shift subset ({}) differ in length",
                frames.len(),
                shifts.len()
            )));
        }

        let h = intersection.height();
        let w = intersection.width();
        let mut accumulator = Array2::<f64>::zeros((h, w));

        for (frame, shift) in frames.iter().zip(shifts.iter()) {
            let y_low = (intersection.y_low as i64 - shift.dy) as usize;
            let x_low = (intersection.x_low as i64 - shift.dx) as usize;
            let cropped = frame.data.slice(s![y_low..y_low + h, x_low..x_low + w]);
            accumulator += &cropped.mapv(|v| v as f64);
        }

        let n = frames.len() as f64;
        Ok(accumulator.mapv(|v| (v / n) as f32))
    }

    /// Intersection over all frames' shifts: the rectangle every shifted
    /// frame covers. Per-frame cropping by `(intersection - shift)` is then
    /// always in bounds and of identical size.
    fn compute_intersection(&self, shifts: &[GlobalShift]) -> Result<Rect> {
        let dy_max = shifts.iter().map(|s| s.dy).max().unwrap_or(0);
        let dy_min = shifts.iter().map(|s| s.dy).min().unwrap_or(0);
        let dx_max = shifts.iter().map(|s| s.dx).max().unwrap_or(0);
        let dx_min = shifts.iter().map(|s| s.dx).min().unwrap_or(0);

        let y_low = dy_max;
        let y_high = dy_min + self.frame_height as i64;
        let x_low = dx_max;
        let x_high = dx_min + self.frame_width as i64;

        if y_low >= y_high || x_low >= x_high {
            return Err(GanymedeError::Pipeline(
                "frame shifts leave no common intersection region".into(),
            ));
        }

        // The reference frame's zero shift pins y_low/x_low at or above 0.
        Ok(Rect {
            y_low: y_low as usize,
            y_high: y_high as usize,
            x_low: x_low as usize,
            x_high: x_high as usize,
        })
    }
}
