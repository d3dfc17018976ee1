use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

use crate::consts::EPSILON;
use crate::error::{GanymedeError, Result};
use crate::frame::ShiftVector;

use super::subpixel::refine_peak_paraboloid;

/// Compute the translation between two equal-shaped regions using FFT phase
/// correlation, refined to sub-pixel accuracy with a paraboloid fit.
///
/// The result follows the registration sign convention: positive `(dy, dx)`
/// means the target content sits at lower pixel coordinates than in the
/// reference and must be translated in the positive direction to align.
pub fn compute_offset_array(
    reference: &Array2<f32>,
    target: &Array2<f32>,
) -> Result<ShiftVector> {
    let (correlation, h, w) = phase_correlation_surface(reference, target)?;

    let (peak_row, peak_col, _peak_val) = find_peak(&correlation);

    let dy = signed_peak_offset(peak_row, h);
    let dx = signed_peak_offset(peak_col, w);

    // Subpixel refinement
    let (sub_dy, sub_dx) = refine_peak_paraboloid(&correlation, peak_row, peak_col);

    Ok(ShiftVector {
        dy: dy + sub_dy,
        dx: dx + sub_dx,
    })
}

/// Integer-accuracy variant of [`compute_offset_array`]: the raw correlation
/// peak with wrap-around handling, no refinement.
pub fn compute_offset_integer(
    reference: &Array2<f32>,
    target: &Array2<f32>,
) -> Result<(i64, i64)> {
    let (correlation, h, w) = phase_correlation_surface(reference, target)?;

    let (peak_row, peak_col, _peak_val) = find_peak(&correlation);

    Ok((
        signed_peak_offset(peak_row, h) as i64,
        signed_peak_offset(peak_col, w) as i64,
    ))
}

fn phase_correlation_surface(
    reference: &Array2<f32>,
    target: &Array2<f32>,
) -> Result<(Array2<f64>, usize, usize)> {
    let (h, w) = reference.dim();
    let (th, tw) = target.dim();
    if h != th || w != tw {
        return Err(GanymedeError::DimensionMismatch {
            expected_h: h,
            expected_w: w,
            actual_h: th,
            actual_w: tw,
        });
    }

    // Apply Hann window to reduce spectral leakage
    let ref_windowed = apply_hann(reference);
    let tgt_windowed = apply_hann(target);

    let ref_fft = fft2d(&ref_windowed);
    let tgt_fft = fft2d(&tgt_windowed);

    let cross_power = normalized_cross_power(&ref_fft, &tgt_fft);

    Ok((ifft2d(&cross_power), h, w))
}

/// Convert a correlation peak index to a signed offset (handle wrap-around).
pub(crate) fn signed_peak_offset(peak: usize, n: usize) -> f64 {
    if peak > n / 2 {
        peak as f64 - n as f64
    } else {
        peak as f64
    }
}

pub(crate) fn apply_hann(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    for row in 0..h {
        let wy = 0.5 * (1.0 - (std::f64::consts::TAU * row as f64 / h as f64).cos());
        for col in 0..w {
            let wx = 0.5 * (1.0 - (std::f64::consts::TAU * col as f64 / w as f64).cos());
            result[[row, col]] = data[[row, col]] * (wy * wx) as f32;
        }
    }

    result
}

/// 2D FFT: row-wise FFT, then column-wise FFT.
pub(crate) fn fft2d(data: &Array2<f32>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft_forward(w);
    let fft_col = planner.plan_fft_forward(h);

    // Convert to complex
    let mut result = Array2::<Complex<f64>>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            result[[row, col]] = Complex::new(data[[row, col]] as f64, 0.0);
        }
    }

    // Row-wise FFT
    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| result[[row, c]]).collect();
        fft_row.process(&mut row_data);
        for col in 0..w {
            result[[row, col]] = row_data[col];
        }
    }

    // Column-wise FFT
    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| result[[r, col]]).collect();
        fft_col.process(&mut col_data);
        for row in 0..h {
            result[[row, col]] = col_data[row];
        }
    }

    result
}

/// Inverse 2D FFT, real part only.
pub(crate) fn ifft2d(data: &Array2<Complex<f64>>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let ifft_row = planner.plan_fft_inverse(w);
    let ifft_col = planner.plan_fft_inverse(h);

    let mut work = data.clone();

    // Column-wise IFFT
    for col in 0..w {
        let mut col_data: Vec<Complex<f64>> = (0..h).map(|r| work[[r, col]]).collect();
        ifft_col.process(&mut col_data);
        for row in 0..h {
            work[[row, col]] = col_data[row];
        }
    }

    // Row-wise IFFT
    for row in 0..h {
        let mut row_data: Vec<Complex<f64>> = (0..w).map(|c| work[[row, c]]).collect();
        ifft_row.process(&mut row_data);
        for col in 0..w {
            work[[row, col]] = row_data[col];
        }
    }

    // Extract real part and normalize
    let scale = 1.0 / (h * w) as f64;
    let mut result = Array2::<f64>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            result[[row, col]] = work[[row, col]].re * scale;
        }
    }

    result
}

pub(crate) fn normalized_cross_power(
    ref_fft: &Array2<Complex<f64>>,
    tgt_fft: &Array2<Complex<f64>>,
) -> Array2<Complex<f64>> {
    let (h, w) = ref_fft.dim();
    let mut result = Array2::<Complex<f64>>::zeros((h, w));

    for row in 0..h {
        for col in 0..w {
            let cross = ref_fft[[row, col]] * tgt_fft[[row, col]].conj();
            let mag = cross.norm();
            result[[row, col]] = if mag > EPSILON as f64 {
                cross / mag
            } else {
                Complex::new(0.0, 0.0)
            };
        }
    }

    result
}

pub(crate) fn find_peak(data: &Array2<f64>) -> (usize, usize, f64) {
    let (h, w) = data.dim();
    let mut best_row = 0;
    let mut best_col = 0;
    let mut best_val = f64::NEG_INFINITY;

    for row in 0..h {
        for col in 0..w {
            if data[[row, col]] > best_val {
                best_val = data[[row, col]];
                best_row = row;
                best_col = col;
            }
        }
    }

    (best_row, best_col, best_val)
}
