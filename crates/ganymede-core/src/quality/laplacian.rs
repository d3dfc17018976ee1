use ndarray::{Array2, ArrayView2};

/// Compute Laplacian variance of a region — higher means sharper.
///
/// Convolves with the 3x3 Laplacian kernel:
///   0  1  0
///   1 -4  1
///   0  1  0
/// Then returns the variance of the result.
pub fn laplacian_variance(data: &ArrayView2<f32>) -> f64 {
    let (h, w) = data.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let count = ((h - 2) * (w - 2)) as f64;

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let lap = -4.0 * data[[row, col]] as f64
                + data[[row - 1, col]] as f64
                + data[[row + 1, col]] as f64
                + data[[row, col - 1]] as f64
                + data[[row, col + 1]] as f64;
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let mean = sum / count;
    sum_sq / count - mean * mean
}

/// Signed per-pixel Laplacian response map.
///
/// The 1-pixel border is zero (the kernel needs a 3x3 neighborhood).
pub fn laplacian_map(data: &ArrayView2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    if h < 3 || w < 3 {
        return result;
    }

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            result[[row, col]] = -4.0 * data[[row, col]]
                + data[[row - 1, col]]
                + data[[row + 1, col]]
                + data[[row, col - 1]]
                + data[[row, col + 1]];
        }
    }

    result
}

/// Variance of an already-computed Laplacian response region.
pub fn laplacian_map_score(map: &ArrayView2<f32>) -> f64 {
    let count = map.len() as f64;
    if count == 0.0 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for &v in map.iter() {
        sum += v as f64;
        sum_sq += (v as f64) * (v as f64);
    }

    let mean = sum / count;
    sum_sq / count - mean * mean
}
