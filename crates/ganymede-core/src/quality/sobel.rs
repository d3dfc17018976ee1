use ndarray::{Array2, ArrayView2};

/// Compute gradient magnitude quality score using the Sobel operator.
///
/// Sobel kernels:
///   Gx = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]]
///   Gy = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]]
///
/// Score = mean of sqrt(Gx^2 + Gy^2). Higher = sharper.
pub fn sobel_score(data: &ArrayView2<f32>) -> f64 {
    let (h, w) = data.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let count = ((h - 2) * (w - 2)) as f64;

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let (gx, gy) = sobel_at(data, row, col);
            sum += (gx * gx + gy * gy).sqrt();
        }
    }

    sum / count
}

/// Compute the Sobel gradient magnitude image.
///
/// Returns an `Array2<f32>` of the same dimensions as input. The 1-pixel
/// border is zero (the kernel needs a 3x3 neighborhood).
pub fn sobel_map(data: &ArrayView2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    if h < 3 || w < 3 {
        return result;
    }

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let (gx, gy) = sobel_at(data, row, col);
            result[[row, col]] = (gx * gx + gy * gy).sqrt() as f32;
        }
    }

    result
}

#[inline]
fn sobel_at(data: &ArrayView2<f32>, row: usize, col: usize) -> (f64, f64) {
    let gx = -data[[row - 1, col - 1]] as f64 + data[[row - 1, col + 1]] as f64
        - 2.0 * data[[row, col - 1]] as f64
        + 2.0 * data[[row, col + 1]] as f64
        - data[[row + 1, col - 1]] as f64
        + data[[row + 1, col + 1]] as f64;

    let gy = -data[[row - 1, col - 1]] as f64
        - 2.0 * data[[row - 1, col]] as f64
        - data[[row - 1, col + 1]] as f64
        + data[[row + 1, col - 1]] as f64
        + 2.0 * data[[row + 1, col]] as f64
        + data[[row + 1, col + 1]] as f64;

    (gx, gy)
}
