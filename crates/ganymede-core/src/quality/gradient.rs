use ndarray::{Array2, ArrayView2};

/// Mean absolute forward difference in both axes — higher means sharper.
///
/// Cheapest of the three contrast measures; no kernel, just first
/// differences along rows and columns.
pub fn gradient_score(data: &ArrayView2<f32>) -> f64 {
    let (h, w) = data.dim();
    if h < 2 || w < 2 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    for row in 0..h {
        for col in 0..w - 1 {
            sum += (data[[row, col + 1]] - data[[row, col]]).abs() as f64;
        }
    }
    for row in 0..h - 1 {
        for col in 0..w {
            sum += (data[[row + 1, col]] - data[[row, col]]).abs() as f64;
        }
    }

    let count = (h * (w - 1) + (h - 1) * w) as f64;
    sum / count
}

/// Per-pixel forward-difference response map, |dx| + |dy|.
///
/// The last row and column carry only the difference that exists there.
pub fn gradient_map(data: &ArrayView2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    for row in 0..h {
        for col in 0..w {
            let mut response = 0.0f32;
            if col + 1 < w {
                response += (data[[row, col + 1]] - data[[row, col]]).abs();
            }
            if row + 1 < h {
                response += (data[[row + 1, col]] - data[[row, col]]).abs();
            }
            result[[row, col]] = response;
        }
    }

    result
}
