pub mod gradient;
pub mod laplacian;
pub mod sobel;

use ndarray::{Array2, ArrayView2};

use crate::config::RankMethod;
use crate::frame::ContrastMap;

pub use gradient::{gradient_map, gradient_score};
pub use laplacian::{laplacian_map, laplacian_map_score, laplacian_variance};
pub use sobel::{sobel_map, sobel_score};

/// Score a pixel region with the given contrast measure.
pub fn score_region(data: &ArrayView2<f32>, method: RankMethod) -> f64 {
    match method {
        RankMethod::Gradient => gradient_score(data),
        RankMethod::Laplace => laplacian_variance(data),
        RankMethod::Sobel => sobel_score(data),
    }
}

/// Per-pixel contrast response of a region with the given measure.
pub fn response_map(data: &ArrayView2<f32>, method: RankMethod) -> Array2<f32> {
    match method {
        RankMethod::Gradient => gradient_map(data),
        RankMethod::Laplace => laplacian_map(data),
        RankMethod::Sobel => sobel_map(data),
    }
}

/// Reduce a region of an already-computed response map to a scalar score.
///
/// Uses the same reduction as [`score_region`]: variance for Laplace, mean
/// response for Gradient and Sobel.
pub fn score_from_map(map_region: &ArrayView2<f32>, method: RankMethod) -> f64 {
    match method {
        RankMethod::Laplace => laplacian_map_score(map_region),
        RankMethod::Gradient | RankMethod::Sobel => {
            let count = map_region.len() as f64;
            if count == 0.0 {
                return 0.0;
            }
            map_region.iter().map(|&v| v as f64).sum::<f64>() / count
        }
    }
}

/// Build a contrast map of a whole frame: full-resolution response followed
/// by `downsample` x `downsample` average pooling.
pub fn build_contrast_map(
    data: &Array2<f32>,
    method: RankMethod,
    downsample: usize,
) -> ContrastMap {
    let full = response_map(&data.view(), method);
    if downsample <= 1 {
        return ContrastMap {
            data: full,
            method,
            downsample: 1,
        };
    }

    let (h, w) = full.dim();
    let out_h = h / downsample;
    let out_w = w / downsample;
    let mut pooled = Array2::<f32>::zeros((out_h, out_w));
    let norm = (downsample * downsample) as f32;

    for row in 0..out_h {
        for col in 0..out_w {
            let mut sum = 0.0f32;
            for dr in 0..downsample {
                for dc in 0..downsample {
                    sum += full[[row * downsample + dr, col * downsample + dc]];
                }
            }
            pooled[[row, col]] = sum / norm;
        }
    }

    ContrastMap {
        data: pooled,
        method,
        downsample,
    }
}
