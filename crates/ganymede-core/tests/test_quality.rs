mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use ganymede_core::config::RankMethod;
use ganymede_core::quality::{
    build_contrast_map, gradient_score, laplacian_variance, response_map, score_from_map,
    score_region, sobel_score,
};

use common::textured_scene;

#[test]
fn test_constant_region_scores_zero() {
    let flat = Array2::<f32>::from_elem((32, 32), 0.5);
    assert_abs_diff_eq!(gradient_score(&flat.view()), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(laplacian_variance(&flat.view()), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sobel_score(&flat.view()), 0.0, epsilon = 1e-12);
}

#[test]
fn test_texture_scores_higher_than_ramp() {
    let ramp = Array2::from_shape_fn((32, 32), |(_, c)| 0.3 + 0.01 * c as f32);
    let texture = textured_scene(32, 32, 4);

    for method in [RankMethod::Gradient, RankMethod::Laplace, RankMethod::Sobel] {
        let smooth = score_region(&ramp.view(), method);
        let rough = score_region(&texture.view(), method);
        assert!(
            rough > smooth,
            "{}: texture {} should beat ramp {}",
            method,
            rough,
            smooth
        );
    }
}

#[test]
fn test_laplacian_of_linear_ramp_is_zero() {
    let ramp = Array2::from_shape_fn((32, 32), |(r, c)| 0.1 + 0.02 * r as f32 + 0.01 * c as f32);
    assert_abs_diff_eq!(laplacian_variance(&ramp.view()), 0.0, epsilon = 1e-9);
}

#[test]
fn test_response_map_has_region_shape() {
    let texture = textured_scene(40, 30, 6);
    for method in [RankMethod::Gradient, RankMethod::Laplace, RankMethod::Sobel] {
        let map = response_map(&texture.view(), method);
        assert_eq!(map.dim(), (40, 30));
    }
}

#[test]
fn test_contrast_map_downsampling() {
    let texture = textured_scene(64, 48, 8);
    let map = build_contrast_map(&texture, RankMethod::Sobel, 4);
    assert_eq!(map.data.dim(), (16, 12));
    assert_eq!(map.downsample, 4);
    assert_eq!(map.method, RankMethod::Sobel);

    let full = build_contrast_map(&texture, RankMethod::Sobel, 1);
    assert_eq!(full.data.dim(), (64, 48));
}

#[test]
fn test_map_score_agrees_with_direct_score_for_sobel() {
    // Mean reduction over the map interior (the border is zero padding)
    // equals the direct score.
    let texture = textured_scene(32, 32, 10);
    let map = build_contrast_map(&texture, RankMethod::Sobel, 1);
    let interior = map.data.slice(ndarray::s![1..31, 1..31]);
    let from_map = score_from_map(&interior, RankMethod::Sobel);
    let direct = sobel_score(&texture.view());
    assert_abs_diff_eq!(from_map, direct, epsilon = 1e-4);
}
