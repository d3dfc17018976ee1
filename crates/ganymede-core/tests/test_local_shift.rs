mod common;

use ganymede_core::align::local::{compute_shift, LocalShift};
use ganymede_core::align::register_translation_subpixel;
use ganymede_core::config::{AlignmentMethod, RegistrationConfig};
use ganymede_core::frame::{GlobalShift, Rect, ShiftVector};
use ganymede_core::points::AlignmentPoint;

use common::{crop_frame, synthetic_scene, test_config};

/// Mean frame cut at `base`, warped frame cut at `base + (sy, sx)`:
/// the point's content sits at lower coordinates in the warped frame, so the
/// measured local shift is `(+sy, +sx)`.
fn shifted_pair(sy: i64, sx: i64) -> (AlignmentPoint, ganymede_core::frame::Frame) {
    let scene = synthetic_scene(140, 140, 77);
    let mean = crop_frame(&scene, 0, 20, 20, 100, 100);
    let warped = crop_frame(&scene, 1, (20 + sy) as usize, (20 + sx) as usize, 100, 100);
    let point = AlignmentPoint::new(0, &mean.data, false, 50, 50, 10, 15, 5, false, false);
    (point, warped)
}

fn full_intersection() -> Rect {
    Rect {
        y_low: 0,
        y_high: 100,
        x_low: 0,
        x_high: 100,
    }
}

fn method_config(method: AlignmentMethod) -> RegistrationConfig {
    RegistrationConfig {
        alignment_method: method,
        ..test_config()
    }
}

#[test]
fn test_de_warp_disabled_returns_zero_shift() {
    let (point, warped) = shifted_pair(2, 1);
    let config = method_config(AlignmentMethod::RadialSearch);
    let shift = compute_shift(
        &warped,
        &point,
        GlobalShift::default(),
        &full_intersection(),
        &config,
        false,
    )
    .unwrap();
    assert_eq!(shift, LocalShift::default());
}

#[test]
fn test_radial_search_finds_known_shift() {
    let (point, warped) = shifted_pair(2, 1);
    let config = method_config(AlignmentMethod::RadialSearch);
    let shift = compute_shift(
        &warped,
        &point,
        GlobalShift::default(),
        &full_intersection(),
        &config,
        true,
    )
    .unwrap();
    assert_eq!(shift.shift, ShiftVector { dy: 2.0, dx: 1.0 });
    assert!(shift.error.is_none());
}

#[test]
fn test_radial_search_identical_frame_is_zero() {
    let scene = synthetic_scene(140, 140, 77);
    let mean = crop_frame(&scene, 0, 20, 20, 100, 100);
    let point = AlignmentPoint::new(0, &mean.data, false, 50, 50, 10, 15, 5, false, false);

    let config = method_config(AlignmentMethod::RadialSearch);
    let shift = compute_shift(
        &mean,
        &point,
        GlobalShift::default(),
        &full_intersection(),
        &config,
        true,
    )
    .unwrap();
    assert_eq!(shift.shift, ShiftVector::default());
}

#[test]
fn test_radial_search_subpixel_refinement_stays_near_minimum() {
    let (point, warped) = shifted_pair(2, 1);
    let config = RegistrationConfig {
        local_subpixel_refinement: true,
        ..method_config(AlignmentMethod::RadialSearch)
    };
    let shift = compute_shift(
        &warped,
        &point,
        GlobalShift::default(),
        &full_intersection(),
        &config,
        true,
    )
    .unwrap();
    // Refinement moves the integer minimum by at most half a pixel.
    assert_eq!(shift.shift.dy.round(), 2.0);
    assert_eq!(shift.shift.dx.round(), 1.0);
}

#[test]
fn test_steepest_descent_finds_known_shift() {
    let (point, warped) = shifted_pair(2, 1);
    let config = method_config(AlignmentMethod::SteepestDescent);
    let shift = compute_shift(
        &warped,
        &point,
        GlobalShift::default(),
        &full_intersection(),
        &config,
        true,
    )
    .unwrap();
    assert_eq!(shift.shift, ShiftVector { dy: 2.0, dx: 1.0 });
}

#[test]
fn test_cross_correlation_finds_known_shift() {
    let (point, warped) = shifted_pair(3, -2);
    let config = method_config(AlignmentMethod::CrossCorrelation);
    let shift = compute_shift(
        &warped,
        &point,
        GlobalShift::default(),
        &full_intersection(),
        &config,
        true,
    )
    .unwrap();
    assert_eq!(shift.shift, ShiftVector { dy: 3.0, dx: -2.0 });
    assert!(shift.error.is_none());
}

#[test]
fn test_subpixel_method_reports_shift_and_diagnostics() {
    let (point, warped) = shifted_pair(2, 1);
    let config = method_config(AlignmentMethod::Subpixel);
    let shift = compute_shift(
        &warped,
        &point,
        GlobalShift::default(),
        &full_intersection(),
        &config,
        true,
    )
    .unwrap();
    assert!((shift.shift.dy - 2.0).abs() < 0.2, "dy={}", shift.shift.dy);
    assert!((shift.shift.dx - 1.0).abs() < 0.2, "dx={}", shift.shift.dx);
    let error = shift.error.unwrap();
    assert!((0.0..=1.0).contains(&error));
    assert!(shift.diff_phase.unwrap().abs() <= std::f64::consts::PI);
}

#[test]
fn test_subpixel_registration_of_identical_regions() {
    let scene = synthetic_scene(64, 64, 13);
    let result = register_translation_subpixel(&scene, &scene, 10).unwrap();
    assert!(result.shift.dy.abs() < 0.11);
    assert!(result.shift.dx.abs() < 0.11);
    assert!(result.error < 0.05);
    assert!(result.diff_phase.abs() < 1e-6);
}

#[test]
fn test_global_shift_offsets_the_search_window() {
    // The warped frame carries a pure global shift of (2, 1). With that
    // shift accounted for when placing the box, no local residual remains.
    let (point, warped) = shifted_pair(2, 1);
    let config = method_config(AlignmentMethod::RadialSearch);
    let shift = compute_shift(
        &warped,
        &point,
        GlobalShift { dy: 2, dx: 1 },
        &full_intersection(),
        &config,
        true,
    )
    .unwrap();
    assert_eq!(shift.shift, ShiftVector::default());
}
