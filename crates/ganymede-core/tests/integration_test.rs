mod common;

use ganymede_core::align::local::compute_shift;
use ganymede_core::config::AlignmentMethod;
use ganymede_core::frame::{Frame, GlobalShift, Rect};
use ganymede_core::pipeline::register_sequence;

use common::{synthetic_scene, test_config};

/// Five frames cut from one scene at known offsets. Frame 2 is left at full
/// contrast so it wins reference selection; the others are slightly
/// attenuated, which leaves phase correlation unaffected.
fn build_sequence() -> (Vec<Frame>, [(i64, i64); 5]) {
    let scene = synthetic_scene(140, 140, 101);
    let offsets: [(i64, i64); 5] = [(2, -1), (0, 3), (0, 0), (-4, 2), (1, 1)];
    let frames: Vec<Frame> = offsets
        .iter()
        .enumerate()
        .map(|(i, &(dy, dx))| {
            let mut frame = common::crop_frame(
                &scene,
                i,
                (20 + dy) as usize,
                (20 + dx) as usize,
                100,
                100,
            );
            if i != 2 {
                frame.data.mapv_inplace(|v| v * 0.9);
            }
            frame
        })
        .collect();
    (frames, offsets)
}

#[test]
fn test_register_sequence_end_to_end() {
    let (frames, offsets) = build_sequence();
    let config = test_config();

    let outcome = register_sequence(&frames, &config, false).unwrap();

    assert_eq!(outcome.reference_index, 2);
    for (shift, &(dy, dx)) in outcome.shifts.iter().zip(offsets.iter()) {
        assert_eq!(*shift, GlobalShift { dy, dx });
    }
    assert_eq!(
        outcome.intersection,
        Rect {
            y_low: 2,
            y_high: 96,
            x_low: 3,
            x_high: 99
        }
    );

    // Mean frame lives in intersection coordinates.
    assert_eq!(
        outcome.mean_frame.dim(),
        (outcome.intersection.height(), outcome.intersection.width())
    );

    // The grid was built and ranked.
    assert!(!outcome.manager.points().is_empty());
    assert_eq!(outcome.ranking.stack_size, 3); // 50% of 5 frames, rounded up
    assert_eq!(outcome.ranking.points_per_frame.len(), 5);
    for point in outcome.manager.points() {
        assert_eq!(point.frame_qualities.len(), 5);
        assert_eq!(point.best_frame_indices.len(), outcome.ranking.stack_size);
    }

    // Every selected (frame, point) pair appears in the reverse index.
    let selected: usize = outcome
        .ranking
        .points_per_frame
        .iter()
        .map(|points| points.len())
        .sum();
    assert_eq!(
        selected,
        outcome.manager.points().len() * outcome.ranking.stack_size
    );
}

#[test]
fn test_registered_frames_have_no_local_residual() {
    // Rigid translations only: once the global shift is accounted for, the
    // per-point residual is zero everywhere.
    let (frames, _) = build_sequence();
    let config = test_config();
    let outcome = register_sequence(&frames, &config, false).unwrap();

    let point = &outcome.manager.points()[0];
    for (frame, &shift) in frames.iter().zip(outcome.shifts.iter()) {
        let local = compute_shift(
            frame,
            point,
            shift,
            &outcome.intersection,
            &config,
            true,
        )
        .unwrap();
        assert_eq!(local.shift.dy, 0.0, "frame {}", frame.index);
        assert_eq!(local.shift.dx, 0.0, "frame {}", frame.index);
    }
}

#[test]
fn test_local_methods_agree_after_registration() {
    let (frames, _) = build_sequence();
    let mut config = test_config();
    let outcome = register_sequence(&frames, &config, false).unwrap();

    let point = &outcome.manager.points()[0];
    for method in [
        AlignmentMethod::RadialSearch,
        AlignmentMethod::SteepestDescent,
        AlignmentMethod::CrossCorrelation,
    ] {
        config.alignment_method = method;
        let local = compute_shift(
            &frames[3],
            point,
            outcome.shifts[3],
            &outcome.intersection,
            &config,
            true,
        )
        .unwrap();
        assert_eq!(local.shift.dy, 0.0, "{}", method);
        assert_eq!(local.shift.dx, 0.0, "{}", method);
    }
}

#[test]
fn test_register_sequence_rejects_empty_input() {
    let config = test_config();
    assert!(register_sequence(&[], &config, false).is_err());
}

#[test]
fn test_register_sequence_validates_config() {
    let (frames, _) = build_sequence();
    let mut config = test_config();
    config.step_size = 0;
    assert!(register_sequence(&frames, &config, false).is_err());
}
