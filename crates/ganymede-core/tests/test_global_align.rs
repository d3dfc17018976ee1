mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use ganymede_core::align::phase_correlation::compute_offset_array;
use ganymede_core::align::GlobalAligner;
use ganymede_core::error::GanymedeError;
use ganymede_core::frame::{Frame, GlobalShift, Rect};
use ganymede_core::quality::laplacian_variance;

use common::{crop_frame, synthetic_scene};

#[test]
fn test_zero_offset_for_identical_regions() {
    let scene = synthetic_scene(64, 64, 7);
    let offset = compute_offset_array(&scene, &scene).unwrap();
    assert!(offset.dy.abs() < 0.5, "dy={} should be ~0", offset.dy);
    assert!(offset.dx.abs() < 0.5, "dx={} should be ~0", offset.dx);
}

#[test]
fn test_known_shift_sign_and_magnitude() {
    let scene = synthetic_scene(140, 140, 11);
    let reference = crop_frame(&scene, 0, 20, 20, 100, 100);
    // Cut 3 rows down and 5 columns right: content sits at lower
    // coordinates in the target, so the reported shift is positive.
    let target = crop_frame(&scene, 1, 23, 25, 100, 100);

    let offset = compute_offset_array(&reference.data, &target.data).unwrap();
    assert!((offset.dy - 3.0).abs() < 0.5, "dy={} should be ~3", offset.dy);
    assert!((offset.dx - 5.0).abs() < 0.5, "dx={} should be ~5", offset.dx);
}

#[test]
fn test_select_alignment_rect_prefers_textured_tile() {
    // Flat frame except one textured tile in the 3x3 partition.
    let mut data = Array2::<f32>::from_elem((90, 90), 0.2);
    let texture = synthetic_scene(30, 30, 3);
    for r in 0..30 {
        for c in 0..30 {
            data[[30 + r, 60 + c]] = texture[[r, c]];
        }
    }
    let frames = vec![Frame::new(0, data)];

    let mut aligner = GlobalAligner::new(&frames, 0).unwrap();
    let rect = aligner
        .select_alignment_rect(&frames, 3, laplacian_variance)
        .unwrap();
    assert_eq!(
        rect,
        Rect {
            y_low: 30,
            y_high: 60,
            x_low: 60,
            x_high: 90
        }
    );
}

#[test]
fn test_align_frames_recovers_known_shifts() {
    let scene = synthetic_scene(140, 140, 42);
    let offsets: [(i64, i64); 5] = [(2, -1), (0, 3), (0, 0), (-4, 2), (1, 1)];
    let frames: Vec<Frame> = offsets
        .iter()
        .enumerate()
        .map(|(i, &(dy, dx))| {
            crop_frame(&scene, i, (20 + dy) as usize, (20 + dx) as usize, 100, 100)
        })
        .collect();

    let mut aligner = GlobalAligner::new(&frames, 2).unwrap();
    aligner
        .select_alignment_rect(&frames, 3, laplacian_variance)
        .unwrap();
    aligner.align_frames(&frames).unwrap();

    let shifts = aligner.shifts().unwrap();
    for (shift, &(dy, dx)) in shifts.iter().zip(offsets.iter()) {
        assert_eq!(*shift, GlobalShift { dy, dx });
    }

    // dy in [-4, 2], dx in [-1, 3] over 100 pixels
    assert_eq!(
        aligner.intersection().unwrap(),
        Rect {
            y_low: 2,
            y_high: 96,
            x_low: 3,
            x_high: 99
        }
    );
}

#[test]
fn test_average_frame_matches_reference_crop() {
    let scene = synthetic_scene(140, 140, 42);
    let offsets: [(i64, i64); 3] = [(2, -1), (0, 0), (-3, 2)];
    let frames: Vec<Frame> = offsets
        .iter()
        .enumerate()
        .map(|(i, &(dy, dx))| {
            crop_frame(&scene, i, (20 + dy) as usize, (20 + dx) as usize, 100, 100)
        })
        .collect();

    let mut aligner = GlobalAligner::new(&frames, 1).unwrap();
    aligner
        .select_alignment_rect(&frames, 3, laplacian_variance)
        .unwrap();
    aligner.align_frames(&frames).unwrap();

    let shifts = aligner.shifts().unwrap().to_vec();
    let refs: Vec<&Frame> = frames.iter().collect();
    let mean = aligner.average_frame(&refs, &shifts).unwrap();

    // All frames are exact translations of one scene, so the mean over the
    // intersection equals the reference frame's own crop of it.
    let intersection = aligner.intersection().unwrap();
    assert_eq!(mean.dim(), (intersection.height(), intersection.width()));
    for r in 0..intersection.height() {
        for c in 0..intersection.width() {
            let expected =
                frames[1].data[[intersection.y_low + r, intersection.x_low + c]];
            assert_abs_diff_eq!(mean[[r, c]], expected, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_align_before_rect_selection_is_an_ordering_error() {
    let scene = synthetic_scene(64, 64, 5);
    let frames = vec![crop_frame(&scene, 0, 0, 0, 64, 64)];
    let mut aligner = GlobalAligner::new(&frames, 0).unwrap();

    let err = aligner.align_frames(&frames).unwrap_err();
    assert!(matches!(err, GanymedeError::WrongOrdering(_)));

    let refs: Vec<&Frame> = frames.iter().collect();
    let err = aligner.average_frame(&refs, &[GlobalShift::default()]).unwrap_err();
    assert!(matches!(err, GanymedeError::WrongOrdering(_)));
}

#[test]
fn test_constructor_validates_input() {
    assert!(matches!(
        GlobalAligner::new(&[], 0),
        Err(GanymedeError::EmptySequence)
    ));

    let scene = synthetic_scene(32, 32, 1);
    let frames = vec![crop_frame(&scene, 0, 0, 0, 32, 32)];
    assert!(matches!(
        GlobalAligner::new(&frames, 5),
        Err(GanymedeError::FrameIndexOutOfRange { .. })
    ));

    let mismatched = vec![
        crop_frame(&scene, 0, 0, 0, 32, 32),
        crop_frame(&scene, 1, 0, 0, 16, 32),
    ];
    assert!(matches!(
        GlobalAligner::new(&mismatched, 0),
        Err(GanymedeError::DimensionMismatch { .. })
    ));
}
