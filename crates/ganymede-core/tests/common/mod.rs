#![allow(dead_code)]

use ndarray::{s, Array2};

use ganymede_core::config::RegistrationConfig;
use ganymede_core::frame::Frame;

/// Minimal deterministic generator so test scenes are reproducible.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493))
    }

    /// Uniform value in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32) / (1u64 << 24) as f32
    }
}

/// Synthetic sky: faint noise plus a handful of Gaussian blobs, so both
/// correlation and block matching have features to lock on to.
pub fn synthetic_scene(height: usize, width: usize, seed: u64) -> Array2<f32> {
    let mut rng = Lcg::new(seed);
    let mut scene = Array2::<f32>::zeros((height, width));
    for v in scene.iter_mut() {
        *v = 0.05 * rng.next_f32();
    }

    let blobs = ((height * width) / 800).max(8);
    for _ in 0..blobs {
        let cy = (rng.next_f32() * (height as f32 - 1.0)) as i64;
        let cx = (rng.next_f32() * (width as f32 - 1.0)) as i64;
        let amp = 0.4 + 0.6 * rng.next_f32();
        let sigma = 2.0 + 4.0 * rng.next_f32();
        let reach = (3.0 * sigma) as i64;
        for r in (cy - reach).max(0)..=(cy + reach).min(height as i64 - 1) {
            for c in (cx - reach).max(0)..=(cx + reach).min(width as i64 - 1) {
                let d2 = ((r - cy) * (r - cy) + (c - cx) * (c - cx)) as f32;
                let value = scene[[r as usize, c as usize]]
                    + amp * (-d2 / (2.0 * sigma * sigma)).exp();
                scene[[r as usize, c as usize]] = value.min(1.0);
            }
        }
    }

    scene
}

/// Bright scene with texture everywhere, so every alignment point candidate
/// passes brightness and contrast admission.
pub fn textured_scene(height: usize, width: usize, seed: u64) -> Array2<f32> {
    let mut rng = Lcg::new(seed);
    Array2::from_shape_fn((height, width), |_| 0.3 + 0.4 * rng.next_f32())
}

/// Frame cut out of a larger scene at `(y0, x0)`. Cutting frame i at
/// `base + shift_i` makes global alignment report exactly `shift_i` relative
/// to a frame cut at `base`.
pub fn crop_frame(
    scene: &Array2<f32>,
    index: usize,
    y0: usize,
    x0: usize,
    height: usize,
    width: usize,
) -> Frame {
    Frame::new(
        index,
        scene.slice(s![y0..y0 + height, x0..x0 + width]).to_owned(),
    )
}

/// Registration parameters scaled down for the small test images.
pub fn test_config() -> RegistrationConfig {
    RegistrationConfig {
        search_width: 5,
        half_box_width: 10,
        half_patch_width: 15,
        step_size: 20,
        structure_threshold: 0.0,
        brightness_threshold: 0.01,
        contrast_threshold: 0.01,
        stack_percent: 50.0,
        average_frame_percent: 40.0,
        ..RegistrationConfig::default()
    }
}
