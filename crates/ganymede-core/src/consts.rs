/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Upsampling factor for sub-pixel translation registration.
/// 10 gives ~0.1 px accuracy on the cross-correlation peak.
pub const SUBPIXEL_UPSAMPLE_FACTOR: usize = 10;

/// Search window (in pixels) around the coarse peak for the upsampled DFT
/// refinement stage of sub-pixel registration.
pub const SUBPIXEL_SEARCH_WINDOW: f64 = 1.5;

/// Number of channels in a color patch accumulation buffer (R, G, B).
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Number of channels in a monochrome patch accumulation buffer.
pub const MONO_CHANNEL_COUNT: usize = 1;
