use ndarray::Array2;

use crate::config::RankMethod;

/// A single grayscale image frame.
/// Pixel values are f32 in [0.0, 1.0].
#[derive(Clone, Debug)]
pub struct Frame {
    /// Position of this frame in the input sequence.
    pub index: usize,
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Optional precomputed contrast-response map used to accelerate
    /// per-point frame ranking.
    pub contrast_map: Option<ContrastMap>,
}

impl Frame {
    pub fn new(index: usize, data: Array2<f32>) -> Self {
        Self {
            index,
            data,
            contrast_map: None,
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// Down-sampled contrast-response map of one frame.
///
/// `data` dims are the frame dims divided by `downsample`. Laplace maps store
/// the signed filter response; Gradient and Sobel maps store magnitudes.
#[derive(Clone, Debug)]
pub struct ContrastMap {
    pub data: Array2<f32>,
    pub method: RankMethod,
    pub downsample: usize,
}

/// Local (sub-pixel capable) shift of an alignment point in one frame.
///
/// Sign convention: positive `(dy, dx)` means the observed content sits at
/// lower pixel coordinates than in the reference and must be translated in
/// the positive direction to align.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShiftVector {
    pub dy: f64,
    pub dx: f64,
}

/// Integer global rigid shift of one frame relative to the reference frame.
///
/// Kept integral so the intersection region can be cropped with plain
/// indexing; same sign convention as [`ShiftVector`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalShift {
    pub dy: i64,
    pub dx: i64,
}

/// Half-open pixel rectangle `[y_low, y_high) x [x_low, x_high)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub y_low: usize,
    pub y_high: usize,
    pub x_low: usize,
    pub x_high: usize,
}

impl Rect {
    pub fn height(&self) -> usize {
        self.y_high.saturating_sub(self.y_low)
    }

    pub fn width(&self) -> usize {
        self.x_high.saturating_sub(self.x_low)
    }

    pub fn is_empty(&self) -> bool {
        self.y_high <= self.y_low || self.x_high <= self.x_low
    }
}
