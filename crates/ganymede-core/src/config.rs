use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GanymedeError, Result};

/// Algorithm used to compute the local de-warp shift of an alignment point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentMethod {
    /// Upsampled-DFT cross-correlation, ~1/10 pixel accuracy, with error and
    /// phase-difference diagnostics.
    Subpixel,
    /// FFT phase correlation, integer-pixel accuracy.
    CrossCorrelation,
    /// Exhaustive expanding-ring search over absolute pixel differences.
    #[default]
    RadialSearch,
    /// Greedy 8-connected descent over absolute pixel differences.
    SteepestDescent,
}

impl AlignmentMethod {
    /// Resolve a method name to the closed enum. Unrecognized names are a
    /// fatal configuration error.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "Subpixel" => Ok(Self::Subpixel),
            "CrossCorrelation" => Ok(Self::CrossCorrelation),
            "RadialSearch" => Ok(Self::RadialSearch),
            "SteepestDescent" => Ok(Self::SteepestDescent),
            other => Err(GanymedeError::NotSupported(format!(
                "alignment method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AlignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Subpixel => "Subpixel",
            Self::CrossCorrelation => "CrossCorrelation",
            Self::RadialSearch => "RadialSearch",
            Self::SteepestDescent => "SteepestDescent",
        };
        write!(f, "{}", name)
    }
}

/// Contrast measure used for structure scoring and per-point frame ranking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankMethod {
    /// Mean absolute forward difference in both axes.
    #[serde(rename = "gradient")]
    Gradient,
    /// Variance of the 3x3 Laplacian response.
    #[default]
    Laplace,
    /// Mean Sobel gradient magnitude.
    Sobel,
}

impl RankMethod {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "gradient" => Ok(Self::Gradient),
            "Laplace" => Ok(Self::Laplace),
            "Sobel" => Ok(Self::Sobel),
            other => Err(GanymedeError::NotSupported(format!(
                "rank method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gradient => "gradient",
            Self::Laplace => "Laplace",
            Self::Sobel => "Sobel",
        };
        write!(f, "{}", name)
    }
}

/// Configuration of the registration core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Local shift estimation algorithm.
    #[serde(default)]
    pub alignment_method: AlignmentMethod,
    /// Contrast measure for structure scoring and frame ranking.
    #[serde(default)]
    pub rank_method: RankMethod,
    /// Maximum local search radius in pixels.
    pub search_width: usize,
    /// Half width of the shift-measurement box of an alignment point.
    pub half_box_width: usize,
    /// Half width of the stacking patch of an alignment point.
    pub half_patch_width: usize,
    /// Nominal spacing between alignment point centers.
    pub step_size: usize,
    /// Normalized structure score below which a point is dropped (0..1).
    pub structure_threshold: f64,
    /// Minimum box peak brightness for admission.
    pub brightness_threshold: f32,
    /// Minimum box brightness range (max - min) for admission.
    pub contrast_threshold: f32,
    /// Fraction of below-threshold pixels above which a point is recentred
    /// on its brightness centroid.
    pub dim_fraction_threshold: f64,
    /// Percentage of frames stacked per alignment point.
    pub stack_percent: f64,
    /// Percentage of top-quality frames averaged into the reference image.
    pub average_frame_percent: f64,
    /// Tile grid scale factor for alignment rectangle selection.
    pub rectangle_scale_factor: usize,
    /// Parabola-fit sub-pixel refinement of the radial search minimum.
    #[serde(default)]
    pub local_subpixel_refinement: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            alignment_method: AlignmentMethod::default(),
            rank_method: RankMethod::default(),
            search_width: 10,
            half_box_width: 20,
            half_patch_width: 30,
            step_size: 25,
            structure_threshold: 0.15,
            brightness_threshold: 0.10,
            contrast_threshold: 0.05,
            dim_fraction_threshold: 0.3,
            stack_percent: 25.0,
            average_frame_percent: 5.0,
            rectangle_scale_factor: 3,
            local_subpixel_refinement: false,
        }
    }
}

impl RegistrationConfig {
    /// Validate parameter ranges. Violations are fatal configuration errors.
    pub fn validate(&self) -> Result<()> {
        if self.rectangle_scale_factor == 0 {
            return Err(GanymedeError::InvalidConfig(
                "rectangle_scale_factor must be >= 1".into(),
            ));
        }
        if self.search_width == 0 {
            return Err(GanymedeError::InvalidConfig(
                "search_width must be >= 1".into(),
            ));
        }
        if self.half_box_width == 0 {
            return Err(GanymedeError::InvalidConfig(
                "half_box_width must be >= 1".into(),
            ));
        }
        if self.half_patch_width < self.half_box_width {
            return Err(GanymedeError::InvalidConfig(
                "half_patch_width must be >= half_box_width".into(),
            ));
        }
        if self.step_size == 0 {
            return Err(GanymedeError::InvalidConfig("step_size must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.structure_threshold) {
            return Err(GanymedeError::InvalidConfig(
                "structure_threshold must lie in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dim_fraction_threshold) {
            return Err(GanymedeError::InvalidConfig(
                "dim_fraction_threshold must lie in [0, 1]".into(),
            ));
        }
        if self.stack_percent <= 0.0 || self.stack_percent > 100.0 {
            return Err(GanymedeError::InvalidConfig(
                "stack_percent must lie in (0, 100]".into(),
            ));
        }
        if self.average_frame_percent <= 0.0 || self.average_frame_percent > 100.0 {
            return Err(GanymedeError::InvalidConfig(
                "average_frame_percent must lie in (0, 100]".into(),
            ));
        }
        Ok(())
    }
}
