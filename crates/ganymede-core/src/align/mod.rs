pub mod global;
pub mod local;
pub mod phase_correlation;
pub mod subpixel;

pub use global::GlobalAligner;
pub use local::{compute_shift, LocalShift};
pub use phase_correlation::{compute_offset_array, compute_offset_integer};
pub use subpixel::{register_translation_subpixel, SubpixelRegistration};
