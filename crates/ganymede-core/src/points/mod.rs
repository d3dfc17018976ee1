pub mod grid;
pub mod manager;
pub mod point;

pub use grid::{AlignmentPointGrid, StructureMeasure};
pub use manager::AlignmentPointManager;
pub use point::AlignmentPoint;
