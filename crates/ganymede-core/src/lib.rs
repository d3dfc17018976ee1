pub mod error;
pub mod consts;
pub mod config;
pub mod frame;
pub mod quality;
pub mod align;
pub mod points;
pub mod rank;
pub mod pipeline;
