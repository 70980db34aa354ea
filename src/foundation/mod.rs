//! Value types shared by every layer of the pipeline.

pub mod color;
pub mod error;
pub mod geometry;
