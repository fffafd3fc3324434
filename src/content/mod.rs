//! Module for subtitle content utils
mod area;
mod size;

pub use area::{Area, AreaValues};
pub use size::{Size, DEFAULT_FRAME_SIZE, MAX_DIMENSION};

use thiserror::Error;

/// Error for content
#[derive(Debug, Error)]
pub enum ContentError {
    /// Indicate an invalid bounding box Area
    /// Example: If at least one coordinate value of second point are inferior of first point.
    #[error("Invalid bounding box for Area")]
    InvalidAreaBounding,

    /// A coordinate doesn't fit in 12 bits.
    #[error("Area coordinate out of range")]
    AreaOutOfRange,
}
