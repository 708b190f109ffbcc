// this_file: src/error.rs

//! Error types for the rasterizer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RasterError>;

/// Failures that abort a raster run.
///
/// Every variant leaves the [`Raster`](crate::Raster) instance valid; a
/// subsequent call with well-formed input succeeds. Spans already handed to
/// the callback before the failure are not rolled back.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Growing the edge pool or the edge table failed.
    #[error("out of memory")]
    OutOfMemory(#[from] std::collections::TryReserveError),

    /// The polygon needs more edges than fit in 16-bit pool indices.
    #[error("polygon exceeds {} edges", u16::MAX)]
    TooManyEdges,

    /// Malformed input: contour counts overrun the point slice, a vertex
    /// lies outside the bounds, or the polygon shape does not fit the
    /// requested scan mode.
    #[error("malformed polygon")]
    InvalidPolygon,

    /// A raw fill-rule value that is neither odd (1) nor non-zero (2).
    #[error("unknown fill rule: {0}")]
    InvalidRule(u32),
}
