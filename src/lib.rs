// this_file: src/lib.rs

#![deny(unsafe_code)]

//! polyscan - scanline polygon rasterization with fixed-point precision.
//!
//! Given a polygon of one or more closed contours and a bounding rectangle,
//! the rasterizer emits per-scanline horizontal spans covering the polygon's
//! interior under an odd-even or non-zero winding fill rule. A quadratic
//! Bézier flattener turns curves into polylines the rasterizer can consume.
//!
//! The core is an edge-table / active-edge-list state machine over 16.16
//! fixed-point numbers: no per-edge allocation, stable edge ordering,
//! conjoint-span coalescing and a convex fast path that collapses
//! rectangular regions into single spans.
//!
//! ## Architecture
//!
//! - `fixed`: 16.16 fixed-point arithmetic
//! - `geom`: point, rectangle and polygon input types
//! - `quad`: quadratic Bézier flattening
//! - `edge`: edge records, the index pool and the per-scanline table
//! - `raster`: edge building, active-list maintenance, scan drivers and
//!   fill rules
//! - `mask`: byte-per-pixel coverage target built on the span callback
//!
//! ## Safety
//!
//! 100% safe Rust; `#![deny(unsafe_code)]` keeps it that way.
//!
//! ## Example
//!
//! ```
//! use polyscan::{FillRule, FPoint, Polygon, Raster, Rect};
//!
//! let points = [
//!     FPoint::new(0.0, 0.0),
//!     FPoint::new(10.0, 0.0),
//!     FPoint::new(10.0, 5.0),
//!     FPoint::new(0.0, 5.0),
//! ];
//! let counts = [4, 0];
//! let polygon = Polygon::new(&points, &counts, false);
//! let bounds = Rect::new(0.0, 0.0, 10.0, 5.0);
//!
//! let mut raster = Raster::new();
//! let mut spans = Vec::new();
//! raster.rasterize(&polygon, &bounds, FillRule::NonZero, |y0, y1, lsh, rsh| {
//!     spans.push((y0, y1, lsh.x.to_int_round(), rsh.x.to_int_round()));
//! })?;
//!
//! assert_eq!(spans.len(), 5);
//! assert_eq!(spans[0], (0, 1, 0, 10));
//! # Ok::<(), polyscan::RasterError>(())
//! ```

pub mod edge;
pub mod error;
pub mod fixed;
pub mod geom;
mod high;
pub mod mask;
pub mod quad;
pub mod raster;

pub use edge::{Edge, FineEdge};
pub use error::{RasterError, Result};
pub use fixed::F16Dot16;
pub use geom::{FPoint, Polygon, Rect};
pub use mask::Mask;
pub use raster::Raster;

/// Fill rule deciding which winding numbers count as inside.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FillRule {
    /// Odd winding numbers are inside.
    Odd = 1,
    /// Any non-zero winding number is inside.
    NonZero = 2,
}

impl FillRule {
    /// Decode a raw rule value; anything but 1 or 2 is an error.
    pub fn from_raw(raw: u32) -> Result<FillRule> {
        match raw {
            1 => Ok(FillRule::Odd),
            2 => Ok(FillRule::NonZero),
            _ => {
                log::error!("unknown fill rule: {raw}");
                Err(RasterError::InvalidRule(raw))
            }
        }
    }
}

impl Default for FillRule {
    fn default() -> FillRule {
        FillRule::NonZero
    }
}
