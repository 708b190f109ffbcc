// this_file: src/raster.rs

//! Scanline polygon rasterization.
//!
//! A raster run walks three structures:
//!
//! 1. the edge table, binning every non-horizontal polygon segment by the
//!    scanline its top endpoint rounds to,
//! 2. the active edge list, holding the edges that cross the scanline being
//!    processed, sorted by x ascending (slope breaks ties),
//! 3. a fill-rule walk over adjacent active-edge pairs that turns winding
//!    counts into horizontal spans for the callback.
//!
//! ```text
//!  (y)
//!   0 ----------------> .
//!   1                 .   .
//!   2               .       . e2     edge_table[0]: e1 e2
//!   3          e1 .           .      edge_table[4]: e3
//!   4 ------------------------> .    edge_table[7]: e4
//!   5         .               .
//!   6       .               .        scanning y = 5:
//!   7 --> .               . e3       active_edges: e1 e3
//!   8       .           .
//!   9      e4 .       .
//!  10          .   .
//!  11            .
//! ```
//!
//! Edges step `x += slope` from one scanline to the next and drop off the
//! active list once the scan passes their bottom endpoint.

use crate::edge::{sort_by_x, Edge, EdgePool, EdgeTable, FineEdge};
use crate::error::{RasterError, Result};
use crate::fixed::F16Dot16;
use crate::geom::{Polygon, Rect};
use crate::FillRule;

/// Scanline polygon rasterizer.
///
/// Owns a reusable edge pool and edge table; both are grown on demand,
/// retained across runs and reset (not freed) at the start of each run.
/// Dropping the rasterizer releases them.
///
/// A single instance is single-threaded and non-reentrant; independent
/// instances share nothing and may run in parallel.
#[derive(Debug)]
pub struct Raster {
    pub(crate) pool: EdgePool<Edge>,
    pub(crate) fine_pool: EdgePool<FineEdge>,
    pub(crate) table: EdgeTable,
    pub(crate) active: u16,
}

impl Default for Raster {
    fn default() -> Self {
        Self::new()
    }
}

impl Raster {
    pub fn new() -> Self {
        Self {
            pool: EdgePool::new(),
            fine_pool: EdgePool::new(),
            table: EdgeTable::new(),
            active: 0,
        }
    }

    /// Rasterize `polygon` against `bounds`, handing each span to `emit` as
    /// `(y_start, y_end, left_edge, right_edge)`.
    ///
    /// `y_end` is `y_start + 1` except when the convex fast path emits a
    /// whole rectangle as one span. The polygon must already lie inside
    /// `bounds`; no clipping is performed. Degenerate input (empty bounds,
    /// no non-horizontal segments) emits nothing and is not an error.
    pub fn rasterize<F>(
        &mut self,
        polygon: &Polygon,
        bounds: &Rect,
        rule: FillRule,
        mut emit: F,
    ) -> Result<()>
    where
        F: FnMut(i32, i32, &Edge, &Edge),
    {
        if polygon.vertex_total().is_none() {
            return Err(RasterError::InvalidPolygon);
        }

        if polygon.convex {
            // each convex contour scans independently with the two-edge
            // fast path; the fill rule is irrelevant for a single convex
            // outline
            for contour in polygon.contours() {
                let counts = [contour.len() as u16, 0];
                let single = Polygon {
                    points: contour,
                    counts: &counts,
                    convex: true,
                };
                self.scan_convex(&single, bounds, &mut emit)?;
            }
            Ok(())
        } else {
            self.scan_concave(polygon, bounds, rule, &mut emit)
        }
    }

    /// Build the edge table for `polygon` and return the polygon's scanline
    /// range, or `None` when there is nothing to scan.
    fn make_edges(&mut self, polygon: &Polygon, bounds: &Rect) -> Result<Option<(i32, i32)>> {
        if !(bounds.w > 0.0 && bounds.h > 0.0) {
            return Ok(None);
        }

        self.active = 0;
        let base = F16Dot16::from_float(bounds.y).to_int_round();
        let height = F16Dot16::from_float(bounds.h).to_int_round();
        self.table.reset(base, height as usize + 1)?;
        self.pool.reset()?;

        let mut first = true;
        let (mut top, mut bottom) = (0i32, 0i32);

        for contour in polygon.contours() {
            if contour.len() < 2 {
                continue;
            }
            // implicit closure: the pair walk starts with (last, first)
            let mut pb = contour[contour.len() - 1];
            for &pe in contour {
                let yb = F16Dot16::from_float(pb.y);
                let ye = F16Dot16::from_float(pe.y);
                let iyb = yb.to_int_round();
                let iye = ye.to_int_round();

                // horizontal segments carry no winding across scanlines
                if iyb == iye {
                    pb = pe;
                    continue;
                }

                let xb = F16Dot16::from_float(pb.x);
                let xe = F16Dot16::from_float(pe.x);

                let (xb, yb, iyb, xe, ye, iye, winding) = if yb > ye {
                    (xe, ye, iye, xb, yb, iyb, -1i8)
                } else {
                    (xb, yb, iyb, xe, ye, iye, 1i8)
                };
                debug_assert!(iyb < iye);

                if first {
                    top = iyb;
                    bottom = iye;
                    first = false;
                } else {
                    top = top.min(iyb);
                    bottom = bottom.max(iye);
                }

                let slope = (xe - xb).div(ye - yb);
                let dy_top = yb - F16Dot16::from_int(iyb);
                let dy_bottom = ye - F16Dot16::from_int(iye);
                debug_assert!(dy_top.abs() <= F16Dot16::HALF);
                debug_assert!(dy_bottom.abs() <= F16Dot16::HALF);

                let edge = Edge {
                    // place x on scanline iyb rather than on the raw
                    // endpoint, so stepping by slope tracks the segment
                    x: xb - dy_top.mul(slope),
                    slope,
                    x_top: xb,
                    x_bottom: xe,
                    dy_top,
                    dy_bottom,
                    y_top: iyb,
                    y_bottom: iye - 1,
                    winding,
                    is_top: true,
                    next: 0,
                };

                let index = self.pool.alloc(edge)?;
                let Some(bucket) = self.table.bucket_of(iyb) else {
                    return Err(RasterError::InvalidPolygon);
                };
                let head = self.table.head(bucket);
                self.pool.get_mut(index).next = head;
                self.table.set_head(bucket, index);

                pb = pe;
            }
        }

        if first {
            return Ok(None);
        }
        log::debug!(
            "edge table ready: {} edges, scanlines {}..{}",
            self.pool.count(),
            top,
            bottom
        );
        Ok(Some((top, bottom)))
    }

    /// Splice the chain starting at `index` into the active list, keeping it
    /// sorted by `(x, slope)` ascending.
    fn sorted_append(&mut self, mut index: u16) {
        let mut active = self.active;
        while index != 0 {
            let incoming = *self.pool.get(index);

            let mut prev: u16 = 0;
            let mut cursor = active;
            while cursor != 0 {
                let against = self.pool.get(cursor);
                debug_assert!(cursor != index);
                if incoming.x < against.x
                    || (incoming.x == against.x && incoming.slope < against.slope)
                {
                    break;
                }
                prev = cursor;
                cursor = against.next;
            }

            self.pool.get_mut(index).next = cursor;
            if prev == 0 {
                active = index;
            } else {
                self.pool.get_mut(prev).next = index;
            }

            index = incoming.next;
        }
        self.active = active;
    }

    /// Prepend the chain starting at `index` onto the active list without
    /// ordering; callers follow up with a sort.
    fn append(&mut self, mut index: u16) {
        while index != 0 {
            let next = self.pool.get(index).next;
            self.pool.get_mut(index).next = self.active;
            self.active = index;
            index = next;
        }
    }

    /// Step the active list to the next scanline: evict edges the scan has
    /// passed, walk the survivors' x by their slope and clear their top
    /// flag.
    ///
    /// Returns whether the x sequence is still monotone, letting the caller
    /// skip re-sorting on the next scanline.
    fn advance(&mut self, y: i32, bottom: i32, track_order: bool) -> bool {
        let mut order = true;
        let mut seen_first = false;
        let mut prev_x = F16Dot16::ZERO;
        let mut prev: u16 = 0;
        let mut index = self.active;
        while index != 0 {
            let (y_bottom, next) = {
                let edge = self.pool.get(index);
                (edge.y_bottom, edge.next)
            };

            if y != bottom - 1 && y_bottom < y + 1 {
                if prev == 0 {
                    self.active = next;
                } else {
                    self.pool.get_mut(prev).next = next;
                }
                index = next;
                continue;
            }

            let x = {
                let edge = self.pool.get_mut(index);
                edge.x += edge.slope;
                edge.is_top = false;
                edge.x
            };

            if track_order && seen_first && order && x < prev_x {
                order = false;
            }
            seen_first = true;
            prev_x = x;
            prev = index;
            index = next;
        }
        order
    }

    /// Scan one convex contour.
    fn scan_convex<F>(&mut self, polygon: &Polygon, bounds: &Rect, emit: &mut F) -> Result<()>
    where
        F: FnMut(i32, i32, &Edge, &Edge),
    {
        let Some((top, bottom)) = self.make_edges(polygon, bounds)? else {
            return Ok(());
        };

        for y in top..bottom {
            let Some(bucket) = self.table.bucket_of(y) else {
                debug_assert!(false, "scanline {y} outside edge table");
                break;
            };
            self.sorted_append(self.table.head(bucket));
            self.convex_line(y, emit);
            self.advance(y, bottom, false);
        }
        Ok(())
    }

    /// Scan a concave (or multi-contour) polygon under `rule`.
    fn scan_concave<F>(
        &mut self,
        polygon: &Polygon,
        bounds: &Rect,
        rule: FillRule,
        emit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(i32, i32, &Edge, &Edge),
    {
        let Some((top, bottom)) = self.make_edges(polygon, bounds)? else {
            return Ok(());
        };

        let mut order = true;
        for y in top..bottom {
            let Some(bucket) = self.table.bucket_of(y) else {
                debug_assert!(false, "scanline {y} outside edge table");
                break;
            };
            let head = self.table.head(bucket);
            if order {
                self.sorted_append(head);
            } else {
                // crossing edges put the list out of order mid-scan
                self.append(head);
                sort_by_x(&mut self.pool, self.active);
            }
            self.concave_line(y, rule, emit);
            order = self.advance(y, bottom, true);
        }
        Ok(())
    }

    /// Emit the span between the two active edges of a convex contour.
    ///
    /// When both edges are near-vertical the region below is a rectangle:
    /// it is emitted as one multi-scanline span, the taller edge is
    /// re-entered into the edge table at the rectangle's bottom and the
    /// intermediate scanlines carry no active edges.
    fn convex_line<F>(&mut self, y: i32, emit: &mut F)
    where
        F: FnMut(i32, i32, &Edge, &Edge),
    {
        let index_lsh = self.active;
        if index_lsh == 0 {
            return;
        }
        let index_rsh = self.pool.get(index_lsh).next;
        if index_rsh == 0 {
            return;
        }
        debug_assert!(self.pool.get(index_lsh).x <= self.pool.get(index_rsh).x);

        let mut ye = y + 1;

        let flat_lsh = self.pool.get(index_lsh).slope.abs() <= F16Dot16::NEAR_ZERO;
        let flat_rsh = self.pool.get(index_rsh).slope.abs() <= F16Dot16::NEAR_ZERO;
        if flat_lsh && flat_rsh {
            let (index_min, index_max) =
                if self.pool.get(index_lsh).y_bottom > self.pool.get(index_rsh).y_bottom {
                    (index_rsh, index_lsh)
                } else {
                    (index_lsh, index_rsh)
                };

            ye = self.pool.get(index_min).y_bottom + 1;
            self.active = 0;

            // the taller edge outlives the rectangle; re-enter it at the new
            // top so the scan picks it up again
            if ye < self.pool.get(index_max).y_bottom {
                if let Some(bucket) = self.table.bucket_of(ye) {
                    let head = self.table.head(bucket);
                    self.pool.get_mut(index_max).next = head;
                    self.table.set_head(bucket, index_max);
                } else {
                    debug_assert!(false, "re-entry scanline {ye} outside edge table");
                }
            }
        }

        let lsh = self.pool.get(index_lsh);
        let rsh = self.pool.get(index_rsh);
        log::trace!(
            "span y {}..{} x {}..{}",
            y,
            ye,
            lsh.x.to_float(),
            rsh.x.to_float()
        );
        emit(y, ye, lsh, rsh);
    }

    /// Walk active-edge pairs under `rule`, coalescing conjoint spans.
    ///
    /// Two spans meeting at a shared vertex x are merged before emission so
    /// downstream blending sees no seam.
    fn concave_line<F>(&mut self, y: i32, rule: FillRule, emit: &mut F)
    where
        F: FnMut(i32, i32, &Edge, &Edge),
    {
        fn flush<F>(pool: &EdgePool<Edge>, y: i32, lsh: u16, rsh: u16, emit: &mut F)
        where
            F: FnMut(i32, i32, &Edge, &Edge),
        {
            let (lsh, rsh) = (pool.get(lsh), pool.get(rsh));
            log::trace!("span y {} x {}..{}", y, lsh.x.to_float(), rsh.x.to_float());
            emit(y, y + 1, lsh, rsh);
        }

        let mut winding = 0i32;
        let mut cache_lsh: u16 = 0;
        let mut cache_rsh: u16 = 0;

        let mut index_lsh = self.active;
        while index_lsh != 0 {
            let edge_lsh = self.pool.get(index_lsh);
            winding += i32::from(edge_lsh.winding);

            let index_rsh = edge_lsh.next;
            if index_rsh == 0 {
                break;
            }
            debug_assert!(edge_lsh.x <= self.pool.get(index_rsh).x);

            let inside = match rule {
                FillRule::Odd => winding & 1 != 0,
                FillRule::NonZero => winding != 0,
            };

            if inside {
                if cache_lsh == 0 && cache_rsh == 0 {
                    cache_lsh = index_lsh;
                    cache_rsh = index_rsh;
                } else if self.pool.get(cache_rsh).x.to_int_round()
                    == self.pool.get(index_lsh).x.to_int_round()
                {
                    // conjoint: this pair starts where the cached one ends
                    cache_rsh = index_rsh;
                } else {
                    flush(&self.pool, y, cache_lsh, cache_rsh, emit);
                    cache_lsh = index_lsh;
                    cache_rsh = index_rsh;
                }
            }

            index_lsh = index_rsh;
        }

        if cache_lsh != 0 && cache_rsh != 0 {
            flush(&self.pool, y, cache_lsh, cache_rsh, emit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::FPoint;

    fn collect_spans(
        raster: &mut Raster,
        polygon: &Polygon,
        bounds: &Rect,
        rule: FillRule,
    ) -> Vec<(i32, i32, i32, i32)> {
        let mut spans = Vec::new();
        raster
            .rasterize(polygon, bounds, rule, |ys, ye, lsh, rsh| {
                spans.push((ys, ye, lsh.x.to_int_round(), rsh.x.to_int_round()));
            })
            .unwrap();
        spans
    }

    #[test]
    fn test_horizontal_segments_build_no_edges() {
        let points = [
            FPoint::new(0.0, 0.0),
            FPoint::new(10.0, 0.0),
            FPoint::new(10.0, 5.0),
            FPoint::new(0.0, 5.0),
        ];
        let counts = [4u16, 0];
        let polygon = Polygon::new(&points, &counts, false);
        let bounds = Rect::new(0.0, 0.0, 10.0, 5.0);

        let mut raster = Raster::new();
        raster.make_edges(&polygon, &bounds).unwrap();

        // only the two vertical segments survive
        assert_eq!(raster.pool.count(), 2);
    }

    #[test]
    fn test_edge_orientation_invariant() {
        let points = [
            FPoint::new(0.0, 4.5),
            FPoint::new(3.0, 0.5),
            FPoint::new(6.0, 4.5),
        ];
        let counts = [3u16, 0];
        let polygon = Polygon::new(&points, &counts, false);
        let bounds = Rect::new(0.0, 0.0, 6.0, 5.0);

        let mut raster = Raster::new();
        raster.make_edges(&polygon, &bounds).unwrap();

        assert_eq!(raster.pool.count(), 2);
        for index in 1..=raster.pool.count() as u16 {
            let edge = raster.pool.get(index);
            assert!(edge.y_top <= edge.y_bottom);
            assert!(edge.winding == 1 || edge.winding == -1);
            assert!(edge.dy_top.abs() <= F16Dot16::HALF);
            assert!(edge.dy_bottom.abs() <= F16Dot16::HALF);
            assert!(edge.is_top);
        }
    }

    #[test]
    fn test_start_x_correction() {
        // segment from (0, 0.25) to (4, 4.25), slope 1: its top rounds to
        // scanline 0, so x must back up by dy_top * slope = 0.25
        let points = [
            FPoint::new(0.0, 0.25),
            FPoint::new(4.0, 4.25),
            FPoint::new(0.0, 4.25),
        ];
        let counts = [3u16, 0];
        let polygon = Polygon::new(&points, &counts, false);
        let bounds = Rect::new(0.0, 0.0, 5.0, 5.0);

        let mut raster = Raster::new();
        raster.make_edges(&polygon, &bounds).unwrap();

        let slanted = (1..=raster.pool.count() as u16)
            .map(|i| *raster.pool.get(i))
            .find(|e| e.slope == F16Dot16::ONE)
            .unwrap();
        assert_eq!(slanted.dy_top, F16Dot16::from_float(0.25));
        assert_eq!(slanted.x, F16Dot16::from_float(-0.25));
        assert_eq!(slanted.x_top, F16Dot16::ZERO);
    }

    #[test]
    fn test_degenerate_bounds_emit_nothing() {
        let points = [
            FPoint::new(0.0, 0.0),
            FPoint::new(4.0, 0.0),
            FPoint::new(4.0, 4.0),
        ];
        let counts = [3u16, 0];
        let polygon = Polygon::new(&points, &counts, false);

        let mut raster = Raster::new();
        let spans = collect_spans(
            &mut raster,
            &polygon,
            &Rect::new(0.0, 0.0, 4.0, 0.0),
            FillRule::Odd,
        );
        assert!(spans.is_empty());
    }

    #[test]
    fn test_malformed_counts_rejected() {
        let points = [FPoint::new(0.0, 0.0); 3];
        let counts = [9u16, 0];
        let polygon = Polygon::new(&points, &counts, false);
        let bounds = Rect::new(0.0, 0.0, 4.0, 4.0);

        let mut raster = Raster::new();
        let result = raster.rasterize(&polygon, &bounds, FillRule::Odd, |_, _, _, _| {});
        assert!(matches!(result, Err(RasterError::InvalidPolygon)));
    }

    #[test]
    fn test_is_top_clears_after_first_scanline() {
        let points = [
            FPoint::new(0.0, 0.0),
            FPoint::new(4.0, 0.0),
            FPoint::new(4.0, 4.0),
            FPoint::new(0.0, 4.0),
        ];
        let counts = [4u16, 0];
        let polygon = Polygon::new(&points, &counts, false);
        let bounds = Rect::new(0.0, 0.0, 4.0, 4.0);

        let mut tops = Vec::new();
        Raster::new()
            .rasterize(&polygon, &bounds, FillRule::NonZero, |ys, _, lsh, rsh| {
                tops.push((ys, lsh.is_top, rsh.is_top));
            })
            .unwrap();

        assert_eq!(tops.len(), 4);
        assert_eq!(tops[0], (0, true, true));
        for &(_, lsh_top, rsh_top) in &tops[1..] {
            assert!(!lsh_top && !rsh_top);
        }
    }
}
