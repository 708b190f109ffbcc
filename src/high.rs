// this_file: src/high.rs

//! High-precision scan mode.
//!
//! Variant of the concave scan that never rounds y to integer scanlines:
//! edges keep fixed-point `y_top`/`y_bottom`, the scan position steps one
//! full unit in fixed point from the polygon's exact top, and spans are
//! reported with fixed-point vertical extents. Precision of the horizontal
//! walk is unchanged; this mode exists for callers that want unrounded span
//! heights, and stays more expensive than the integer path.

use crate::edge::{sort_by_x, FineEdge};
use crate::error::{RasterError, Result};
use crate::fixed::F16Dot16;
use crate::geom::{Polygon, Rect};
use crate::raster::Raster;
use crate::FillRule;

impl Raster {
    /// Rasterize a concave polygon with fixed-point span heights.
    ///
    /// Spans arrive as `(y_start, y_end, left_edge, right_edge)` with both
    /// y values in 16.16 fixed point; `y_end - y_start` is one unit except
    /// for the final span, which is clipped to the polygon's exact bottom.
    /// Convex-flagged polygons are rejected; use [`Raster::rasterize`] for
    /// those.
    pub fn rasterize_fine<F>(
        &mut self,
        polygon: &Polygon,
        bounds: &Rect,
        rule: FillRule,
        mut emit: F,
    ) -> Result<()>
    where
        F: FnMut(F16Dot16, F16Dot16, &FineEdge, &FineEdge),
    {
        if polygon.convex {
            return Err(RasterError::InvalidPolygon);
        }
        if polygon.vertex_total().is_none() {
            return Err(RasterError::InvalidPolygon);
        }

        let Some((top, bottom)) = self.make_fine_edges(polygon, bounds)? else {
            return Ok(());
        };

        let mut y = top;
        while y < bottom {
            if let Some(bucket) = self.table.bucket_of(y.to_int()) {
                self.activate_fine(bucket, y);
            }
            sort_by_x(&mut self.fine_pool, self.active);
            self.fine_line(y, bottom, rule, &mut emit);
            self.advance_fine(y);
            y += F16Dot16::ONE;
        }
        Ok(())
    }

    /// Build the fine edge table and return the polygon's fixed-point y
    /// range, or `None` when there is nothing to scan.
    fn make_fine_edges(
        &mut self,
        polygon: &Polygon,
        bounds: &Rect,
    ) -> Result<Option<(F16Dot16, F16Dot16)>> {
        if !(bounds.w > 0.0 && bounds.h > 0.0) {
            return Ok(None);
        }

        self.active = 0;
        // buckets are addressed by floor(y); one spare bucket past the
        // rounded height catches deferrals from the bottom scan step
        let base = F16Dot16::from_float(bounds.y).to_int();
        let size = F16Dot16::from_float(bounds.h).to_int_round() as usize + 2;
        self.table.reset(base, size)?;
        self.fine_pool.reset()?;

        let mut first = true;
        let (mut top, mut bottom) = (F16Dot16::ZERO, F16Dot16::ZERO);

        for contour in polygon.contours() {
            if contour.len() < 2 {
                continue;
            }
            let mut pb = contour[contour.len() - 1];
            for &pe in contour {
                let yb = F16Dot16::from_float(pb.y);
                let ye = F16Dot16::from_float(pe.y);

                if (ye - yb).abs() <= F16Dot16::NEAR_ZERO {
                    pb = pe;
                    continue;
                }

                let xb = F16Dot16::from_float(pb.x);
                let xe = F16Dot16::from_float(pe.x);

                let (xb, yb, xe, ye, winding) = if yb > ye {
                    (xe, ye, xb, yb, -1i8)
                } else {
                    (xb, yb, xe, ye, 1i8)
                };
                debug_assert!(yb < ye);

                if first {
                    top = yb;
                    bottom = ye;
                    first = false;
                } else {
                    top = top.min(yb);
                    bottom = bottom.max(ye);
                }

                let edge = FineEdge {
                    x: xb,
                    slope: (xe - xb).div(ye - yb),
                    y_top: yb,
                    y_bottom: ye,
                    winding,
                    next: 0,
                };

                let index = self.fine_pool.alloc(edge)?;
                let Some(bucket) = self.table.bucket_of(yb.to_int()) else {
                    return Err(RasterError::InvalidPolygon);
                };
                self.fine_table_insert(bucket, index);

                pb = pe;
            }
        }

        if first {
            return Ok(None);
        }
        log::debug!(
            "fine edge table ready: {} edges, y {}..{}",
            self.fine_pool.count(),
            top.to_float(),
            bottom.to_float()
        );
        Ok(Some((top, bottom)))
    }

    /// Insert an edge into a bucket keeping the bucket sorted by `y_top`
    /// ascending.
    fn fine_table_insert(&mut self, bucket: usize, index: u16) {
        let y_top = self.fine_pool.get(index).y_top;

        let mut prev: u16 = 0;
        let mut cursor = self.table.head(bucket);
        while cursor != 0 {
            debug_assert!(cursor != index);
            if y_top <= self.fine_pool.get(cursor).y_top {
                break;
            }
            prev = cursor;
            cursor = self.fine_pool.get(cursor).next;
        }

        self.fine_pool.get_mut(index).next = cursor;
        if prev == 0 {
            self.table.set_head(bucket, index);
        } else {
            self.fine_pool.get_mut(prev).next = index;
        }
    }

    /// Move the bucket's edges whose top has been reached onto the active
    /// list; edges starting later in the bucket are deferred to the next
    /// bucket so the following step reconsiders them.
    fn activate_fine(&mut self, bucket: usize, y: F16Dot16) {
        let mut index = self.table.head(bucket);
        self.table.set_head(bucket, 0);

        let mut deferred: u16 = 0;
        while index != 0 {
            let next = self.fine_pool.get(index).next;
            let y_top = self.fine_pool.get(index).y_top;
            if y_top <= y {
                let edge = self.fine_pool.get_mut(index);
                // the scan position may sit below the edge's top; bring x
                // up to the current y before the edge joins the walk
                edge.x += (y - y_top).mul(edge.slope);
                edge.next = self.active;
                self.active = index;
            } else {
                self.fine_pool.get_mut(index).next = deferred;
                deferred = index;
            }
            index = next;
        }

        if deferred != 0 && bucket + 1 < self.table.len() {
            let mut last = deferred;
            while self.fine_pool.get(last).next != 0 {
                last = self.fine_pool.get(last).next;
            }
            let old_head = self.table.head(bucket + 1);
            self.fine_pool.get_mut(last).next = old_head;
            self.table.set_head(bucket + 1, deferred);
        }
    }

    /// Pairwise fill walk, identical in shape to the integer path but with
    /// fixed-point span heights.
    fn fine_line<F>(&mut self, y: F16Dot16, bottom: F16Dot16, rule: FillRule, emit: &mut F)
    where
        F: FnMut(F16Dot16, F16Dot16, &FineEdge, &FineEdge),
    {
        let y_end = (y + F16Dot16::ONE).min(bottom);

        let mut winding = 0i32;
        let mut cache_lsh: u16 = 0;
        let mut cache_rsh: u16 = 0;

        let mut index_lsh = self.active;
        while index_lsh != 0 {
            let edge_lsh = self.fine_pool.get(index_lsh);
            winding += i32::from(edge_lsh.winding);

            let index_rsh = edge_lsh.next;
            if index_rsh == 0 {
                break;
            }
            debug_assert!(edge_lsh.x <= self.fine_pool.get(index_rsh).x);

            let inside = match rule {
                FillRule::Odd => winding & 1 != 0,
                FillRule::NonZero => winding != 0,
            };

            if inside {
                if cache_lsh == 0 && cache_rsh == 0 {
                    cache_lsh = index_lsh;
                    cache_rsh = index_rsh;
                } else if self.fine_pool.get(cache_rsh).x.to_int_round()
                    == self.fine_pool.get(index_lsh).x.to_int_round()
                {
                    cache_rsh = index_rsh;
                } else {
                    emit(
                        y,
                        y_end,
                        self.fine_pool.get(cache_lsh),
                        self.fine_pool.get(cache_rsh),
                    );
                    cache_lsh = index_lsh;
                    cache_rsh = index_rsh;
                }
            }

            index_lsh = index_rsh;
        }

        if cache_lsh != 0 && cache_rsh != 0 {
            emit(
                y,
                y_end,
                self.fine_pool.get(cache_lsh),
                self.fine_pool.get(cache_rsh),
            );
        }
    }

    /// Step active fine edges one unit down, dropping the ones the next
    /// step would no longer cross.
    fn advance_fine(&mut self, y: F16Dot16) {
        let mut prev: u16 = 0;
        let mut index = self.active;
        while index != 0 {
            let (y_bottom, next) = {
                let edge = self.fine_pool.get(index);
                (edge.y_bottom, edge.next)
            };

            if y_bottom <= y + F16Dot16::ONE {
                if prev == 0 {
                    self.active = next;
                } else {
                    self.fine_pool.get_mut(prev).next = next;
                }
            } else {
                let edge = self.fine_pool.get_mut(index);
                edge.x += edge.slope;
                prev = index;
            }
            index = next;
        }
    }
}
