//! Vector path clipping.
//!
//! Paths that intersect a redaction rectangle are rebuilt as the polygon
//! difference `subject - rectangle`. The difference is computed at x1000
//! fixed-point precision by decomposing the rectangle's complement into
//! four axis-aligned slabs (left, right, middle-bottom, middle-top) and
//! intersecting the subject with each slab; the slabs tile the complement
//! disjointly, so the union of the pieces is exactly the part of the
//! subject outside the rectangle.
//!
//! Curves are flattened before clipping by recursive de Casteljau
//! subdivision (flatness tolerance 1.0 pt, depth capped at 4), so the
//! clipper only ever sees polylines.

use super::error::{RedactError, RedactResult};
use super::geometry::Rect;
use super::ops::CollectedPath;
use super::parser::Operand;
use super::serializer::EmitOp;

/// Fixed-point scale: 1/1000 pt resolution.
const FIXED_SCALE: f64 = 1000.0;

/// Flatness tolerance for curve subdivision, in points.
const FLATNESS: f64 = 1.0;

/// Hard recursion cap for curve subdivision.
const MAX_DEPTH: u32 = 4;

/// Minimum surviving polygon area: 0.1 pt^2 in fixed units
/// (doubled, since the shoelace sum is twice the area).
const MIN_DOUBLE_AREA: i128 = 200_000;

type FPoint = (i64, i64);

/// Flattens a cubic Bezier into line segments appended to `out`.
///
/// `out` must already contain the start point; the end point is always
/// appended.
pub(crate) fn flatten_cubic(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    out: &mut Vec<(f64, f64)>,
) {
    flatten_rec(p0, p1, p2, p3, 0, out);
}

fn flatten_rec(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    depth: u32,
    out: &mut Vec<(f64, f64)>,
) {
    if depth >= MAX_DEPTH || is_flat(p0, p1, p2, p3) {
        out.push(p3);
        return;
    }

    // de Casteljau split at t = 0.5
    let ab = midpoint(p0, p1);
    let bc = midpoint(p1, p2);
    let cd = midpoint(p2, p3);
    let abc = midpoint(ab, bc);
    let bcd = midpoint(bc, cd);
    let mid = midpoint(abc, bcd);

    flatten_rec(p0, ab, abc, mid, depth + 1, out);
    flatten_rec(mid, bcd, cd, p3, depth + 1, out);
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

/// Control-point distance from the chord, compared against the flatness
/// tolerance.
fn is_flat(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) -> bool {
    let dx = p3.0 - p0.0;
    let dy = p3.1 - p0.1;
    let d1 = ((p1.0 - p0.0) * dy - (p1.1 - p0.1) * dx).abs();
    let d2 = ((p2.0 - p0.0) * dy - (p2.1 - p0.1) * dx).abs();
    let chord_sq = dx * dx + dy * dy;
    if chord_sq < 1e-12 {
        // Degenerate chord: measure raw control point offsets
        return (p1.0 - p0.0).abs() + (p1.1 - p0.1).abs() < FLATNESS
            && (p2.0 - p0.0).abs() + (p2.1 - p0.1).abs() < FLATNESS;
    }
    let limit = FLATNESS * chord_sq.sqrt();
    d1 <= limit && d2 <= limit
}

fn to_fixed(p: (f64, f64)) -> FPoint {
    (
        (p.0 * FIXED_SCALE).round() as i64,
        (p.1 * FIXED_SCALE).round() as i64,
    )
}

fn from_fixed(p: FPoint) -> (f64, f64) {
    (p.0 as f64 / FIXED_SCALE, p.1 as f64 / FIXED_SCALE)
}

#[derive(Debug, Clone, Copy)]
struct FBox {
    xmin: i64,
    ymin: i64,
    xmax: i64,
    ymax: i64,
}

impl FBox {
    fn from_rect(rect: &Rect) -> FBox {
        let (xmin, ymin) = to_fixed((rect.left, rect.bottom));
        let (xmax, ymax) = to_fixed((rect.right, rect.top));
        FBox {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    fn of_polygon(poly: &[FPoint]) -> Option<FBox> {
        let first = poly.first()?;
        let mut b = FBox {
            xmin: first.0,
            ymin: first.1,
            xmax: first.0,
            ymax: first.1,
        };
        for &(x, y) in poly {
            b.xmin = b.xmin.min(x);
            b.ymin = b.ymin.min(y);
            b.xmax = b.xmax.max(x);
            b.ymax = b.ymax.max(y);
        }
        Some(b)
    }

    fn is_degenerate(&self) -> bool {
        self.xmin >= self.xmax || self.ymin >= self.ymax
    }

    /// Closed-interval overlap: a zero-width box (a hairline) touching the
    /// rectangle still counts, so hairlines crossing the redaction area are
    /// not silently kept.
    fn overlaps(&self, other: &FBox) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    fn contains(&self, other: &FBox) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }
}

/// One axis-aligned clipping boundary.
#[derive(Debug, Clone, Copy)]
enum Edge {
    MinX(i64),
    MaxX(i64),
    MinY(i64),
    MaxY(i64),
}

impl Edge {
    fn inside(&self, p: FPoint) -> bool {
        match *self {
            Edge::MinX(v) => p.0 >= v,
            Edge::MaxX(v) => p.0 <= v,
            Edge::MinY(v) => p.1 >= v,
            Edge::MaxY(v) => p.1 <= v,
        }
    }

    fn intersect(&self, a: FPoint, b: FPoint) -> FPoint {
        match *self {
            Edge::MinX(v) | Edge::MaxX(v) => {
                let dx = (b.0 - a.0) as i128;
                if dx == 0 {
                    return (v, a.1);
                }
                let dy = (b.1 - a.1) as i128;
                let t_num = (v - a.0) as i128;
                let y = a.1 as i128 + div_round(dy * t_num, dx);
                (v, y as i64)
            }
            Edge::MinY(v) | Edge::MaxY(v) => {
                let dy = (b.1 - a.1) as i128;
                if dy == 0 {
                    return (a.0, v);
                }
                let dx = (b.0 - a.0) as i128;
                let t_num = (v - a.1) as i128;
                let x = a.0 as i128 + div_round(dx * t_num, dy);
                (x as i64, v)
            }
        }
    }
}

/// Rounded integer division (round half away from zero).
fn div_round(num: i128, den: i128) -> i128 {
    let q = num / den;
    let r = num % den;
    if 2 * r.abs() >= den.abs() {
        if (num < 0) != (den < 0) { q - 1 } else { q + 1 }
    } else {
        q
    }
}

/// Sutherland-Hodgman clip of a (treated-as-closed) polygon against one
/// boundary.
fn clip_edge(poly: &[FPoint], edge: Edge) -> Vec<FPoint> {
    let mut out = Vec::with_capacity(poly.len() + 4);
    if poly.is_empty() {
        return out;
    }
    let mut prev = poly[poly.len() - 1];
    let mut prev_inside = edge.inside(prev);
    for &cur in poly {
        let cur_inside = edge.inside(cur);
        if cur_inside {
            if !prev_inside {
                out.push(edge.intersect(prev, cur));
            }
            out.push(cur);
        } else if prev_inside {
            out.push(edge.intersect(prev, cur));
        }
        prev = cur;
        prev_inside = cur_inside;
    }
    out
}

/// Intersects a polygon with an axis-aligned box.
fn clip_to_box(poly: &[FPoint], b: &FBox) -> Vec<FPoint> {
    let mut clipped = clip_edge(poly, Edge::MinX(b.xmin));
    clipped = clip_edge(&clipped, Edge::MaxX(b.xmax));
    clipped = clip_edge(&clipped, Edge::MinY(b.ymin));
    clipped = clip_edge(&clipped, Edge::MaxY(b.ymax));
    clipped
}

/// Twice the signed shoelace area.
fn double_area(poly: &[FPoint]) -> i128 {
    let mut sum: i128 = 0;
    for i in 0..poly.len() {
        let (x1, y1) = poly[i];
        let (x2, y2) = poly[(i + 1) % poly.len()];
        sum += x1 as i128 * y2 as i128 - x2 as i128 * y1 as i128;
    }
    sum
}

/// Drops consecutive duplicates and a duplicated closing point.
fn dedup_polygon(mut poly: Vec<FPoint>) -> Vec<FPoint> {
    poly.dedup();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    poly
}

/// True when a polygon is worth keeping: at least three distinct points and
/// a non-trivial area.
fn is_valid(poly: &[FPoint]) -> bool {
    poly.len() >= 3 && double_area(poly).abs() >= MIN_DOUBLE_AREA
}

/// Computes `poly - rect` as the union of up to four slab intersections.
fn subtract_rect(poly: &[FPoint], rect: &FBox, poly_box: &FBox) -> Vec<Vec<FPoint>> {
    let mut out = Vec::new();
    let slabs = [
        // Left of the rectangle
        FBox {
            xmin: poly_box.xmin,
            ymin: poly_box.ymin,
            xmax: rect.xmin,
            ymax: poly_box.ymax,
        },
        // Right of the rectangle
        FBox {
            xmin: rect.xmax,
            ymin: poly_box.ymin,
            xmax: poly_box.xmax,
            ymax: poly_box.ymax,
        },
        // Below, between the rectangle's verticals
        FBox {
            xmin: rect.xmin.max(poly_box.xmin),
            ymin: poly_box.ymin,
            xmax: rect.xmax.min(poly_box.xmax),
            ymax: rect.ymin,
        },
        // Above, between the rectangle's verticals
        FBox {
            xmin: rect.xmin.max(poly_box.xmin),
            ymin: rect.ymax,
            xmax: rect.xmax.min(poly_box.xmax),
            ymax: poly_box.ymax,
        },
    ];

    for slab in slabs {
        if slab.is_degenerate() {
            continue;
        }
        let piece = dedup_polygon(clip_to_box(poly, &slab));
        if is_valid(&piece) {
            out.push(piece);
        }
    }
    out
}

/// Clips a collected path against the redaction rectangles.
///
/// Returns the surviving polygons in user space, ready to re-emit as
/// `m`/`l`/`h` sequences under the CTM that was in force. An empty result
/// means the whole path is covered and should be dropped. Fails with
/// `PathClip` when the CTM cannot be inverted.
pub fn clip_path(path: &CollectedPath, rects: &[Rect]) -> RedactResult<Vec<Vec<(f64, f64)>>> {
    let inverse = path.ctm.invert().ok_or(RedactError::PathClip)?;

    let mut polygons: Vec<Vec<FPoint>> = path
        .subpaths
        .iter()
        .map(|sp| dedup_polygon(sp.points.iter().map(|&p| to_fixed(p)).collect()))
        .filter(|poly| !poly.is_empty())
        .collect();

    for rect in rects {
        let clip_box = FBox::from_rect(rect);
        if clip_box.is_degenerate() {
            continue;
        }
        let mut next = Vec::with_capacity(polygons.len());
        for poly in polygons {
            let poly_box = match FBox::of_polygon(&poly) {
                Some(b) => b,
                None => continue,
            };
            if !poly_box.overlaps(&clip_box) {
                // Untouched by this rectangle; kept even when too thin to
                // clip (stroked hairlines)
                next.push(poly);
            } else if clip_box.contains(&poly_box) {
                // Fully covered: dropped
            } else if is_valid(&poly) {
                next.extend(subtract_rect(&poly, &clip_box, &poly_box));
            }
            // Degenerate subpaths that touch a rectangle are dropped
            // rather than risked
        }
        polygons = next;
    }

    Ok(polygons
        .into_iter()
        .map(|poly| {
            poly.into_iter()
                .map(|p| {
                    let (x, y) = from_fixed(p);
                    inverse.transform_point(x, y)
                })
                .collect()
        })
        .collect())
}

/// Close-and-paint operators imply `h`; the rebuilt path closes its
/// polygons explicitly, so they map to their plain counterparts.
pub fn normalize_paint_operator(op: &str) -> &'static str {
    match op {
        "s" => "S",
        "b" => "B",
        "b*" => "B*",
        "F" => "f",
        "S" => "S",
        "f" => "f",
        "f*" => "f*",
        "B" => "B",
        "B*" => "B*",
        _ => "n",
    }
}

/// Rebuilds the operator sequence for the surviving polygons: `m`, `l`
/// per vertex, `h`, then the painting operator once at the end. Every
/// emitted operator carries the same stream position so the serializer
/// keeps the group adjacent.
pub fn rebuild_path_ops(
    polygons: &[Vec<(f64, f64)>],
    paint_operator: &str,
    pos: u32,
) -> Vec<EmitOp> {
    let mut out = Vec::new();
    for poly in polygons {
        let mut points = poly.iter();
        let first = match points.next() {
            Some(p) => p,
            None => continue,
        };
        out.push(EmitOp::op(
            pos,
            "m",
            vec![Operand::Number(first.0), Operand::Number(first.1)],
        ));
        for p in points {
            out.push(EmitOp::op(
                pos,
                "l",
                vec![Operand::Number(p.0), Operand::Number(p.1)],
            ));
        }
        out.push(EmitOp::op(pos, "h", vec![]));
    }
    out.push(EmitOp::op(
        pos,
        normalize_paint_operator(paint_operator),
        vec![],
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Matrix;
    use crate::core::ops::Subpath;

    fn rect_path(left: f64, bottom: f64, right: f64, top: f64) -> CollectedPath {
        CollectedPath {
            subpaths: vec![Subpath {
                points: vec![(left, bottom), (right, bottom), (right, top), (left, top)],
                closed: true,
            }],
            ctm: Matrix::identity(),
        }
    }

    fn polygon_bounds(poly: &[(f64, f64)]) -> Rect {
        Rect::bounding(poly).unwrap()
    }

    #[test]
    fn test_no_overlap_keeps_path() {
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let out = clip_path(&path, &[Rect::new(50.0, 50.0, 60.0, 60.0)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(polygon_bounds(&out[0]), Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_full_containment_drops_path() {
        let path = rect_path(10.0, 10.0, 20.0, 20.0);
        let out = clip_path(&path, &[Rect::new(0.0, 0.0, 100.0, 100.0)]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_right_half_clip() {
        // The filled rectangle of scenario S4: right half redacted,
        // left half (100,200)-(125,230) survives.
        let path = rect_path(100.0, 200.0, 150.0, 230.0);
        let out = clip_path(&path, &[Rect::new(125.0, 200.0, 150.0, 230.0)]).unwrap();
        assert_eq!(out.len(), 1);
        let bounds = polygon_bounds(&out[0]);
        assert!((bounds.left - 100.0).abs() < 0.01);
        assert!((bounds.bottom - 200.0).abs() < 0.01);
        assert!((bounds.right - 125.0).abs() < 0.01);
        assert!((bounds.top - 230.0).abs() < 0.01);
    }

    #[test]
    fn test_center_hole_produces_ring_pieces() {
        // A hole strictly inside the subject yields all four slab pieces
        let path = rect_path(0.0, 0.0, 100.0, 100.0);
        let out = clip_path(&path, &[Rect::new(40.0, 40.0, 60.0, 60.0)]).unwrap();
        assert_eq!(out.len(), 4);

        // No surviving piece pokes into the hole interior
        for poly in &out {
            let bounds = polygon_bounds(poly);
            let hole = Rect::new(40.01, 40.01, 59.99, 59.99);
            assert!(!bounds.intersects(&hole) || {
                // middle slabs share x-range with the hole but sit outside in y
                bounds.top <= 40.01 || bounds.bottom >= 59.99
            });
        }
    }

    #[test]
    fn test_two_subpaths_one_dropped_one_clipped() {
        let path = CollectedPath {
            subpaths: vec![
                Subpath {
                    points: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
                    closed: true,
                },
                Subpath {
                    points: vec![(20.0, 0.0), (40.0, 0.0), (40.0, 10.0), (20.0, 10.0)],
                    closed: true,
                },
            ],
            ctm: Matrix::identity(),
        };
        // Covers the first subpath fully, the second only to x=30
        let out = clip_path(&path, &[Rect::new(-5.0, -5.0, 30.0, 15.0)]).unwrap();
        assert_eq!(out.len(), 1);
        let bounds = polygon_bounds(&out[0]);
        assert!((bounds.left - 30.0).abs() < 0.01);
        assert!((bounds.right - 40.0).abs() < 0.01);
    }

    #[test]
    fn test_degenerate_sliver_is_dropped() {
        // Clip leaves a sliver narrower than the area threshold
        let path = rect_path(0.0, 0.0, 10.0, 10.0);
        let out = clip_path(&path, &[Rect::new(0.005, 0.0, 10.0, 10.0)]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_ctm_round_trip() {
        // Path collected under a 2x CTM: output must be in user space
        let path = CollectedPath {
            subpaths: vec![Subpath {
                points: vec![(100.0, 100.0), (150.0, 100.0), (150.0, 150.0), (100.0, 150.0)],
                closed: true,
            }],
            ctm: Matrix::from_values(2.0, 0.0, 0.0, 2.0, 0.0, 0.0),
        };
        let out = clip_path(&path, &[Rect::new(125.0, 100.0, 150.0, 150.0)]).unwrap();
        assert_eq!(out.len(), 1);
        let bounds = polygon_bounds(&out[0]);
        // Page-space left half (100..125, 100..150) maps to user (50..62.5, 50..75)
        assert!((bounds.left - 50.0).abs() < 0.01);
        assert!((bounds.right - 62.5).abs() < 0.01);
        assert!((bounds.bottom - 50.0).abs() < 0.01);
        assert!((bounds.top - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_singular_ctm_is_path_clip_error() {
        let path = CollectedPath {
            subpaths: vec![Subpath {
                points: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
                closed: true,
            }],
            ctm: Matrix::from_values(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
        };
        assert_eq!(
            clip_path(&path, &[Rect::new(0.0, 0.0, 5.0, 5.0)]),
            Err(RedactError::PathClip)
        );
    }

    #[test]
    fn test_multiple_rects_apply_iteratively() {
        let path = rect_path(0.0, 0.0, 30.0, 10.0);
        let out = clip_path(
            &path,
            &[
                Rect::new(0.0, -1.0, 10.0, 11.0),
                Rect::new(20.0, -1.0, 30.0, 11.0),
            ],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        let bounds = polygon_bounds(&out[0]);
        assert!((bounds.left - 10.0).abs() < 0.01);
        assert!((bounds.right - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_flatten_cubic_endpoints() {
        let mut points = vec![(0.0, 0.0)];
        flatten_cubic((0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), &mut points);
        assert!(points.len() > 2);
        assert_eq!(*points.last().unwrap(), (10.0, 0.0));
    }

    #[test]
    fn test_flatten_straight_line_stays_short() {
        let mut points = vec![(0.0, 0.0)];
        // Control points on the chord: already flat
        flatten_cubic((0.0, 0.0), (3.0, 3.0), (6.0, 6.0), (9.0, 9.0), &mut points);
        assert_eq!(points, vec![(0.0, 0.0), (9.0, 9.0)]);
    }

    #[test]
    fn test_flatten_depth_is_bounded() {
        let mut points = vec![(0.0, 0.0)];
        flatten_cubic(
            (0.0, 0.0),
            (0.0, 1000.0),
            (1000.0, 1000.0),
            (1000.0, 0.0),
            &mut points,
        );
        // Depth 4 yields at most 2^4 segments
        assert!(points.len() <= 17);
    }

    #[test]
    fn test_normalize_paint_operator() {
        assert_eq!(normalize_paint_operator("s"), "S");
        assert_eq!(normalize_paint_operator("b"), "B");
        assert_eq!(normalize_paint_operator("b*"), "B*");
        assert_eq!(normalize_paint_operator("F"), "f");
        assert_eq!(normalize_paint_operator("f*"), "f*");
        assert_eq!(normalize_paint_operator("n"), "n");
    }

    #[test]
    fn test_rebuild_path_ops_shape() {
        let polys = vec![vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]];
        let ops = rebuild_path_ops(&polys, "s", 7);
        let names: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(names, vec!["m", "l", "l", "h", "S"]);
        assert!(ops.iter().all(|op| op.pos == 7));
    }
}
