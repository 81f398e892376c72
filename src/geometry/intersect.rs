//! Intersection and containment tests for annotation geometry.
//!
//! These are the numeric workhorses behind polygon validation and mask
//! rasterization: an orientation test, a segment-intersection test with
//! collinear handling, and a ray-casting point-in-polygon test.

use super::primitives::Point;

/// Turn direction of the path `p1 -> p2 -> p3` in image coordinates
/// (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Positive cross product: the path bends clockwise on screen.
    Clockwise,
    /// Negative cross product: the path bends counter-clockwise.
    CounterClockwise,
    /// Zero cross product: the three points are collinear.
    Collinear,
}

/// Sign of the cross product `(p2 - p1) x (p3 - p2)`.
pub fn orientation(p1: Point, p2: Point, p3: Point) -> Orientation {
    let value = (p2.y - p1.y) * (p3.x - p2.x) - (p2.x - p1.x) * (p3.y - p2.y);
    if value > 0.0 {
        Orientation::Clockwise
    } else if value < 0.0 {
        Orientation::CounterClockwise
    } else {
        Orientation::Collinear
    }
}

/// Check whether `q` lies within the bounding rectangle of segment `[a, b]`.
///
/// Only meaningful when `q` is already known to be collinear with the
/// segment; combined with [`orientation`] it classifies touching and
/// overlapping collinear segments.
pub fn on_segment(a: Point, b: Point, q: Point) -> bool {
    let x_range = a.x.min(b.x) <= q.x && q.x <= a.x.max(b.x);
    let y_range = a.y.min(b.y) <= q.y && q.y <= a.y.max(b.y);
    x_range && y_range
}

/// Check whether segments `[p1, p2]` and `[p3, p4]` intersect.
///
/// The general case holds when the endpoints of each segment straddle the
/// other segment's line. Collinear configurations fall through to
/// [`on_segment`] checks so that touching endpoints and overlapping
/// collinear runs are reported as intersections.
pub fn segments_intersect(p1: Point, p2: Point, p3: Point, p4: Point) -> bool {
    let o1 = orientation(p1, p2, p3);
    let o2 = orientation(p1, p2, p4);
    let o3 = orientation(p3, p4, p1);
    let o4 = orientation(p3, p4, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(p1, p2, p3))
        || (o2 == Orientation::Collinear && on_segment(p1, p2, p4))
        || (o3 == Orientation::Collinear && on_segment(p3, p4, p1))
        || (o4 == Orientation::Collinear && on_segment(p3, p4, p2))
}

/// Ray-casting point-in-polygon test.
///
/// Casts a horizontal ray from `point` to `(right_bound, point.y)` and
/// toggles inside/outside on every edge whose half-open y-span straddles
/// the ray row, so a vertex sitting exactly on the ray counts once rather
/// than once per incident edge. A point exactly on an edge reports the
/// on-segment result outright. A closed ring may repeat its first vertex
/// at the end; the zero-length wrap edge is skipped. `right_bound` must
/// lie to the right of every vertex.
pub fn point_in_polygon(vertices: &[Point], point: Point, right_bound: f32) -> bool {
    let mut len = vertices.len();
    if len > 1 && vertices.first() == vertices.last() {
        len -= 1;
    }
    if len < 3 {
        return false;
    }

    let mut inside = false;

    for i in 0..len {
        let a = vertices[i];
        let b = vertices[(i + 1) % len];

        if orientation(a, point, b) == Orientation::Collinear && on_segment(a, b, point) {
            return true;
        }

        // Half-open y-span: a vertex on the ray row belongs to only one
        // of its two edges
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x && x <= right_bound {
                inside = !inside;
            }
        }
    }

    inside
}
