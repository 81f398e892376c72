//! Drawing primitives: points, bounding boxes, segments, and polygons.
//!
//! A [`BoundingBox`] keeps its corners normalized while it is dragged, and a
//! [`Polygon`] grows one validated edge at a time until it is closed. Both
//! are plain image-space data with no canvas coupling.

use thiserror::Error;

use super::intersect::{point_in_polygon, segments_intersect};

/// Snap distance in pixels for closing a polygon onto its first vertex.
pub const CLOSE_TOLERANCE: f32 = 8.0;

/// Minimum committed vertices before a polygon may close.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Both coordinates rounded to the nearest whole pixel.
    pub fn rounded(&self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }
}

/// An axis-aligned bounding box under construction or committed.
///
/// The box remembers the anchor corner where the drag began. Every
/// [`adjust`](Self::adjust) renormalizes the corners, so `start` is always
/// the top-left and `end` the bottom-right no matter which direction the
/// pointer moves.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    anchor: Point,
    start: Point,
    end: Point,
    pub label: String,
    pub colour: String,
}

impl BoundingBox {
    /// Start a degenerate box at the press position.
    pub fn new(origin: Point, label: impl Into<String>, colour: impl Into<String>) -> Self {
        Self {
            anchor: origin,
            start: origin,
            end: origin,
            label: label.into(),
            colour: colour.into(),
        }
    }

    /// Rebuild a committed box from a normalized `[x, y, width, height]` rect.
    pub fn from_rect(
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        label: impl Into<String>,
        colour: impl Into<String>,
    ) -> Self {
        let start = Point::new(x, y);
        let end = Point::new(x + width, y + height);
        Self {
            anchor: start,
            start,
            end,
            label: label.into(),
            colour: colour.into(),
        }
    }

    /// Move the free corner to `p`, keeping the corners normalized.
    pub fn adjust(&mut self, p: Point) {
        self.start = Point::new(self.anchor.x.min(p.x), self.anchor.y.min(p.y));
        self.end = Point::new(self.anchor.x.max(p.x), self.anchor.y.max(p.y));
    }

    /// Round all corners to whole pixels. Called once when the box commits.
    pub fn freeze(&mut self) {
        self.anchor = self.anchor.rounded();
        self.start = self.start.rounded();
        self.end = self.end.rounded();
    }

    /// Top-left corner.
    pub fn start(&self) -> Point {
        self.start
    }

    /// Bottom-right corner.
    pub fn end(&self) -> Point {
        self.end
    }

    pub fn x(&self) -> f32 {
        self.start.x
    }

    pub fn y(&self) -> f32 {
        self.start.y
    }

    pub fn width(&self) -> f32 {
        self.end.x - self.start.x
    }

    pub fn height(&self) -> f32 {
        self.end.y - self.start.y
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// The `[x, y, width, height]` rect used by dataset records.
    pub fn rect(&self) -> [f32; 4] {
        [self.x(), self.y(), self.width(), self.height()]
    }

    /// Check if a point lies within the box, borders included.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.start.x
            && point.x <= self.end.x
            && point.y >= self.start.y
            && point.y <= self.end.y
    }

    /// Project a point onto the nearest position inside the box.
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.start.x, self.end.x),
            point.y.clamp(self.start.y, self.end.y),
        )
    }
}

/// A directed line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    /// Start a degenerate segment at the given origin.
    pub fn new(origin: Point) -> Self {
        Self {
            start: origin,
            end: origin,
        }
    }

    /// Move the free endpoint.
    pub fn adjust(&mut self, p: Point) {
        self.end = p;
    }
}

/// Result of committing the candidate vertex of an in-progress polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddVertex {
    /// The vertex was accepted and a new live segment started from it.
    SegmentAdded,
    /// The vertex snapped onto the first vertex and closed the ring.
    Closed,
    /// The new edge would cross a non-adjacent edge and was discarded.
    RejectedSelfIntersecting,
}

/// Ways an explicit polygon close can fail.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PolygonError {
    /// Fewer than the minimum number of vertices are committed.
    #[error("a polygon needs at least {MIN_POLYGON_VERTICES} vertices to close")]
    InvalidClose,
    /// The closing edge would cross one of the existing edges.
    #[error("edge would cross a non-adjacent edge of the same polygon")]
    RejectedEdge,
}

/// A polygon ring built one vertex at a time.
///
/// While open, the polygon carries a live segment from its newest vertex to
/// the pointer. Committing the candidate runs a self-intersection check
/// against all non-adjacent edges; a closed ring stores its first vertex
/// again at the end so consumers can walk consecutive pairs directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point>,
    closed: bool,
    segment: Option<Segment>,
    pub colour: String,
}

impl Polygon {
    /// Start a polygon with its root vertex at `origin`.
    pub fn start(origin: Point, colour: impl Into<String>) -> Self {
        let root = origin.rounded();
        Self {
            vertices: vec![root],
            closed: false,
            segment: Some(Segment::new(root)),
            colour: colour.into(),
        }
    }

    /// Rebuild a closed ring from a loaded vertex run. Appends the closing
    /// duplicate when the run does not already end on its first vertex.
    pub fn from_ring(points: Vec<Point>, colour: impl Into<String>) -> Self {
        let mut vertices = points;
        if let (Some(&first), Some(&last)) = (vertices.first(), vertices.last()) {
            if first != last {
                vertices.push(first);
            }
        }
        Self {
            vertices,
            closed: true,
            segment: None,
            colour: colour.into(),
        }
    }

    /// Move the free end of the live segment to the pointer.
    pub fn adjust(&mut self, p: Point) {
        if let Some(segment) = &mut self.segment {
            segment.adjust(p);
        }
    }

    /// Commit the live segment's endpoint as the next vertex.
    ///
    /// Within [`CLOSE_TOLERANCE`] of the first vertex (and with at least
    /// [`MIN_POLYGON_VERTICES`] committed) the candidate snaps onto the
    /// first vertex and closes the ring instead. A press on the newest
    /// vertex itself leaves the ring unchanged.
    pub fn add_vertex(&mut self) -> AddVertex {
        let Some(live) = self.segment else {
            return AddVertex::Closed;
        };
        let candidate = live.end.rounded();
        let Some(&root) = self.vertices.first() else {
            self.vertices.push(candidate);
            self.segment = Some(Segment::new(candidate));
            return AddVertex::SegmentAdded;
        };

        if self.vertices.len() >= MIN_POLYGON_VERTICES
            && candidate.distance_to(&root) <= CLOSE_TOLERANCE
        {
            return match self.close() {
                Ok(()) => AddVertex::Closed,
                Err(_) => AddVertex::RejectedSelfIntersecting,
            };
        }

        let Some(&last) = self.vertices.last() else {
            return AddVertex::RejectedSelfIntersecting;
        };
        // Pressing the newest vertex again would store a zero-length edge
        if candidate == last {
            self.segment = Some(Segment::new(candidate));
            return AddVertex::SegmentAdded;
        }
        let edge = Segment {
            start: last,
            end: candidate,
        };
        if self.edge_would_cross(&edge, false) {
            return AddVertex::RejectedSelfIntersecting;
        }

        self.vertices.push(candidate);
        self.segment = Some(Segment::new(candidate));
        AddVertex::SegmentAdded
    }

    /// Close the ring onto its first vertex.
    pub fn close(&mut self) -> Result<(), PolygonError> {
        if self.closed {
            return Ok(());
        }
        if self.vertices.len() < MIN_POLYGON_VERTICES {
            return Err(PolygonError::InvalidClose);
        }
        let (Some(&root), Some(&last)) = (self.vertices.first(), self.vertices.last()) else {
            return Err(PolygonError::InvalidClose);
        };
        let closing = Segment {
            start: last,
            end: root,
        };
        if self.edge_would_cross(&closing, true) {
            return Err(PolygonError::RejectedEdge);
        }
        self.vertices.push(root);
        self.closed = true;
        self.segment = None;
        Ok(())
    }

    /// Check a candidate edge against all committed edges it is not
    /// adjacent to. Adjacency is positional: the edge into the newest
    /// vertex always shares that vertex, and a closing edge also shares
    /// the root with the very first edge.
    fn edge_would_cross(&self, candidate: &Segment, closing: bool) -> bool {
        let n = self.vertices.len();
        if n < 2 {
            return false;
        }
        for i in 0..n - 1 {
            if i == n - 2 {
                continue;
            }
            if closing && i == 0 {
                continue;
            }
            let a = self.vertices[i];
            let b = self.vertices[i + 1];
            if segments_intersect(a, b, candidate.start, candidate.end) {
                return true;
            }
        }
        false
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The segment tracking the pointer, if the polygon is still open.
    pub fn live_segment(&self) -> Option<&Segment> {
        self.segment.as_ref()
    }

    /// Committed edges as consecutive vertex pairs.
    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        self.vertices.windows(2).map(|pair| Segment {
            start: pair[0],
            end: pair[1],
        })
    }

    /// Number of distinct vertices, excluding the closing duplicate.
    pub fn vertex_count(&self) -> usize {
        if self.closed && self.vertices.len() >= 2 && self.vertices.first() == self.vertices.last()
        {
            self.vertices.len() - 1
        } else {
            self.vertices.len()
        }
    }

    /// Vertex run without the closing duplicate, flattened to
    /// `[x0, y0, x1, y1, ...]` for dataset records.
    pub fn flat_vertices(&self) -> Vec<f32> {
        let mut run: &[Point] = &self.vertices;
        if self.closed && run.len() >= 2 && run.first() == run.last() {
            run = &run[..run.len() - 1];
        }
        run.iter().flat_map(|p| [p.x, p.y]).collect()
    }

    /// Ray-casting containment test against this ring.
    pub fn contains(&self, point: Point, right_bound: f32) -> bool {
        point_in_polygon(&self.vertices, point, right_bound)
    }
}
