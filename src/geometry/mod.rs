//! Canvas-independent annotation geometry.

mod intersect;
mod primitives;

pub use intersect::{Orientation, on_segment, orientation, point_in_polygon, segments_intersect};
pub use primitives::{
    AddVertex, BoundingBox, CLOSE_TOLERANCE, MIN_POLYGON_VERTICES, Point, Polygon, PolygonError,
    Segment,
};
