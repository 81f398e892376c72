//! In-progress drawing state for the active image.

use crate::geometry::{BoundingBox, Polygon};
use crate::model::AnnotationId;

/// What the user is currently drawing.
///
/// The flow is one-directional: dragging a box leads to its commit, which
/// opens a polygon phase on the new annotation; each closed ring returns
/// to the waiting phase until the annotation is ended. Only the states
/// that hold uncommitted geometry lose anything when cancelled.
#[derive(Debug, Clone, Default)]
pub enum DraftState {
    /// Not currently drawing anything.
    #[default]
    Idle,
    /// Dragging out a bounding box; the box tracks the pointer.
    DrawingBox { bbox: BoundingBox },
    /// Box committed; the next press inside it roots a polygon.
    AwaitingPolygon { annotation: AnnotationId },
    /// Building a polygon ring vertex by vertex.
    DrawingPolygon {
        annotation: AnnotationId,
        polygon: Polygon,
    },
}

impl DraftState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DraftState::Idle)
    }

    /// Check if the draft holds geometry that a cancel would discard.
    pub fn has_pending_geometry(&self) -> bool {
        matches!(
            self,
            DraftState::DrawingBox { .. } | DraftState::DrawingPolygon { .. }
        )
    }

    /// The annotation the polygon phase is attached to, if any.
    pub fn annotation(&self) -> Option<AnnotationId> {
        match self {
            DraftState::AwaitingPolygon { annotation }
            | DraftState::DrawingPolygon { annotation, .. } => Some(*annotation),
            _ => None,
        }
    }
}
