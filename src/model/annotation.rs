//! Annotation model: one labelled bounding box plus its polygon rings.

use crate::geometry::{BoundingBox, Polygon};

/// Unique identifier for an annotation within one image.
pub type AnnotationId = u32;

/// Unique identifier for a primitive within one annotation.
pub type PrimitiveId = u32;

/// Stable address of a committed primitive, independent of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveHandle {
    pub annotation: AnnotationId,
    pub primitive: PrimitiveId,
}

/// One annotated object: a label, a colour, at most one bounding box, and
/// any number of closed polygon rings inside it.
///
/// Primitives get small per-annotation ids when they commit. Undo and redo
/// address them through those ids, never through coordinates, so reverting
/// an edit cannot pick up an unrelated primitive that happens to overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub label: String,
    pub colour: String,
    bbox: Option<(PrimitiveId, BoundingBox)>,
    polygons: Vec<(PrimitiveId, Polygon)>,
    next_primitive: PrimitiveId,
}

impl Annotation {
    pub fn new(id: AnnotationId, label: impl Into<String>, colour: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            colour: colour.into(),
            bbox: None,
            polygons: Vec::new(),
            next_primitive: 0,
        }
    }

    fn alloc_primitive(&mut self) -> PrimitiveId {
        let id = self.next_primitive;
        self.next_primitive += 1;
        id
    }

    /// Attach the committed bounding box. An annotation has exactly one.
    pub fn commit_bbox(&mut self, bbox: BoundingBox) -> PrimitiveId {
        let id = self.alloc_primitive();
        if self.bbox.is_some() {
            log::warn!("Annotation {} already had a bounding box, replacing", self.id);
        }
        self.bbox = Some((id, bbox));
        id
    }

    /// Attach a closed polygon ring under a fresh primitive id.
    pub fn commit_polygon(&mut self, polygon: Polygon) -> PrimitiveId {
        let id = self.alloc_primitive();
        self.polygons.push((id, polygon));
        id
    }

    /// Re-attach a ring under the id it had before it was undone.
    pub fn restore_polygon(&mut self, id: PrimitiveId, polygon: Polygon) {
        self.polygons.push((id, polygon));
        self.next_primitive = self.next_primitive.max(id + 1);
    }

    /// Detach a ring by id, returning it if it was present.
    pub fn remove_polygon(&mut self, id: PrimitiveId) -> Option<Polygon> {
        let index = self.polygons.iter().position(|(pid, _)| *pid == id)?;
        Some(self.polygons.remove(index).1)
    }

    pub fn bbox(&self) -> Option<&BoundingBox> {
        self.bbox.as_ref().map(|(_, bbox)| bbox)
    }

    pub fn bbox_handle(&self) -> Option<PrimitiveHandle> {
        self.bbox.as_ref().map(|(id, _)| PrimitiveHandle {
            annotation: self.id,
            primitive: *id,
        })
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        self.polygons.iter().map(|(_, polygon)| polygon)
    }

    /// Rings paired with their stable handles, in commit order.
    pub fn polygon_entries(&self) -> impl Iterator<Item = (PrimitiveHandle, &Polygon)> {
        self.polygons.iter().map(|(id, polygon)| {
            (
                PrimitiveHandle {
                    annotation: self.id,
                    primitive: *id,
                },
                polygon,
            )
        })
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Multi-ring annotations export as crowds.
    pub fn is_crowd(&self) -> bool {
        self.polygons.len() > 1
    }

    /// Rewrite the label if it currently matches `old`. Returns whether
    /// anything changed.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if self.label != old {
            return false;
        }
        self.label = new.to_string();
        if let Some((_, bbox)) = &mut self.bbox {
            bbox.label = new.to_string();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Point;

    use super::*;

    fn boxed_annotation() -> Annotation {
        let mut annotation = Annotation::new(0, "cat", "blue");
        annotation.commit_bbox(BoundingBox::from_rect(0.0, 0.0, 50.0, 50.0, "cat", "blue"));
        annotation
    }

    fn ring(offset: f32) -> Polygon {
        Polygon::from_ring(
            vec![
                Point::new(offset, offset),
                Point::new(offset + 10.0, offset),
                Point::new(offset + 10.0, offset + 10.0),
            ],
            "blue",
        )
    }

    #[test]
    fn test_primitive_ids_are_sequential() {
        let mut annotation = boxed_annotation();
        let first = annotation.commit_polygon(ring(0.0));
        let second = annotation.commit_polygon(ring(20.0));
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(annotation.polygon_count(), 2);
    }

    #[test]
    fn test_remove_and_restore_keep_ids_stable() {
        let mut annotation = boxed_annotation();
        let id = annotation.commit_polygon(ring(0.0));
        let removed = annotation.remove_polygon(id);
        assert!(removed.is_some());
        assert_eq!(annotation.polygon_count(), 0);

        annotation.restore_polygon(id, ring(0.0));
        // The next allocation must not collide with the restored id
        let next = annotation.commit_polygon(ring(20.0));
        assert!(next > id);
    }

    #[test]
    fn test_remove_unknown_polygon_is_none() {
        let mut annotation = boxed_annotation();
        assert!(annotation.remove_polygon(99).is_none());
    }

    #[test]
    fn test_crowd_threshold() {
        let mut annotation = boxed_annotation();
        assert!(!annotation.is_crowd());
        annotation.commit_polygon(ring(0.0));
        assert!(!annotation.is_crowd());
        annotation.commit_polygon(ring(20.0));
        assert!(annotation.is_crowd());
    }

    #[test]
    fn test_rename_matches_exact_label() {
        let mut annotation = boxed_annotation();
        assert!(!annotation.rename("dog", "wolf"));
        assert_eq!(annotation.label, "cat");

        assert!(annotation.rename("cat", "dog"));
        assert_eq!(annotation.label, "dog");
        assert_eq!(annotation.bbox().map(|b| b.label.as_str()), Some("dog"));
    }
}
