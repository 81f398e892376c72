//! Per-image working state: committed annotations plus their edit history.

use std::path::{Path, PathBuf};

use crate::format::{ImageSnapshot, current_date};
use crate::geometry::{BoundingBox, Polygon};
use crate::history::{EditEntry, History, HistoryError};
use crate::model::{Annotation, AnnotationId, PrimitiveHandle};

/// Pixel dimensions and capture date supplied by the image-decoding
/// collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub date_captured: String,
}

impl ImageMeta {
    /// Metadata stamped with today's date.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            date_captured: current_date(),
        }
    }

    pub fn with_date(width: u32, height: u32, date_captured: impl Into<String>) -> Self {
        Self {
            width,
            height,
            date_captured: date_captured.into(),
        }
    }
}

/// One image of the working set with its annotations and its own
/// undo/redo stacks.
///
/// History entries address annotations and rings by id; reverting and
/// re-applying never searches by coordinates. Stacks are strictly per
/// image and never migrate when the active image changes.
#[derive(Debug, Clone)]
pub struct EditableImage {
    path: PathBuf,
    file_name: String,
    meta: ImageMeta,
    annotations: Vec<Annotation>,
    history: History,
    next_annotation: AnnotationId,
}

impl EditableImage {
    /// A fresh image with no annotations.
    pub fn new(path: PathBuf, meta: ImageMeta) -> Self {
        let file_name = file_name_of(&path);
        Self {
            path,
            file_name,
            meta,
            annotations: Vec::new(),
            history: History::new(),
            next_annotation: 0,
        }
    }

    /// An image rebuilt from a loaded dataset: annotations are committed
    /// and the history starts empty.
    pub fn restore(path: PathBuf, meta: ImageMeta, annotations: Vec<Annotation>) -> Self {
        let file_name = file_name_of(&path);
        let next_annotation = annotations.len() as AnnotationId;
        Self {
            path,
            file_name,
            meta,
            annotations,
            history: History::new(),
            next_annotation,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    fn annotation_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id == id)
    }

    /// Commit a dragged-out box as a new annotation.
    pub fn commit_box(&mut self, bbox: BoundingBox) -> PrimitiveHandle {
        let id = self.next_annotation;
        self.next_annotation += 1;

        let mut annotation = Annotation::new(id, bbox.label.clone(), bbox.colour.clone());
        let primitive = annotation.commit_bbox(bbox);
        self.history.commit(EditEntry::BoxCommit {
            annotation: annotation.clone(),
        });
        self.annotations.push(annotation);
        PrimitiveHandle {
            annotation: id,
            primitive,
        }
    }

    /// Commit a closed ring onto an existing annotation.
    pub fn commit_polygon(
        &mut self,
        annotation: AnnotationId,
        polygon: Polygon,
    ) -> Option<PrimitiveHandle> {
        let Some(target) = self.annotation_mut(annotation) else {
            log::warn!(
                "No annotation {} on '{}', dropping polygon",
                annotation,
                self.file_name
            );
            return None;
        };
        let primitive = target.commit_polygon(polygon.clone());
        self.history.commit(EditEntry::PolygonCommit {
            annotation,
            primitive,
            polygon,
        });
        Some(PrimitiveHandle {
            annotation,
            primitive,
        })
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Revert the newest committed edit.
    pub fn undo(&mut self) -> Result<EditEntry, HistoryError> {
        let entry = self.history.pop_undo()?;
        self.revert(&entry);
        Ok(entry)
    }

    /// Re-apply the newest reverted edit.
    pub fn redo(&mut self) -> Result<EditEntry, HistoryError> {
        let entry = self.history.pop_redo()?;
        self.apply(&entry);
        Ok(entry)
    }

    fn revert(&mut self, entry: &EditEntry) {
        match entry {
            EditEntry::BoxCommit { annotation } => {
                // The box commit created the annotation, so reverting it
                // removes the whole annotation
                self.annotations.retain(|a| a.id != annotation.id);
            }
            EditEntry::PolygonCommit {
                annotation,
                primitive,
                ..
            } => {
                let Some(target) = self.annotation_mut(*annotation) else {
                    log::warn!("Undo target annotation {} is missing", annotation);
                    return;
                };
                if target.remove_polygon(*primitive).is_none() {
                    log::warn!(
                        "Undo target ring {} of annotation {} is missing",
                        primitive,
                        annotation
                    );
                }
            }
        }
    }

    fn apply(&mut self, entry: &EditEntry) {
        match entry {
            EditEntry::BoxCommit { annotation } => {
                self.next_annotation = self.next_annotation.max(annotation.id + 1);
                self.annotations.push(annotation.clone());
            }
            EditEntry::PolygonCommit {
                annotation,
                primitive,
                polygon,
            } => {
                let Some(target) = self.annotation_mut(*annotation) else {
                    log::warn!("Redo target annotation {} is missing", annotation);
                    return;
                };
                target.restore_polygon(*primitive, polygon.clone());
            }
        }
    }

    /// Rewrite `old` labels to `new` across committed annotations and
    /// both history stacks. Returns how many records changed.
    pub fn rename_label(&mut self, old: &str, new: &str) -> usize {
        let mut touched = 0;
        for annotation in &mut self.annotations {
            if annotation.rename(old, new) {
                touched += 1;
            }
        }
        for entry in self.history.entries_mut() {
            if entry.rename(old, new) {
                touched += 1;
            }
        }
        touched
    }

    /// Detached copy of this image for the exporter.
    pub fn snapshot(&self) -> ImageSnapshot {
        ImageSnapshot {
            file_name: self.file_name.clone(),
            width: self.meta.width,
            height: self.meta.height,
            date_captured: self.meta.date_captured.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
