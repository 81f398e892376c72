//! Dataset record assembly, file writing, and the load path.
//!
//! Assembly is deterministic: image and annotation ids count up from zero
//! in working-set order, and categories get their ids in first-seen order.
//! The record and the colour map land in separate files inside the image
//! directory, each written whole.

use std::collections::HashMap;
use std::path::Path;

use crate::format::error::FormatError;
use crate::format::record::{
    AnnotationRecord, CategoryRecord, DatasetInfo, DatasetRecord, ImageRecord, Segmentation,
};
use crate::geometry::{BoundingBox, Point, Polygon};
use crate::mask::encode_region;
use crate::model::{Annotation, AnnotationId, ColourMap};

/// Dataset file written next to the images.
pub const DATASET_FILE_NAME: &str = "coco.json";

/// Colour-to-label file written next to the dataset.
pub const COLOUR_MAP_FILE_NAME: &str = ".colour_map.json";

/// Everything the exporter needs to describe one image, detached from the
/// live editing state.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSnapshot {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub date_captured: String,
    pub annotations: Vec<Annotation>,
}

/// First-seen category id assignment.
#[derive(Debug, Default)]
struct CategoryTable {
    records: Vec<CategoryRecord>,
    ids: HashMap<String, u32>,
}

impl CategoryTable {
    fn id_for(&mut self, label: &str) -> u32 {
        if let Some(&id) = self.ids.get(label) {
            return id;
        }
        let id = self.records.len() as u32;
        self.records.push(CategoryRecord {
            id,
            name: label.to_string(),
            supercategory: None,
        });
        self.ids.insert(label.to_string(), id);
        id
    }
}

/// Incremental dataset assembly.
///
/// The export worker drives this one annotation at a time so it can check
/// for cancellation between the expensive mask encodes; [`build_record`]
/// wraps the same walk for synchronous callers.
#[derive(Debug)]
pub struct RecordBuilder {
    info: DatasetInfo,
    categories: CategoryTable,
    images: Vec<ImageRecord>,
    annotations: Vec<AnnotationRecord>,
    next_annotation: u64,
}

impl RecordBuilder {
    pub fn new(info: DatasetInfo) -> Self {
        Self {
            info,
            categories: CategoryTable::default(),
            images: Vec::new(),
            annotations: Vec::new(),
            next_annotation: 0,
        }
    }

    /// Register the next image and return its record id.
    pub fn begin_image(&mut self, image: &ImageSnapshot) -> u64 {
        let id = self.images.len() as u64;
        self.images.push(ImageRecord {
            id,
            width: image.width,
            height: image.height,
            file_name: image.file_name.clone(),
            date_captured: image.date_captured.clone(),
        });
        id
    }

    /// Encode one annotation under the given image id.
    pub fn push_annotation(&mut self, image_id: u64, annotation: &Annotation) {
        let Some(bbox) = annotation.bbox() else {
            log::warn!(
                "Annotation {} has no bounding box, skipping export",
                annotation.id
            );
            return;
        };

        let category_id = self.categories.id_for(&annotation.label);
        let rect = bbox.rect();
        let area = rect[2] * rect[3];

        let segmentation = if annotation.is_crowd() {
            let rings: Vec<Polygon> = annotation.polygons().cloned().collect();
            Segmentation::Rle(encode_region(bbox, &rings))
        } else {
            Segmentation::Polygons(annotation.polygons().map(Polygon::flat_vertices).collect())
        };

        let id = self.next_annotation;
        self.next_annotation += 1;
        self.annotations.push(AnnotationRecord {
            id,
            image_id,
            category_id,
            bbox: rect,
            area,
            segmentation,
            iscrowd: u8::from(annotation.is_crowd()),
        });
    }

    pub fn finish(self) -> DatasetRecord {
        DatasetRecord {
            info: self.info,
            licenses: Vec::new(),
            images: self.images,
            annotations: self.annotations,
            categories: self.categories.records,
        }
    }
}

/// Assemble the full dataset record in one pass.
pub fn build_record(images: &[ImageSnapshot], info: &DatasetInfo) -> DatasetRecord {
    let mut builder = RecordBuilder::new(info.clone());
    for image in images {
        let image_id = builder.begin_image(image);
        for annotation in &image.annotations {
            builder.push_annotation(image_id, annotation);
        }
    }
    builder.finish()
}

// ============================================================================
// File I/O
// ============================================================================

/// Serialize the record and overwrite the dataset file.
pub fn write_dataset(record: &DatasetRecord, path: &Path) -> Result<(), FormatError> {
    log::info!(
        "Writing {} annotations across {} images to {:?}",
        record.annotations.len(),
        record.images.len(),
        path
    );
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read and parse a dataset file.
pub fn read_dataset(path: &Path) -> Result<DatasetRecord, FormatError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Serialize the colour map and overwrite its file.
pub fn write_colour_map(map: &ColourMap, path: &Path) -> Result<(), FormatError> {
    let json = serde_json::to_string_pretty(map)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read and parse a colour map file.
pub fn read_colour_map(path: &Path) -> Result<ColourMap, FormatError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

// ============================================================================
// Load Path
// ============================================================================

/// Rebuild per-image committed annotations from a loaded record.
///
/// Labels come from the category table and colours from the inverted
/// colour map; a label with no colour falls back to the first palette
/// colour. Vertex-run segmentations become closed rings again. Run-length
/// masks are not invertible into vertices, so crowd annotations come back
/// as their bounding box with no rings.
pub fn restore_images(
    record: &DatasetRecord,
    colours: &ColourMap,
) -> Result<Vec<ImageSnapshot>, FormatError> {
    let categories: HashMap<u32, &str> = record
        .categories
        .iter()
        .map(|category| (category.id, category.name.as_str()))
        .collect();

    let mut images: Vec<ImageSnapshot> = record
        .images
        .iter()
        .map(|image| ImageSnapshot {
            file_name: image.file_name.clone(),
            width: image.width,
            height: image.height,
            date_captured: image.date_captured.clone(),
            annotations: Vec::new(),
        })
        .collect();
    let index_of: HashMap<u64, usize> = record
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| (image.id, index))
        .collect();

    for entry in &record.annotations {
        let Some(&image_index) = index_of.get(&entry.image_id) else {
            return Err(FormatError::ImageNotFound { id: entry.image_id });
        };
        let Some(&label) = categories.get(&entry.category_id) else {
            return Err(FormatError::CategoryNotFound {
                id: entry.category_id,
            });
        };
        let colour = match colours.colour_for_label(label) {
            Some(colour) => colour,
            None => {
                log::warn!(
                    "Label '{}' has no colour mapping, using '{}'",
                    label,
                    colours.fallback_colour()
                );
                colours.fallback_colour()
            }
        };

        let image = &mut images[image_index];
        let id = image.annotations.len() as AnnotationId;
        let mut annotation = Annotation::new(id, label, colour);
        let [x, y, width, height] = entry.bbox;
        annotation.commit_bbox(BoundingBox::from_rect(x, y, width, height, label, colour));

        match &entry.segmentation {
            Segmentation::Polygons(rings) => {
                for run in rings {
                    if run.len() < 6 || run.len() % 2 != 0 {
                        log::warn!(
                            "Annotation {} has a malformed vertex run of length {}, skipping",
                            entry.id,
                            run.len()
                        );
                        continue;
                    }
                    let points = run
                        .chunks(2)
                        .map(|pair| Point::new(pair[0], pair[1]))
                        .collect();
                    annotation.commit_polygon(Polygon::from_ring(points, colour));
                }
            }
            Segmentation::Rle(_) => {
                log::debug!(
                    "Annotation {} keeps only its box: masks do not restore to rings",
                    entry.id
                );
            }
        }

        image.annotations.push(annotation);
    }

    Ok(images)
}
