//! Dataset export and load.
//!
//! The exporter writes two files into the image directory: a COCO-style
//! `coco.json` with images, annotations, and categories, and a hidden
//! `.colour_map.json` holding the colour-to-label mapping. Loading reads
//! both back and rebuilds committed annotations with fresh history.

mod error;
mod export;
mod record;
mod worker;

#[cfg(test)]
mod tests;

pub use error::FormatError;
pub use export::{
    COLOUR_MAP_FILE_NAME, DATASET_FILE_NAME, ImageSnapshot, RecordBuilder, build_record,
    read_colour_map, read_dataset, restore_images, write_colour_map, write_dataset,
};
pub use record::{
    AnnotationRecord, CategoryRecord, DatasetInfo, DatasetRecord, ImageRecord, LicenseRecord,
    Segmentation,
};
pub use worker::{ExportJob, ExportOutcome, ExportSummary, ExportWorker, run_job};

pub(crate) use record::current_date;
