//! Tests for dataset assembly, persistence, and the export worker.

mod restore_tests;

use std::path::PathBuf;

use crate::format::ImageSnapshot;
use crate::geometry::{BoundingBox, Point, Polygon};
use crate::model::Annotation;

/// Directory unique to one test, wiped before use.
pub(crate) fn temp_dir(name: &str) -> PathBuf {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = std::env::temp_dir().join(format!(
        "boxer-core-format-{}-{}",
        std::process::id(),
        name
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub(crate) fn annotation(id: u32, label: &str, colour: &str, rect: [f32; 4]) -> Annotation {
    let mut annotation = Annotation::new(id, label, colour);
    annotation.commit_bbox(BoundingBox::from_rect(
        rect[0], rect[1], rect[2], rect[3], label, colour,
    ));
    annotation
}

pub(crate) fn square_ring(x: f32, y: f32, side: f32, colour: &str) -> Polygon {
    Polygon::from_ring(
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ],
        colour,
    )
}

pub(crate) fn snapshot(file_name: &str, annotations: Vec<Annotation>) -> ImageSnapshot {
    ImageSnapshot {
        file_name: file_name.to_string(),
        width: 640,
        height: 480,
        date_captured: "2021-05-03".to_string(),
        annotations,
    }
}
