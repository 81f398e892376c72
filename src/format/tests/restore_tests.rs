//! Rebuilding committed annotations from loaded records.

use crate::format::{
    DATASET_FILE_NAME, DatasetInfo, FormatError, Segmentation, build_record, read_dataset,
    restore_images,
};
use crate::model::ColourMap;

use super::{annotation, snapshot, square_ring, temp_dir};

fn colour_map() -> ColourMap {
    let mut map = ColourMap::default();
    map.set_label("blue", "dog");
    map.set_label("red", "cat");
    map
}

#[test]
fn test_restore_rebuilds_rings_and_colours() {
    let mut subject = annotation(0, "dog", "blue", [0.0, 0.0, 20.0, 20.0]);
    subject.commit_polygon(square_ring(2.0, 2.0, 5.0, "blue"));
    let images = vec![
        snapshot("a.jpg", vec![subject]),
        snapshot("b.jpg", vec![annotation(0, "cat", "red", [5.0, 5.0, 4.0, 4.0])]),
    ];
    let record = build_record(&images, &DatasetInfo::new());

    let restored = restore_images(&record, &colour_map()).unwrap();
    assert_eq!(restored.len(), 2);
    assert_eq!(restored[0].file_name, "a.jpg");
    assert_eq!(restored[0].width, 640);

    let back = &restored[0].annotations[0];
    assert_eq!(back.id, 0);
    assert_eq!(back.label, "dog");
    assert_eq!(back.colour, "blue");
    assert_eq!(back.bbox().map(|bbox| bbox.rect()), Some([0.0, 0.0, 20.0, 20.0]));
    assert_eq!(back.polygon_count(), 1);
    let rings: Vec<_> = back.polygons().collect();
    assert!(rings[0].is_closed());
    assert_eq!(rings[0].vertex_count(), 4);

    let other = &restored[1].annotations[0];
    assert_eq!(other.label, "cat");
    assert_eq!(other.colour, "red");
}

#[test]
fn test_restore_unmapped_label_falls_back() {
    let images = vec![snapshot(
        "a.jpg",
        vec![annotation(0, "dog", "yellow", [0.0, 0.0, 4.0, 4.0])],
    )];
    let record = build_record(&images, &DatasetInfo::new());

    // The default map has no "dog" label, so the first palette colour wins.
    let restored = restore_images(&record, &ColourMap::default()).unwrap();
    assert_eq!(restored[0].annotations[0].colour, "blue");
}

#[test]
fn test_restore_crowd_keeps_box_only() {
    let mut subject = annotation(0, "dog", "blue", [0.0, 0.0, 6.0, 6.0]);
    subject.commit_polygon(square_ring(0.0, 0.0, 2.0, "blue"));
    subject.commit_polygon(square_ring(3.0, 3.0, 2.0, "blue"));
    let record = build_record(&[snapshot("a.jpg", vec![subject])], &DatasetInfo::new());

    let restored = restore_images(&record, &colour_map()).unwrap();
    let back = &restored[0].annotations[0];
    assert_eq!(back.polygon_count(), 0);
    assert_eq!(back.bbox().map(|bbox| bbox.rect()), Some([0.0, 0.0, 6.0, 6.0]));
}

#[test]
fn test_restore_rejects_unknown_category() {
    let images = vec![snapshot(
        "a.jpg",
        vec![annotation(0, "dog", "blue", [0.0, 0.0, 4.0, 4.0])],
    )];
    let mut record = build_record(&images, &DatasetInfo::new());
    record.annotations[0].category_id = 9;

    match restore_images(&record, &colour_map()) {
        Err(FormatError::CategoryNotFound { id }) => assert_eq!(id, 9),
        other => panic!("expected a missing category, got {:?}", other),
    }
}

#[test]
fn test_restore_rejects_unknown_image() {
    let images = vec![snapshot(
        "a.jpg",
        vec![annotation(0, "dog", "blue", [0.0, 0.0, 4.0, 4.0])],
    )];
    let mut record = build_record(&images, &DatasetInfo::new());
    record.annotations[0].image_id = 7;

    match restore_images(&record, &colour_map()) {
        Err(FormatError::ImageNotFound { id }) => assert_eq!(id, 7),
        other => panic!("expected a missing image, got {:?}", other),
    }
}

#[test]
fn test_restore_skips_malformed_vertex_runs() {
    let mut subject = annotation(0, "dog", "blue", [0.0, 0.0, 10.0, 10.0]);
    subject.commit_polygon(square_ring(1.0, 1.0, 3.0, "blue"));
    let images = vec![snapshot("a.jpg", vec![subject])];
    let mut record = build_record(&images, &DatasetInfo::new());

    // Two coordinate pairs cannot form a ring; an odd run is torn.
    record.annotations[0].segmentation =
        Segmentation::Polygons(vec![vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 2.0, 3.0]]);

    let restored = restore_images(&record, &colour_map()).unwrap();
    let back = &restored[0].annotations[0];
    assert_eq!(back.polygon_count(), 0);
    assert!(back.bbox().is_some());
}

#[test]
fn test_torn_dataset_file_is_fatal() {
    let dir = temp_dir("torn-dataset");
    let path = dir.join(DATASET_FILE_NAME);
    std::fs::write(&path, b"{\"images\": [").unwrap();

    match read_dataset(&path) {
        Err(FormatError::Json(_)) => {}
        other => panic!("expected a parse failure, got {:?}", other),
    }
}
