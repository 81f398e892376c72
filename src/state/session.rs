//! Annotation session over one image directory.
//!
//! The [`Session`] owns the working set and is the only mutator of it:
//! pointer events route through the draft state machine, committed edits
//! land in per-image history, and interface collaborators observe the
//! results through events and read-only accessors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::format::{
    COLOUR_MAP_FILE_NAME, DATASET_FILE_NAME, DatasetInfo, ExportJob, ExportOutcome, ExportSummary,
    ExportWorker, FormatError, ImageSnapshot, read_colour_map, read_dataset, restore_images,
    run_job,
};
use crate::geometry::{AddVertex, BoundingBox, Point, Polygon, Segment};
use crate::history::HistoryError;
use crate::model::{AnnotationId, ColourMap, PrimitiveHandle};
use crate::state::draft::DraftState;
use crate::state::event::{EventBus, SessionEvent};
use crate::state::image::{EditableImage, ImageMeta};

/// File extensions accepted when scanning a directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "bmp"];

/// Check if a filename has a supported image extension.
pub fn is_image_filename(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Errors opening a working directory.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The directory could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The directory exists but holds nothing annotatable
    #[error("no supported image files in {path:?}")]
    NoValidImages { path: PathBuf },

    /// A dataset file was present but could not be loaded
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// One element of the redraw list, in draw order.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    /// A committed bounding box
    Box {
        handle: PrimitiveHandle,
        bbox: BoundingBox,
    },
    /// A committed closed ring
    Ring {
        handle: PrimitiveHandle,
        polygon: Polygon,
    },
    /// The box currently being dragged
    DraftBox { bbox: BoundingBox },
    /// A committed edge of the ring under construction
    DraftEdge { segment: Segment, colour: String },
    /// The candidate edge following the pointer
    LiveEdge { segment: Segment, colour: String },
}

/// The annotation session: working set, draft, history, and export.
pub struct Session {
    folder: PathBuf,
    images: Vec<EditableImage>,
    current_index: usize,
    colour_map: ColourMap,
    info: DatasetInfo,
    active_colour: String,
    draft: DraftState,
    status: String,
    events: EventBus,
    worker: Option<ExportWorker>,
    last_export_job: Option<u64>,
}

impl Session {
    /// Open a directory of images as the working set.
    ///
    /// `probe` supplies pixel dimensions and capture dates for images not
    /// covered by a saved dataset; this crate never decodes pixels itself.
    /// When the directory already holds a dataset file, its annotations
    /// are reloaded as committed state with empty history.
    pub fn open(
        folder: impl Into<PathBuf>,
        probe: impl Fn(&Path) -> ImageMeta,
    ) -> Result<Self, OpenError> {
        let folder = folder.into();
        let mut files: Vec<PathBuf> = std::fs::read_dir(&folder)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        if files.is_empty() {
            return Err(OpenError::NoValidImages { path: folder });
        }
        files.sort();

        let dataset_path = folder.join(DATASET_FILE_NAME);
        let colour_map_path = folder.join(COLOUR_MAP_FILE_NAME);
        let (info, colour_map, restored) = if dataset_path.is_file() {
            log::info!("Loading existing dataset from {:?}", dataset_path);
            let record = read_dataset(&dataset_path)?;
            let colour_map = if colour_map_path.is_file() {
                read_colour_map(&colour_map_path)?
            } else {
                ColourMap::default()
            };
            let restored = restore_images(&record, &colour_map)?;
            (record.info, colour_map, restored)
        } else {
            (DatasetInfo::new(), ColourMap::default(), Vec::new())
        };

        let mut by_name: HashMap<String, ImageSnapshot> = restored
            .into_iter()
            .map(|snapshot| (snapshot.file_name.clone(), snapshot))
            .collect();

        let mut images = Vec::with_capacity(files.len());
        for path in files {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let image = match by_name.remove(&name) {
                Some(snapshot) => EditableImage::restore(
                    path,
                    ImageMeta::with_date(snapshot.width, snapshot.height, snapshot.date_captured),
                    snapshot.annotations,
                ),
                None => {
                    let meta = probe(&path);
                    EditableImage::new(path, meta)
                }
            };
            images.push(image);
        }
        for missing in by_name.keys() {
            log::warn!("Dataset references missing image file '{}', skipping", missing);
        }

        let worker = match ExportWorker::spawn() {
            Ok(worker) => Some(worker),
            Err(e) => {
                log::error!("{}; exports will run blocking", e);
                None
            }
        };

        let status = format!(
            "Opened {} images from `{}`.",
            images.len(),
            folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| folder.display().to_string()),
        );
        let active_colour = colour_map.fallback_colour().to_string();
        log::info!("{}", status);

        Ok(Self {
            folder,
            images,
            current_index: 0,
            colour_map,
            info,
            active_colour,
            draft: DraftState::Idle,
            status,
            events: EventBus::new(),
            worker,
            last_export_job: None,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// 1-based position of the active image, for display.
    pub fn image_position(&self) -> (usize, usize) {
        (self.current_index + 1, self.images.len())
    }

    pub fn current_image(&self) -> Option<&EditableImage> {
        self.images.get(self.current_index)
    }

    fn current_image_mut(&mut self) -> Option<&mut EditableImage> {
        self.images.get_mut(self.current_index)
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn colour_map(&self) -> &ColourMap {
        &self.colour_map
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Replace the dataset header carried into the next export.
    pub fn set_info(&mut self, info: DatasetInfo) {
        self.info = info;
    }

    pub fn active_colour(&self) -> &str {
        &self.active_colour
    }

    /// Select the colour new boxes will be drawn in.
    pub fn set_active_colour(&mut self, colour: impl Into<String>) {
        self.active_colour = colour.into();
    }

    fn active_label(&self) -> String {
        self.colour_map
            .label_for(&self.active_colour)
            .unwrap_or(&self.active_colour)
            .to_string()
    }

    pub fn draft(&self) -> &DraftState {
        &self.draft
    }

    pub fn can_undo(&self) -> bool {
        self.current_image().is_some_and(EditableImage::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.current_image().is_some_and(EditableImage::can_redo)
    }

    /// Subscribe to state-change events.
    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn annotation_bbox(&self, id: AnnotationId) -> Option<BoundingBox> {
        self.current_image()
            .and_then(|image| image.annotation(id))
            .and_then(|annotation| annotation.bbox().cloned())
    }

    fn emit_history_changed(&mut self) {
        let can_undo = self.can_undo();
        let can_redo = self.can_redo();
        self.events
            .emit(SessionEvent::HistoryChanged { can_undo, can_redo });
    }

    // ========================================================================
    // Pointer Routing
    // ========================================================================

    /// Route a pointer press on the image canvas.
    pub fn pointer_down(&mut self, p: Point) {
        match std::mem::take(&mut self.draft) {
            DraftState::Idle => {
                let bbox = BoundingBox::new(p, self.active_label(), self.active_colour.clone());
                self.draft = DraftState::DrawingBox { bbox };
                self.events.emit(SessionEvent::DraftChanged);
            }
            DraftState::DrawingBox { mut bbox } => {
                // Already mid-drag; treat the press as a drag update
                bbox.adjust(p);
                self.draft = DraftState::DrawingBox { bbox };
            }
            DraftState::AwaitingPolygon { annotation } => {
                let Some(bbox) = self.annotation_bbox(annotation) else {
                    self.draft = DraftState::Idle;
                    return;
                };
                if !bbox.contains(&p) {
                    // Rings live inside their box; presses outside do not
                    // root one
                    log::debug!("Polygon root outside the box, ignored");
                    self.draft = DraftState::AwaitingPolygon { annotation };
                    return;
                }
                let colour = bbox.colour.clone();
                let polygon = Polygon::start(bbox.clamp(p), colour);
                self.draft = DraftState::DrawingPolygon {
                    annotation,
                    polygon,
                };
                self.events.emit(SessionEvent::DraftChanged);
            }
            DraftState::DrawingPolygon {
                annotation,
                mut polygon,
            } => {
                if let Some(bbox) = self.annotation_bbox(annotation) {
                    polygon.adjust(bbox.clamp(p));
                }
                match polygon.add_vertex() {
                    AddVertex::SegmentAdded => {
                        self.draft = DraftState::DrawingPolygon {
                            annotation,
                            polygon,
                        };
                        self.events.emit(SessionEvent::DraftChanged);
                    }
                    AddVertex::Closed => {
                        self.commit_ring(annotation, polygon);
                        self.draft = DraftState::AwaitingPolygon { annotation };
                    }
                    AddVertex::RejectedSelfIntersecting => {
                        self.status =
                            "Edge would cross the polygon, pick another point.".to_string();
                        self.draft = DraftState::DrawingPolygon {
                            annotation,
                            polygon,
                        };
                        self.events.emit(SessionEvent::EdgeRejected);
                    }
                }
            }
        }
    }

    /// Route pointer movement while drawing.
    pub fn pointer_move(&mut self, p: Point) {
        let clamp_box = match &self.draft {
            DraftState::DrawingPolygon { annotation, .. } => self.annotation_bbox(*annotation),
            _ => None,
        };
        match &mut self.draft {
            DraftState::DrawingBox { bbox } => {
                bbox.adjust(p);
                self.events.emit(SessionEvent::DraftChanged);
            }
            DraftState::DrawingPolygon { polygon, .. } => {
                let target = clamp_box.map(|bbox| bbox.clamp(p)).unwrap_or(p);
                polygon.adjust(target);
                self.events.emit(SessionEvent::DraftChanged);
            }
            _ => {}
        }
    }

    /// Route a pointer release: commits the dragged box.
    pub fn pointer_up(&mut self, p: Point) {
        let draft = std::mem::take(&mut self.draft);
        let DraftState::DrawingBox { mut bbox } = draft else {
            self.draft = draft;
            return;
        };
        bbox.adjust(p);
        bbox.freeze();

        let label = bbox.label.clone();
        let corners = (bbox.start(), bbox.end());
        let Some(image) = self.current_image_mut() else {
            return;
        };
        let handle = image.commit_box(bbox);

        self.status = format!(
            "Created `{}` bounding box at [{}, {}, {}, {}].",
            label,
            corners.0.x as i64,
            corners.0.y as i64,
            corners.1.x as i64,
            corners.1.y as i64,
        );
        self.draft = DraftState::AwaitingPolygon {
            annotation: handle.annotation,
        };
        self.events.emit(SessionEvent::BoxCommitted { handle });
        self.emit_history_changed();
    }

    fn commit_ring(&mut self, annotation: AnnotationId, polygon: Polygon) {
        let vertex_count = polygon.vertex_count();
        let Some(image) = self.current_image_mut() else {
            return;
        };
        let Some(handle) = image.commit_polygon(annotation, polygon) else {
            return;
        };
        let label = image
            .annotation(annotation)
            .map(|a| a.label.clone())
            .unwrap_or_default();

        self.status = format!("Closed `{}` polygon with {} vertices.", label, vertex_count);
        self.events.emit(SessionEvent::PolygonCommitted { handle });
        self.emit_history_changed();
    }

    /// Leave the polygon phase, discarding any unfinished ring. Committed
    /// geometry is untouched.
    pub fn end_annotation(&mut self) {
        if self.draft.is_idle() {
            return;
        }
        if self.draft.has_pending_geometry() {
            log::debug!("Discarding in-progress draft geometry");
        }
        self.draft = DraftState::Idle;
        self.events.emit(SessionEvent::DraftChanged);
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Revert the newest committed edit on the active image.
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        self.end_annotation();
        let entry = match self.current_image_mut() {
            Some(image) => image.undo()?,
            None => return Err(HistoryError::EmptyHistory),
        };
        self.status = format!("Removed {}.", entry.description());
        self.events.emit(SessionEvent::Undone);
        self.emit_history_changed();
        Ok(())
    }

    /// Re-apply the newest reverted edit on the active image.
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        self.end_annotation();
        let entry = match self.current_image_mut() {
            Some(image) => image.redo()?,
            None => return Err(HistoryError::EmptyHistory),
        };
        self.status = format!("Restored {}.", entry.description());
        self.events.emit(SessionEvent::Redone);
        self.emit_history_changed();
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn has_next_image(&self) -> bool {
        self.current_index + 1 < self.images.len()
    }

    pub fn has_prev_image(&self) -> bool {
        self.current_index > 0
    }

    /// Move to the next image. Returns false at the end of the set.
    pub fn next_image(&mut self) -> bool {
        if !self.has_next_image() {
            return false;
        }
        self.end_annotation();
        self.current_index += 1;
        self.announce_position();
        true
    }

    /// Move to the previous image. Returns false at the start of the set.
    pub fn prev_image(&mut self) -> bool {
        if !self.has_prev_image() {
            return false;
        }
        self.end_annotation();
        self.current_index -= 1;
        self.announce_position();
        true
    }

    fn announce_position(&mut self) {
        let (position, total) = self.image_position();
        self.status = format!("Moved to image {} out of {}.", position, total);
        self.events.emit(SessionEvent::ImageActivated {
            index: self.current_index,
        });
        self.emit_history_changed();
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Add a colour to the palette or reassign its label directly.
    pub fn define_colour(&mut self, colour: impl Into<String>, label: impl Into<String>) {
        self.colour_map.set_label(colour, label);
    }

    /// Rename the label of a colour everywhere: the colour map, committed
    /// annotations on every image, and both history stacks. The rename is
    /// not a history entry of its own.
    pub fn rename_label(&mut self, colour: &str, new_label: &str) {
        let Some(old) = self.colour_map.label_for(colour).map(String::from) else {
            log::warn!("Colour '{}' is not in the colour map", colour);
            return;
        };
        if old == new_label {
            return;
        }
        self.colour_map.set_label(colour, new_label);

        let mut touched = 0;
        for image in &mut self.images {
            touched += image.rename_label(&old, new_label);
        }
        log::debug!(
            "Renamed {} records from '{}' to '{}'",
            touched,
            old,
            new_label
        );
        self.status = format!("Changed {} label to `{}`.", colour, new_label);
        self.events.emit(SessionEvent::LabelRenamed {
            colour: colour.to_string(),
            label: new_label.to_string(),
        });
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Everything the canvas should draw for the active image, committed
    /// primitives first, draft geometry on top.
    pub fn drawables(&self) -> Vec<Drawable> {
        let mut out = Vec::new();
        if let Some(image) = self.current_image() {
            for annotation in image.annotations() {
                if let (Some(handle), Some(bbox)) = (annotation.bbox_handle(), annotation.bbox()) {
                    out.push(Drawable::Box {
                        handle,
                        bbox: bbox.clone(),
                    });
                }
                for (handle, polygon) in annotation.polygon_entries() {
                    out.push(Drawable::Ring {
                        handle,
                        polygon: polygon.clone(),
                    });
                }
            }
        }

        match &self.draft {
            DraftState::DrawingBox { bbox } => out.push(Drawable::DraftBox { bbox: bbox.clone() }),
            DraftState::DrawingPolygon { polygon, .. } => {
                for segment in polygon.edges() {
                    out.push(Drawable::DraftEdge {
                        segment,
                        colour: polygon.colour.clone(),
                    });
                }
                if let Some(live) = polygon.live_segment() {
                    out.push(Drawable::LiveEdge {
                        segment: *live,
                        colour: polygon.colour.clone(),
                    });
                }
            }
            _ => {}
        }
        out
    }

    // ========================================================================
    // Export
    // ========================================================================

    fn export_job(&self) -> ExportJob {
        ExportJob {
            images: self.images.iter().map(EditableImage::snapshot).collect(),
            info: self.info.clone(),
            colour_map: self.colour_map.clone(),
            dataset_path: self.folder.join(DATASET_FILE_NAME),
            colour_map_path: self.folder.join(COLOUR_MAP_FILE_NAME),
        }
    }

    /// Export the working set. Runs on the worker thread when available,
    /// superseding any job still in flight; the outcome arrives through
    /// [`poll_export`](Self::poll_export).
    pub fn export(&mut self) -> Result<u64, FormatError> {
        let job = self.export_job();
        match &self.worker {
            Some(worker) => {
                let id = worker.submit(job);
                self.last_export_job = Some(id);
                self.events.emit(SessionEvent::ExportStarted { job: id });
                Ok(id)
            }
            None => {
                let summary = run_job(&job)?;
                self.status = export_status(&summary);
                self.events.emit(SessionEvent::ExportFinished { job: 0 });
                Ok(0)
            }
        }
    }

    /// Check for a finished export without blocking.
    pub fn poll_export(&mut self) -> Option<ExportOutcome> {
        let outcome = self.worker.as_ref()?.poll()?;
        match &outcome {
            ExportOutcome::Finished { job, summary } => {
                self.status = export_status(summary);
                self.events.emit(SessionEvent::ExportFinished { job: *job });
            }
            ExportOutcome::Cancelled { job } => {
                log::debug!("Export job {} was superseded", job);
            }
            ExportOutcome::Failed { job, error } => {
                log::error!("Export job {} failed: {}", job, error);
                self.status = format!("Export failed: {}.", error);
                self.events.emit(SessionEvent::ExportFailed {
                    job: *job,
                    error: error.clone(),
                });
            }
        }
        Some(outcome)
    }

    /// Close the session: discard the draft, retire the worker, and write
    /// the dataset synchronously so nothing is lost.
    pub fn close(mut self) -> Result<(), FormatError> {
        self.end_annotation();
        if let Some(worker) = self.worker.take() {
            worker.cancel_pending();
            // Dropping joins the thread, so a job already past its last
            // generation check lands before the final write below
            drop(worker);
        }
        let summary = run_job(&self.export_job())?;
        log::info!(
            "Closed `{}` after writing {} annotations",
            self.folder.display(),
            summary.annotations
        );
        Ok(())
    }
}

fn export_status(summary: &ExportSummary) -> String {
    format!(
        "Exported {} annotations across {} images.",
        summary.annotations, summary.images
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str, files: &[&str]) -> PathBuf {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = std::env::temp_dir().join(format!("boxer-core-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for file in files {
            std::fs::write(dir.join(file), b"test").unwrap();
        }
        dir
    }

    fn probe(_: &Path) -> ImageMeta {
        ImageMeta::with_date(64, 48, "2021-05-03")
    }

    fn draw_box(session: &mut Session, from: (f32, f32), to: (f32, f32)) {
        session.pointer_down(Point::new(from.0, from.1));
        session.pointer_move(Point::new(to.0, to.1));
        session.pointer_up(Point::new(to.0, to.1));
    }

    fn press(session: &mut Session, at: (f32, f32)) {
        session.pointer_down(Point::new(at.0, at.1));
    }

    fn wait_for_export(session: &mut Session) -> ExportOutcome {
        for _ in 0..500 {
            if let Some(outcome) = session.poll_export() {
                return outcome;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("export did not finish in time");
    }

    #[test]
    fn test_open_rejects_imageless_directory() {
        let dir = temp_dir("no-images", &["readme.md"]);
        match Session::open(&dir, probe) {
            Err(OpenError::NoValidImages { path }) => assert_eq!(path, dir),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("open should have failed"),
        }
    }

    #[test]
    fn test_open_missing_directory_is_io_error() {
        let dir = temp_dir("missing", &[]);
        std::fs::remove_dir_all(&dir).unwrap();
        match Session::open(&dir, probe) {
            Err(OpenError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("open should have failed"),
        }
    }

    #[test]
    fn test_open_scans_and_sorts() {
        let dir = temp_dir("scan", &["b.jpg", "a.PNG", "notes.txt", "c.bmp"]);
        let mut session = Session::open(&dir, probe).unwrap();
        assert_eq!(session.image_count(), 3);
        assert_eq!(session.current_image().unwrap().file_name(), "a.PNG");
        session.next_image();
        assert_eq!(session.current_image().unwrap().file_name(), "b.jpg");
        session.next_image();
        assert_eq!(session.current_image().unwrap().file_name(), "c.bmp");
    }

    #[test]
    fn test_box_then_polygon_flow() {
        let dir = temp_dir("flow", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        let events = session.subscribe();

        draw_box(&mut session, (10.0, 10.0), (40.0, 40.0));
        assert!(matches!(session.draft(), DraftState::AwaitingPolygon { .. }));
        assert!(session.can_undo());
        assert!(session.status().contains("bounding box at [10, 10, 40, 40]"));

        // Root a ring inside the box and close it near the root
        press(&mut session, (15.0, 15.0));
        press(&mut session, (30.0, 15.0));
        press(&mut session, (30.0, 30.0));
        press(&mut session, (16.0, 16.0));

        let image = session.current_image().unwrap();
        assert_eq!(image.annotations().len(), 1);
        assert_eq!(image.annotations()[0].polygon_count(), 1);
        assert!(session.status().contains("polygon with 3 vertices"));
        assert!(matches!(session.draft(), DraftState::AwaitingPolygon { .. }));

        session.end_annotation();
        assert!(session.draft().is_idle());

        let collected: Vec<SessionEvent> = events.try_iter().collect();
        assert!(collected.contains(&SessionEvent::BoxCommitted {
            handle: PrimitiveHandle {
                annotation: 0,
                primitive: 0
            }
        }));
        assert!(
            collected
                .iter()
                .any(|e| matches!(e, SessionEvent::PolygonCommitted { .. }))
        );
    }

    #[test]
    fn test_click_commits_zero_area_box() {
        let dir = temp_dir("zero-area", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        session.pointer_down(Point::new(5.4, 5.6));
        session.pointer_up(Point::new(5.4, 5.6));

        let image = session.current_image().unwrap();
        assert_eq!(image.annotations().len(), 1);
        assert_eq!(
            image.annotations()[0].bbox().unwrap().rect(),
            [5.0, 6.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_polygon_root_outside_box_ignored() {
        let dir = temp_dir("root-outside", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (10.0, 10.0), (40.0, 40.0));

        press(&mut session, (50.0, 50.0));
        assert!(matches!(session.draft(), DraftState::AwaitingPolygon { .. }));

        press(&mut session, (20.0, 20.0));
        assert!(matches!(session.draft(), DraftState::DrawingPolygon { .. }));
    }

    #[test]
    fn test_ring_vertices_clamp_into_box() {
        let dir = temp_dir("clamp", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (10.0, 10.0), (40.0, 40.0));

        press(&mut session, (15.0, 15.0));
        press(&mut session, (100.0, 20.0));
        let DraftState::DrawingPolygon { polygon, .. } = session.draft() else {
            panic!("expected an open polygon");
        };
        assert_eq!(polygon.vertices()[1], Point::new(40.0, 20.0));
    }

    #[test]
    fn test_rejected_edge_surfaces() {
        let dir = temp_dir("reject", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (0.0, 0.0), (40.0, 40.0));
        let events = session.subscribe();

        press(&mut session, (5.0, 5.0));
        press(&mut session, (35.0, 5.0));
        press(&mut session, (35.0, 15.0));
        // This edge would cross the first one
        press(&mut session, (20.0, 2.0));

        assert!(session.status().contains("Edge would cross"));
        let collected: Vec<SessionEvent> = events.try_iter().collect();
        assert!(collected.contains(&SessionEvent::EdgeRejected));

        // Drawing continues with the rejected vertex dropped
        let DraftState::DrawingPolygon { polygon, .. } = session.draft() else {
            panic!("expected an open polygon");
        };
        assert_eq!(polygon.vertices().len(), 3);
    }

    #[test]
    fn test_navigation_bounds() {
        let dir = temp_dir("nav", &["a.jpg", "b.jpg", "c.png"]);
        let mut session = Session::open(&dir, probe).unwrap();
        assert_eq!(session.image_position(), (1, 3));
        assert!(!session.has_prev_image());
        assert!(!session.prev_image());

        assert!(session.next_image());
        assert!(session.next_image());
        assert_eq!(session.image_position(), (3, 3));
        assert!(!session.has_next_image());
        assert!(!session.next_image());
        assert!(session.status().contains("image 3 out of 3"));
    }

    #[test]
    fn test_per_image_history() {
        let dir = temp_dir("history", &["a.jpg", "b.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (1.0, 1.0), (9.0, 9.0));
        session.end_annotation();
        assert!(session.can_undo());

        // Stacks never migrate between images
        assert!(session.next_image());
        assert!(!session.can_undo());
        assert!(!session.can_redo());

        assert!(session.prev_image());
        session.undo().unwrap();
        assert!(session.current_image().unwrap().annotations().is_empty());
        session.redo().unwrap();
        assert_eq!(session.current_image().unwrap().annotations().len(), 1);

        session.undo().unwrap();
        assert_eq!(session.undo(), Err(HistoryError::EmptyHistory));
    }

    #[test]
    fn test_undo_discards_draft_first() {
        let dir = temp_dir("undo-draft", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (10.0, 10.0), (40.0, 40.0));
        press(&mut session, (15.0, 15.0));
        press(&mut session, (30.0, 15.0));

        session.undo().unwrap();
        assert!(session.draft().is_idle());
        // The unfinished ring was never committed, so undo removed the box
        assert!(session.current_image().unwrap().annotations().is_empty());
    }

    #[test]
    fn test_rename_label_sweeps_everything() {
        let dir = temp_dir("rename", &["a.jpg", "b.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (1.0, 1.0), (9.0, 9.0));
        session.end_annotation();
        session.next_image();
        draw_box(&mut session, (2.0, 2.0), (8.0, 8.0));
        session.undo().unwrap();

        session.rename_label("blue", "cat");
        assert_eq!(session.colour_map().label_for("blue"), Some("cat"));
        assert!(session.status().contains("Changed blue label to `cat`"));
        // The rename itself is not undoable
        assert!(!session.can_undo());

        // Committed annotation on the other image
        session.prev_image();
        assert_eq!(session.current_image().unwrap().annotations()[0].label, "cat");

        // The undone annotation replays with the new label
        session.next_image();
        session.redo().unwrap();
        assert_eq!(session.current_image().unwrap().annotations()[0].label, "cat");
    }

    #[test]
    fn test_drawables_layering() {
        let dir = temp_dir("drawables", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (0.0, 0.0), (20.0, 20.0));
        press(&mut session, (5.0, 5.0));
        press(&mut session, (15.0, 5.0));
        session.pointer_move(Point::new(15.0, 15.0));

        let drawables = session.drawables();
        assert!(matches!(drawables[0], Drawable::Box { .. }));
        assert!(
            drawables
                .iter()
                .any(|d| matches!(d, Drawable::DraftEdge { .. }))
        );
        let Some(Drawable::LiveEdge { segment, .. }) = drawables.last() else {
            panic!("expected the live edge on top");
        };
        assert_eq!(segment.end, Point::new(15.0, 15.0));
    }

    #[test]
    fn test_background_export_completes() {
        let dir = temp_dir("worker", &["a.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (0.0, 0.0), (10.0, 10.0));
        session.end_annotation();

        let job = session.export().unwrap();
        match wait_for_export(&mut session) {
            ExportOutcome::Finished { job: done, summary } => {
                assert_eq!(done, job);
                assert_eq!(summary.annotations, 1);
                assert_eq!(summary.images, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(session.status().contains("Exported 1 annotations"));
        assert!(dir.join(DATASET_FILE_NAME).is_file());
        assert!(dir.join(COLOUR_MAP_FILE_NAME).is_file());
    }

    #[test]
    fn test_close_writes_and_reopen_restores() {
        let dir = temp_dir("roundtrip", &["a.jpg", "b.jpg"]);
        let mut session = Session::open(&dir, probe).unwrap();
        draw_box(&mut session, (10.0, 10.0), (30.0, 30.0));
        press(&mut session, (12.0, 12.0));
        press(&mut session, (28.0, 12.0));
        press(&mut session, (28.0, 28.0));
        press(&mut session, (12.0, 12.0));
        session.end_annotation();
        session.rename_label("blue", "cat");
        session.close().unwrap();

        assert!(dir.join(DATASET_FILE_NAME).is_file());
        assert!(dir.join(COLOUR_MAP_FILE_NAME).is_file());

        let session = Session::open(&dir, probe).unwrap();
        assert_eq!(session.colour_map().label_for("blue"), Some("cat"));
        let image = session.current_image().unwrap();
        assert_eq!(image.annotations().len(), 1);

        let annotation = &image.annotations()[0];
        assert_eq!(annotation.label, "cat");
        assert_eq!(annotation.colour, "blue");
        assert_eq!(
            annotation.bbox().map(|b| b.rect()),
            Some([10.0, 10.0, 20.0, 20.0])
        );
        assert_eq!(annotation.polygon_count(), 1);
        // Reloaded state starts with fresh history
        assert!(!image.can_undo());

        // The other image stayed empty
        assert!(session.images[1].annotations().is_empty());
    }

    #[test]
    fn test_close_wins_over_in_flight_export() {
        let dir = temp_dir("close-race", &[]);
        for i in 0..4000 {
            std::fs::write(dir.join(format!("img-{:05}.jpg", i)), b"test").unwrap();
        }
        let mut session = Session::open(&dir, probe).unwrap();

        // Kick off a bulky snapshot, then commit one more box while that
        // job is still serializing
        session.export().unwrap();
        draw_box(&mut session, (10.0, 10.0), (30.0, 30.0));
        session.end_annotation();
        session.close().unwrap();

        // The file on disk must hold the final working set, not the
        // superseded snapshot
        let record = read_dataset(&dir.join(DATASET_FILE_NAME)).unwrap();
        assert_eq!(record.images.len(), 4000);
        assert_eq!(record.annotations.len(), 1);
    }
}
