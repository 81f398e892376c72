//! Background thread for dataset export.
//!
//! Mask encoding over large crowds is O(box area x vertices), too slow to
//! run on the thread that handles pointer input. Export jobs are therefore
//! snapshotted and shipped to a dedicated thread; the session polls for
//! outcomes. A generation counter makes stale jobs abandon themselves
//! between annotation encodes.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread;

use crate::format::error::FormatError;
use crate::format::export::{ImageSnapshot, RecordBuilder, write_colour_map, write_dataset};
use crate::format::record::DatasetInfo;
use crate::model::ColourMap;

/// Everything one export run needs, detached from live state.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub images: Vec<ImageSnapshot>,
    pub info: DatasetInfo,
    pub colour_map: ColourMap,
    pub dataset_path: PathBuf,
    pub colour_map_path: PathBuf,
}

/// Summary of a finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub images: usize,
    pub annotations: usize,
    pub files_written: Vec<PathBuf>,
}

/// Terminal state of a submitted export job.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// The job wrote its files
    Finished { job: u64, summary: ExportSummary },
    /// The job was superseded before it finished encoding
    Cancelled { job: u64 },
    /// The job failed while encoding or writing
    Failed { job: u64, error: String },
}

/// Messages sent to the export thread
enum ThreadMessage {
    /// Run an export job
    Export { job: u64, payload: Box<ExportJob> },
    /// Shut down the thread
    Shutdown,
}

/// Write a job's dataset and colour map synchronously.
pub fn run_job(job: &ExportJob) -> Result<ExportSummary, FormatError> {
    let record = super::export::build_record(&job.images, &job.info);
    write_dataset(&record, &job.dataset_path)?;
    write_colour_map(&job.colour_map, &job.colour_map_path)?;
    Ok(ExportSummary {
        images: record.images.len(),
        annotations: record.annotations.len(),
        files_written: vec![job.dataset_path.clone(), job.colour_map_path.clone()],
    })
}

/// Handle to the export thread.
///
/// Dropping the handle shuts the thread down and joins it.
pub struct ExportWorker {
    request_tx: Sender<ThreadMessage>,
    result_rx: Receiver<ExportOutcome>,
    thread_handle: Option<thread::JoinHandle<()>>,
    /// Id of the most recently submitted job; older in-flight jobs are
    /// stale and abandon themselves.
    generation: Arc<AtomicU64>,
}

impl ExportWorker {
    /// Spawn the export thread.
    pub fn spawn() -> Result<Self, String> {
        let (request_tx, request_rx) = channel::<ThreadMessage>();
        let (result_tx, result_rx) = channel::<ExportOutcome>();
        let generation = Arc::new(AtomicU64::new(0));
        let thread_generation = Arc::clone(&generation);

        let thread_handle = thread::Builder::new()
            .name("dataset-export".to_string())
            .spawn(move || {
                log::info!("Dataset export thread started");
                Self::thread_loop(request_rx, result_tx, thread_generation);
                log::info!("Dataset export thread exiting");
            })
            .map_err(|e| format!("Failed to spawn export thread: {}", e))?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            generation,
        })
    }

    /// Submit a job, superseding any job still in flight. Returns the job
    /// id to match against poll results.
    pub fn submit(&self, payload: ExportJob) -> u64 {
        let job = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Submitting export job {} ({} images)", job, payload.images.len());
        if self
            .request_tx
            .send(ThreadMessage::Export {
                job,
                payload: Box::new(payload),
            })
            .is_err()
        {
            log::error!("Failed to submit export job {}: thread disconnected", job);
        }
        job
    }

    /// Mark every in-flight job stale without submitting a new one.
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Check for a finished outcome without blocking.
    pub fn poll(&self) -> Option<ExportOutcome> {
        match self.result_rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Export thread disconnected");
                None
            }
        }
    }

    fn thread_loop(
        request_rx: Receiver<ThreadMessage>,
        result_tx: Sender<ExportOutcome>,
        generation: Arc<AtomicU64>,
    ) {
        loop {
            match request_rx.recv() {
                Ok(ThreadMessage::Export { job, payload }) => {
                    let outcome = Self::run_export(job, &payload, &generation);
                    if result_tx.send(outcome).is_err() {
                        log::warn!("Export result channel closed, stopping thread");
                        break;
                    }
                }
                Ok(ThreadMessage::Shutdown) => {
                    log::debug!("Export thread received shutdown");
                    break;
                }
                Err(_) => {
                    log::debug!("Export request channel closed, stopping thread");
                    break;
                }
            }
        }
    }

    fn run_export(job: u64, payload: &ExportJob, generation: &AtomicU64) -> ExportOutcome {
        let mut builder = RecordBuilder::new(payload.info.clone());
        for image in &payload.images {
            let image_id = builder.begin_image(image);
            for annotation in &image.annotations {
                if generation.load(Ordering::SeqCst) != job {
                    log::debug!("Export job {} superseded, abandoning encode", job);
                    return ExportOutcome::Cancelled { job };
                }
                builder.push_annotation(image_id, annotation);
            }
        }

        if generation.load(Ordering::SeqCst) != job {
            log::debug!("Export job {} superseded before writing", job);
            return ExportOutcome::Cancelled { job };
        }

        let record = builder.finish();
        let summary = ExportSummary {
            images: record.images.len(),
            annotations: record.annotations.len(),
            files_written: vec![payload.dataset_path.clone(), payload.colour_map_path.clone()],
        };
        if let Err(e) = write_dataset(&record, &payload.dataset_path) {
            return ExportOutcome::Failed {
                job,
                error: e.to_string(),
            };
        }
        if let Err(e) = write_colour_map(&payload.colour_map, &payload.colour_map_path) {
            return ExportOutcome::Failed {
                job,
                error: e.to_string(),
            };
        }

        log::debug!(
            "Export job {} wrote {} annotations across {} images",
            job,
            summary.annotations,
            summary.images
        );
        ExportOutcome::Finished { job, summary }
    }
}

impl Drop for ExportWorker {
    fn drop(&mut self) {
        log::debug!("Shutting down export thread");

        // Send shutdown message
        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        // Wait for thread to finish
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::warn!("Export thread panicked during shutdown");
            }
        }
    }
}
