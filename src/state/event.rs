//! Session events delivered to interface collaborators.

use std::sync::mpsc::{Receiver, Sender, channel};

use crate::model::PrimitiveHandle;

/// State-change notification pushed after a session mutation.
///
/// Collaborators subscribe once and drain their receiver instead of
/// polling session flags; every event carries enough to decide whether a
/// redraw or a control refresh is needed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The active image changed
    ImageActivated { index: usize },
    /// In-progress draft geometry changed
    DraftChanged,
    /// A bounding box was committed, creating its annotation
    BoxCommitted { handle: PrimitiveHandle },
    /// A polygon ring closed and was committed
    PolygonCommitted { handle: PrimitiveHandle },
    /// A polygon edge was rejected because it would self-intersect
    EdgeRejected,
    /// A committed edit was reverted
    Undone,
    /// A reverted edit was re-applied
    Redone,
    /// Undo/redo availability after the latest mutation
    HistoryChanged { can_undo: bool, can_redo: bool },
    /// Every annotation drawn in `colour` now carries `label`
    LabelRenamed { colour: String, label: String },
    /// A background export was submitted
    ExportStarted { job: u64 },
    /// A background export wrote its files
    ExportFinished { job: u64 },
    /// A background export failed
    ExportFailed { job: u64, error: String },
}

/// Fan-out channel for session events.
///
/// Subscribers that drop their receiver are pruned on the next emit.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<SessionEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a receiver that observes every subsequent event.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver an event to all live subscribers.
    pub fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
