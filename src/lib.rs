//! Boxer annotation core.
//!
//! The engine behind the Boxer image labelling tool: drawing geometry,
//! the box-then-polygons annotation flow, per-image undo/redo history,
//! and COCO-style dataset export. Interface shells own the canvas and
//! image decoding; they drive a [`Session`] with pointer events and
//! render whatever it reports back.

pub mod format;
pub mod geometry;
pub mod history;
pub mod mask;
pub mod model;
pub mod state;

pub use history::{EditEntry, History, HistoryConfig, HistoryError};
pub use mask::{RleMask, encode_region};
pub use state::{Drawable, Session, SessionEvent};
