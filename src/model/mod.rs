//! Data models for annotations and labelling.

mod annotation;
mod category;

pub use annotation::{Annotation, AnnotationId, PrimitiveHandle, PrimitiveId};
pub use category::{ColourMap, DEFAULT_PALETTE};
