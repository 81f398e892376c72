//! Working-set state management.

mod draft;
mod event;
mod image;
mod session;

pub use draft::DraftState;
pub use event::{EventBus, SessionEvent};
pub use image::{EditableImage, ImageMeta};
pub use session::{Drawable, IMAGE_EXTENSIONS, OpenError, Session, is_image_filename};
