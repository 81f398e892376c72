//! Error types for dataset export and load.

use thiserror::Error;

/// Errors that can occur while writing or reading dataset files.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid record structure or content
    #[error("Invalid dataset: {message}")]
    InvalidDataset {
        /// Description of the problem
        message: String,
    },

    /// Category ID referenced but not defined
    #[error("Category not found: {id}")]
    CategoryNotFound {
        /// The missing category ID
        id: u32,
    },

    /// Annotation references an image ID the record never declares
    #[error("Image not found: {id}")]
    ImageNotFound {
        /// The missing image ID
        id: u64,
    },
}

impl FormatError {
    /// Create an invalid dataset error with a message.
    pub fn invalid_dataset(message: impl Into<String>) -> Self {
        Self::InvalidDataset {
            message: message.into(),
        }
    }
}
