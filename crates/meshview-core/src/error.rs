//! Error types for meshview-rs.

use thiserror::Error;

/// The main error type for meshview-rs operations.
#[derive(Error, Debug)]
pub enum MeshViewError {
    /// A field or attribute has the wrong number of entries for the mesh.
    #[error("{what} size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        what: String,
        expected: String,
        actual: usize,
    },

    /// A material to be freed is not in the library cache.
    #[error("material '{0}' to be freed is not found (is it a ghost?)")]
    MaterialNotFound(String),

    /// An internal bookkeeping invariant was broken.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The operation needs a current mesh but none is displayed.
    #[error("no current mesh is displayed")]
    NoCurrentMesh,

    /// Geometry arrays are malformed.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Image encoding or decoding error.
    #[error("image error: {0}")]
    ImageError(String),
}

impl MeshViewError {
    /// Convenience constructor for a size mismatch against a single count.
    pub fn size_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            what: what.into(),
            expected: expected.to_string(),
            actual,
        }
    }
}

/// A specialized Result type for meshview-rs operations.
pub type Result<T> = std::result::Result<T, MeshViewError>;
