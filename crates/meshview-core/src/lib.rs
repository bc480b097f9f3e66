//! Core abstractions for meshview-rs.
//!
//! This crate provides the fundamental types shared by the scene backend and the viewers:
//! - [`AttributeData`] typed arrays and the per-corner replication used for per-element fields
//! - [`ResourceLedger`] tracking every scene object a viewer allocates
//! - [`VisualizationGeometry`] handed to viewers by mesh sources
//! - Configuration options and the error type

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Mesh sizes stay far below f32 precision limits
#![allow(clippy::cast_precision_loss)]

pub mod attributes;
pub mod error;
pub mod geometry;
pub mod options;
pub mod resource;

pub use attributes::{replicate_per_corner, AttributeData, AttributeKey, RawAttributes};
pub use error::{MeshViewError, Result};
pub use geometry::{compute_vertex_normals, ModelTransform, VisualizationGeometry};
pub use options::{CameraOptions, ControlOptions, ViewerOptions};
pub use resource::{LedgerStats, ResourceId, ResourceKind, ResourceLedger, SharedLedger};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
