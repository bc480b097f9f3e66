//! meshview-rs: interactive mesh viewer widgets.
//!
//! A viewer displays a triangle or line mesh with optional scalar coloring,
//! texture maps, vector field glyphs, wireframe and point overlays, and ghosts
//! of earlier frames. It keeps a retained scene whose every resource is tracked
//! in a per-viewer ledger, and exports that scene as a serializable document or
//! a standalone HTML page.
//!
//! # Quick Start
//!
//! ```no_run
//! use meshview::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mesh = RawMesh::with_computed_normals(
//!         vec![Vec3::ZERO, Vec3::X, Vec3::Y],
//!         &[[0, 1, 2]],
//!     );
//!     let mut viewer = TriMeshViewer::new(mesh, ViewerOptions::default(), UpdateOptions::new())?;
//!     viewer.update(UpdateOptions::new().with_scalar_field(vec![0.0, 0.5, 1.0]))?;
//!     viewer.show_wireframe(true)?;
//!     viewer.export_html("mesh.html")?;
//!     Ok(())
//! }
//! ```

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Renderer widths stay far below f32 precision limits
#![allow(clippy::cast_precision_loss)]

mod elastic;
mod flattening;
mod mesh;
mod tri_mesh;
mod viewer;

pub use elastic::{DeformedMesh, ElasticStructure, ElasticStructureViewer};
pub use flattening::{FlatPositions, FlatteningAnimation, DEFAULT_DURATION};
pub use mesh::{MeshSource, RawMesh};
pub use tri_mesh::{LineMeshViewer, TriMeshViewer};
pub use viewer::{MeshStyle, UpdateOptions, Viewer};

// Re-export core types
pub use meshview_core::{
    AttributeData, AttributeKey, LedgerStats, MeshViewError, ModelTransform, ResourceId,
    ResourceKind, ResourceLedger, Result, SharedLedger, ViewerOptions, VisualizationGeometry, Mat4,
    Vec2, Vec3, Vec4,
};

// Re-export render types
pub use meshview_render::{
    ArrowAlignment, CameraParams, ColorMap, ColorMapRegistry, DomainType, GroupKind, Material,
    MaterialLibrary, MeshKind, ScalarField, SceneDocument, TextureMap, VectorField,
};

/// Initializes logging through `env_logger`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::try_init();
    log::info!("meshview-rs initialized");
}
