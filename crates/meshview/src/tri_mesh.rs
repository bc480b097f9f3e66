//! Triangle and line-segment viewers.

use std::ops::{Deref, DerefMut};

use meshview_core::{Result, ViewerOptions};

use crate::mesh::MeshSource;
use crate::viewer::{MeshStyle, UpdateOptions, Viewer};

/// Viewer drawing a source as shaded triangles.
pub struct TriMeshViewer<S: MeshSource>(Viewer<S>);

impl<S: MeshSource> TriMeshViewer<S> {
    pub fn new(source: S, options: ViewerOptions, init: UpdateOptions) -> Result<Self> {
        Viewer::new(source, MeshStyle::Triangles, options, init).map(Self)
    }

    pub fn into_inner(self) -> Viewer<S> {
        self.0
    }
}

impl<S: MeshSource> Deref for TriMeshViewer<S> {
    type Target = Viewer<S>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: MeshSource> DerefMut for TriMeshViewer<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Viewer drawing a source as line segments.
pub struct LineMeshViewer<S: MeshSource>(Viewer<S>);

impl<S: MeshSource> LineMeshViewer<S> {
    pub fn new(source: S, options: ViewerOptions, init: UpdateOptions) -> Result<Self> {
        Viewer::new(source, MeshStyle::Lines, options, init).map(Self)
    }

    pub fn into_inner(self) -> Viewer<S> {
        self.0
    }
}

impl<S: MeshSource> Deref for LineMeshViewer<S> {
    type Target = Viewer<S>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: MeshSource> DerefMut for LineMeshViewer<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RawMesh;
    use glam::Vec3;
    use meshview_render::{GroupKind, MaterialKind, MeshKind};

    #[test]
    fn test_tri_mesh_viewer_uses_lambert() {
        let mesh = RawMesh::with_computed_normals(vec![Vec3::ZERO, Vec3::X, Vec3::Y], &[[0, 1, 2]]);
        let viewer = TriMeshViewer::new(mesh, ViewerOptions::default(), UpdateOptions::new()).unwrap();
        let current = viewer.scene().mesh(viewer.current_mesh().unwrap()).unwrap();
        assert_eq!(current.kind, MeshKind::Mesh);
        assert_eq!(current.material.kind(), MaterialKind::Lambert);
    }

    #[test]
    fn test_line_mesh_viewer_draws_segments() {
        let mesh = RawMesh::lines(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            &[[0, 1], [1, 2]],
            vec![Vec3::Z; 3],
        );
        let mut viewer = LineMeshViewer::new(
            mesh,
            ViewerOptions::default(),
            UpdateOptions::new().with_scalar_field(vec![0.0, 1.0]),
        )
        .unwrap();
        let current = viewer.scene().mesh(viewer.current_mesh().unwrap()).unwrap();
        assert_eq!(current.kind, MeshKind::LineSegments);
        assert_eq!(current.material.kind(), MaterialKind::LineBasic);
        // Two segments with a color each: two corners per segment.
        assert_eq!(viewer.current_geometry().unwrap().vertex_count(), 4);

        viewer.update(UpdateOptions::new()).unwrap();
        assert_eq!(viewer.scene().children(GroupKind::Live).len(), 1);
    }
}
