//! Mesh sources feeding a viewer.

use glam::Vec3;

use meshview_core::{compute_vertex_normals, Result, VisualizationGeometry};

/// Anything that can produce the geometry a viewer displays.
///
/// Viewers pull a fresh geometry on every `update`, so sources whose vertices
/// move (simulations, deformers) are re-read each time.
pub trait MeshSource {
    fn visualization_geometry(&mut self) -> Result<VisualizationGeometry>;
}

/// Plain arrays of vertices, elements and normals.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMesh {
    geometry: VisualizationGeometry,
}

impl RawMesh {
    pub fn triangles(vertices: Vec<Vec3>, faces: &[[u32; 3]], normals: Vec<Vec3>) -> Self {
        Self {
            geometry: VisualizationGeometry::triangles(vertices, faces, normals),
        }
    }

    /// Triangle mesh with area-weighted vertex normals.
    pub fn with_computed_normals(vertices: Vec<Vec3>, faces: &[[u32; 3]]) -> Self {
        let flat: Vec<u32> = faces.iter().flatten().copied().collect();
        let normals = compute_vertex_normals(&vertices, &flat);
        Self::triangles(vertices, faces, normals)
    }

    pub fn lines(vertices: Vec<Vec3>, edges: &[[u32; 2]], normals: Vec<Vec3>) -> Self {
        Self {
            geometry: VisualizationGeometry::lines(vertices, edges, normals),
        }
    }

    /// Replaces all arrays; `elements` keeps the current arity.
    pub fn update_geometry(&mut self, vertices: Vec<Vec3>, elements: Vec<u32>, normals: Vec<Vec3>) {
        self.geometry.vertices = vertices;
        self.geometry.elements = elements;
        self.geometry.normals = normals;
    }

    /// Moves the vertices, keeping connectivity and normals.
    pub fn set_vertices(&mut self, vertices: Vec<Vec3>) {
        self.geometry.vertices = vertices;
    }

    pub fn geometry(&self) -> &VisualizationGeometry {
        &self.geometry
    }
}

impl MeshSource for RawMesh {
    fn visualization_geometry(&mut self) -> Result<VisualizationGeometry> {
        self.geometry.validate()?;
        Ok(self.geometry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_normals_face_up() {
        let mut mesh = RawMesh::with_computed_normals(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            &[[0, 1, 2]],
        );
        let geom = mesh.visualization_geometry().unwrap();
        assert_eq!(geom.arity, 3);
        assert!(geom.normals.iter().all(|n| (*n - Vec3::Z).length() < 1e-6));
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut mesh = RawMesh::triangles(vec![Vec3::ZERO], &[[0, 1, 2]], vec![Vec3::Z]);
        assert!(mesh.visualization_geometry().is_err());
    }

    #[test]
    fn test_update_geometry_keeps_arity() {
        let mut mesh = RawMesh::lines(vec![Vec3::ZERO, Vec3::X], &[[0, 1]], vec![Vec3::Z; 2]);
        mesh.update_geometry(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 1, 2],
            vec![Vec3::Z; 3],
        );
        let geom = mesh.visualization_geometry().unwrap();
        assert_eq!(geom.arity, 2);
        assert_eq!(geom.num_elements(), 2);
    }
}
