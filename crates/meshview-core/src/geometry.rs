//! Visualization geometry handed to a viewer by a mesh source.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{MeshViewError, Result};

/// Vertices, element indices and normals of a mesh to display.
///
/// `elements` is flattened with `arity` indices per element: 3 for triangles,
/// 2 for line segments.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationGeometry {
    pub vertices: Vec<Vec3>,
    pub elements: Vec<u32>,
    pub arity: usize,
    pub normals: Vec<Vec3>,
}

impl VisualizationGeometry {
    /// Builds triangle geometry.
    pub fn triangles(vertices: Vec<Vec3>, faces: &[[u32; 3]], normals: Vec<Vec3>) -> Self {
        Self {
            vertices,
            elements: faces.iter().flatten().copied().collect(),
            arity: 3,
            normals,
        }
    }

    /// Builds line-segment geometry.
    pub fn lines(vertices: Vec<Vec3>, edges: &[[u32; 2]], normals: Vec<Vec3>) -> Self {
        Self {
            vertices,
            elements: edges.iter().flatten().copied().collect(),
            arity: 2,
            normals,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len() / self.arity.max(1)
    }

    /// Checks array shapes and index bounds.
    pub fn validate(&self) -> Result<()> {
        if self.arity < 2 || self.arity > 3 {
            return Err(MeshViewError::InvalidGeometry(format!(
                "unsupported element arity {}",
                self.arity
            )));
        }
        if self.elements.len() % self.arity != 0 {
            return Err(MeshViewError::InvalidGeometry(format!(
                "{} indices do not form whole elements of arity {}",
                self.elements.len(),
                self.arity
            )));
        }
        if self.normals.len() != self.vertices.len() {
            return Err(MeshViewError::size_mismatch(
                "normals",
                self.vertices.len(),
                self.normals.len(),
            ));
        }
        let n = self.vertices.len();
        if let Some(&bad) = self.elements.iter().find(|&&i| i as usize >= n) {
            return Err(MeshViewError::InvalidGeometry(format!(
                "element index {bad} out of range for {n} vertices"
            )));
        }
        Ok(())
    }

    /// Centroid of every element.
    pub fn element_centroids(&self) -> Vec<Vec3> {
        let k = self.arity.max(1);
        self.elements
            .chunks(k)
            .map(|e| e.iter().map(|&i| self.vertices[i as usize]).sum::<Vec3>() / k as f32)
            .collect()
    }
}

/// Computes vertex normals as the area-weighted average of incident triangle normals.
///
/// Vertices not touched by any triangle get a zero normal.
pub fn compute_vertex_normals(vertices: &[Vec3], triangles: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; vertices.len()];
    for tri in triangles.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        // Cross product length is twice the area, so this is already area weighted.
        let n = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    for normal in &mut normals {
        *normal = normal.normalize_or_zero();
    }
    normals
}

/// Uniform scale and translation that centers a mesh and fits it in `[-1, 1]^3`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelTransform {
    pub scale: f32,
    pub position: Vec3,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            position: Vec3::ZERO,
        }
    }
}

impl ModelTransform {
    /// Centers on the vertex mean and scales the largest coordinate magnitude to 1.
    pub fn fit(vertices: &[Vec3]) -> Self {
        if vertices.is_empty() {
            return Self::default();
        }
        let translate = -vertices.iter().copied().sum::<Vec3>() / vertices.len() as f32;
        let bb_size = vertices
            .iter()
            .map(|&v| (v + translate).abs().max_element())
            .fold(0.0_f32, f32::max);
        if bb_size <= f32::EPSILON {
            return Self {
                scale: 1.0,
                position: translate,
            };
        }
        let scale = 2.0 / bb_size;
        Self {
            scale,
            position: scale * translate,
        }
    }

    pub fn apply(&self, p: Vec3) -> Vec3 {
        self.scale * p + self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> VisualizationGeometry {
        VisualizationGeometry::triangles(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            &[[0, 1, 2], [0, 2, 3]],
            vec![Vec3::Z; 4],
        )
    }

    #[test]
    fn test_counts() {
        let g = quad();
        assert_eq!(g.num_vertices(), 4);
        assert_eq!(g.num_elements(), 2);
        g.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mut g = quad();
        g.elements[5] = 9;
        assert!(matches!(g.validate(), Err(MeshViewError::InvalidGeometry(_))));
    }

    #[test]
    fn test_validate_rejects_normal_count() {
        let mut g = quad();
        g.normals.pop();
        assert!(matches!(
            g.validate(),
            Err(MeshViewError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_vertex_normals_flat_quad() {
        let g = quad();
        let normals = compute_vertex_normals(&g.vertices, &g.elements);
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn test_centroids() {
        let g = VisualizationGeometry::lines(vec![Vec3::ZERO, Vec3::X * 2.0], &[[0, 1]], vec![Vec3::Z; 2]);
        assert_eq!(g.element_centroids(), vec![Vec3::X]);
    }

    #[test]
    fn test_model_transform_fit() {
        let t = ModelTransform::fit(&[Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 1.0, 1.0)]);
        // Mean is (2,1,1); largest offset is 1, so scale is 2.
        assert_eq!(t.scale, 2.0);
        assert!((t.apply(Vec3::new(3.0, 1.0, 1.0)) - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_model_transform_degenerate() {
        let t = ModelTransform::fit(&[Vec3::ONE, Vec3::ONE]);
        assert_eq!(t.scale, 1.0);
    }
}
