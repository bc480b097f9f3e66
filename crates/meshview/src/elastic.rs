//! Viewing deformed elastic structures.

use std::ops::{Deref, DerefMut};

use glam::Vec3;

use meshview_core::{compute_vertex_normals, Result, ViewerOptions, VisualizationGeometry};

use crate::mesh::MeshSource;
use crate::tri_mesh::TriMeshViewer;
use crate::viewer::UpdateOptions;

/// A simulated structure with a triangulated surface.
pub trait ElasticStructure {
    /// Surface triangles; fixed over the structure's lifetime.
    fn elements(&self) -> Vec<[u32; 3]>;

    /// Current vertex positions.
    fn deformed_vertices(&self) -> Vec<Vec3>;
}

/// Mesh source reading the structure's current deformation.
pub struct DeformedMesh<E> {
    structure: E,
    elements: Vec<u32>,
}

impl<E: ElasticStructure> DeformedMesh<E> {
    pub fn new(structure: E) -> Self {
        let elements = structure.elements().into_iter().flatten().collect();
        Self {
            structure,
            elements,
        }
    }

    pub fn structure(&self) -> &E {
        &self.structure
    }

    pub fn structure_mut(&mut self) -> &mut E {
        &mut self.structure
    }
}

impl<E: ElasticStructure> MeshSource for DeformedMesh<E> {
    fn visualization_geometry(&mut self) -> Result<VisualizationGeometry> {
        let vertices = self.structure.deformed_vertices();
        let normals = compute_vertex_normals(&vertices, &self.elements);
        let geometry = VisualizationGeometry {
            vertices,
            elements: self.elements.clone(),
            arity: 3,
            normals,
        };
        geometry.validate()?;
        Ok(geometry)
    }
}

/// Triangle viewer that re-reads the structure's deformation on every update.
pub struct ElasticStructureViewer<E: ElasticStructure>(TriMeshViewer<DeformedMesh<E>>);

impl<E: ElasticStructure> ElasticStructureViewer<E> {
    pub fn new(structure: E, options: ViewerOptions, init: UpdateOptions) -> Result<Self> {
        TriMeshViewer::new(DeformedMesh::new(structure), options, init).map(Self)
    }

    pub fn structure(&self) -> &E {
        self.0.source().structure()
    }

    /// Mutable access for advancing the simulation between updates.
    pub fn structure_mut(&mut self) -> &mut E {
        self.0.source_mut().structure_mut()
    }
}

impl<E: ElasticStructure> Deref for ElasticStructureViewer<E> {
    type Target = TriMeshViewer<DeformedMesh<E>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E: ElasticStructure> DerefMut for ElasticStructureViewer<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::{AttributeKey, ResourceKind};

    /// A single triangle stretched along X.
    struct Membrane {
        stretch: f32,
    }

    impl ElasticStructure for Membrane {
        fn elements(&self) -> Vec<[u32; 3]> {
            vec![[0, 1, 2]]
        }

        fn deformed_vertices(&self) -> Vec<Vec3> {
            vec![Vec3::ZERO, Vec3::X * self.stretch, Vec3::Y]
        }
    }

    #[test]
    fn test_update_pulls_deformation() {
        let mut viewer = ElasticStructureViewer::new(
            Membrane { stretch: 1.0 },
            ViewerOptions::default(),
            UpdateOptions::new(),
        )
        .unwrap();
        viewer.structure_mut().stretch = 3.0;
        viewer.update(UpdateOptions::new()).unwrap();

        let positions = viewer
            .current_geometry()
            .unwrap()
            .attribute(AttributeKey::Position)
            .unwrap();
        assert_eq!(positions.data().floats().unwrap()[3], 3.0);
        assert_eq!(positions.version(), 1);
        // Positions are updated in place.
        assert_eq!(viewer.ledger().allocated(ResourceKind::Geometry), 1);
    }
}
