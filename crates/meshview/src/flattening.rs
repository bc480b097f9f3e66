//! Animated flattening of a mesh onto its parametrization.
//!
//! The current geometry gets one morph target holding the flat positions (with
//! normals facing +Z), and a ping-pong animation blends between the mesh and
//! its flattening.

use std::path::Path;
use std::rc::Rc;

use glam::{Vec2, Vec3};

use meshview_core::{AttributeData, AttributeKey, MeshViewError, ResourceId, Result, ViewerOptions};
use meshview_render::{
    flattening_track, AnimationAction, AnimationClip, BufferAttribute, BufferGeometry, DomainType,
    GeometryBinding, GroupKind, LoopMode, MeshKind, SceneDocument, TextureMap,
};

use crate::mesh::MeshSource;
use crate::tri_mesh::TriMeshViewer;
use crate::viewer::UpdateOptions;

/// Number of keyframes in the blend-weight track.
const FLATTENING_KEYFRAMES: usize = 20;

/// Default animation duration in seconds.
pub const DEFAULT_DURATION: f32 = 5.0;

/// Target positions of the flattened mesh, one per vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatPositions {
    /// 2D coordinates, placed in the z = 0 plane.
    Planar(Vec<Vec2>),
    Spatial(Vec<Vec3>),
}

impl FlatPositions {
    pub fn len(&self) -> usize {
        match self {
            Self::Planar(uv) => uv.len(),
            Self::Spatial(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_positions(&self) -> Vec<Vec3> {
        match self {
            Self::Planar(uv) => uv.iter().map(|p| p.extend(0.0)).collect(),
            Self::Spatial(p) => p.clone(),
        }
    }
}

impl From<Vec<Vec2>> for FlatPositions {
    fn from(uv: Vec<Vec2>) -> Self {
        Self::Planar(uv)
    }
}

impl From<Vec<Vec3>> for FlatPositions {
    fn from(positions: Vec<Vec3>) -> Self {
        Self::Spatial(positions)
    }
}

/// A triangle mesh viewer playing the flattening animation.
pub struct FlatteningAnimation<S: MeshSource> {
    viewer: TriMeshViewer<S>,
    flat_positions: Vec<Vec3>,
    action: AnimationAction,
    flattening_mesh: ResourceId,
}

impl<S: MeshSource> FlatteningAnimation<S> {
    pub fn new(
        source: S,
        flat: impl Into<FlatPositions>,
        options: ViewerOptions,
        duration: f32,
        texture_map: Option<Rc<TextureMap>>,
    ) -> Result<Self> {
        let flat_positions = flat.into().to_positions();
        let init = match texture_map {
            Some(tex) => UpdateOptions::new().with_texture_map(tex),
            None => UpdateOptions::new(),
        };
        let mut viewer = TriMeshViewer::new(source, options, init)?;
        let flattening_mesh = bind_flattening(&mut viewer, &flat_positions, None)?;

        let track = flattening_track(duration, FLATTENING_KEYFRAMES)?;
        let action = AnimationAction::new(
            viewer.ledger(),
            AnimationClip::new("flattening", vec![track]),
            flattening_mesh,
            LoopMode::PingPong,
        );
        log::debug!("flattening animation on mesh {flattening_mesh}, {duration}s");

        Ok(Self {
            viewer,
            flat_positions,
            action,
            flattening_mesh,
        })
    }

    /// Pulls a fresh frame from the source and re-targets the flattening onto it.
    ///
    /// The frame must keep one vertex per flat position, so per-element scalar
    /// fields (which unshare corners) are rejected before anything changes.
    pub fn update(&mut self, opts: UpdateOptions) -> Result<()> {
        let geometry = self.viewer.source_mut().visualization_geometry()?;
        let nv = geometry.num_vertices();
        if nv != self.flat_positions.len() {
            return Err(MeshViewError::size_mismatch(
                "flat positions",
                nv,
                self.flat_positions.len(),
            ));
        }
        if let Some(field) = &opts.scalar_field {
            if field.validate_size(nv, geometry.num_elements())? == DomainType::PerElement {
                return Err(MeshViewError::InvalidGeometry(
                    "per-element scalar fields cannot be flattened".into(),
                ));
            }
        }
        self.viewer.set_geometry(geometry, opts)?;
        bind_flattening(&mut self.viewer, &self.flat_positions, Some(self.flattening_mesh))?;
        Ok(())
    }

    pub fn show_wireframe(&mut self, show: bool) -> Result<()> {
        self.viewer.show_wireframe(show)
    }

    pub fn show_points(&mut self, show: bool, size: f32) -> Result<()> {
        self.viewer.show_points(show, size)
    }

    pub fn viewer(&self) -> &TriMeshViewer<S> {
        &self.viewer
    }

    pub fn action(&self) -> &AnimationAction {
        &self.action
    }

    pub fn flattening_mesh(&self) -> ResourceId {
        self.flattening_mesh
    }

    /// Captures the scene together with the animation.
    pub fn show(&self) -> Result<SceneDocument> {
        self.viewer.show()?.with_animation(&self.action)
    }

    pub fn export_html(&self, path: impl AsRef<Path>) -> Result<()> {
        self.show()?.write_html(path)
    }
}

impl<S: MeshSource> Drop for FlatteningAnimation<S> {
    fn drop(&mut self) {
        if let Err(e) = self.action.dispose(self.viewer.ledger()) {
            log::warn!("failed to dispose flattening animation: {e}");
        }
    }
}

/// Gives the current geometry its flat morph targets and shows it through the
/// flattening mesh in place of the current mesh.
///
/// Creates the flattening mesh when `flattening_mesh` is `None`, otherwise
/// repoints it at the current geometry.
fn bind_flattening<S: MeshSource>(
    viewer: &mut TriMeshViewer<S>,
    flat_positions: &[Vec3],
    flattening_mesh: Option<ResourceId>,
) -> Result<ResourceId> {
    let current = viewer.current_mesh().ok_or(MeshViewError::NoCurrentMesh)?;
    let (geom_id, material) = viewer
        .scene()
        .mesh(current)
        .map(|m| (m.geometry.geometry, Rc::clone(&m.material)))
        .ok_or(MeshViewError::NoCurrentMesh)?;
    let num_vertices = viewer.current_geometry().map_or(0, BufferGeometry::vertex_count);
    if flat_positions.len() != num_vertices {
        return Err(MeshViewError::size_mismatch(
            "flat positions",
            num_vertices,
            flat_positions.len(),
        ));
    }

    let ledger = Rc::clone(viewer.ledger());
    let flat_pos = BufferAttribute::new(&ledger, AttributeData::from_vec3(flat_positions));
    let flat_normals =
        BufferAttribute::new(&ledger, AttributeData::from_vec3(&vec![Vec3::Z; num_vertices]));
    let morph_material = viewer.library_mut().morph_material(&material);

    let scene = viewer.scene_mut();
    let geom = scene
        .geometry_mut(geom_id)
        .ok_or(MeshViewError::NoCurrentMesh)?;
    let replaced = geom
        .set_morph_attributes(AttributeKey::Position, vec![flat_pos])
        .into_iter()
        .chain(geom.set_morph_attributes(AttributeKey::Normal, vec![flat_normals]));
    for attr in replaced {
        attr.dispose(&ledger)?;
    }

    if let Some(mesh) = scene.mesh_mut(current) {
        mesh.material = Rc::clone(&morph_material);
    }
    let flattening_mesh = match flattening_mesh {
        Some(id) => {
            let mesh = scene.mesh_mut(id).ok_or_else(|| {
                MeshViewError::InvariantViolation(format!("flattening mesh {id} vanished"))
            })?;
            mesh.geometry = GeometryBinding::borrowed(geom_id);
            mesh.material = morph_material;
            id
        }
        None => scene.create_mesh(
            MeshKind::Mesh,
            GeometryBinding::borrowed(geom_id),
            morph_material,
        ),
    };
    scene.detach(GroupKind::Live, current);
    scene.attach(GroupKind::Live, flattening_mesh)?;
    Ok(flattening_mesh)
}
