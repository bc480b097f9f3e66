//! Retained scene graph of a viewer.
//!
//! Geometries and meshes live in arenas keyed by their resource id; the live and
//! ghost groups hold ordered mesh ids. A mesh refers to its geometry through a
//! [`GeometryBinding`], and only owners dispose the geometry they draw.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec3;

use meshview_core::{
    MeshViewError, ModelTransform, ResourceId, ResourceKind, Result, SharedLedger, ViewerOptions,
};

use crate::buffer::{BufferGeometry, GeometryBinding};
use crate::camera::{self, Camera, CameraParams, Controls, Light, LightKind};
use crate::materials::Material;

/// How a mesh's geometry is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MeshKind {
    /// Indexed triangles.
    Mesh,
    /// Indexed line segments.
    LineSegments,
    /// One point per vertex.
    Points,
    /// Vector field arrow glyphs.
    Arrows,
}

/// A drawable object: geometry plus material.
#[derive(Debug)]
pub struct SceneMesh {
    id: ResourceId,
    pub kind: MeshKind,
    pub geometry: GeometryBinding,
    pub material: Rc<Material>,
}

impl SceneMesh {
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// The two display groups under the objects node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Live,
    /// Translucent meshes kept around by `preserve_existing` updates.
    Ghost,
}

/// Render loop state as far as the scene is concerned.
#[derive(Debug)]
pub struct Renderer {
    id: ResourceId,
    pub width: u32,
    pub height: u32,
    paused: bool,
    pending_redraw: bool,
    redraws: u64,
}

impl Renderer {
    fn new(ledger: &SharedLedger, width: u32, height: u32) -> Self {
        Self {
            id: ledger.acquire(ResourceKind::Renderer),
            width,
            height,
            paused: false,
            pending_redraw: false,
            redraws: 0,
        }
    }

    pub fn pause_rendering(&mut self) {
        self.paused = true;
    }

    /// Resumes rendering and redraws immediately.
    pub fn resume_rendering(&mut self) {
        self.paused = false;
        self.pending_redraw = false;
        self.redraws += 1;
    }

    /// Signals that the scene changed. Deferred while paused.
    pub fn request_redraw(&mut self) {
        if self.paused {
            self.pending_redraw = true;
        } else {
            self.redraws += 1;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_pending_redraw(&self) -> bool {
        self.pending_redraw
    }

    /// Number of frames drawn so far.
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }
}

/// Scene graph, camera rig and renderer state of one viewer.
pub struct Scene {
    ledger: SharedLedger,
    geometries: HashMap<ResourceId, BufferGeometry>,
    meshes: HashMap<ResourceId, SceneMesh>,
    live: Vec<ResourceId>,
    ghosts: Vec<ResourceId>,
    group_ids: [ResourceId; 3],
    /// Transform of the objects node holding both groups.
    pub transform: ModelTransform,
    pub camera: Camera,
    pub controls: Controls,
    pub lights: Vec<Light>,
    pub renderer: Renderer,
    pub background: Vec3,
}

impl Scene {
    pub fn new(ledger: SharedLedger, options: &ViewerOptions) -> Self {
        let camera = Camera::new(&ledger, &options.camera, options.aspect());
        let controls = Controls::new(&ledger, &options.controls);
        let lights = vec![
            Light::new(
                &ledger,
                LightKind::Point {
                    position: options.camera.position,
                },
                options.point_light_intensity,
            ),
            Light::new(&ledger, LightKind::Ambient, options.ambient_light_intensity),
        ];
        let renderer = Renderer::new(&ledger, options.width, options.height);
        let group_ids = [
            ledger.acquire(ResourceKind::Group),
            ledger.acquire(ResourceKind::Group),
            ledger.acquire(ResourceKind::Group),
        ];
        Self {
            ledger,
            geometries: HashMap::new(),
            meshes: HashMap::new(),
            live: Vec::new(),
            ghosts: Vec::new(),
            group_ids,
            transform: ModelTransform::default(),
            camera,
            controls,
            lights,
            renderer,
            background: options.background_color,
        }
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    // === Geometry arena ===

    /// Allocates an empty geometry and returns its id.
    pub fn create_geometry(&mut self) -> ResourceId {
        let geom = BufferGeometry::new(&self.ledger);
        let id = geom.id();
        self.geometries.insert(id, geom);
        id
    }

    pub fn geometry(&self, id: ResourceId) -> Option<&BufferGeometry> {
        self.geometries.get(&id)
    }

    /// Mutable access to a geometry; counts as a scene change.
    pub fn geometry_mut(&mut self, id: ResourceId) -> Option<&mut BufferGeometry> {
        self.renderer.request_redraw();
        self.geometries.get_mut(&id)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    // === Mesh arena ===

    /// Creates a mesh (not yet attached to any group).
    pub fn create_mesh(
        &mut self,
        kind: MeshKind,
        geometry: GeometryBinding,
        material: Rc<Material>,
    ) -> ResourceId {
        let id = self.ledger.acquire(ResourceKind::Mesh);
        log::debug!("created {kind:?} mesh {id} on geometry {}", geometry.geometry);
        self.meshes.insert(
            id,
            SceneMesh {
                id,
                kind,
                geometry,
                material,
            },
        );
        id
    }

    pub fn mesh(&self, id: ResourceId) -> Option<&SceneMesh> {
        self.meshes.get(&id)
    }

    pub fn mesh_mut(&mut self, id: ResourceId) -> Option<&mut SceneMesh> {
        self.renderer.request_redraw();
        self.meshes.get_mut(&id)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Ids of every mesh, attached or not.
    pub fn mesh_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self.meshes.keys().copied().collect();
        ids.sort();
        ids
    }

    // === Groups ===

    fn group(&self, group: GroupKind) -> &Vec<ResourceId> {
        match group {
            GroupKind::Live => &self.live,
            GroupKind::Ghost => &self.ghosts,
        }
    }

    fn group_mut(&mut self, group: GroupKind) -> &mut Vec<ResourceId> {
        match group {
            GroupKind::Live => &mut self.live,
            GroupKind::Ghost => &mut self.ghosts,
        }
    }

    pub fn children(&self, group: GroupKind) -> &[ResourceId] {
        self.group(group)
    }

    pub fn contains(&self, group: GroupKind, mesh: ResourceId) -> bool {
        self.group(group).contains(&mesh)
    }

    /// Adds a mesh to a group; a mesh already in the group is left in place.
    pub fn attach(&mut self, group: GroupKind, mesh: ResourceId) -> Result<()> {
        if !self.meshes.contains_key(&mesh) {
            return Err(MeshViewError::InvariantViolation(format!(
                "attaching unknown mesh {mesh}"
            )));
        }
        if !self.contains(group, mesh) {
            self.group_mut(group).push(mesh);
            self.renderer.request_redraw();
        }
        Ok(())
    }

    /// Removes a mesh from a group. Returns whether it was there.
    pub fn detach(&mut self, group: GroupKind, mesh: ResourceId) -> bool {
        let children = self.group_mut(group);
        let before = children.len();
        children.retain(|&m| m != mesh);
        let removed = children.len() != before;
        if removed {
            self.renderer.request_redraw();
        }
        removed
    }

    /// Replaces a group's children.
    pub fn set_children(&mut self, group: GroupKind, meshes: Vec<ResourceId>) -> Result<()> {
        if let Some(bad) = meshes.iter().find(|&m| !self.meshes.contains_key(m)) {
            return Err(MeshViewError::InvariantViolation(format!(
                "attaching unknown mesh {bad}"
            )));
        }
        *self.group_mut(group) = meshes;
        self.renderer.request_redraw();
        Ok(())
    }

    // === Disposal ===

    /// Removes a mesh from the scene and releases it, along with its geometry if it owns it.
    pub fn dispose_mesh(&mut self, id: ResourceId) -> Result<()> {
        let mesh = self
            .meshes
            .remove(&id)
            .ok_or_else(|| MeshViewError::InvariantViolation(format!("disposing unknown mesh {id}")))?;
        self.live.retain(|&m| m != id);
        self.ghosts.retain(|&m| m != id);
        if mesh.geometry.is_owner() {
            if let Some(geom) = self.geometries.remove(&mesh.geometry.geometry) {
                geom.dispose(&self.ledger)?;
            }
        }
        self.renderer.request_redraw();
        self.ledger.release(id)
    }

    /// Disposes every mesh in a group and empties it.
    pub fn clean_group(&mut self, group: GroupKind) -> Result<()> {
        let meshes = std::mem::take(self.group_mut(group));
        if !meshes.is_empty() {
            log::debug!("cleaning {} meshes from {group:?} group", meshes.len());
        }
        for mesh in meshes {
            self.dispose_mesh(mesh)?;
        }
        Ok(())
    }

    // === View ===

    pub fn camera_params(&self) -> CameraParams {
        (self.camera.position, self.camera.up, self.controls.target)
    }

    pub fn set_camera_params(&mut self, (position, up, target): CameraParams) {
        self.camera.position = position;
        self.camera.up = up;
        self.controls.target = target;
        self.camera.look_at(target);
        self.renderer.request_redraw();
    }

    pub fn target_depth(&self) -> f32 {
        camera::target_depth(&self.camera, &self.controls)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.width = width;
        self.renderer.height = height;
        self.camera.aspect = width as f32 / height.max(1) as f32;
        self.renderer.request_redraw();
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if !self.meshes.is_empty() {
            log::warn!("scene dropped with {} undisposed meshes", self.meshes.len());
            for id in self.mesh_ids() {
                if let Err(e) = self.dispose_mesh(id) {
                    log::warn!("failed to dispose mesh {id}: {e}");
                }
            }
        }
        for (_, geom) in self.geometries.drain() {
            if let Err(e) = geom.dispose(&self.ledger) {
                log::warn!("failed to dispose geometry: {e}");
            }
        }
        let mut released = camera::dispose_view(&self.ledger, &self.camera, &self.controls, &self.lights);
        let nodes = self.group_ids.iter().copied().chain(std::iter::once(self.renderer.id));
        for id in nodes {
            released = released.and(self.ledger.release(id));
        }
        if let Err(e) = released {
            log::warn!("failed to release scene nodes: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferAttribute;
    use crate::materials::MaterialDescriptor;
    use meshview_core::{AttributeData, AttributeKey, ResourceLedger};

    fn scene() -> (SharedLedger, Scene) {
        let ledger = ResourceLedger::shared();
        let scene = Scene::new(ledger.clone(), &ViewerOptions::default());
        (ledger, scene)
    }

    fn material(ledger: &SharedLedger) -> Rc<Material> {
        Rc::new(Material::new(ledger, MaterialDescriptor::wireframe(Vec3::ZERO)))
    }

    #[test]
    fn test_attach_detach() {
        let (ledger, mut scene) = scene();
        let geom = scene.create_geometry();
        let mesh = scene.create_mesh(MeshKind::Mesh, GeometryBinding::owned(geom), material(&ledger));
        scene.attach(GroupKind::Live, mesh).unwrap();
        scene.attach(GroupKind::Live, mesh).unwrap();
        assert_eq!(scene.children(GroupKind::Live), &[mesh]);
        assert!(scene.detach(GroupKind::Live, mesh));
        assert!(!scene.detach(GroupKind::Live, mesh));
        scene.dispose_mesh(mesh).unwrap();
    }

    #[test]
    fn test_borrower_does_not_dispose_geometry() {
        let (ledger, mut scene) = scene();
        let geom = scene.create_geometry();
        scene.geometry_mut(geom).unwrap().insert_attribute(
            AttributeKey::Position,
            BufferAttribute::new(&ledger, AttributeData::from_vec3(&[Vec3::ZERO])),
        );
        let mat = material(&ledger);
        let owner = scene.create_mesh(MeshKind::Mesh, GeometryBinding::owned(geom), mat.clone());
        let borrower = scene.create_mesh(MeshKind::Points, GeometryBinding::borrowed(geom), mat);
        scene.attach(GroupKind::Live, owner).unwrap();
        scene.attach(GroupKind::Live, borrower).unwrap();

        scene.dispose_mesh(borrower).unwrap();
        assert!(scene.geometry(geom).is_some());
        scene.clean_group(GroupKind::Live).unwrap();
        assert!(scene.geometry(geom).is_none());
        assert!(scene.children(GroupKind::Live).is_empty());
        assert_eq!(ledger.live_of(ResourceKind::BufferAttribute), 0);
        assert_eq!(ledger.live_of(ResourceKind::Geometry), 0);
    }

    #[test]
    fn test_renderer_pause_defers_redraw() {
        let (_ledger, mut scene) = scene();
        scene.renderer.pause_rendering();
        let before = scene.renderer.redraw_count();
        scene.resize(100, 50);
        assert_eq!(scene.renderer.redraw_count(), before);
        assert!(scene.renderer.has_pending_redraw());
        scene.renderer.resume_rendering();
        assert_eq!(scene.renderer.redraw_count(), before + 1);
        assert_eq!(scene.camera.aspect, 2.0);
    }

    #[test]
    fn test_camera_params_round_trip() {
        let (_ledger, mut scene) = scene();
        let params = (Vec3::new(1.0, 2.0, 3.0), Vec3::Z, Vec3::X);
        scene.set_camera_params(params);
        assert_eq!(scene.camera_params(), params);
        assert_eq!(scene.camera.look_at, Vec3::X);
    }

    #[test]
    fn test_drop_releases_scene_nodes() {
        let (ledger, scene) = scene();
        assert!(ledger.live_count() > 0);
        drop(scene);
        assert_eq!(ledger.live_count(), 0);
    }
}
