//! The viewer: scene ownership and the update pipeline.
//!
//! A [`Viewer`] keeps one *current* mesh bound to a geometry whose buffer
//! attributes are updated in place across frames. Optional attributes (`index`,
//! `color`, `uv`) that a frame does not need are moved to a stash instead of
//! being destroyed, and are reused when a later frame needs them again. An
//! attribute key is attached to the current geometry or stashed, never both.
//!
//! Updates with `preserve_existing` turn the current mesh (and a displayed
//! vector field) into a translucent ghost; the next non-preserving update
//! disposes every ghost.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use glam::Vec3;

use meshview_core::{
    replicate_per_corner, AttributeData, AttributeKey, MeshViewError, ModelTransform, RawAttributes,
    ResourceId, ResourceLedger, Result, SharedLedger, ViewerOptions, VisualizationGeometry,
};
use meshview_render::{
    set_arrow_alpha, ArrowGlyphs, BufferAttribute, BufferGeometry, CameraParams, ColorMapRegistry,
    DomainType, GeometryBinding, GroupKind, Material, MaterialDescriptor, MaterialLibrary, MeshKind,
    ScalarField, Scene, SceneDocument, TextureMap, VectorField, GHOST_OPACITY,
};

use crate::mesh::MeshSource;

/// Whether a viewer draws triangles or line segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshStyle {
    Triangles,
    Lines,
}

impl MeshStyle {
    pub fn arity(self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Lines => 2,
        }
    }

    pub fn mesh_kind(self) -> MeshKind {
        match self {
            Self::Triangles => MeshKind::Mesh,
            Self::Lines => MeshKind::LineSegments,
        }
    }

    pub fn is_line_mesh(self) -> bool {
        self == Self::Lines
    }
}

/// Per-update settings.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Keep the current mesh around as a translucent ghost.
    pub preserve_existing: bool,
    /// Recenter and rescale the displayed objects to fit the new vertices.
    pub update_model_matrix: bool,
    pub texture_map: Option<Rc<TextureMap>>,
    pub scalar_field: Option<ScalarField>,
    pub vector_field: Option<VectorField>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preserve_existing(mut self, preserve: bool) -> Self {
        self.preserve_existing = preserve;
        self
    }

    pub fn update_model_matrix(mut self, update: bool) -> Self {
        self.update_model_matrix = update;
        self
    }

    pub fn with_texture_map(mut self, texture_map: Rc<TextureMap>) -> Self {
        self.texture_map = Some(texture_map);
        self
    }

    pub fn with_scalar_field(mut self, field: impl Into<ScalarField>) -> Self {
        self.scalar_field = Some(field.into());
        self
    }

    pub fn with_vector_field(mut self, field: impl Into<VectorField>) -> Self {
        self.vector_field = Some(field.into());
        self
    }
}

/// Interactive viewer of one mesh source.
pub struct Viewer<S: MeshSource> {
    source: S,
    style: MeshStyle,
    options: ViewerOptions,
    ledger: SharedLedger,
    scene: Scene,
    library: MaterialLibrary,
    color_maps: ColorMapRegistry,
    stash: BTreeMap<AttributeKey, BufferAttribute>,
    current: Option<ResourceId>,
    wireframe: Option<ResourceId>,
    points: Option<ResourceId>,
    vector_field_mesh: Option<ResourceId>,
    wireframe_material: Option<Rc<Material>>,
    points_material: Option<Rc<Material>>,
    arrow_material: Option<Rc<Material>>,
    arrow_size: f32,
    /// Textures the live and ghost materials may sample.
    textures: Vec<Rc<TextureMap>>,
}

impl<S: MeshSource> Viewer<S> {
    /// Creates a viewer and displays the source's first frame, fitted to the view.
    pub fn new(source: S, style: MeshStyle, options: ViewerOptions, init: UpdateOptions) -> Result<Self> {
        let ledger = ResourceLedger::shared();
        let scene = Scene::new(Rc::clone(&ledger), &options);
        let library = MaterialLibrary::new(Rc::clone(&ledger), style.is_line_mesh());
        let mut viewer = Self {
            source,
            style,
            arrow_size: options.arrow_size,
            options,
            ledger,
            scene,
            library,
            color_maps: ColorMapRegistry::new(),
            stash: BTreeMap::new(),
            current: None,
            wireframe: None,
            points: None,
            vector_field_mesh: None,
            wireframe_material: None,
            points_material: None,
            arrow_material: None,
            textures: Vec::new(),
        };
        log::debug!("created {:?} viewer", style);
        viewer.update(UpdateOptions {
            preserve_existing: true,
            update_model_matrix: true,
            ..init
        })?;
        Ok(viewer)
    }

    /// Pulls a fresh geometry from the source and displays it.
    pub fn update(&mut self, opts: UpdateOptions) -> Result<()> {
        let geometry = self.source.visualization_geometry()?;
        self.set_geometry(geometry, opts)
    }

    /// Swaps in a new source, then displays it. Returns the previous source.
    pub fn update_with_source(&mut self, source: S, opts: UpdateOptions) -> Result<S> {
        let previous = std::mem::replace(&mut self.source, source);
        self.update(opts)?;
        Ok(previous)
    }

    /// Displays `geometry`, reusing the current mesh's buffers where possible.
    pub fn set_geometry(&mut self, geometry: VisualizationGeometry, opts: UpdateOptions) -> Result<()> {
        geometry.validate()?;
        if geometry.arity != self.style.arity() {
            return Err(MeshViewError::InvalidGeometry(format!(
                "{:?} viewer cannot display elements of arity {}",
                self.style, geometry.arity
            )));
        }

        // Validate everything before touching the scene.
        let (nv, ne) = (geometry.num_vertices(), geometry.num_elements());
        let scalar_domain = opts
            .scalar_field
            .as_ref()
            .map(|f| f.validate_size(nv, ne))
            .transpose()?;
        let vector_domain = opts
            .vector_field
            .as_ref()
            .map(|f| f.validate_size(nv, ne))
            .transpose()?;
        if let Some(tex) = &opts.texture_map {
            if tex.uv().len() != nv {
                return Err(MeshViewError::size_mismatch("texture uv", nv, tex.uv().len()));
            }
        }

        if opts.update_model_matrix {
            self.scene.transform = ModelTransform::fit(&geometry.vertices);
            log::debug!(
                "model transform: scale {}, position {}",
                self.scene.transform.scale,
                self.scene.transform.position
            );
        }

        let mut raw = RawAttributes::new();
        raw.insert(AttributeKey::Position, AttributeData::from_vec3(&geometry.vertices));
        raw.insert(AttributeKey::Index, AttributeData::from_indices(&geometry.elements));
        raw.insert(AttributeKey::Normal, AttributeData::from_vec3(&geometry.normals));
        if let Some(tex) = &opts.texture_map {
            raw.insert(AttributeKey::Uv, AttributeData::from_vec2(tex.uv()));
        }

        let mut use_vertex_colors = false;
        if let (Some(field), Some(domain)) = (&opts.scalar_field, scalar_domain) {
            let colors = field.colors(&self.color_maps, &self.options.color_map);
            raw.insert(AttributeKey::Color, AttributeData::from_vec3(&colors));
            if domain == DomainType::PerElement {
                // Per-element colors need unshared corners.
                replicate_per_corner(&mut raw, geometry.arity, true)?;
            }
            use_vertex_colors = true;
        }

        let avoid_flicker = self.options.avoid_redraw_flicker;
        if avoid_flicker {
            self.scene.renderer.pause_rendering();
        }
        let result = self.apply_frame(&geometry, raw, use_vertex_colors, vector_domain, &opts);
        if avoid_flicker {
            self.scene.renderer.resume_rendering();
        }
        result
    }

    fn apply_frame(
        &mut self,
        geometry: &VisualizationGeometry,
        raw: RawAttributes,
        use_vertex_colors: bool,
        vector_domain: Option<DomainType>,
        opts: &UpdateOptions,
    ) -> Result<()> {
        if opts.preserve_existing && self.current.is_some() {
            self.ghost_current()?;
        } else {
            self.scene.clean_group(GroupKind::Ghost)?;
            self.textures.clear();
        }
        if let Some(tex) = &opts.texture_map {
            if !self.textures.iter().any(|t| t.id() == tex.id()) {
                self.textures.push(Rc::clone(tex));
            }
        }

        let material = self
            .library
            .material(use_vertex_colors, opts.texture_map.as_ref().map(|t| t.id()));

        let geom_id = self.bind_attributes(raw, material)?;
        self.check_stash_exclusion()?;

        // Overlays follow the (possibly new) current geometry.
        for overlay in [self.wireframe, self.points].into_iter().flatten() {
            if let Some(mesh) = self.scene.mesh_mut(overlay) {
                mesh.geometry = GeometryBinding::borrowed(geom_id);
            }
        }

        match (&opts.vector_field, vector_domain) {
            (Some(field), Some(domain)) => self.show_vector_field(geometry, field, domain)?,
            _ => {
                if let Some(vf) = self.vector_field_mesh {
                    self.scene.detach(GroupKind::Live, vf);
                }
            }
        }
        Ok(())
    }

    /// Moves the current mesh, and a displayed vector field, to the ghost group.
    fn ghost_current(&mut self) -> Result<()> {
        let Some(old) = self.current.take() else {
            return Ok(());
        };
        let mesh = self.scene.mesh(old).ok_or(MeshViewError::NoCurrentMesh)?;
        let ghost = self.library.ghost_material(&mesh.material);
        if let Some(mesh) = self.scene.mesh_mut(old) {
            mesh.material = ghost;
        }
        self.scene.detach(GroupKind::Live, old);
        self.scene.attach(GroupKind::Ghost, old)?;
        log::debug!("ghosted mesh {old}");

        if let Some(vf) = self
            .vector_field_mesh
            .filter(|&vf| self.scene.contains(GroupKind::Live, vf))
        {
            self.vector_field_mesh = None;
            if let Some(mesh) = self.scene.mesh(vf) {
                mesh.material.update_uniforms(|u| u.transparent = true);
                let geom_id = mesh.geometry.geometry;
                if let Some(colors) = self
                    .scene
                    .geometry_mut(geom_id)
                    .and_then(|g| g.attribute_mut(AttributeKey::ArrowColor))
                {
                    colors.update_array(|data| set_arrow_alpha(data, GHOST_OPACITY));
                }
            }
            self.scene.detach(GroupKind::Live, vf);
            self.scene.attach(GroupKind::Ghost, vf)?;
            log::debug!("ghosted vector field mesh {vf}");
        }
        Ok(())
    }

    /// Binds the frame's attributes to the current geometry, creating the current mesh if needed.
    fn bind_attributes(&mut self, mut raw: RawAttributes, material: Rc<Material>) -> Result<ResourceId> {
        match self.current {
            None => {
                let geom_id = self.scene.create_geometry();
                let geom = self
                    .scene
                    .geometry_mut(geom_id)
                    .ok_or_else(|| MeshViewError::InvariantViolation(format!("geometry {geom_id} vanished")))?;
                for key in AttributeKey::STASHABLE {
                    allocate_update_or_stash(geom, &mut self.stash, &self.ledger, key, &mut raw)?;
                }
                for (key, data) in raw {
                    geom.insert_attribute(key, BufferAttribute::new(&self.ledger, data));
                }
                let mesh = self
                    .scene
                    .create_mesh(self.style.mesh_kind(), GeometryBinding::owned(geom_id), material);
                self.scene.attach(GroupKind::Live, mesh)?;
                self.current = Some(mesh);
                Ok(geom_id)
            }
            Some(mesh_id) => {
                let geom_id = self
                    .scene
                    .mesh(mesh_id)
                    .map(|m| m.geometry.geometry)
                    .ok_or(MeshViewError::NoCurrentMesh)?;
                let geom = self
                    .scene
                    .geometry_mut(geom_id)
                    .ok_or_else(|| MeshViewError::InvariantViolation(format!("geometry {geom_id} vanished")))?;
                for key in [AttributeKey::Position, AttributeKey::Normal] {
                    if let Some(data) = raw.remove(&key) {
                        replace_or_insert(geom, &self.ledger, key, data);
                    }
                }
                for key in AttributeKey::STASHABLE {
                    allocate_update_or_stash(geom, &mut self.stash, &self.ledger, key, &mut raw)?;
                }
                if let Some(mesh) = self.scene.mesh_mut(mesh_id) {
                    mesh.material = material;
                }
                Ok(geom_id)
            }
        }
    }

    fn show_vector_field(
        &mut self,
        geometry: &VisualizationGeometry,
        field: &VectorField,
        domain: DomainType,
    ) -> Result<()> {
        let colors = field.colors(&self.color_maps, &self.options.color_map);
        let glyphs = ArrowGlyphs::build(domain, geometry, field.vectors(), colors);
        let ledger = &self.ledger;
        let material = Rc::clone(
            self.arrow_material
                .get_or_insert_with(|| Rc::new(Material::new(ledger, MaterialDescriptor::arrow()))),
        );

        let vf = match self.vector_field_mesh {
            Some(vf) => {
                let geom_id = self
                    .scene
                    .mesh(vf)
                    .map(|m| m.geometry.geometry)
                    .ok_or_else(|| MeshViewError::InvariantViolation(format!("vector field mesh {vf} vanished")))?;
                if let Some(geom) = self.scene.geometry_mut(geom_id) {
                    for (key, data) in glyphs.to_attributes() {
                        replace_or_insert(geom, &self.ledger, key, data);
                    }
                }
                vf
            }
            None => {
                let geom_id = self.scene.create_geometry();
                if let Some(geom) = self.scene.geometry_mut(geom_id) {
                    for (key, data) in glyphs.to_attributes() {
                        geom.insert_attribute(key, BufferAttribute::new(&self.ledger, data));
                    }
                }
                let vf = self.scene.create_mesh(
                    MeshKind::Arrows,
                    GeometryBinding::owned(geom_id),
                    Rc::clone(&material),
                );
                self.vector_field_mesh = Some(vf);
                vf
            }
        };

        let (size, width, depth) = (
            self.arrow_size,
            self.scene.renderer.width as f32,
            self.scene.target_depth(),
        );
        let offset = field.align().relative_offset();
        material.update_uniforms(|u| {
            u.arrow.arrow_size_px_x = size;
            u.arrow.renderer_width = width;
            u.arrow.target_depth = depth;
            u.arrow.arrow_alignment = offset;
        });
        self.scene.controls.shader_material = Some(material);
        self.scene.attach(GroupKind::Live, vf)
    }

    /// Fails if any attribute key is both attached to the current geometry and stashed.
    pub fn check_stash_exclusion(&self) -> Result<()> {
        let live = self.live_attribute_keys();
        match self.stash.keys().find(|k| live.contains(k)) {
            Some(key) => Err(MeshViewError::InvariantViolation(format!(
                "attribute '{key}' is both live and stashed"
            ))),
            None => Ok(()),
        }
    }

    // === Overlays ===

    /// Shows or hides the wireframe overlay of the current mesh.
    pub fn show_wireframe(&mut self, show: bool) -> Result<()> {
        if show {
            let mesh = match self.wireframe {
                Some(mesh) => mesh,
                None => {
                    let geom_id = self.current_geometry_id()?;
                    let ledger = &self.ledger;
                    let material = Rc::clone(self.wireframe_material.get_or_insert_with(|| {
                        Rc::new(Material::new(ledger, MaterialDescriptor::wireframe(Vec3::ZERO)))
                    }));
                    let mesh = self.scene.create_mesh(
                        self.style.mesh_kind(),
                        GeometryBinding::borrowed(geom_id),
                        material,
                    );
                    self.wireframe = Some(mesh);
                    mesh
                }
            };
            self.scene.attach(GroupKind::Live, mesh)?;
        } else if let Some(mesh) = self.wireframe {
            self.scene.detach(GroupKind::Live, mesh);
        }
        Ok(())
    }

    /// Shows or hides the vertex points overlay and sets its point size.
    pub fn show_points(&mut self, show: bool, size: f32) -> Result<()> {
        if show {
            let mesh = match self.points {
                Some(mesh) => mesh,
                None => {
                    let geom_id = self.current_geometry_id()?;
                    let ledger = &self.ledger;
                    let material = Rc::clone(self.points_material.get_or_insert_with(|| {
                        Rc::new(Material::new(ledger, MaterialDescriptor::points(Vec3::ZERO)))
                    }));
                    let mesh = self.scene.create_mesh(
                        MeshKind::Points,
                        GeometryBinding::borrowed(geom_id),
                        material,
                    );
                    self.points = Some(mesh);
                    mesh
                }
            };
            self.scene.attach(GroupKind::Live, mesh)?;
        } else if let Some(mesh) = self.points {
            self.scene.detach(GroupKind::Live, mesh);
        }
        if let Some(material) = &self.points_material {
            material.update_uniforms(|u| u.point_size = size);
        }
        Ok(())
    }

    fn current_geometry_id(&self) -> Result<ResourceId> {
        self.current
            .and_then(|id| self.scene.mesh(id))
            .map(|m| m.geometry.geometry)
            .ok_or(MeshViewError::NoCurrentMesh)
    }

    // === View ===

    pub fn arrow_size(&self) -> f32 {
        self.arrow_size
    }

    /// Sets the on-screen arrow length in pixels.
    pub fn set_arrow_size(&mut self, px: f32) {
        self.arrow_size = px;
        if let Some(material) = &self.arrow_material {
            material.update_uniforms(|u| u.arrow.arrow_size_px_x = px);
            self.scene.renderer.request_redraw();
        }
    }

    pub fn camera_params(&self) -> CameraParams {
        self.scene.camera_params()
    }

    /// Moves the camera and aims it at the target.
    pub fn set_camera_params(&mut self, params: CameraParams) {
        self.scene.set_camera_params(params);
        let depth = self.scene.target_depth();
        if let Some(material) = &self.arrow_material {
            material.update_uniforms(|u| u.arrow.target_depth = depth);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.scene.resize(width, height);
        self.options.width = width;
        self.options.height = height;
        if let Some(material) = &self.arrow_material {
            material.update_uniforms(|u| u.arrow.renderer_width = width as f32);
        }
    }

    /// Suppresses intermediate redraws during updates.
    pub fn set_avoid_redraw_flicker(&mut self, avoid: bool) {
        self.options.avoid_redraw_flicker = avoid;
    }

    /// Removes a solid material from the library cache and disposes it.
    ///
    /// Meshes still drawing with it keep their handle until the next update
    /// resolves a fresh material.
    pub fn free_material(&mut self, material: &Material) -> Result<()> {
        self.library.free_material(material)
    }

    /// Captures the displayed scene.
    pub fn show(&self) -> Result<SceneDocument> {
        let textures: Vec<&TextureMap> = self.textures.iter().map(AsRef::as_ref).collect();
        SceneDocument::capture(&self.scene, &textures)
    }

    /// Writes the displayed scene to a standalone HTML file.
    pub fn export_html(&self, path: impl AsRef<Path>) -> Result<()> {
        self.show()?.write_html(path)
    }

    // === Accessors ===

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn style(&self) -> MeshStyle {
        self.style
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    /// Ledger of every resource this viewer allocated.
    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub(crate) fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn library(&self) -> &MaterialLibrary {
        &self.library
    }

    pub(crate) fn library_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.library
    }

    pub fn current_mesh(&self) -> Option<ResourceId> {
        self.current
    }

    pub fn wireframe_mesh(&self) -> Option<ResourceId> {
        self.wireframe
    }

    pub fn points_mesh(&self) -> Option<ResourceId> {
        self.points
    }

    pub fn vector_field_mesh(&self) -> Option<ResourceId> {
        self.vector_field_mesh
    }

    pub fn arrow_material(&self) -> Option<&Rc<Material>> {
        self.arrow_material.as_ref()
    }

    pub fn points_material(&self) -> Option<&Rc<Material>> {
        self.points_material.as_ref()
    }

    /// The current mesh's geometry.
    pub fn current_geometry(&self) -> Option<&BufferGeometry> {
        self.current_geometry_id().ok().and_then(|id| self.scene.geometry(id))
    }

    /// Attribute keys attached to the current geometry.
    pub fn live_attribute_keys(&self) -> Vec<AttributeKey> {
        self.current_geometry()
            .map(|g| g.attributes().map(|(k, _)| k).collect())
            .unwrap_or_default()
    }

    /// Attribute keys held in the stash.
    pub fn stash_keys(&self) -> Vec<AttributeKey> {
        self.stash.keys().copied().collect()
    }

    /// Releases every mesh, overlay material and stashed buffer.
    fn teardown(&mut self) -> Result<()> {
        log::debug!(
            "tearing down viewer: {} meshes, {} geometries",
            self.scene.mesh_count(),
            self.scene.geometry_count()
        );
        self.scene.clean_group(GroupKind::Ghost)?;
        // Hidden meshes are re-attached so the live purge reaches them.
        for mesh in [self.vector_field_mesh, self.wireframe, self.points]
            .into_iter()
            .flatten()
        {
            if self.scene.mesh(mesh).is_some() {
                self.scene.attach(GroupKind::Live, mesh)?;
            }
        }
        self.scene.clean_group(GroupKind::Live)?;
        // A detached current mesh remains when another mesh took over the live group.
        for mesh in self.scene.mesh_ids() {
            self.scene.dispose_mesh(mesh)?;
        }
        self.current = None;
        self.wireframe = None;
        self.points = None;
        self.vector_field_mesh = None;

        self.scene.controls.shader_material = None;
        for material in [
            self.wireframe_material.take(),
            self.points_material.take(),
            self.arrow_material.take(),
        ]
        .into_iter()
        .flatten()
        {
            material.dispose(&self.ledger)?;
        }

        for attr in std::mem::take(&mut self.stash).into_values() {
            attr.dispose(&self.ledger)?;
        }
        Ok(())
    }
}

impl<S: MeshSource> Drop for Viewer<S> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            log::warn!("viewer teardown failed: {e}");
        }
    }
}

/// Replaces an attribute's array in place, allocating the buffer if it is missing.
fn replace_or_insert(geom: &mut BufferGeometry, ledger: &SharedLedger, key: AttributeKey, data: AttributeData) {
    match geom.attribute_mut(key) {
        Some(attr) => attr.set_array(data),
        None => {
            geom.insert_attribute(key, BufferAttribute::new(ledger, data));
        }
    }
}

/// Updates, allocates or stashes one optional attribute of the current geometry.
///
/// A needed key reuses the stashed buffer if there is one, otherwise the live
/// buffer, allocating only when neither exists. An unneeded live buffer moves to
/// the stash.
fn allocate_update_or_stash(
    geom: &mut BufferGeometry,
    stash: &mut BTreeMap<AttributeKey, BufferAttribute>,
    ledger: &SharedLedger,
    key: AttributeKey,
    raw: &mut RawAttributes,
) -> Result<()> {
    if geom.contains(key) && stash.contains_key(&key) {
        return Err(MeshViewError::InvariantViolation(format!(
            "attribute '{key}' is both live and stashed"
        )));
    }
    match raw.remove(&key) {
        Some(data) => {
            if let Some(stashed) = stash.remove(&key) {
                log::trace!("reusing stashed '{key}' buffer {}", stashed.id());
                geom.insert_attribute(key, stashed);
            }
            replace_or_insert(geom, ledger, key, data);
        }
        None => {
            if let Some(attr) = geom.remove_attribute(key) {
                log::trace!("stashing '{key}' buffer {}", attr.id());
                stash.insert(key, attr);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RawMesh;
    use meshview_core::ResourceKind;

    fn quad() -> RawMesh {
        RawMesh::with_computed_normals(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            &[[0, 1, 2], [0, 2, 3]],
        )
    }

    fn viewer() -> Viewer<RawMesh> {
        Viewer::new(quad(), MeshStyle::Triangles, ViewerOptions::default(), UpdateOptions::new()).unwrap()
    }

    #[test]
    fn test_initial_update_fits_model() {
        let v = viewer();
        assert!(v.current_mesh().is_some());
        assert_eq!(v.scene().children(GroupKind::Live).len(), 1);
        // Centered at (0.5, 0.5, 0) with half extent 0.5.
        assert!((v.scene().transform.scale - 4.0).abs() < 1e-5);
        assert!((v.scene().transform.position - Vec3::new(-2.0, -2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_update_with_source_swaps_mesh() {
        let mut v = viewer();
        let triangle = RawMesh::with_computed_normals(vec![Vec3::ZERO, Vec3::X, Vec3::Y], &[[0, 1, 2]]);
        let previous = v.update_with_source(triangle, UpdateOptions::new()).unwrap();
        assert_eq!(previous.geometry().vertices.len(), 4);
        assert_eq!(v.source().geometry().vertices.len(), 3);
        assert_eq!(v.current_geometry().unwrap().vertex_count(), 3);
        // The buffers of the current mesh are reused.
        assert_eq!(v.ledger().allocated(ResourceKind::Geometry), 1);
    }

    #[test]
    fn test_free_material_through_viewer() {
        let mut v = viewer();
        let material = Rc::clone(&v.scene().mesh(v.current_mesh().unwrap()).unwrap().material);
        let cached = v.library().len();
        v.free_material(&material).unwrap();
        assert_eq!(v.library().len(), cached - 1);
        assert!(!v.ledger().is_live(material.id()));
        assert!(matches!(
            v.free_material(&material),
            Err(MeshViewError::MaterialNotFound(_))
        ));

        // The next update resolves a fresh cached material.
        v.update(UpdateOptions::new()).unwrap();
        let current = &v.scene().mesh(v.current_mesh().unwrap()).unwrap().material;
        assert!(!Rc::ptr_eq(current, &material));
        assert!(v.ledger().is_live(current.id()));
    }

    #[test]
    fn test_scalar_field_moves_color_to_stash() {
        let mut v = viewer();
        v.update(UpdateOptions::new().with_scalar_field(vec![0.0, 1.0, 2.0, 3.0]))
            .unwrap();
        assert!(v.live_attribute_keys().contains(&AttributeKey::Color));
        assert!(v.stash_keys().is_empty());

        v.update(UpdateOptions::new()).unwrap();
        assert!(!v.live_attribute_keys().contains(&AttributeKey::Color));
        assert_eq!(v.stash_keys(), vec![AttributeKey::Color]);
        v.check_stash_exclusion().unwrap();
    }

    #[test]
    fn test_field_size_mismatch_is_immediate() {
        let mut v = viewer();
        let before = v.ledger().stats();
        let err = v
            .update(UpdateOptions::new().with_scalar_field(vec![0.0; 5]))
            .unwrap_err();
        assert!(matches!(err, MeshViewError::SizeMismatch { .. }));
        assert_eq!(v.ledger().stats(), before);
    }

    #[test]
    fn test_overlays_borrow_current_geometry() {
        let mut v = viewer();
        v.show_wireframe(true).unwrap();
        v.show_points(true, 7.0).unwrap();
        let geom = v.current_geometry_id().unwrap();
        for overlay in [v.wireframe_mesh().unwrap(), v.points_mesh().unwrap()] {
            let mesh = v.scene().mesh(overlay).unwrap();
            assert_eq!(mesh.geometry, GeometryBinding::borrowed(geom));
        }
        assert_eq!(v.points_material().unwrap().uniforms().point_size, 7.0);

        v.show_wireframe(false).unwrap();
        assert_eq!(v.scene().children(GroupKind::Live).len(), 2);
        v.show_wireframe(true).unwrap();
        assert_eq!(v.scene().children(GroupKind::Live).len(), 3);
        assert_eq!(v.ledger().allocated(ResourceKind::Mesh), 3);
    }

    #[test]
    fn test_preserve_repoints_overlays() {
        let mut v = viewer();
        v.show_wireframe(true).unwrap();
        v.update(UpdateOptions::new().preserve_existing(true)).unwrap();
        let geom = v.current_geometry_id().unwrap();
        let wire = v.scene().mesh(v.wireframe_mesh().unwrap()).unwrap();
        assert_eq!(wire.geometry.geometry, geom);
        assert_eq!(v.scene().children(GroupKind::Ghost).len(), 1);
    }

    #[test]
    fn test_vector_field_uniforms() {
        let mut v = viewer();
        let field = VectorField::per_element(vec![Vec3::Z, Vec3::X])
            .with_alignment(meshview_render::ArrowAlignment::Center);
        v.update(UpdateOptions::new().with_vector_field(field)).unwrap();
        let vf = v.vector_field_mesh().unwrap();
        assert!(v.scene().contains(GroupKind::Live, vf));
        let uniforms = v.arrow_material().unwrap().uniforms().arrow;
        assert_eq!(uniforms.arrow_size_px_x, 60.0);
        assert_eq!(uniforms.renderer_width, 512.0);
        assert_eq!(uniforms.target_depth, 5.0);
        assert_eq!(uniforms.arrow_alignment, -0.5);
        assert!(v.scene().controls.shader_material.is_some());

        v.set_arrow_size(30.0);
        v.resize(800, 400);
        assert_eq!(v.arrow_material().unwrap().uniforms().arrow.arrow_size_px_x, 30.0);
        assert_eq!(v.arrow_material().unwrap().uniforms().arrow.renderer_width, 800.0);

        v.update(UpdateOptions::new()).unwrap();
        assert!(!v.scene().contains(GroupKind::Live, vf));
    }

    #[test]
    fn test_ghosted_vector_field_is_translucent() {
        let mut v = viewer();
        v.update(UpdateOptions::new().with_vector_field(vec![Vec3::Z; 4]))
            .unwrap();
        let vf = v.vector_field_mesh().unwrap();
        v.update(UpdateOptions::new().preserve_existing(true)).unwrap();
        assert!(v.scene().contains(GroupKind::Ghost, vf));
        assert!(v.vector_field_mesh().is_none());
        let mesh = v.scene().mesh(vf).unwrap();
        assert!(mesh.material.uniforms().transparent);
        let colors = v
            .scene()
            .geometry(mesh.geometry.geometry)
            .unwrap()
            .attribute(AttributeKey::ArrowColor)
            .unwrap()
            .data()
            .floats()
            .unwrap()
            .to_vec();
        assert!(colors.chunks(4).all(|c| c[3] == GHOST_OPACITY));
    }

    #[test]
    fn test_avoid_flicker_redraws_once() {
        let mut v = viewer();
        v.set_avoid_redraw_flicker(true);
        let before = v.scene().renderer.redraw_count();
        v.update(UpdateOptions::new().with_scalar_field(vec![0.0, 1.0])).unwrap();
        assert_eq!(v.scene().renderer.redraw_count(), before + 1);
        assert!(!v.scene().renderer.is_paused());
    }

    #[test]
    fn test_arity_must_match_style() {
        let mut v = viewer();
        let lines = VisualizationGeometry::lines(vec![Vec3::ZERO, Vec3::X], &[[0, 1]], vec![Vec3::Z; 2]);
        assert!(matches!(
            v.set_geometry(lines, UpdateOptions::new()),
            Err(MeshViewError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_overlay_without_mesh_fails() {
        let mut v = viewer();
        v.current = None;
        assert!(matches!(v.show_wireframe(true), Err(MeshViewError::NoCurrentMesh)));
    }
}
