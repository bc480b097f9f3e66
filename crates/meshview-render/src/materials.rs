//! Material system for mesh rendering.
//!
//! Whether a material uses vertex colors or a texture changes the shader program
//! the browser engine compiles for it, and that program is fixed after the first
//! render. Materials are therefore never mutated in their defining fields: each
//! distinct combination gets its own cached instance in the [`MaterialLibrary`],
//! and only cheap runtime uniforms (point size, transparency, arrow parameters)
//! change after creation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;
use serde::Serialize;

use meshview_core::{MeshViewError, ResourceId, ResourceKind, Result, SharedLedger};

use crate::texture_map::TextureId;
use crate::vector_render::ArrowUniforms;

/// Opacity of ghost materials.
pub const GHOST_OPACITY: f32 = 0.25;

const LIGHT_GRAY: Vec3 = Vec3::new(0.827, 0.827, 0.827);
const BLACK: Vec3 = Vec3::ZERO;
const RED: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// Shading model of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MaterialKind {
    /// Diffuse-lit surface.
    Lambert,
    /// Unlit line segments.
    LineBasic,
    /// Unlit wireframe overlay.
    Wireframe,
    /// Screen-space points overlay.
    Points,
    /// Custom vector field arrow shader.
    Arrow,
}

/// Cache key of a library material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub ghost: bool,
    pub vertex_colors: bool,
    pub texture: Option<TextureId>,
    pub morph_targets: bool,
}

impl fmt::Display for MaterialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = if self.ghost { "ghost" } else { "solid" };
        write!(f, "{category}_vc{}", self.vertex_colors)?;
        if let Some(tex) = self.texture {
            write!(f, "_tex{}", tex.raw())?;
        }
        if self.morph_targets {
            f.write_str("_morph")?;
        }
        Ok(())
    }
}

/// The fields that define a material's shader program.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDescriptor {
    pub kind: MaterialKind,
    pub vertex_colors: bool,
    pub texture: Option<TextureId>,
    /// Solid color, used only when neither vertex colors nor a texture apply.
    pub color: Option<Vec3>,
    pub transparent: bool,
    pub opacity: f32,
    pub double_sided: bool,
    /// `(factor, units)` depth offset so overlays draw on top of the surface.
    pub polygon_offset: Option<(f32, f32)>,
    pub morph_targets: bool,
    pub morph_normals: bool,
    pub size_attenuation: bool,
}

impl MaterialDescriptor {
    fn base(kind: MaterialKind) -> Self {
        Self {
            kind,
            vertex_colors: false,
            texture: None,
            color: None,
            transparent: false,
            opacity: 1.0,
            double_sided: false,
            polygon_offset: None,
            morph_targets: false,
            morph_normals: false,
            size_attenuation: true,
        }
    }

    /// Descriptor of a library material for the given key.
    pub fn for_key(key: &MaterialKey, is_line_mesh: bool) -> Self {
        let mut desc = if is_line_mesh {
            Self::base(MaterialKind::LineBasic)
        } else {
            Self {
                double_sided: true,
                polygon_offset: Some((1.0, 1.0)),
                ..Self::base(MaterialKind::Lambert)
            }
        };
        desc.vertex_colors = key.vertex_colors;
        desc.texture = key.texture;
        if !key.vertex_colors && key.texture.is_none() {
            desc.color = Some(match (key.ghost, is_line_mesh) {
                (true, _) => RED,
                (false, true) => BLACK,
                (false, false) => LIGHT_GRAY,
            });
        }
        if key.ghost {
            desc.transparent = true;
            desc.opacity = GHOST_OPACITY;
        }
        desc.morph_targets = key.morph_targets;
        desc.morph_normals = key.morph_targets;
        desc
    }

    /// Black double-sided wireframe overlay.
    pub fn wireframe(color: Vec3) -> Self {
        Self {
            color: Some(color),
            double_sided: true,
            ..Self::base(MaterialKind::Wireframe)
        }
    }

    /// Fixed pixel-size points overlay.
    pub fn points(color: Vec3) -> Self {
        Self {
            color: Some(color),
            size_attenuation: false,
            ..Self::base(MaterialKind::Points)
        }
    }

    /// Vector field arrow shader.
    pub fn arrow() -> Self {
        Self {
            vertex_colors: true,
            ..Self::base(MaterialKind::Arrow)
        }
    }
}

/// Values that may change after the material is first rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeUniforms {
    pub point_size: f32,
    /// Set on arrow materials once a ghosted glyph mesh needs alpha blending.
    pub transparent: bool,
    pub arrow: ArrowUniforms,
}

impl Default for RuntimeUniforms {
    fn default() -> Self {
        Self {
            point_size: 5.0,
            transparent: false,
            arrow: ArrowUniforms::default(),
        }
    }
}

/// A material with a fixed descriptor and mutable runtime uniforms.
#[derive(Debug)]
pub struct Material {
    id: ResourceId,
    descriptor: MaterialDescriptor,
    uniforms: RefCell<RuntimeUniforms>,
}

impl Material {
    /// Allocates a material in the ledger.
    pub fn new(ledger: &SharedLedger, descriptor: MaterialDescriptor) -> Self {
        let id = ledger.acquire(ResourceKind::Material);
        log::debug!("allocated {:?} material {id}", descriptor.kind);
        let mut uniforms = RuntimeUniforms::default();
        uniforms.transparent = descriptor.transparent;
        Self {
            id,
            descriptor,
            uniforms: RefCell::new(uniforms),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn descriptor(&self) -> &MaterialDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> MaterialKind {
        self.descriptor.kind
    }

    pub fn uses_vertex_colors(&self) -> bool {
        self.descriptor.vertex_colors
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.descriptor.texture
    }

    pub fn uniforms(&self) -> RuntimeUniforms {
        *self.uniforms.borrow()
    }

    /// Updates runtime uniforms in place.
    pub fn update_uniforms(&self, f: impl FnOnce(&mut RuntimeUniforms)) {
        f(&mut self.uniforms.borrow_mut());
    }

    /// Releases the material from the ledger.
    pub fn dispose(&self, ledger: &SharedLedger) -> Result<()> {
        log::debug!("disposing {:?} material {}", self.descriptor.kind, self.id);
        ledger.release(self.id)
    }

    /// The non-ghost library key describing this material.
    fn solid_key(&self) -> MaterialKey {
        MaterialKey {
            ghost: false,
            vertex_colors: self.descriptor.vertex_colors,
            texture: self.descriptor.texture,
            morph_targets: self.descriptor.morph_targets,
        }
    }
}

/// Cache of materials keyed by their mangled descriptor.
pub struct MaterialLibrary {
    ledger: SharedLedger,
    is_line_mesh: bool,
    materials: HashMap<MaterialKey, Rc<Material>>,
}

impl MaterialLibrary {
    pub fn new(ledger: SharedLedger, is_line_mesh: bool) -> Self {
        Self {
            ledger,
            is_line_mesh,
            materials: HashMap::new(),
        }
    }

    /// Returns the cached solid material for the descriptor, creating it on first request.
    pub fn material(&mut self, use_vertex_colors: bool, texture: Option<TextureId>) -> Rc<Material> {
        self.get_or_create(MaterialKey {
            ghost: false,
            vertex_colors: use_vertex_colors,
            texture,
            morph_targets: false,
        })
    }

    /// Returns the cached translucent variant of `orig`.
    pub fn ghost_material(&mut self, orig: &Material) -> Rc<Material> {
        self.get_or_create(MaterialKey {
            ghost: true,
            ..orig.solid_key()
        })
    }

    /// Returns the cached variant of `orig` with morph targets and morph normals enabled.
    pub fn morph_material(&mut self, orig: &Material) -> Rc<Material> {
        self.get_or_create(MaterialKey {
            morph_targets: true,
            ..orig.solid_key()
        })
    }

    /// Removes the solid material with `material`'s descriptor and disposes it.
    ///
    /// Fails with [`MeshViewError::MaterialNotFound`] if no such material is cached,
    /// leaving the cache unchanged.
    pub fn free_material(&mut self, material: &Material) -> Result<()> {
        let key = material.solid_key();
        let mat = self
            .materials
            .remove(&key)
            .ok_or_else(|| MeshViewError::MaterialNotFound(key.to_string()))?;
        mat.dispose(&self.ledger)
    }

    pub fn contains(&self, key: &MaterialKey) -> bool {
        self.materials.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Mangled names of all cached materials, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.materials.keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    fn get_or_create(&mut self, key: MaterialKey) -> Rc<Material> {
        let ledger = &self.ledger;
        let is_line_mesh = self.is_line_mesh;
        Rc::clone(self.materials.entry(key).or_insert_with(|| {
            log::debug!("creating material '{key}'");
            Rc::new(Material::new(
                ledger,
                MaterialDescriptor::for_key(&key, is_line_mesh),
            ))
        }))
    }
}

impl Drop for MaterialLibrary {
    fn drop(&mut self) {
        for (key, mat) in self.materials.drain() {
            if let Err(e) = mat.dispose(&self.ledger) {
                log::warn!("failed to dispose material '{key}': {e}");
            }
        }
    }
}
