//! Vector field arrow glyph resources.

use glam::{Vec3, Vec4};
use serde::Serialize;

use meshview_core::{AttributeData, AttributeKey, RawAttributes, VisualizationGeometry};

use crate::fields::DomainType;

/// Uniforms of the arrow shader.
///
/// Arrows are sized in screen pixels, so the shader needs the renderer width and
/// the camera-to-target distance to convert back to world units.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowUniforms {
    pub arrow_size_px_x: f32,
    pub renderer_width: f32,
    pub target_depth: f32,
    pub arrow_alignment: f32,
}

impl Default for ArrowUniforms {
    fn default() -> Self {
        Self {
            arrow_size_px_x: 60.0,
            renderer_width: 512.0,
            target_depth: 5.0,
            arrow_alignment: 0.0,
        }
    }
}

/// Per-arrow data of a vector field glyph mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowGlyphs {
    pub bases: Vec<Vec3>,
    pub vectors: Vec<Vec3>,
    pub colors: Vec<Vec4>,
}

impl ArrowGlyphs {
    /// Places one arrow per vertex, or per element centroid for per-element fields.
    pub fn build(
        domain: DomainType,
        geometry: &VisualizationGeometry,
        vectors: &[Vec3],
        colors: Vec<Vec4>,
    ) -> Self {
        let bases = match domain {
            DomainType::PerVertex => geometry.vertices.clone(),
            DomainType::PerElement => geometry.element_centroids(),
        };
        Self {
            bases,
            vectors: vectors.to_vec(),
            colors,
        }
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Geometry attributes of the glyph mesh.
    pub fn to_attributes(&self) -> RawAttributes {
        let mut attrs = RawAttributes::new();
        attrs.insert(AttributeKey::Position, AttributeData::from_vec3(&self.bases));
        attrs.insert(AttributeKey::ArrowVector, AttributeData::from_vec3(&self.vectors));
        attrs.insert(AttributeKey::ArrowColor, AttributeData::from_vec4(&self.colors));
        attrs
    }
}

/// Sets the alpha channel of every RGBA arrow color.
pub fn set_arrow_alpha(colors: &mut AttributeData, alpha: f32) {
    if colors.item_size() != 4 {
        log::warn!("arrow colors are not RGBA; leaving alpha unchanged");
        return;
    }
    if let Some(values) = colors.floats_mut() {
        for rgba in values.chunks_exact_mut(4) {
            rgba[3] = alpha;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniforms_layout() {
        let u = ArrowUniforms::default();
        assert_eq!(bytemuck::bytes_of(&u).len(), 16);
    }

    #[test]
    fn test_per_element_bases() {
        let vertices = vec![Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0)];
        let geometry = VisualizationGeometry::triangles(vertices, &[[0, 1, 2]], vec![Vec3::Z; 3]);
        let glyphs = ArrowGlyphs::build(DomainType::PerElement, &geometry, &[Vec3::Z], vec![Vec4::ONE]);
        assert_eq!(glyphs.bases, vec![Vec3::new(1.0, 1.0, 0.0)]);
        let attrs = glyphs.to_attributes();
        assert_eq!(attrs[&AttributeKey::ArrowColor].item_size(), 4);
    }

    #[test]
    fn test_set_alpha() {
        let mut colors = AttributeData::from_vec4(&[Vec4::ONE, Vec4::ONE]);
        set_arrow_alpha(&mut colors, 0.25);
        assert_eq!(colors.floats().unwrap(), &[1.0, 1.0, 1.0, 0.25, 1.0, 1.0, 1.0, 0.25]);
    }
}
