//! Typed attribute buffers that make up a geometry.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{MeshViewError, Result};

/// Name of a geometry attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKey {
    Position,
    Normal,
    Index,
    Uv,
    Color,
    /// Per-arrow RGBA color of a vector field glyph.
    ArrowColor,
    /// Per-arrow direction and magnitude of a vector field glyph.
    ArrowVector,
}

impl AttributeKey {
    /// Optional attributes whose buffers are stashed rather than freed when unused.
    pub const STASHABLE: [AttributeKey; 3] = [AttributeKey::Index, AttributeKey::Color, AttributeKey::Uv];

    /// The attribute name as the browser engine knows it.
    pub fn name(self) -> &'static str {
        match self {
            AttributeKey::Position => "position",
            AttributeKey::Normal => "normal",
            AttributeKey::Index => "index",
            AttributeKey::Uv => "uv",
            AttributeKey::Color => "color",
            AttributeKey::ArrowColor => "arrowColor",
            AttributeKey::ArrowVector => "arrowVector",
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed array of attribute values.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    /// Tightly packed `f32` items of `item_size` components each.
    Float { values: Vec<f32>, item_size: usize },
    /// Element indices.
    Index(Vec<u32>),
}

impl AttributeData {
    pub fn from_vec2(items: &[Vec2]) -> Self {
        Self::Float {
            values: items.iter().flat_map(|v| [v.x, v.y]).collect(),
            item_size: 2,
        }
    }

    pub fn from_vec3(items: &[Vec3]) -> Self {
        Self::Float {
            values: items.iter().flat_map(|v| [v.x, v.y, v.z]).collect(),
            item_size: 3,
        }
    }

    pub fn from_vec4(items: &[Vec4]) -> Self {
        Self::Float {
            values: items.iter().flat_map(|v| [v.x, v.y, v.z, v.w]).collect(),
            item_size: 4,
        }
    }

    pub fn from_indices(indices: &[u32]) -> Self {
        Self::Index(indices.to_vec())
    }

    /// Number of components per item (1 for indices).
    pub fn item_size(&self) -> usize {
        match self {
            Self::Float { item_size, .. } => *item_size,
            Self::Index(_) => 1,
        }
    }

    /// Number of items.
    pub fn count(&self) -> usize {
        match self {
            Self::Float { values, item_size } => values.len() / (*item_size).max(1),
            Self::Index(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Typed array name used by the browser engine.
    pub fn array_type(&self) -> &'static str {
        match self {
            Self::Float { .. } => "Float32Array",
            Self::Index(_) => "Uint32Array",
        }
    }

    /// Raw little-endian bytes of the array.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float { values, .. } => bytemuck::cast_slice(values),
            Self::Index(indices) => bytemuck::cast_slice(indices),
        }
    }

    /// The float components, if this is a float array.
    pub fn floats(&self) -> Option<&[f32]> {
        match self {
            Self::Float { values, .. } => Some(values),
            Self::Index(_) => None,
        }
    }

    /// The float components, mutably, if this is a float array.
    pub fn floats_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            Self::Float { values, .. } => Some(values),
            Self::Index(_) => None,
        }
    }

    /// The indices, if this is an index array.
    pub fn indices(&self) -> Option<&[u32]> {
        match self {
            Self::Index(indices) => Some(indices),
            Self::Float { .. } => None,
        }
    }

    /// Builds a new array whose item `i` is item `indices[i]` of `self`.
    pub fn gather(&self, indices: &[u32]) -> Result<Self> {
        let count = self.count();
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(MeshViewError::InvalidGeometry(format!(
                "index {bad} out of range for attribute with {count} items"
            )));
        }
        Ok(match self {
            Self::Float { values, item_size } => {
                let n = *item_size;
                let mut out = Vec::with_capacity(indices.len() * n);
                for &i in indices {
                    let start = i as usize * n;
                    out.extend_from_slice(&values[start..start + n]);
                }
                Self::Float {
                    values: out,
                    item_size: n,
                }
            }
            Self::Index(src) => Self::Index(indices.iter().map(|&i| src[i as usize]).collect()),
        })
    }

    /// Repeats every item `times` times in place order (`a a a b b b ...`).
    #[must_use]
    pub fn repeat_items(&self, times: usize) -> Self {
        match self {
            Self::Float { values, item_size } => {
                let n = (*item_size).max(1);
                let mut out = Vec::with_capacity(values.len() * times);
                for item in values.chunks(n) {
                    for _ in 0..times {
                        out.extend_from_slice(item);
                    }
                }
                Self::Float {
                    values: out,
                    item_size: n,
                }
            }
            Self::Index(src) => Self::Index(
                src.iter()
                    .flat_map(|&i| std::iter::repeat(i).take(times))
                    .collect(),
            ),
        }
    }
}

/// Attribute arrays for one frame, before they are bound to buffers.
pub type RawAttributes = BTreeMap<AttributeKey, AttributeData>;

/// Replicates per-vertex attributes to per-element-corner attributes.
///
/// Every attribute except the index is gathered through the index array. When
/// `per_element_color` is set, `color` holds one entry per element and is repeated
/// once per corner instead. The index array is replaced by the identity sequence
/// `0..indices.len()`.
pub fn replicate_per_corner(
    attrs: &mut RawAttributes,
    arity: usize,
    per_element_color: bool,
) -> Result<()> {
    let indices = attrs
        .get(&AttributeKey::Index)
        .and_then(AttributeData::indices)
        .map(<[u32]>::to_vec)
        .ok_or_else(|| MeshViewError::InvalidGeometry("missing index attribute".to_string()))?;

    for (key, data) in attrs.iter_mut() {
        match key {
            AttributeKey::Index => {}
            AttributeKey::Color if per_element_color => *data = data.repeat_items(arity),
            _ => *data = data.gather(&indices)?,
        }
    }

    let corners = u32::try_from(indices.len()).map_err(|_| {
        MeshViewError::InvalidGeometry("too many element corners for u32 indices".to_string())
    })?;
    attrs.insert(AttributeKey::Index, AttributeData::Index((0..corners).collect()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_item_size() {
        let data = AttributeData::from_vec3(&[Vec3::ZERO, Vec3::X]);
        assert_eq!(data.count(), 2);
        assert_eq!(data.item_size(), 3);
        assert_eq!(data.as_bytes().len(), 24);

        let idx = AttributeData::from_indices(&[0, 1, 2]);
        assert_eq!(idx.count(), 3);
        assert_eq!(idx.array_type(), "Uint32Array");
    }

    #[test]
    fn test_gather_out_of_range() {
        let data = AttributeData::from_vec2(&[Vec2::ZERO]);
        assert!(data.gather(&[0, 1]).is_err());
    }

    #[test]
    fn test_repeat_items() {
        let data = AttributeData::Float {
            values: vec![1.0, 2.0],
            item_size: 1,
        };
        assert_eq!(
            data.repeat_items(3),
            AttributeData::Float {
                values: vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0],
                item_size: 1
            }
        );
    }

    #[test]
    fn test_replicate_per_corner_triangles() {
        // Two triangles sharing an edge.
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE];
        let mut attrs = RawAttributes::new();
        attrs.insert(AttributeKey::Position, AttributeData::from_vec3(&positions));
        attrs.insert(AttributeKey::Normal, AttributeData::from_vec3(&[Vec3::Z; 4]));
        attrs.insert(AttributeKey::Index, AttributeData::from_indices(&[0, 1, 2, 1, 3, 2]));
        attrs.insert(
            AttributeKey::Color,
            AttributeData::from_vec3(&[Vec3::X, Vec3::Y]),
        );

        replicate_per_corner(&mut attrs, 3, true).unwrap();

        assert_eq!(attrs[&AttributeKey::Position].count(), 6);
        assert_eq!(attrs[&AttributeKey::Normal].count(), 6);
        assert_eq!(attrs[&AttributeKey::Color].count(), 6);
        assert_eq!(
            attrs[&AttributeKey::Index].indices().unwrap(),
            &[0, 1, 2, 3, 4, 5]
        );

        let pos = attrs[&AttributeKey::Position].floats().unwrap();
        // Fourth corner is vertex 1.
        assert_eq!(&pos[9..12], &[1.0, 0.0, 0.0]);
        let col = attrs[&AttributeKey::Color].floats().unwrap();
        assert_eq!(&col[6..9], &[1.0, 0.0, 0.0]);
        assert_eq!(&col[9..12], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_replicate_requires_index() {
        let mut attrs = RawAttributes::new();
        attrs.insert(AttributeKey::Position, AttributeData::from_vec3(&[Vec3::ZERO]));
        assert!(replicate_per_corner(&mut attrs, 3, true).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn replicated_corners_follow_index(
                (n, faces) in (3usize..12).prop_flat_map(|n| {
                    (Just(n), prop::collection::vec(prop::array::uniform3(0..n as u32), 1..10))
                })
            ) {
                let positions: Vec<Vec3> = (0..n).map(|i| Vec3::splat(i as f32)).collect();
                let index: Vec<u32> = faces.iter().flatten().copied().collect();
                let mut attrs = RawAttributes::new();
                attrs.insert(AttributeKey::Position, AttributeData::from_vec3(&positions));
                attrs.insert(AttributeKey::Index, AttributeData::from_indices(&index));

                replicate_per_corner(&mut attrs, 3, false).unwrap();

                let corners = attrs[&AttributeKey::Index].indices().unwrap();
                prop_assert_eq!(corners.len(), index.len());
                prop_assert!(corners.iter().enumerate().all(|(i, &c)| c as usize == i));
                let pos = attrs[&AttributeKey::Position].floats().unwrap();
                for (corner, &v) in index.iter().enumerate() {
                    prop_assert_eq!(pos[3 * corner], v as f32);
                }
            }
        }
    }
}
