//! Scalar and vector fields displayed on a mesh.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use meshview_core::{MeshViewError, Result};

use crate::color_maps::ColorMapRegistry;

/// Which mesh entity a field value is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainType {
    PerVertex,
    /// One value per triangle (or per segment on line meshes).
    PerElement,
}

/// Finds the domain of `len` values on a mesh, checking an explicit domain if one is given.
fn resolve_domain(
    what: &str,
    len: usize,
    explicit: Option<DomainType>,
    num_vertices: usize,
    num_elements: usize,
) -> Result<DomainType> {
    match explicit {
        Some(DomainType::PerVertex) if len != num_vertices => {
            Err(MeshViewError::size_mismatch(what, num_vertices, len))
        }
        Some(DomainType::PerElement) if len != num_elements => {
            Err(MeshViewError::size_mismatch(what, num_elements, len))
        }
        Some(domain) => Ok(domain),
        None if len == num_vertices => Ok(DomainType::PerVertex),
        None if len == num_elements => Ok(DomainType::PerElement),
        None => Err(MeshViewError::SizeMismatch {
            what: what.to_string(),
            expected: format!("{num_vertices} (per vertex) or {num_elements} (per element)"),
            actual: len,
        }),
    }
}

/// A scalar value per vertex or per element, shown through a color map.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    values: Vec<f32>,
    domain: Option<DomainType>,
    color_map: Option<String>,
    range: Option<(f32, f32)>,
}

impl ScalarField {
    /// Creates a field whose domain is inferred from its length.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            domain: None,
            color_map: None,
            range: None,
        }
    }

    pub fn per_vertex(values: Vec<f32>) -> Self {
        Self {
            domain: Some(DomainType::PerVertex),
            ..Self::new(values)
        }
    }

    pub fn per_element(values: Vec<f32>) -> Self {
        Self {
            domain: Some(DomainType::PerElement),
            ..Self::new(values)
        }
    }

    #[must_use]
    pub fn with_color_map(mut self, name: impl Into<String>) -> Self {
        self.color_map = Some(name.into());
        self
    }

    /// Fixes the value range mapped onto the color map (defaults to the data range).
    #[must_use]
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn color_map(&self) -> Option<&str> {
        self.color_map.as_deref()
    }

    /// Validates the field size against the mesh and returns its domain.
    pub fn validate_size(&self, num_vertices: usize, num_elements: usize) -> Result<DomainType> {
        resolve_domain(
            "scalar field",
            self.values.len(),
            self.domain,
            num_vertices,
            num_elements,
        )
    }

    /// The value range mapped onto the color map.
    pub fn range(&self) -> (f32, f32) {
        self.range.unwrap_or_else(|| {
            let min = self.values.iter().copied().fold(f32::INFINITY, f32::min);
            let max = self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if min > max {
                (0.0, 1.0)
            } else {
                (min, max)
            }
        })
    }

    /// RGB color of every value.
    pub fn colors(&self, color_maps: &ColorMapRegistry, default_map: &str) -> Vec<Vec3> {
        let map = color_maps.get_or_default(self.color_map.as_deref().unwrap_or(default_map));
        let (min, max) = self.range();
        map.map_range(&self.values, min, max)
    }
}

impl From<Vec<f32>> for ScalarField {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Where an arrow sits relative to its base point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArrowAlignment {
    /// The arrow starts at the base point.
    #[default]
    Tail,
    /// The arrow is centered on the base point.
    Center,
    /// The arrow ends at the base point.
    Tip,
}

impl ArrowAlignment {
    /// Offset of the arrow along its direction, as a fraction of its length.
    pub fn relative_offset(self) -> f32 {
        match self {
            ArrowAlignment::Tail => 0.0,
            ArrowAlignment::Center => -0.5,
            ArrowAlignment::Tip => -1.0,
        }
    }
}

/// A vector per vertex or per element, drawn as arrow glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    vectors: Vec<Vec3>,
    domain: Option<DomainType>,
    align: ArrowAlignment,
    color: Option<Vec3>,
    color_map: Option<String>,
}

impl VectorField {
    /// Creates a field whose domain is inferred from its length.
    pub fn new(vectors: Vec<Vec3>) -> Self {
        Self {
            vectors,
            domain: None,
            align: ArrowAlignment::default(),
            color: None,
            color_map: None,
        }
    }

    pub fn per_vertex(vectors: Vec<Vec3>) -> Self {
        Self {
            domain: Some(DomainType::PerVertex),
            ..Self::new(vectors)
        }
    }

    pub fn per_element(vectors: Vec<Vec3>) -> Self {
        Self {
            domain: Some(DomainType::PerElement),
            ..Self::new(vectors)
        }
    }

    #[must_use]
    pub fn with_alignment(mut self, align: ArrowAlignment) -> Self {
        self.align = align;
        self
    }

    /// Draws every arrow in one color instead of coloring by magnitude.
    #[must_use]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = Some(color);
        self
    }

    #[must_use]
    pub fn with_color_map(mut self, name: impl Into<String>) -> Self {
        self.color_map = Some(name.into());
        self
    }

    pub fn vectors(&self) -> &[Vec3] {
        &self.vectors
    }

    pub fn align(&self) -> ArrowAlignment {
        self.align
    }

    /// Validates the field size against the mesh and returns its domain.
    pub fn validate_size(&self, num_vertices: usize, num_elements: usize) -> Result<DomainType> {
        resolve_domain(
            "vector field",
            self.vectors.len(),
            self.domain,
            num_vertices,
            num_elements,
        )
    }

    /// Opaque RGBA color of every arrow.
    pub fn colors(&self, color_maps: &ColorMapRegistry, default_map: &str) -> Vec<Vec4> {
        if let Some(c) = self.color {
            return vec![c.extend(1.0); self.vectors.len()];
        }
        let magnitudes: Vec<f32> = self.vectors.iter().map(|v| v.length()).collect();
        let max = magnitudes.iter().copied().fold(0.0, f32::max);
        let map = color_maps.get_or_default(self.color_map.as_deref().unwrap_or(default_map));
        map.map_range(&magnitudes, 0.0, max)
            .into_iter()
            .map(|c| c.extend(1.0))
            .collect()
    }
}

impl From<Vec<Vec3>> for VectorField {
    fn from(vectors: Vec<Vec3>) -> Self {
        Self::new(vectors)
    }
}
