//! Buffer attributes and geometries.

use std::collections::BTreeMap;

use meshview_core::{AttributeData, AttributeKey, ResourceId, ResourceKind, Result, SharedLedger};

/// A typed array bound to the renderer.
///
/// Replacing the array keeps the same allocation (and id); the version counter
/// tells the renderer to re-upload.
#[derive(Debug)]
pub struct BufferAttribute {
    id: ResourceId,
    data: AttributeData,
    version: u32,
}

impl BufferAttribute {
    /// Allocates a buffer attribute in the ledger.
    pub fn new(ledger: &SharedLedger, data: AttributeData) -> Self {
        let id = ledger.acquire(ResourceKind::BufferAttribute);
        log::trace!("allocated buffer attribute {id} ({} items)", data.count());
        Self {
            id,
            data,
            version: 0,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Replaces the array contents in place.
    pub fn set_array(&mut self, data: AttributeData) {
        self.data = data;
        self.version = self.version.wrapping_add(1);
    }

    /// Edits the array contents in place.
    pub fn update_array(&mut self, f: impl FnOnce(&mut AttributeData)) {
        f(&mut self.data);
        self.version = self.version.wrapping_add(1);
    }

    pub fn dispose(self, ledger: &SharedLedger) -> Result<()> {
        ledger.release(self.id)
    }
}

/// A set of named buffer attributes plus optional morph targets.
#[derive(Debug)]
pub struct BufferGeometry {
    id: ResourceId,
    attributes: BTreeMap<AttributeKey, BufferAttribute>,
    morph_attributes: BTreeMap<AttributeKey, Vec<BufferAttribute>>,
}

impl BufferGeometry {
    pub fn new(ledger: &SharedLedger) -> Self {
        Self {
            id: ledger.acquire(ResourceKind::Geometry),
            attributes: BTreeMap::new(),
            morph_attributes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn attribute(&self, key: AttributeKey) -> Option<&BufferAttribute> {
        self.attributes.get(&key)
    }

    pub fn attribute_mut(&mut self, key: AttributeKey) -> Option<&mut BufferAttribute> {
        self.attributes.get_mut(&key)
    }

    pub fn contains(&self, key: AttributeKey) -> bool {
        self.attributes.contains_key(&key)
    }

    /// Attaches an attribute, returning the one it replaced.
    pub fn insert_attribute(&mut self, key: AttributeKey, attr: BufferAttribute) -> Option<BufferAttribute> {
        self.attributes.insert(key, attr)
    }

    /// Detaches an attribute without disposing it.
    pub fn remove_attribute(&mut self, key: AttributeKey) -> Option<BufferAttribute> {
        self.attributes.remove(&key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (AttributeKey, &BufferAttribute)> {
        self.attributes.iter().map(|(&k, v)| (k, v))
    }

    /// Sets the morph targets of one attribute, returning the previous targets.
    pub fn set_morph_attributes(
        &mut self,
        key: AttributeKey,
        targets: Vec<BufferAttribute>,
    ) -> Vec<BufferAttribute> {
        self.morph_attributes.insert(key, targets).unwrap_or_default()
    }

    pub fn morph_attributes(&self) -> impl Iterator<Item = (AttributeKey, &[BufferAttribute])> {
        self.morph_attributes.iter().map(|(&k, v)| (k, v.as_slice()))
    }

    /// Number of vertices (position items).
    pub fn vertex_count(&self) -> usize {
        self.attribute(AttributeKey::Position)
            .map_or(0, |a| a.data().count())
    }

    /// Releases the geometry and every attached buffer.
    pub fn dispose(self, ledger: &SharedLedger) -> Result<()> {
        log::debug!(
            "disposing geometry {} with {} attributes",
            self.id,
            self.attributes.len()
        );
        for attr in self.attributes.into_values() {
            attr.dispose(ledger)?;
        }
        for attr in self.morph_attributes.into_values().flatten() {
            attr.dispose(ledger)?;
        }
        ledger.release(self.id)
    }
}

/// Whether a mesh is responsible for disposing its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owner,
    /// Shares another mesh's geometry; never disposes it.
    Borrower,
}

/// The geometry a mesh draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBinding {
    pub geometry: ResourceId,
    pub ownership: Ownership,
}

impl GeometryBinding {
    pub fn owned(geometry: ResourceId) -> Self {
        Self {
            geometry,
            ownership: Ownership::Owner,
        }
    }

    pub fn borrowed(geometry: ResourceId) -> Self {
        Self {
            geometry,
            ownership: Ownership::Borrower,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.ownership == Ownership::Owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use meshview_core::ResourceLedger;

    #[test]
    fn test_set_array_keeps_id() {
        let ledger = ResourceLedger::shared();
        let mut attr = BufferAttribute::new(&ledger, AttributeData::from_vec3(&[Vec3::ZERO]));
        let id = attr.id();
        attr.set_array(AttributeData::from_vec3(&[Vec3::X, Vec3::Y]));
        assert_eq!(attr.id(), id);
        assert_eq!(attr.version(), 1);
        assert_eq!(attr.data().count(), 2);
        assert_eq!(ledger.allocated(ResourceKind::BufferAttribute), 1);
    }

    #[test]
    fn test_geometry_dispose_releases_everything() {
        let ledger = ResourceLedger::shared();
        let mut geom = BufferGeometry::new(&ledger);
        geom.insert_attribute(
            AttributeKey::Position,
            BufferAttribute::new(&ledger, AttributeData::from_vec3(&[Vec3::ZERO])),
        );
        geom.set_morph_attributes(
            AttributeKey::Position,
            vec![BufferAttribute::new(&ledger, AttributeData::from_vec3(&[Vec3::X]))],
        );
        assert_eq!(geom.vertex_count(), 1);
        assert_eq!(ledger.live_count(), 3);
        geom.dispose(&ledger).unwrap();
        assert_eq!(ledger.live_count(), 0);
    }

    #[test]
    fn test_removed_attribute_survives_dispose() {
        let ledger = ResourceLedger::shared();
        let mut geom = BufferGeometry::new(&ledger);
        geom.insert_attribute(
            AttributeKey::Uv,
            BufferAttribute::new(&ledger, AttributeData::from_vec3(&[Vec3::ZERO])),
        );
        let uv = geom.remove_attribute(AttributeKey::Uv).unwrap();
        geom.dispose(&ledger).unwrap();
        assert!(ledger.is_live(uv.id()));
    }
}
