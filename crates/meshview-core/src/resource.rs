//! Resource ledger for scene objects owned by a single viewer.
//!
//! Every buffer, geometry, mesh, material and scene node a viewer creates is
//! acquired from its ledger and must be released exactly once. The ledger is
//! owned by the viewer (shared through `Rc` with the material library and the
//! scene), so nothing outlives the viewer in a process-wide table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{MeshViewError, Result};

/// Identifier of a resource, unique within its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Category of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    BufferAttribute,
    Geometry,
    Mesh,
    Material,
    Group,
    Camera,
    Light,
    Controls,
    Renderer,
    Animation,
}

/// Snapshot of ledger counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub allocated: HashMap<ResourceKind, usize>,
    pub released: HashMap<ResourceKind, usize>,
    pub live: usize,
}

#[derive(Default)]
struct LedgerState {
    next_id: u64,
    live: HashMap<ResourceId, ResourceKind>,
    allocated: HashMap<ResourceKind, usize>,
    released: HashMap<ResourceKind, usize>,
}

/// Tracks live resources and per-kind allocation counts.
#[derive(Default)]
pub struct ResourceLedger {
    state: RefCell<LedgerState>,
}

/// A ledger shared between the objects of one viewer.
pub type SharedLedger = Rc<ResourceLedger>;

impl ResourceLedger {
    /// Creates an empty shared ledger.
    pub fn shared() -> SharedLedger {
        Rc::new(Self::default())
    }

    /// Allocates a new resource id of the given kind.
    pub fn acquire(&self, kind: ResourceKind) -> ResourceId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = ResourceId(state.next_id);
        state.live.insert(id, kind);
        *state.allocated.entry(kind).or_default() += 1;
        log::trace!("acquired {kind:?} {id}");
        id
    }

    /// Releases a resource. Releasing an id that is not live is an error.
    pub fn release(&self, id: ResourceId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let kind = state.live.remove(&id).ok_or_else(|| {
            MeshViewError::InvariantViolation(format!("resource {id} released twice or never acquired"))
        })?;
        *state.released.entry(kind).or_default() += 1;
        log::trace!("released {kind:?} {id}");
        Ok(())
    }

    pub fn is_live(&self, id: ResourceId) -> bool {
        self.state.borrow().live.contains_key(&id)
    }

    /// Number of resources currently live.
    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Number of live resources of one kind.
    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.state
            .borrow()
            .live
            .values()
            .filter(|&&k| k == kind)
            .count()
    }

    /// Total allocations of one kind over the ledger's lifetime.
    pub fn allocated(&self, kind: ResourceKind) -> usize {
        self.state.borrow().allocated.get(&kind).copied().unwrap_or(0)
    }

    /// Total releases of one kind over the ledger's lifetime.
    pub fn released(&self, kind: ResourceKind) -> usize {
        self.state.borrow().released.get(&kind).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.state.borrow();
        LedgerStats {
            allocated: state.allocated.clone(),
            released: state.released.clone(),
            live: state.live.len(),
        }
    }
}
