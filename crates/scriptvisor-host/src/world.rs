//! Entity pool access
//!
//! Pool layouts and addresses are version specific and owned by the host
//! integration. The runtime only needs to walk a pool slot by slot and turn a
//! live slot into a script handle, which is all these traits expose.

use std::ptr;

/// Which entity pool to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Vehicles,
    Peds,
    Objects,
    Pickups,
}

/// Address of a live entity inside a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityAddress(usize);

impl EntityAddress {
    /// Returns `None` for a null address
    pub fn new(raw: usize) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// One host entity pool
pub trait EntityPool {
    /// Number of slots the host reports; may be zero or negative for an
    /// uninitialised pool
    fn count(&self) -> i32;

    /// Entity in slot `index`, or `None` when the slot is invalid or empty
    fn slot(&self, index: i32) -> Option<EntityAddress>;
}

/// Read access to the host world used by the enumeration exports
pub trait WorldView: Send + Sync {
    fn pool(&self, kind: PoolKind) -> Option<&dyn EntityPool>;

    /// Whether the script GUID pool has no room for another handle
    fn script_guid_pool_full(&self) -> bool;

    /// Script handle for an entity, allocating one in the GUID pool if needed
    fn script_handle(&self, entity: EntityAddress) -> i32;

    /// Address of script global `index`
    fn global_ptr(&self, _index: i32) -> *mut u64 {
        ptr::null_mut()
    }

    /// Entity address behind a script handle
    fn entity_base_address(&self, _handle: i32) -> *mut u8 {
        ptr::null_mut()
    }
}

/// World with no pools, for hosts that do not expose entities
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWorld;

impl WorldView for NullWorld {
    fn pool(&self, _kind: PoolKind) -> Option<&dyn EntityPool> {
        None
    }

    fn script_guid_pool_full(&self) -> bool {
        false
    }

    fn script_handle(&self, _entity: EntityAddress) -> i32 {
        0
    }
}
