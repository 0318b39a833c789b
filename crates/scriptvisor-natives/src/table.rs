use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use tracing::debug;

use crate::context::NativeCallContext;

/// A host native: reads its arguments from the context and writes its result back
pub type NativeHandler = fn(&mut NativeCallContext);

/// Hash to native lookup, owned and populated by the host integration
///
/// The bridge only ever reads from it.
pub trait NativeTable: Send + Sync {
    fn handler(&self, hash: u64) -> Option<NativeHandler>;
}

/// In-memory native table
#[derive(Default)]
pub struct NativeRegistry {
    handlers: RwLock<HashMap<u64, NativeHandler>>,
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("natives", &self.len())
            .finish()
    }
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the handler for `hash`
    pub fn register(&self, hash: u64, handler: NativeHandler) {
        debug!(target: "natives", "Registering native {:#018x}", hash);
        self.handlers.write().insert(hash, handler);
    }

    pub fn unregister(&self, hash: u64) -> bool {
        self.handlers.write().remove(&hash).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl NativeTable for NativeRegistry {
    fn handler(&self, hash: u64) -> Option<NativeHandler> {
        self.handlers.read().get(&hash).copied()
    }
}
