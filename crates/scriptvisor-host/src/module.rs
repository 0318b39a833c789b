use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;

use parking_lot::RwLock;

/// Opaque identity of a loaded script module
///
/// On the C ABI this is the module handle the script passes to
/// `scriptRegister`. The runtime never dereferences it; it is only compared,
/// hashed and handed back to the [`ModuleNames`] resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ModuleId(usize);

impl ModuleId {
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn from_handle(handle: *mut c_void) -> Self {
        Self(handle as usize)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }

    pub fn as_handle(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Resolves a module handle to a human readable name for logging
pub trait ModuleNames: Send + Sync {
    /// Display name without file extension, if the module is known
    fn module_name(&self, module: ModuleId) -> Option<String>;

    /// Name to use in log lines, falling back to the raw handle
    fn display_name(&self, module: ModuleId) -> String {
        self.module_name(module)
            .unwrap_or_else(|| format!("module {}", module))
    }
}

/// In-memory module name table
///
/// The module loader records every library it opens here; embedders that load
/// modules themselves can fill it in the same way.
#[derive(Debug, Default)]
pub struct ModuleNameMap {
    names: RwLock<HashMap<ModuleId, String>>,
}

impl ModuleNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, module: ModuleId, name: impl Into<String>) {
        self.names.write().insert(module, name.into());
    }

    pub fn remove(&self, module: ModuleId) -> Option<String> {
        self.names.write().remove(&module)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

impl ModuleNames for ModuleNameMap {
    fn module_name(&self, module: ModuleId) -> Option<String> {
        self.names.read().get(&module).cloned()
    }
}
