use std::collections::{BTreeMap, BTreeSet};
use std::panic;

use parking_lot::Mutex;
use scriptvisor_host::fault::panic_message;
use scriptvisor_host::{KeyboardEvent, ModuleId};
use tracing::{debug, error, warn};

/// Key callback registered by a script module
///
/// Arguments: virtual key, repeat count, scan code, then four C `BOOL`s for
/// extended, alt held, was down before and is up now.
pub type KeyboardHandler = extern "C-unwind" fn(u32, u16, u8, i32, i32, i32, i32);

#[derive(Clone, Copy)]
struct Registration {
    handler: KeyboardHandler,
    /// Module whose code the handler lives in, when known
    owner: Option<ModuleId>,
}

/// Set of registered keyboard handlers, ordered by address
///
/// Handlers remember the module that registered them so they can be dropped
/// before that module's code is unmapped.
#[derive(Default)]
pub struct KeyboardHandlers {
    handlers: Mutex<BTreeMap<usize, Registration>>,
}

impl KeyboardHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the handler was already registered
    pub fn register(&self, handler: KeyboardHandler) -> bool {
        self.register_for(None, handler)
    }

    /// Register `handler` as belonging to `owner`
    pub fn register_for(&self, owner: Option<ModuleId>, handler: KeyboardHandler) -> bool {
        let inserted = self
            .handlers
            .lock()
            .insert(handler as usize, Registration { handler, owner })
            .is_none();

        if inserted {
            debug!(target: "scripting", "Registered keyboard handler {:p}", handler as *const ());
        }
        inserted
    }

    pub fn unregister(&self, handler: KeyboardHandler) -> bool {
        let removed = self.handlers.lock().remove(&(handler as usize)).is_some();

        if removed {
            debug!(target: "scripting", "Unregistered keyboard handler {:p}", handler as *const ());
        } else {
            error!(target: "scripting", "Could not find keyboard handler {:p}", handler as *const ());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Addresses of every registered handler
    pub fn addresses(&self) -> BTreeSet<usize> {
        self.handlers.lock().keys().copied().collect()
    }

    /// Give `owner` every ownerless handler that is not in `known`
    ///
    /// Used after opening a module: whatever its initialisers registered
    /// belongs to it. Returns how many handlers were claimed.
    pub fn claim_new(&self, owner: ModuleId, known: &BTreeSet<usize>) -> usize {
        let mut claimed = 0;
        for (address, registration) in self.handlers.lock().iter_mut() {
            if registration.owner.is_none() && !known.contains(address) {
                registration.owner = Some(owner);
                claimed += 1;
            }
        }
        claimed
    }

    /// Drop every handler owned by `owner`; returns how many were removed
    pub fn remove_owned_by(&self, owner: ModuleId) -> usize {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();

        handlers.retain(|_, registration| {
            let owned = registration.owner == Some(owner);
            if owned {
                warn!(
                    target: "scripting",
                    "Module {} is unloading with keyboard handler {:p} still registered, removed",
                    owner,
                    registration.handler as *const ()
                );
            }
            !owned
        });

        before - handlers.len()
    }

    /// Deliver `event` to every handler registered when the call started
    ///
    /// Handlers may register or unregister handlers, including themselves,
    /// while being called. A panicking handler is logged and skipped.
    pub fn dispatch(&self, event: &KeyboardEvent) {
        let snapshot: Vec<KeyboardHandler> = self
            .handlers
            .lock()
            .values()
            .map(|registration| registration.handler)
            .collect();

        for handler in snapshot {
            let outcome = panic::catch_unwind(|| {
                handler(
                    event.key,
                    event.repeats,
                    event.scan_code,
                    event.is_extended as i32,
                    event.is_with_alt as i32,
                    event.was_down_before as i32,
                    event.is_up_now as i32,
                )
            });

            if let Err(payload) = outcome {
                error!(
                    target: "scripting",
                    "Error in keyboard handler {:p}: {}",
                    handler as *const (),
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static LAST_KEY: AtomicU32 = AtomicU32::new(0);
    static ALT_SEEN: AtomicU32 = AtomicU32::new(0);

    extern "C-unwind" fn record(key: u32, _: u16, _: u8, _: i32, alt: i32, _: i32, _: i32) {
        LAST_KEY.store(key, Ordering::SeqCst);
        ALT_SEEN.store(alt as u32, Ordering::SeqCst);
    }

    extern "C-unwind" fn explode(_: u32, _: u16, _: u8, _: i32, _: i32, _: i32, _: i32) {
        panic!("handler exploded");
    }

    #[test]
    fn test_register_is_idempotent() {
        let handlers = KeyboardHandlers::new();
        assert!(handlers.register(record));
        assert!(!handlers.register(record));
        assert_eq!(handlers.len(), 1);

        assert!(handlers.unregister(record));
        assert!(!handlers.unregister(record));
        assert!(handlers.is_empty());
    }

    #[test]
    fn test_panicking_handler_does_not_stop_dispatch() {
        let handlers = KeyboardHandlers::new();
        handlers.register(explode);
        handlers.register(record);

        handlers.dispatch(&KeyboardEvent::key_down(0x72).with_alt());

        assert_eq!(LAST_KEY.load(Ordering::SeqCst), 0x72);
        assert_eq!(ALT_SEEN.load(Ordering::SeqCst), 1);
    }

    extern "C-unwind" fn other(_: u32, _: u16, _: u8, _: i32, _: i32, _: i32, _: i32) {}

    #[test]
    fn test_unloading_module_drops_its_handlers() {
        let handlers = KeyboardHandlers::new();
        let module = ModuleId::from_raw(0x7000);

        handlers.register(record);
        let known = handlers.addresses();

        // Registered while the module's initialisers ran
        handlers.register(other);
        assert_eq!(handlers.claim_new(module, &known), 1);
        assert_eq!(handlers.claim_new(module, &known), 0);

        assert_eq!(handlers.remove_owned_by(module), 1);
        assert_eq!(handlers.len(), 1);
        assert!(handlers.addresses().contains(&(record as usize)));
    }

    #[test]
    fn test_handler_registered_for_module() {
        let handlers = KeyboardHandlers::new();
        let module = ModuleId::from_raw(0x8000);

        handlers.register_for(Some(module), explode);
        assert_eq!(handlers.remove_owned_by(ModuleId::from_raw(0x9000)), 0);
        assert_eq!(handlers.remove_owned_by(module), 1);
        assert!(handlers.is_empty());
    }
}
