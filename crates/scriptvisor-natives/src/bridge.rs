use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use scriptvisor_host::fault::panic_message;
use tracing::{error, trace};

use crate::context::NativeCallContext;
use crate::table::NativeTable;
use crate::value::NativeValue;

/// Dispatches native calls to the host table
///
/// One bridge exists per runtime and holds the single shared call context.
/// Only one script runs at a time, so `init; push*; call` sequences never
/// interleave. A native that re-enters the bridge while it is being
/// dispatched is refused and logged rather than allowed to deadlock.
pub struct NativeBridge {
    table: Arc<dyn NativeTable>,
    /// Held while anything borrows `context`
    lock: Mutex<()>,
    /// Heap allocation owned by the bridge; it never moves, so the result
    /// words keep one address for the bridge's whole life
    context: NonNull<NativeCallContext>,
    hash: AtomicU64,
}

// SAFETY: `context` is only turned into a reference while `lock` is held, and
// the result pointer handed out is a raw pointer scripts read by contract.
unsafe impl Send for NativeBridge {}
unsafe impl Sync for NativeBridge {}

/// Exclusive access to the call context for as long as it lives
struct ContextGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    context: &'a mut NativeCallContext,
}

impl NativeBridge {
    pub fn new(table: Arc<dyn NativeTable>) -> Self {
        let context = Box::into_raw(Box::new(NativeCallContext::new()));

        Self {
            table,
            lock: Mutex::new(()),
            // SAFETY: `Box::into_raw` never returns null
            context: unsafe { NonNull::new_unchecked(context) },
            hash: AtomicU64::new(0),
        }
    }

    fn try_context(&self) -> Option<ContextGuard<'_>> {
        let lock = self.lock.try_lock()?;
        // SAFETY: the lock is held for the guard's lifetime, so this is the
        // only reference to the context
        let context = unsafe { &mut *self.context.as_ptr() };
        Some(ContextGuard {
            _lock: lock,
            context,
        })
    }

    /// Begin a call to native `hash`
    pub fn init(&self, hash: u64) {
        match self.try_context() {
            Some(guard) => guard.context.reset(),
            None => {
                error!(target: "natives", "nativeInit({:#018x}) while a native is running, ignored", hash);
                return;
            }
        }
        self.hash.store(hash, Ordering::Relaxed);
    }

    /// Append an argument word to the call being built
    pub fn push(&self, word: u64) {
        match self.try_context() {
            Some(guard) => guard.context.push(word),
            None => {
                error!(target: "natives", "nativePush64 while a native is running, ignored");
            }
        }
    }

    pub fn push_value<T: NativeValue>(&self, value: T) {
        self.push(value.into_word());
    }

    /// Hash of the call being built
    pub fn current_hash(&self) -> u64 {
        self.hash.load(Ordering::Relaxed)
    }

    /// Run the targeted native and return where its result was written
    ///
    /// An unknown hash is a silent no-op and the returned pointer then reads
    /// whatever the previous call left behind. A panicking native is logged
    /// and its result is unspecified.
    pub fn call(&self) -> *mut u64 {
        self.dispatch();
        self.result_ptr()
    }

    /// Look up and invoke the targeted native
    pub fn dispatch(&self) {
        let hash = self.current_hash();

        let Some(handler) = self.table.handler(hash) else {
            trace!(target: "natives", "No handler for native {:#018x}", hash);
            return;
        };

        let Some(guard) = self.try_context() else {
            error!(target: "natives", "Re-entrant call of native {:#018x} refused", hash);
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(guard.context)));
        if let Err(payload) = outcome {
            error!(
                target: "natives",
                "Error in nativeCall {:#018x}: {}",
                hash,
                panic_message(payload.as_ref())
            );
        }
    }

    /// Address of the first result word; stable for the life of the bridge
    pub fn result_ptr(&self) -> *mut u64 {
        // SAFETY: no reference is created; the place is derived straight
        // from the owning pointer
        unsafe { ptr::addr_of_mut!((*self.context.as_ptr()).result).cast::<u64>() }
    }

    /// Convenience for Rust callers: a full `init; push*; call` sequence
    /// with the first result word reinterpreted as `R`
    pub fn invoke<R: NativeValue>(&self, hash: u64, args: &[u64]) -> R {
        self.init(hash);
        for &word in args {
            self.push(word);
        }
        let result = self.call();
        // SAFETY: result points into the context owned by self
        R::from_word(unsafe { result.read() })
    }

    /// Run `f` against the call context, unless a native is currently using it
    pub fn with_context<R>(&self, f: impl FnOnce(&mut NativeCallContext) -> R) -> Option<R> {
        self.try_context().map(|guard| f(guard.context))
    }
}

impl Drop for NativeBridge {
    fn drop(&mut self) {
        // SAFETY: allocated by `Box::into_raw` in `new` and freed only here
        drop(unsafe { Box::from_raw(self.context.as_ptr()) });
    }
}
