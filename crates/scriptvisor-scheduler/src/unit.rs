use std::cell::RefCell;
use std::io;
use std::panic;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};
use parking_lot::Mutex;
use scriptvisor_host::fault::panic_message;
use scriptvisor_host::{HostState, ModuleId};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::registry::{MAX_STACK_SIZE, MIN_STACK_SIZE};

/// Entry point a module registers. It runs once, on the unit's own fiber.
///
/// Declared `C-unwind` so a panicking Rust module unwinds into the fault
/// boundary instead of aborting the process.
pub type ScriptMain = extern "C-unwind" fn();

/// Observable lifecycle of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnitStatus {
    /// Registered, fiber not created yet
    NotStarted,
    /// Executing right now
    Running,
    /// Waiting inside its entry function
    Suspended,
    /// Entry function returned
    Finished,
    /// Entry function panicked or its fiber could not be created
    Faulted,
}

impl UnitStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => UnitStatus::NotStarted,
            1 => UnitStatus::Running,
            2 => UnitStatus::Suspended,
            3 => UnitStatus::Finished,
            _ => UnitStatus::Faulted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Faulted,
}

type ScriptFiber = Coroutine<(), (), RunOutcome, DefaultStack>;

enum FiberState {
    NotStarted,
    Live(ScriptFiber),
    Finished,
    Faulted,
}

/// Handle for switching from a running script back to the scheduler
///
/// Obtained from [`ScriptRegistry::prepare_wait`](crate::ScriptRegistry::prepare_wait).
/// It is neither `Send` nor `Sync`: it must be used on the fiber it came from.
pub struct Suspend {
    yielder: NonNull<Yielder<(), ()>>,
}

impl Suspend {
    /// Switch back to the scheduler; returns when the unit is next resumed
    pub fn suspend(self) {
        // SAFETY: the pointer was published by the fiber body that is running
        // right now and stays valid until that body returns.
        unsafe { self.yielder.as_ref().suspend(()) }
    }
}

/// Everything a unit needs from the scheduler for one tick
pub(crate) struct TickEnv<'a> {
    pub host: &'a dyn HostState,
    pub clock: &'a dyn Clock,
    pub current: &'a CurrentScript,
    pub stack_size: usize,
}

/// One registered module: its entry function, its fiber and its wake time
pub struct ScriptUnit {
    module: ModuleId,
    name: String,
    entry: ScriptMain,
    wake_at: AtomicU64,
    /// Mirror of the fiber state readable from any thread
    status: AtomicU8,
    /// Yielder of the running fiber body, null outside of it
    yielder: Arc<AtomicPtr<Yielder<(), ()>>>,
    fiber: RefCell<FiberState>,
}

// SAFETY: `fiber` is only borrowed by `tick`, which the registry runs on its
// single scheduler thread, and by `Drop`, which has exclusive access and only
// discards the fiber stack. No public method touches it; everything else is
// immutable or atomic.
unsafe impl Send for ScriptUnit {}
unsafe impl Sync for ScriptUnit {}

impl ScriptUnit {
    pub(crate) fn new(module: ModuleId, name: String, entry: ScriptMain) -> Self {
        Self {
            module,
            name,
            entry,
            wake_at: AtomicU64::new(0),
            status: AtomicU8::new(UnitStatus::NotStarted as u8),
            yielder: Arc::new(AtomicPtr::new(ptr::null_mut())),
            fiber: RefCell::new(FiberState::NotStarted),
        }
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> ScriptMain {
        self.entry
    }

    /// Whether this unit runs `entry`
    pub fn runs(&self, entry: ScriptMain) -> bool {
        self.entry as usize == entry as usize
    }

    /// Clock time before which the unit will not be resumed
    pub fn wake_at(&self) -> u64 {
        self.wake_at.load(Ordering::Acquire)
    }

    pub fn status(&self) -> UnitStatus {
        UnitStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: UnitStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Advance this unit by one scheduling step
    pub(crate) fn tick(self: &Arc<Self>, env: &TickEnv<'_>) {
        let Ok(mut fiber) = self.fiber.try_borrow_mut() else {
            warn!(target: "scripting", "Script '{}' ticked while it is running, ignored", self.name);
            return;
        };

        if matches!(*fiber, FiberState::NotStarted) && !env.host.is_playing() {
            return;
        }

        if env.clock.now_ms() < self.wake_at() {
            return;
        }

        if matches!(*fiber, FiberState::NotStarted) {
            info!(target: "scripting", "Launching main() of '{}'", self.name);
            match self.spawn_fiber(env.stack_size) {
                Ok(coroutine) => *fiber = FiberState::Live(coroutine),
                Err(e) => {
                    error!(target: "scripting", "Failed to allocate fiber for '{}': {}", self.name, e);
                    *fiber = FiberState::Faulted;
                    self.set_status(UnitStatus::Faulted);
                    return;
                }
            }
        }

        let FiberState::Live(coroutine) = &mut *fiber else {
            return;
        };

        self.set_status(UnitStatus::Running);
        let result = {
            let _running = env.current.enter(Arc::clone(self));
            coroutine.resume(())
        };

        match result {
            CoroutineResult::Yield(()) => self.set_status(UnitStatus::Suspended),
            CoroutineResult::Return(RunOutcome::Completed) => {
                debug!(target: "scripting", "Script '{}' returned from main()", self.name);
                *fiber = FiberState::Finished;
                self.set_status(UnitStatus::Finished);
            }
            CoroutineResult::Return(RunOutcome::Faulted) => {
                *fiber = FiberState::Faulted;
                self.set_status(UnitStatus::Faulted);
            }
        }
    }

    /// Set the wake time and hand out the switch back to the scheduler
    pub(crate) fn prepare_yield(&self, wait_ms: u64, clock: &dyn Clock) -> Option<Suspend> {
        let wake_at = clock.now_ms().saturating_add(wait_ms);
        self.wake_at.store(wake_at, Ordering::Release);

        NonNull::new(self.yielder.load(Ordering::Acquire)).map(|yielder| Suspend { yielder })
    }

    fn spawn_fiber(&self, stack_size: usize) -> io::Result<ScriptFiber> {
        if !(MIN_STACK_SIZE..=MAX_STACK_SIZE).contains(&stack_size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "stack size {} is outside {}..={}",
                    stack_size, MIN_STACK_SIZE, MAX_STACK_SIZE
                ),
            ));
        }
        let stack = DefaultStack::new(stack_size)?;
        let entry = self.entry;
        let name = self.name.clone();
        let slot = Arc::clone(&self.yielder);

        Ok(Coroutine::with_stack(
            stack,
            move |yielder: &Yielder<(), ()>, ()| {
                slot.store(yielder as *const _ as *mut _, Ordering::Release);
                let outcome = panic::catch_unwind(move || entry());
                slot.store(ptr::null_mut(), Ordering::Release);

                match outcome {
                    Ok(()) => RunOutcome::Completed,
                    Err(payload) => {
                        error!(
                            target: "scripting",
                            "Error in script '{}' main(): {}",
                            name,
                            panic_message(payload.as_ref())
                        );
                        RunOutcome::Faulted
                    }
                }
            },
        ))
    }
}

impl Drop for ScriptUnit {
    fn drop(&mut self) {
        if let FiberState::Live(coroutine) = self.fiber.get_mut() {
            if coroutine.started() && !coroutine.done() {
                debug!(target: "scripting", "Discarding suspended fiber of '{}'", self.name);
                // SAFETY: the fiber is suspended, not running. Its stack is
                // thrown away without unwinding, like deleting an OS fiber;
                // values living on it are leaked.
                unsafe { coroutine.force_reset() };
            }
        }
    }
}

/// The unit currently executing, if any
///
/// Set for exactly the span of one fiber resume and cleared on every way out
/// of it, so a wait issued outside a script never finds a stale unit.
#[derive(Default)]
pub(crate) struct CurrentScript {
    unit: Mutex<Option<Arc<ScriptUnit>>>,
}

impl CurrentScript {
    pub fn enter(&self, unit: Arc<ScriptUnit>) -> RunningGuard<'_> {
        let previous = self.unit.lock().replace(unit);
        debug_assert!(previous.is_none(), "two script units running at once");
        RunningGuard { slot: self }
    }

    pub fn get(&self) -> Option<Arc<ScriptUnit>> {
        self.unit.lock().clone()
    }
}

pub(crate) struct RunningGuard<'a> {
    slot: &'a CurrentScript,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.slot.unit.lock().take();
    }
}
