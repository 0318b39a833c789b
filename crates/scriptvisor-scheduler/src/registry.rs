use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use indexmap::IndexMap;
use parking_lot::Mutex;
use scriptvisor_host::thread::ResetRequest;
use scriptvisor_host::{
    HostState, ModuleId, ModuleNameMap, ModuleNames, NoopResetHook, ResetHook, ThreadState,
};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::unit::{CurrentScript, ScriptMain, ScriptUnit, Suspend, TickEnv};

/// Default fiber stack size per script (1 MiB)
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Smallest fiber stack a script is given
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Largest fiber stack a script may ask for; bigger sizes fault the unit
pub const MAX_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Scheduler tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Bytes of stack given to each script fiber
    pub stack_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

type ScriptMap = IndexMap<ModuleId, Arc<ScriptUnit>>;

/// Registry of script units, ticked once per host frame
///
/// Registration and removal may happen from any thread and always go through
/// one lock. A tick copies the unit list under that lock and runs the scripts
/// outside it, so a long script body never blocks registration and removing a
/// unit mid-tick cannot free it while it runs.
///
/// Ticks themselves must come from one thread: the first thread to tick
/// becomes the scheduler thread and ticks from anywhere else are refused.
pub struct ScriptRegistry {
    scripts: Mutex<ScriptMap>,
    current: CurrentScript,
    main_thread: OnceLock<ThreadId>,
    foreign_tick_logged: AtomicBool,
    ticking: AtomicBool,
    host: Arc<dyn HostState>,
    clock: Arc<dyn Clock>,
    names: Arc<dyn ModuleNames>,
    reset_hook: Arc<dyn ResetHook>,
    config: SchedulerConfig,
}

impl ScriptRegistry {
    /// Create an empty registry with default naming, reset hook and config
    pub fn new(host: Arc<dyn HostState>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scripts: Mutex::new(IndexMap::new()),
            current: CurrentScript::default(),
            main_thread: OnceLock::new(),
            foreign_tick_logged: AtomicBool::new(false),
            ticking: AtomicBool::new(false),
            host,
            clock,
            names: Arc::new(ModuleNameMap::new()),
            reset_hook: Arc::new(NoopResetHook),
            config: SchedulerConfig::default(),
        }
    }

    pub fn with_module_names(mut self, names: Arc<dyn ModuleNames>) -> Self {
        self.names = names;
        self
    }

    pub fn with_reset_hook(mut self, reset_hook: Arc<dyn ResetHook>) -> Self {
        self.reset_hook = reset_hook;
        self
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run one scheduling step of every registered script
    pub fn tick(&self) {
        if !self.on_scheduler_thread() {
            return;
        }

        if self.ticking.swap(true, Ordering::AcqRel) {
            warn!(target: "scripting", "Re-entrant tick from inside a script ignored");
            return;
        }
        let _ticking = TickingGuard(&self.ticking);

        let snapshot: Vec<Arc<ScriptUnit>> = self.scripts.lock().values().cloned().collect();

        let env = TickEnv {
            host: self.host.as_ref(),
            clock: self.clock.as_ref(),
            current: &self.current,
            stack_size: self.config.stack_size,
        };

        for unit in &snapshot {
            unit.tick(&env);
        }
    }

    /// Register `entry` as the script of `module`
    ///
    /// Returns `false`, leaving the existing unit in place, if the module
    /// already has a script.
    pub fn add_script(&self, module: ModuleId, entry: ScriptMain) -> bool {
        let name = self.names.display_name(module);
        info!(target: "scripting", "Registering script '{}' ({:p})", name, entry as *const ());

        let mut scripts = self.scripts.lock();
        Self::insert_locked(&mut scripts, module, name, entry)
    }

    fn insert_locked(
        scripts: &mut ScriptMap,
        module: ModuleId,
        name: String,
        entry: ScriptMain,
    ) -> bool {
        if scripts.contains_key(&module) {
            error!(target: "scripting", "Script '{}' is already registered", name);
            return false;
        }

        scripts.insert(module, Arc::new(ScriptUnit::new(module, name, entry)));
        true
    }

    /// Unregister the script of `module`
    ///
    /// A unit that is running in the current tick stays alive until the tick
    /// is done with it.
    pub fn remove_script(&self, module: ModuleId) -> bool {
        let removed = self.scripts.lock().shift_remove(&module);

        match removed {
            Some(unit) => {
                info!(target: "scripting", "Unregistered script '{}'", unit.name());
                true
            }
            None => {
                error!(target: "scripting", "Could not find script for module {}", module);
                false
            }
        }
    }

    /// Unregister the script whose entry function is `entry`
    ///
    /// If several modules registered the same function, one of them is
    /// removed; which one is unspecified.
    pub fn remove_script_by_entry(&self, entry: ScriptMain) -> bool {
        let module = self
            .scripts
            .lock()
            .iter()
            .find(|(_, unit)| unit.runs(entry))
            .map(|(module, _)| *module);

        match module {
            Some(module) => self.remove_script(module),
            None => {
                error!(target: "scripting", "Could not find script for function {:p}", entry as *const ());
                false
            }
        }
    }

    /// Restart every script from its entry point, then run the host's reset
    ///
    /// Each module gets a brand new unit that has not started and is due
    /// immediately.
    pub fn reset(&self, request: ResetRequest) -> ThreadState {
        let retired = {
            let mut scripts = self.scripts.lock();
            let previous = std::mem::take(&mut *scripts);

            for (module, unit) in &previous {
                let name = self.names.display_name(*module);
                Self::insert_locked(&mut scripts, *module, name, unit.entry());
            }

            previous
        };

        info!(target: "scripting", "Restarting {} script(s)", retired.len());
        drop(retired);

        self.reset_hook.reset(request)
    }

    /// Suspend the running script for at least `wait_ms` milliseconds
    ///
    /// Logged and ignored when called outside a script.
    pub fn wait(&self, wait_ms: u64) {
        if let Some(suspend) = self.prepare_wait(wait_ms) {
            suspend.suspend();
        }
    }

    /// Record the running script's wake time and return the switch back to
    /// the scheduler without taking it
    ///
    /// Callers that hold resources which must not stay alive across the
    /// suspension release them between this and [`Suspend::suspend`].
    pub fn prepare_wait(&self, wait_ms: u64) -> Option<Suspend> {
        if self.main_thread.get() != Some(&thread::current().id()) {
            warn!(target: "scripting", "scriptWait called off the scheduler thread, ignored");
            return None;
        }

        let Some(unit) = self.current.get() else {
            warn!(target: "scripting", "scriptWait called outside of a script, ignored");
            return None;
        };

        unit.prepare_yield(wait_ms, self.clock.as_ref())
    }

    /// Module of the script executing right now
    pub fn current_module(&self) -> Option<ModuleId> {
        self.current.get().map(|unit| unit.module())
    }

    pub fn script_count(&self) -> usize {
        self.scripts.lock().len()
    }

    /// Registered modules in registration order
    pub fn modules(&self) -> Vec<ModuleId> {
        self.scripts.lock().keys().copied().collect()
    }

    pub fn unit(&self, module: ModuleId) -> Option<Arc<ScriptUnit>> {
        self.scripts.lock().get(&module).cloned()
    }

    fn on_scheduler_thread(&self) -> bool {
        let id = thread::current().id();
        let main = *self.main_thread.get_or_init(|| {
            debug!(target: "scripting", "Scheduler bound to thread {:?}", id);
            id
        });

        if main == id {
            return true;
        }

        if !self.foreign_tick_logged.swap(true, Ordering::Relaxed) {
            error!(
                target: "scripting",
                "Tick from thread {:?} refused, scripts belong to thread {:?}",
                id,
                main
            );
        }
        false
    }
}

struct TickingGuard<'a>(&'a AtomicBool);

impl Drop for TickingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
