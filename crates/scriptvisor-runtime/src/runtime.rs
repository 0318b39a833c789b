use std::sync::Arc;

use scriptvisor_host::thread::ResetRequest;
use scriptvisor_host::{
    FixedVersion, GameVersion, HostState, KeyboardEvent, ModuleId, ModuleNameMap, ModuleNames,
    NoopResetHook, NullWorld, PoolKind, ResetHook, ThreadState, VersionProvider, WorldView,
};
use scriptvisor_natives::{NativeBridge, NativeTable};
use scriptvisor_scheduler::{Clock, MonotonicClock, SchedulerConfig, ScriptMain, ScriptRegistry};
use tracing::info;

use crate::keyboard::{KeyboardHandler, KeyboardHandlers};
use crate::world::collect_handles;

/// Host collaborators a [`Runtime`] is built from
///
/// Only the run state and the native table are required; everything else
/// defaults to an inert stand-in.
pub struct HostServices {
    pub state: Arc<dyn HostState>,
    pub natives: Arc<dyn NativeTable>,
    pub module_names: Arc<dyn ModuleNames>,
    pub version: Arc<dyn VersionProvider>,
    pub world: Arc<dyn WorldView>,
    pub reset_hook: Arc<dyn ResetHook>,
    pub clock: Arc<dyn Clock>,
}

impl HostServices {
    pub fn new(state: Arc<dyn HostState>, natives: Arc<dyn NativeTable>) -> Self {
        Self {
            state,
            natives,
            module_names: Arc::new(ModuleNameMap::new()),
            version: Arc::new(FixedVersion::default()),
            world: Arc::new(NullWorld),
            reset_hook: Arc::new(NoopResetHook),
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    pub fn with_module_names(mut self, module_names: Arc<dyn ModuleNames>) -> Self {
        self.module_names = module_names;
        self
    }

    pub fn with_version(mut self, version: Arc<dyn VersionProvider>) -> Self {
        self.version = version;
        self
    }

    pub fn with_world(mut self, world: Arc<dyn WorldView>) -> Self {
        self.world = world;
        self
    }

    pub fn with_reset_hook(mut self, reset_hook: Arc<dyn ResetHook>) -> Self {
        self.reset_hook = reset_hook;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// One script runtime: scheduler, native bridge, keyboard handlers and world access
///
/// Construct it once at startup, hand it to [`abi::install`](crate::abi::install)
/// if modules call in through the C entry points, and drive it with
/// [`Runtime::tick`] from the host's script thread.
pub struct Runtime {
    scheduler: ScriptRegistry,
    natives: NativeBridge,
    keyboard: KeyboardHandlers,
    version: Arc<dyn VersionProvider>,
    world: Arc<dyn WorldView>,
}

impl Runtime {
    pub fn new(services: HostServices, config: SchedulerConfig) -> Self {
        let HostServices {
            state,
            natives,
            module_names,
            version,
            world,
            reset_hook,
            clock,
        } = services;

        info!(
            target: "scripting",
            "Starting script runtime for {} (fiber stack {} bytes)",
            version.game_version(),
            config.stack_size
        );

        let scheduler = ScriptRegistry::new(state, clock)
            .with_module_names(module_names)
            .with_reset_hook(reset_hook)
            .with_config(config);

        Self {
            scheduler,
            natives: NativeBridge::new(natives),
            keyboard: KeyboardHandlers::new(),
            version,
            world,
        }
    }

    pub fn scheduler(&self) -> &ScriptRegistry {
        &self.scheduler
    }

    pub fn natives(&self) -> &NativeBridge {
        &self.natives
    }

    pub fn keyboard(&self) -> &KeyboardHandlers {
        &self.keyboard
    }

    /// Advance every script by one step; call once per host frame
    pub fn tick(&self) {
        self.scheduler.tick();
    }

    pub fn register_script(&self, module: ModuleId, entry: ScriptMain) -> bool {
        self.scheduler.add_script(module, entry)
    }

    pub fn unregister_script(&self, module: ModuleId) -> bool {
        self.scheduler.remove_script(module)
    }

    pub fn unregister_function(&self, entry: ScriptMain) -> bool {
        self.scheduler.remove_script_by_entry(entry)
    }

    /// Host script thread reset: restart every script, then reset the host thread
    pub fn reset_scripts(&self, request: ResetRequest) -> ThreadState {
        self.scheduler.reset(request)
    }

    pub fn game_version(&self) -> GameVersion {
        self.version.game_version()
    }

    /// Register a key handler on behalf of the script running right now, if any
    pub fn register_keyboard_handler(&self, handler: KeyboardHandler) -> bool {
        self.keyboard.register_for(self.scheduler.current_module(), handler)
    }

    /// Entry point for the host's input hook
    pub fn on_keyboard_event(&self, event: &KeyboardEvent) {
        self.keyboard.dispatch(event);
    }

    pub fn world_handles(&self, kind: PoolKind, out: &mut [i32]) -> usize {
        collect_handles(self.world.as_ref(), kind, out)
    }

    pub fn global_ptr(&self, index: i32) -> *mut u64 {
        self.world.global_ptr(index)
    }

    pub fn entity_base_address(&self, handle: i32) -> *mut u8 {
        self.world.entity_base_address(handle)
    }
}
