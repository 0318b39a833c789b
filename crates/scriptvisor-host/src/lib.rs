/// Host-side collaborator interfaces for scriptvisor
///
/// The runtime never reaches into the host process directly. Everything it
/// needs from the host (run state, module names, version, entity pools, the
/// script thread reset hook) goes through the traits in this crate, so the
/// scheduler and native bridge can be driven by a real host or by a test double.
pub mod fault;
pub mod keyboard;
pub mod module;
pub mod state;
pub mod thread;
pub mod version;
pub mod world;

pub use keyboard::KeyboardEvent;
pub use module::{ModuleId, ModuleNameMap, ModuleNames};
pub use state::{GameState, HostState, SharedHostState};
pub use thread::{NoopResetHook, ResetHook, ResetRequest, ThreadState};
pub use version::{FixedVersion, GameVersion, VersionProvider};
pub use world::{EntityAddress, EntityPool, NullWorld, PoolKind, WorldView};
