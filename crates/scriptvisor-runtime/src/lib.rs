/// Runtime context for hosting native script modules
///
/// A [`Runtime`] bundles the scheduler, the native bridge, the keyboard handler
/// set and the world accessors behind one object built from the host's
/// [`HostServices`]. The [`abi`] module exposes it to script modules through
/// the exported C entry points, and [`loader`] opens module files and
/// registers their entry functions.
pub mod abi;
pub mod keyboard;
pub mod loader;
pub mod runtime;
pub mod scanner;
pub mod world;

pub use keyboard::{KeyboardHandler, KeyboardHandlers};
pub use loader::{LoadError, LoaderSettings, ModuleLoader};
pub use runtime::{HostServices, Runtime};
pub use scanner::{ModuleScanner, ScanResult};
pub use world::collect_handles;
