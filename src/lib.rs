/// Standalone host for scriptvisor script modules
///
/// Reads the config file, sets up logging, and runs a simulated host that
/// loads script modules from a directory and ticks them once per frame.
pub mod config;
pub mod host;
pub mod logging;
pub mod reload;
pub mod runner;

pub use config::{ConfigLoadError, ScriptvisorConfig};
pub use host::SimulatedHost;
pub use runner::{HostOptions, ScriptHost};
