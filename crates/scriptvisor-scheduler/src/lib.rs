/// Cooperative script scheduler
///
/// Every registered module gets a [`ScriptUnit`]: its entry function running on
/// a private fiber stack. The host calls [`ScriptRegistry::tick`] once per
/// frame and each due unit is resumed in turn on the calling thread until it
/// waits or returns. Only one unit ever executes at a time.
pub mod clock;
pub mod registry;
pub mod unit;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use registry::{
    SchedulerConfig, ScriptRegistry, DEFAULT_STACK_SIZE, MAX_STACK_SIZE, MIN_STACK_SIZE,
};
pub use unit::{ScriptMain, ScriptUnit, Suspend, UnitStatus};
