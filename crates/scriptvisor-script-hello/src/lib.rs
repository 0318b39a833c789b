//! Smallest possible script module: `ScriptMain` counts its runs and returns

use std::sync::atomic::{AtomicU32, Ordering};

static RUNS: AtomicU32 = AtomicU32::new(0);

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C-unwind" fn ScriptMain() {
    RUNS.fetch_add(1, Ordering::SeqCst);
}

/// Times `ScriptMain` has run in this copy of the module
#[no_mangle]
pub extern "C" fn hello_runs() -> u32 {
    RUNS.load(Ordering::SeqCst)
}
