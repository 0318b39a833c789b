//! Exported C entry points for script modules
//!
//! Modules link against these symbols by name. They reach the runtime through
//! a process-wide slot filled by [`install`]; while the slot is empty every
//! export logs a warning and returns a default value.
//!
//! The exports never unwind into the caller and never report errors to it:
//! failures are logged and absorbed.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_void};
use std::slice;
use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};
use scriptvisor_host::{ModuleId, PoolKind};
use scriptvisor_scheduler::ScriptMain;
use tracing::{info, warn};

use crate::keyboard::KeyboardHandler;
use crate::runtime::Runtime;

static RUNTIME: RwLock<Option<Arc<Runtime>>> = const_rwlock(None);

/// Make `runtime` the target of the exported entry points
///
/// Returns the previously installed runtime, if any.
pub fn install(runtime: Arc<Runtime>) -> Option<Arc<Runtime>> {
    info!(target: "scripting", "Installing script runtime");
    RUNTIME.write().replace(runtime)
}

/// Detach the installed runtime; exports become no-ops again
pub fn uninstall() -> Option<Arc<Runtime>> {
    let previous = RUNTIME.write().take();
    if previous.is_some() {
        info!(target: "scripting", "Uninstalled script runtime");
    }
    previous
}

pub fn installed() -> Option<Arc<Runtime>> {
    RUNTIME.read().clone()
}

fn runtime(export: &str) -> Option<Arc<Runtime>> {
    let runtime = installed();
    if runtime.is_none() {
        warn!(target: "scripting", "{} called with no script runtime installed", export);
    }
    runtime
}

#[no_mangle]
pub extern "C" fn scriptRegister(module: *mut c_void, entry: Option<ScriptMain>) {
    let Some(entry) = entry else {
        warn!(target: "scripting", "scriptRegister called with a null entry function");
        return;
    };

    if let Some(rt) = runtime("scriptRegister") {
        rt.register_script(ModuleId::from_handle(module), entry);
    }
}

#[no_mangle]
pub extern "C" fn scriptRegisterAdditionalThread(_module: *mut c_void, _entry: Option<ScriptMain>) {
    warn!(target: "scripting", "Plugin is trying to use scriptRegisterAdditionalThread, which is not supported");
}

#[no_mangle]
pub extern "C" fn scriptUnregister(module: *mut c_void) {
    if let Some(rt) = runtime("scriptUnregister") {
        rt.unregister_script(ModuleId::from_handle(module));
    }
}

#[no_mangle]
pub extern "C" fn scriptUnregisterFunction(entry: Option<ScriptMain>) {
    let Some(entry) = entry else {
        warn!(target: "scripting", "scriptUnregisterFunction called with a null entry function");
        return;
    };

    if let Some(rt) = runtime("scriptUnregisterFunction") {
        rt.unregister_function(entry);
    }
}

#[no_mangle]
pub extern "C" fn scriptWait(wait_ms: u32) {
    let Some(rt) = runtime("scriptWait") else {
        return;
    };

    let suspend = rt.scheduler().prepare_wait(u64::from(wait_ms));
    // Nothing owned may stay on the fiber stack while it is suspended
    drop(rt);

    if let Some(suspend) = suspend {
        suspend.suspend();
    }
}

#[no_mangle]
pub extern "C" fn nativeInit(hash: u64) {
    if let Some(rt) = runtime("nativeInit") {
        rt.natives().init(hash);
    }
}

#[no_mangle]
pub extern "C" fn nativePush64(value: u64) {
    if let Some(rt) = runtime("nativePush64") {
        rt.natives().push(value);
    }
}

/// Returns the shared result buffer, or null with no runtime installed
#[no_mangle]
pub extern "C" fn nativeCall() -> *mut u64 {
    match runtime("nativeCall") {
        Some(rt) => rt.natives().call(),
        None => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn getGameVersion() -> i32 {
    runtime("getGameVersion")
        .map(|rt| rt.game_version().0)
        .unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn keyboardHandlerRegister(handler: Option<KeyboardHandler>) {
    let Some(handler) = handler else {
        return;
    };

    if let Some(rt) = runtime("keyboardHandlerRegister") {
        rt.register_keyboard_handler(handler);
    }
}

#[no_mangle]
pub extern "C" fn keyboardHandlerUnregister(handler: Option<KeyboardHandler>) {
    let Some(handler) = handler else {
        return;
    };

    if let Some(rt) = runtime("keyboardHandlerUnregister") {
        rt.keyboard().unregister(handler);
    }
}

#[no_mangle]
pub extern "C" fn getGlobalPtr(index: i32) -> *mut u64 {
    match runtime("getGlobalPtr") {
        Some(rt) => rt.global_ptr(index),
        None => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "C" fn getScriptHandleBaseAddress(handle: i32) -> *mut u8 {
    match runtime("getScriptHandleBaseAddress") {
        Some(rt) => rt.entity_base_address(handle),
        None => std::ptr::null_mut(),
    }
}

fn world_get_all(export: &str, kind: PoolKind, array: *mut i32, array_size: i32) -> i32 {
    let Some(rt) = runtime(export) else {
        return 0;
    };

    if array.is_null() || array_size <= 0 {
        return 0;
    }

    // SAFETY: the caller passes an array of at least `array_size` ints
    let out = unsafe { slice::from_raw_parts_mut(array, array_size as usize) };
    rt.world_handles(kind, out) as i32
}

#[no_mangle]
pub extern "C" fn worldGetAllVehicles(array: *mut i32, array_size: i32) -> i32 {
    world_get_all("worldGetAllVehicles", PoolKind::Vehicles, array, array_size)
}

#[no_mangle]
pub extern "C" fn worldGetAllPeds(array: *mut i32, array_size: i32) -> i32 {
    world_get_all("worldGetAllPeds", PoolKind::Peds, array, array_size)
}

#[no_mangle]
pub extern "C" fn worldGetAllObjects(array: *mut i32, array_size: i32) -> i32 {
    world_get_all("worldGetAllObjects", PoolKind::Objects, array, array_size)
}

#[no_mangle]
pub extern "C" fn worldGetAllPickups(array: *mut i32, array_size: i32) -> i32 {
    world_get_all("worldGetAllPickups", PoolKind::Pickups, array, array_size)
}

#[no_mangle]
pub extern "C" fn createTexture(_file_name: *const c_char) -> i32 {
    warn!(target: "scripting", "Plugin is trying to use createTexture, which is not supported");
    0
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn drawTexture(
    _id: i32,
    _index: i32,
    _level: i32,
    _time: i32,
    _size_x: f32,
    _size_y: f32,
    _center_x: f32,
    _center_y: f32,
    _pos_x: f32,
    _pos_y: f32,
    _rotation: f32,
    _screen_height_scale_factor: f32,
    _r: f32,
    _g: f32,
    _b: f32,
    _a: f32,
) {
    warn!(target: "scripting", "Plugin is trying to use drawTexture, which is not supported");
}
