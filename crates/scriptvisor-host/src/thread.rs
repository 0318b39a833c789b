use std::ffi::c_void;

/// State of the host script thread the runtime lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ThreadState {
    Idle = 0,
    Running = 1,
    Killed = 2,
}

/// Arguments the host passes when it resets the runtime's script thread
///
/// `args` points into host memory and is forwarded untouched.
#[derive(Debug, Clone, Copy)]
pub struct ResetRequest {
    pub script_hash: u32,
    pub args: *mut c_void,
    pub arg_count: u32,
}

impl ResetRequest {
    pub fn new(script_hash: u32) -> Self {
        Self {
            script_hash,
            args: std::ptr::null_mut(),
            arg_count: 0,
        }
    }
}

/// The host's own script-thread reset, invoked after the registry restarts
/// every script
pub trait ResetHook: Send + Sync {
    fn reset(&self, request: ResetRequest) -> ThreadState;
}

/// Reset hook for hosts without a script thread of their own
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResetHook;

impl ResetHook for NoopResetHook {
    fn reset(&self, _request: ResetRequest) -> ThreadState {
        ThreadState::Idle
    }
}
