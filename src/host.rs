//! A stand-in host process
//!
//! Drives the runtime without a game: the host spends a configurable number
//! of frames loading, then reports that it is playing. A handful of natives
//! give modules something to call.

use std::ffi::{c_char, CStr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use scriptvisor_host::{GameState, HostState, SharedHostState};
use scriptvisor_natives::{NativeCallContext, NativeRegistry};
use tracing::info;

/// Milliseconds since the host started, as `i32`
pub const GET_GAME_TIMER: u64 = 0x9cd2_7b0f_5a2b_5cd1;
/// Frames the host has run, as `i32`
pub const GET_FRAME_COUNT: u64 = 0xfc8f_1b0c_6b1e_3d20;
/// Log a C string from a script; no result
pub const LOG_STRING: u64 = 0x2f1e_9a47_c0d3_11e8;

static HOST_FRAMES: AtomicU64 = AtomicU64::new(0);
static HOST_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Simulated host run state
#[derive(Debug)]
pub struct SimulatedHost {
    state: SharedHostState,
    frames: AtomicU64,
    playing_after: u64,
}

impl SimulatedHost {
    /// The host starts loading and is playing from frame `playing_after` on
    pub fn new(playing_after: u64) -> Self {
        HOST_EPOCH.get_or_init(Instant::now);

        let host = Self {
            state: SharedHostState::new(GameState::Loading),
            frames: AtomicU64::new(0),
            playing_after,
        };
        if playing_after == 0 {
            host.state.set(GameState::Playing);
        }
        host
    }

    /// Begin the next frame; returns its number, starting at 1
    pub fn advance_frame(&self) -> u64 {
        let frame = self.frames.fetch_add(1, Ordering::AcqRel) + 1;
        HOST_FRAMES.store(frame, Ordering::Release);

        if frame == self.playing_after {
            info!("Host finished loading after {} frame(s)", frame);
            self.state.set(GameState::Playing);
        }
        frame
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Native table with the demonstration natives registered
    pub fn natives() -> Arc<NativeRegistry> {
        let natives = NativeRegistry::new();
        natives.register(GET_GAME_TIMER, get_game_timer);
        natives.register(GET_FRAME_COUNT, get_frame_count);
        natives.register(LOG_STRING, log_string);
        Arc::new(natives)
    }
}

impl HostState for SimulatedHost {
    fn game_state(&self) -> Option<GameState> {
        self.state.game_state()
    }
}

fn get_game_timer(ctx: &mut NativeCallContext) {
    let elapsed = HOST_EPOCH.get_or_init(Instant::now).elapsed().as_millis();
    ctx.set_result(elapsed as i32);
}

fn get_frame_count(ctx: &mut NativeCallContext) {
    ctx.set_result(HOST_FRAMES.load(Ordering::Acquire) as i32);
}

fn log_string(ctx: &mut NativeCallContext) {
    let Some(text) = ctx.arg::<*const c_char>(0).filter(|text| !text.is_null()) else {
        return;
    };

    // SAFETY: scripts pass a NUL-terminated string that outlives the call
    let text = unsafe { CStr::from_ptr(text) };
    info!(target: "natives", "[script] {}", text.to_string_lossy());
}
