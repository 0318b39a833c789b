use std::sync::atomic::{AtomicU32, Ordering};

/// Run state reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GameState {
    /// Actively playing; scripts may start
    Playing = 0,
    /// Intro movie
    Intro = 1,
    /// License screens
    Licenses = 3,
    /// Main menu
    MainMenu = 5,
    /// Loading a session
    Loading = 6,
}

impl GameState {
    /// Decode a raw host state value
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(GameState::Playing),
            1 => Some(GameState::Intro),
            3 => Some(GameState::Licenses),
            5 => Some(GameState::MainMenu),
            6 => Some(GameState::Loading),
            _ => None,
        }
    }
}

/// Query for the host's current run state
pub trait HostState: Send + Sync {
    /// Current state, or `None` if the host reports something unrecognised
    fn game_state(&self) -> Option<GameState>;

    /// Whether scripts are allowed to start
    fn is_playing(&self) -> bool {
        self.game_state() == Some(GameState::Playing)
    }
}

/// Host state backed by an atomic, settable from any thread
#[derive(Debug)]
pub struct SharedHostState {
    raw: AtomicU32,
}

impl SharedHostState {
    pub fn new(state: GameState) -> Self {
        Self {
            raw: AtomicU32::new(state as u32),
        }
    }

    pub fn set(&self, state: GameState) {
        self.raw.store(state as u32, Ordering::Release);
    }

    /// Store a raw value as read from host memory
    pub fn set_raw(&self, raw: u32) {
        self.raw.store(raw, Ordering::Release);
    }
}

impl Default for SharedHostState {
    fn default() -> Self {
        Self::new(GameState::Loading)
    }
}

impl HostState for SharedHostState {
    fn game_state(&self) -> Option<GameState> {
        GameState::from_raw(self.raw.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_playing_is_playing() {
        let state = SharedHostState::default();
        assert!(!state.is_playing());

        state.set(GameState::MainMenu);
        assert!(!state.is_playing());

        state.set(GameState::Playing);
        assert!(state.is_playing());
    }

    #[test]
    fn test_unknown_raw_state() {
        let state = SharedHostState::new(GameState::Playing);
        state.set_raw(42);
        assert_eq!(state.game_state(), None);
        assert!(!state.is_playing());
    }
}
