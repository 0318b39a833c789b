use std::fmt;

/// Host build identifier as reported to scripts by `getGameVersion`
///
/// Values are whatever the host's version detection produces; the runtime only
/// passes them through. `-1` means the build was not recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct GameVersion(pub i32);

impl GameVersion {
    pub const UNKNOWN: GameVersion = GameVersion(-1);

    pub fn is_known(self) -> bool {
        self.0 >= 0
    }
}

impl Default for GameVersion {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "build #{}", self.0)
        } else {
            write!(f, "unknown build")
        }
    }
}

/// Version detection collaborator
pub trait VersionProvider: Send + Sync {
    fn game_version(&self) -> GameVersion;
}

/// Version provider that always reports the same value
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedVersion(pub GameVersion);

impl VersionProvider for FixedVersion {
    fn game_version(&self) -> GameVersion {
        self.0
    }
}
