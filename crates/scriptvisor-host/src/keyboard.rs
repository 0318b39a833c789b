//! Keyboard events delivered by the host's input hook

/// A single key event, carrying the fields of a raw window-message key stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardEvent {
    /// Virtual key code
    pub key: u32,
    /// Repeat count for held keys
    pub repeats: u16,
    /// Hardware scan code
    pub scan_code: u8,
    /// Extended key (right-hand ctrl/alt, arrow cluster, ...)
    pub is_extended: bool,
    /// Alt was held
    pub is_with_alt: bool,
    /// Key was already down before this event
    pub was_down_before: bool,
    /// Key is being released
    pub is_up_now: bool,
}

impl KeyboardEvent {
    /// A plain key press with no modifiers
    pub fn key_down(key: u32) -> Self {
        Self {
            key,
            repeats: 1,
            scan_code: 0,
            is_extended: false,
            is_with_alt: false,
            was_down_before: false,
            is_up_now: false,
        }
    }

    /// A plain key release
    pub fn key_up(key: u32) -> Self {
        Self {
            was_down_before: true,
            is_up_now: true,
            ..Self::key_down(key)
        }
    }

    /// Add the alt modifier
    pub fn with_alt(mut self) -> Self {
        self.is_with_alt = true;
        self
    }
}
