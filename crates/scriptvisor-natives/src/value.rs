//! Bit reinterpretation between Rust values and native call words
//!
//! A value occupies the low bytes of its word and the rest is zero, the same
//! layout a C caller gets by writing the value through a pointer into a zeroed
//! `uint64_t`. Reading takes the low bytes back out.

/// A value that can travel through one 64-bit argument or result word
pub trait NativeValue: Sized {
    fn into_word(self) -> u64;
    fn from_word(word: u64) -> Self;
}

macro_rules! impl_native_int {
    ($($ty:ty => $bits:ty),* $(,)?) => {
        $(
            impl NativeValue for $ty {
                fn into_word(self) -> u64 {
                    self as $bits as u64
                }

                fn from_word(word: u64) -> Self {
                    word as $bits as $ty
                }
            }
        )*
    };
}

impl_native_int!(
    i8 => u8,
    i16 => u16,
    i32 => u32,
    i64 => u64,
    isize => usize,
    u8 => u8,
    u16 => u16,
    u32 => u32,
    u64 => u64,
    usize => usize,
);

impl NativeValue for bool {
    fn into_word(self) -> u64 {
        self as u64
    }

    fn from_word(word: u64) -> Self {
        word as u8 != 0
    }
}

impl NativeValue for f32 {
    fn into_word(self) -> u64 {
        self.to_bits() as u64
    }

    fn from_word(word: u64) -> Self {
        f32::from_bits(word as u32)
    }
}

impl NativeValue for f64 {
    fn into_word(self) -> u64 {
        self.to_bits()
    }

    fn from_word(word: u64) -> Self {
        f64::from_bits(word)
    }
}

impl<T> NativeValue for *const T {
    fn into_word(self) -> u64 {
        self as usize as u64
    }

    fn from_word(word: u64) -> Self {
        word as usize as *const T
    }
}

impl<T> NativeValue for *mut T {
    fn into_word(self) -> u64 {
        self as usize as u64
    }

    fn from_word(word: u64) -> Self {
        word as usize as *mut T
    }
}

/// Three-component vector as natives return it: one float per word
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_words(self) -> [u64; 3] {
        [self.x.into_word(), self.y.into_word(), self.z.into_word()]
    }

    pub fn from_words(words: &[u64; 3]) -> Self {
        Self {
            x: f32::from_word(words[0]),
            y: f32::from_word(words[1]),
            z: f32::from_word(words[2]),
        }
    }
}
