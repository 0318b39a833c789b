use crate::value::NativeValue;

/// Number of result words a native may write (enough for a vector)
pub const MAX_RESULT_WORDS: usize = 3;

/// Argument and result buffer for one native call
///
/// Arguments are appended in call order and cleared by [`reset`]. The result
/// buffer is left alone by `reset`: a call that never reaches a
/// handler leaves the previous result in place, and callers reading it get a
/// stale value rather than uninitialised memory.
///
/// [`reset`]: NativeCallContext::reset
#[derive(Debug, Clone, Default)]
pub struct NativeCallContext {
    args: Vec<u64>,
    pub(crate) result: [u64; MAX_RESULT_WORDS],
}

impl NativeCallContext {
    pub fn new() -> Self {
        Self {
            args: Vec::with_capacity(32),
            result: [0; MAX_RESULT_WORDS],
        }
    }

    /// Start a new call: drop all pushed arguments
    pub fn reset(&mut self) {
        self.args.clear();
    }

    /// Append one argument word. There is no upper bound; natives validate
    /// their own argument counts.
    pub fn push(&mut self, word: u64) {
        self.args.push(word);
    }

    pub fn push_value<T: NativeValue>(&mut self, value: T) {
        self.push(value.into_word());
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[u64] {
        &self.args
    }

    /// Argument `index` reinterpreted as `T`
    pub fn arg<T: NativeValue>(&self, index: usize) -> Option<T> {
        self.args.get(index).copied().map(T::from_word)
    }

    pub fn set_result<T: NativeValue>(&mut self, value: T) {
        self.result[0] = value.into_word();
    }

    /// Write a multi-word result. Words beyond [`MAX_RESULT_WORDS`] are dropped.
    pub fn set_result_words(&mut self, words: &[u64]) {
        let n = words.len().min(MAX_RESULT_WORDS);
        self.result[..n].copy_from_slice(&words[..n]);
    }

    pub fn result<T: NativeValue>(&self) -> T {
        T::from_word(self.result[0])
    }

    pub fn result_words(&self) -> &[u64; MAX_RESULT_WORDS] {
        &self.result
    }

    /// Address of the first result word
    pub fn result_ptr(&mut self) -> *mut u64 {
        self.result.as_mut_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_args_only() {
        let mut ctx = NativeCallContext::new();
        ctx.push_value(5i32);
        ctx.push_value(2.0f32);
        ctx.set_result(99u32);

        assert_eq!(ctx.arg_count(), 2);
        assert_eq!(ctx.arg::<i32>(0), Some(5));
        assert_eq!(ctx.arg::<f32>(1), Some(2.0));
        assert_eq!(ctx.arg::<u32>(2), None);

        ctx.reset();
        assert_eq!(ctx.arg_count(), 0);
        assert_eq!(ctx.result::<u32>(), 99);
    }

    #[test]
    fn test_result_words_are_truncated() {
        let mut ctx = NativeCallContext::new();
        ctx.set_result_words(&[1, 2, 3, 4, 5]);
        assert_eq!(ctx.result_words(), &[1, 2, 3]);
    }

    #[test]
    fn test_result_ptr_reads_first_word() {
        let mut ctx = NativeCallContext::new();
        ctx.set_result(0x1234u64);
        let ptr = ctx.result_ptr();
        assert_eq!(unsafe { *ptr }, 0x1234);
    }
}
