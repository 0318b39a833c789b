/// Native call marshalling
///
/// Scripts call into the host's function table with a three step protocol:
/// `init(hash)`, any number of `push(word)`, then `call()`. Arguments and
/// results travel as untyped 64-bit words; caller and callee agree on the types
/// out of band. [`NativeValue`] does the bit reinterpretation on either side.
pub mod bridge;
pub mod context;
pub mod table;
pub mod value;

pub use bridge::NativeBridge;
pub use context::{NativeCallContext, MAX_RESULT_WORDS};
pub use table::{NativeHandler, NativeRegistry, NativeTable};
pub use value::{NativeValue, Vector3};
