//! Model definitions
//!
//! Descriptors, references and the stack they live in.

mod descriptor;
mod engine;
mod kind;
mod stack;
mod value;

// Re-exports
pub use descriptor::*;
pub use engine::*;
pub use kind::*;
pub use stack::*;
pub use value::*;
