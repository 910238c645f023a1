//! In-memory IR
//!
//! A deliberately small model of a compiled module:
//! - `Module`: ordered, uniquely named functions and globals
//! - `Function`: declared, defined, or materializable on demand
//! - `Instruction`: calls, arithmetic, casts and returns with optional
//!   source locations
//! - `IntrinsicId`: the fixed catalog of primitive target operations
//!
//! Bodies serialize with serde; out-of-line bodies are provided by a
//! `BodyLoader` (see `crate::archive`).

mod builder;
mod error;
mod function;
mod instr;
mod intrinsics;
mod module;
mod printer;
mod types;

pub use builder::*;
pub use error::*;
pub use function::*;
pub use instr::*;
pub use intrinsics::*;
pub use module::*;
pub use types::*;

#[cfg(test)]
mod tests;
