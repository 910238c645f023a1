//! Post-link builtin library import
//!
//! Pulls the builtin functions a compiled program needs out of a lazily
//! loadable library, links them in, and lowers builtin calls to target
//! intrinsics.

pub mod archive;
pub mod ir;
pub mod linker;
pub mod pass;

pub use archive::{load_archive, read_archive, save_archive, write_archive, ArchiveError};
pub use ir::{Function, IrError, Module};
pub use linker::{link_modules, LinkError};
pub use pass::{import_builtins, PassConfig, PassConfigBuilder, PassError, PassStats};
