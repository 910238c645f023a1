//! Builtin library import pass
//!
//! Runs after the program has been compiled and before target code
//! generation. In order:
//! 1. import the library functions the program transitively reaches
//! 2. seed the configuration flag globals
//! 3. repair calls made through signature-changing casts
//! 4. lower builtin calls to target intrinsics, then tighten linkage

mod deferred;
mod flags;
mod importer;
mod lowering;
mod resolver;
mod table;

pub use deferred::DeferredDeletions;
pub use flags::{default_flags, initialize_flags, ConfigFlag, FlagValue, DEFAULT_FLAGS};
pub use importer::{import_library, ImportStats};
pub use lowering::{internalize, BuiltinConverter, LoweringStats};
pub use resolver::{BitcastResolver, ResolveStats};
pub use table::{BuiltinTable, Lowering, PrefixRule};

use crate::ir::{IntrinsicId, IrError, Module, Type};
use crate::linker::LinkError;
use log::info;
use std::fmt;

/// Result type for the pass
pub type PassResult<T> = Result<T, PassError>;

/// Conditions that abort the pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassError {
    /// A library body could not be loaded, or the IR was inconsistent
    Ir(IrError),
    /// The library could not be linked into the program
    Link(LinkError),
    /// An intrinsic was called with an operand type the target lacks
    UnsupportedOperand {
        function: String,
        intrinsic: IntrinsicId,
        expected: Type,
        found: Type,
    },
    /// A builtin call lacks an argument its lowering needs
    MalformedCall { function: String, callee: String },
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::Ir(err) => write!(f, "IR error: {}", err),
            PassError::Link(err) => write!(f, "Link error: {}", err),
            PassError::UnsupportedOperand {
                function,
                intrinsic,
                expected,
                found,
            } => write!(
                f,
                "Unsupported operand in '{}': {} expects {}, found {}",
                function, intrinsic, expected, found
            ),
            PassError::MalformedCall { function, callee } => {
                write!(f, "Malformed call to '{}' in '{}'", callee, function)
            }
        }
    }
}

impl std::error::Error for PassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PassError::Ir(err) => Some(err),
            PassError::Link(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IrError> for PassError {
    fn from(err: IrError) -> Self {
        PassError::Ir(err)
    }
}

impl From<LinkError> for PassError {
    fn from(err: LinkError) -> Self {
        PassError::Link(err)
    }
}

/// Pass configuration
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Flag globals to initialize
    pub flags: Vec<ConfigFlag>,
    /// Make everything not exported internal once lowering is done
    pub internalize: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            flags: default_flags(),
            internalize: true,
        }
    }
}

/// Builder for PassConfig
pub struct PassConfigBuilder {
    config: PassConfig,
}

impl PassConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PassConfig::default(),
        }
    }

    /// Set a flag, overriding any default of the same name
    pub fn flag(mut self, name: impl Into<String>, value: FlagValue) -> Self {
        let name = name.into();
        match self.config.flags.iter_mut().find(|flag| flag.name == name) {
            Some(flag) => flag.value = value,
            None => self.config.flags.push(ConfigFlag::new(name, value)),
        }
        self
    }

    /// Drop every flag, defaults included
    pub fn no_flags(mut self) -> Self {
        self.config.flags.clear();
        self
    }

    pub fn internalize(mut self, enable: bool) -> Self {
        self.config.internalize = enable;
        self
    }

    pub fn build(self) -> PassConfig {
        self.config
    }
}

impl Default for PassConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What the pass did, stage by stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub functions_imported: usize,
    pub functions_pruned: usize,
    pub flags_set: usize,
    pub clones_created: usize,
    pub calls_redirected: usize,
    pub unresolved_bitcasts: usize,
    pub calls_lowered: usize,
    pub lifetime_markers_dropped: usize,
    pub symbols_internalized: usize,
}

/// Import `library` into `program` with the default configuration.
pub fn import_builtins(program: &mut Module, library: Module) -> PassResult<PassStats> {
    run(program, library, &PassConfig::default())
}

/// Run every stage of the pass over `program`.
pub fn run(program: &mut Module, library: Module, config: &PassConfig) -> PassResult<PassStats> {
    let imported = import_library(program, library)?;
    let flags_set = initialize_flags(program, &config.flags);
    let resolved = BitcastResolver::new().run(program)?;
    let lowered = BuiltinConverter::new(BuiltinTable::get()).run(program, config.internalize)?;

    let stats = PassStats {
        functions_imported: imported.linked,
        functions_pruned: imported.pruned,
        flags_set,
        clones_created: resolved.clones_created,
        calls_redirected: resolved.calls_redirected,
        unresolved_bitcasts: resolved.unresolved,
        calls_lowered: lowered.calls_lowered,
        lifetime_markers_dropped: lowered.lifetime_markers_dropped,
        symbols_internalized: lowered.symbols_internalized,
    };
    info!(
        "builtins imported into '{}': {} functions linked, {} pruned, {} flags set, {} clones, {} calls lowered",
        program.name,
        stats.functions_imported,
        stats.functions_pruned,
        stats.flags_set,
        stats.clones_created,
        stats.calls_lowered
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_config_builder() {
        let config = PassConfigBuilder::new()
            .flag("__FastRelaxedMath", FlagValue::Int(1))
            .flag("__Extra", FlagValue::Int(7))
            .internalize(false)
            .build();

        assert!(!config.internalize);
        assert_eq!(config.flags.len(), DEFAULT_FLAGS.len() + 1);
        let relaxed = config.flags.iter().find(|flag| flag.name == "__FastRelaxedMath").unwrap();
        assert_eq!(relaxed.value, FlagValue::Int(1));

        let empty = PassConfigBuilder::new().no_flags().build();
        assert!(empty.flags.is_empty());
        assert!(empty.internalize);
    }

    #[test]
    fn test_error_display() {
        let err = PassError::UnsupportedOperand {
            function: "k".to_string(),
            intrinsic: IntrinsicId::Ctlz,
            expected: Type::i32(),
            found: Type::i64(),
        };
        assert_eq!(err.to_string(), "Unsupported operand in 'k': llvm.ctlz expects i32, found i64");
    }
}
