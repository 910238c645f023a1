//! Configuration flags seeded into the program before rewriting

use crate::ir::{Constant, Module};
use log::debug;

/// Value written into a flag global. Every flag global is an `i32`;
/// float values are stored as their raw bit pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagValue {
    Int(u32),
    Float(f32),
}

impl FlagValue {
    pub fn bits(self) -> u32 {
        match self {
            FlagValue::Int(value) => value,
            FlagValue::Float(value) => value.to_bits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFlag {
    pub name: String,
    pub value: FlagValue,
}

impl ConfigFlag {
    pub fn new(name: impl Into<String>, value: FlagValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

pub const DEFAULT_FLAGS: &[(&str, FlagValue)] = &[
    ("__FlushDenormals", FlagValue::Int(1)),
    ("__DashGSpecified", FlagValue::Int(0)),
    ("__FastRelaxedMath", FlagValue::Int(0)),
    ("__UseNative64BitSubgroupBuiltin", FlagValue::Int(1)),
    ("__CRMacros", FlagValue::Int(1)),
    ("__IsSPIRV", FlagValue::Int(0)),
    ("__EnableSWSrgbWrites", FlagValue::Int(0)),
    ("__ProfilingTimerResolution", FlagValue::Float(0.0)),
];

pub fn default_flags() -> Vec<ConfigFlag> {
    DEFAULT_FLAGS
        .iter()
        .map(|(name, value)| ConfigFlag::new(*name, *value))
        .collect()
}

/// Set the initializer of every listed global the module has. Missing
/// globals are skipped. Returns how many globals were set.
pub fn initialize_flags(module: &mut Module, flags: &[ConfigFlag]) -> usize {
    let mut set = 0;
    for flag in flags {
        if let Some(global) = module.global_mut(&flag.name) {
            global.initializer = Some(Constant::i32(flag.value.bits()));
            debug!("flag {} = {:#x}", flag.name, flag.value.bits());
            set += 1;
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{GlobalVariable, Type};

    #[test]
    fn test_only_present_flags_are_set() {
        let mut module = Module::new("m");
        module.add_global(GlobalVariable::new("__FlushDenormals", Type::i32()));
        module.add_global(GlobalVariable::new("__IsSPIRV", Type::i32()));
        module.add_global(GlobalVariable::new("unrelated", Type::i32()));

        let set = initialize_flags(&mut module, &default_flags());
        assert_eq!(set, 2);
        assert_eq!(module.global("__FlushDenormals").unwrap().initializer, Some(Constant::i32(1)));
        assert_eq!(module.global("__IsSPIRV").unwrap().initializer, Some(Constant::i32(0)));
        assert!(module.global("unrelated").unwrap().is_declaration());
    }

    #[test]
    fn test_float_flag_stores_bit_pattern() {
        let mut module = Module::new("m");
        module.add_global(GlobalVariable::new("__ProfilingTimerResolution", Type::i32()));
        let flags = vec![ConfigFlag::new("__ProfilingTimerResolution", FlagValue::Float(1.5))];

        initialize_flags(&mut module, &flags);
        let init = module.global("__ProfilingTimerResolution").unwrap().initializer.clone();
        assert_eq!(init.and_then(|c| c.as_int()), Some(1.5f32.to_bits() as u64));
    }

    #[test]
    fn test_default_resolution_is_zero_bits() {
        assert_eq!(FlagValue::Float(0.0).bits(), 0);
        assert_eq!(default_flags().len(), 8);
    }
}
