//! Primitive intrinsic operations
//!
//! The catalog is fixed: a handful of generic operations the front end may
//! emit plus the target's native operation set. Every intrinsic knows its
//! base name and how its signature is derived from its overload types, so a
//! declaration can be materialized on demand in any module.

use super::types::{FunctionType, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntrinsicId {
    // generic
    LifetimeStart,
    LifetimeEnd,
    Ctlz,
    Fma,
    // target
    GenxRnde,
    GenxRndd,
    GenxRndu,
    GenxRndz,
    GenxCos,
    GenxSin,
    GenxExp,
    GenxLog,
    GenxSqrt,
    GenxCbit,
    GenxPow,
    GenxBfrev,
    GenxFmax,
    GenxFmin,
    GenxIeeeSqrt,
    GenxIeeeDiv,
    GenxFptosiSat,
    GenxFptouiSat,
    GenxLzd,
}

impl IntrinsicId {
    pub fn base_name(self) -> &'static str {
        match self {
            IntrinsicId::LifetimeStart => "lifetime.start",
            IntrinsicId::LifetimeEnd => "lifetime.end",
            IntrinsicId::Ctlz => "ctlz",
            IntrinsicId::Fma => "fma",
            IntrinsicId::GenxRnde => "genx.rnde",
            IntrinsicId::GenxRndd => "genx.rndd",
            IntrinsicId::GenxRndu => "genx.rndu",
            IntrinsicId::GenxRndz => "genx.rndz",
            IntrinsicId::GenxCos => "genx.cos",
            IntrinsicId::GenxSin => "genx.sin",
            IntrinsicId::GenxExp => "genx.exp",
            IntrinsicId::GenxLog => "genx.log",
            IntrinsicId::GenxSqrt => "genx.sqrt",
            IntrinsicId::GenxCbit => "genx.cbit",
            IntrinsicId::GenxPow => "genx.pow",
            IntrinsicId::GenxBfrev => "genx.bfrev",
            IntrinsicId::GenxFmax => "genx.fmax",
            IntrinsicId::GenxFmin => "genx.fmin",
            IntrinsicId::GenxIeeeSqrt => "genx.ieee.sqrt",
            IntrinsicId::GenxIeeeDiv => "genx.ieee.div",
            IntrinsicId::GenxFptosiSat => "genx.fptosi.sat",
            IntrinsicId::GenxFptouiSat => "genx.fptoui.sat",
            IntrinsicId::GenxLzd => "genx.lzd",
        }
    }

    /// Number of overload types the intrinsic's name is parameterized by
    pub fn overload_count(self) -> usize {
        match self {
            IntrinsicId::LifetimeStart | IntrinsicId::LifetimeEnd => 0,
            IntrinsicId::GenxFptosiSat | IntrinsicId::GenxFptouiSat => 2,
            _ => 1,
        }
    }

    /// Mangled symbol name of the declaration for `overloads`.
    pub fn declaration_name(self, overloads: &[Type]) -> String {
        let mut name = format!("llvm.{}", self.base_name());
        for ty in overloads {
            name.push('.');
            name.push_str(&ty.mangle());
        }
        name
    }

    /// Signature of the declaration for `overloads`.
    ///
    /// Callers must pass exactly `overload_count()` types.
    pub fn signature(self, overloads: &[Type]) -> FunctionType {
        debug_assert_eq!(overloads.len(), self.overload_count(), "{}", self);
        match self {
            IntrinsicId::LifetimeStart | IntrinsicId::LifetimeEnd => {
                FunctionType::new(Type::Void, vec![Type::i64(), Type::ptr_to(Type::i8())])
            }
            IntrinsicId::GenxFptosiSat | IntrinsicId::GenxFptouiSat => {
                FunctionType::new(overloads[0].clone(), vec![overloads[1].clone()])
            }
            IntrinsicId::Ctlz => {
                let ty = overloads[0].clone();
                FunctionType::new(ty.clone(), vec![ty, Type::i1()])
            }
            IntrinsicId::Fma => {
                let ty = overloads[0].clone();
                FunctionType::new(ty.clone(), vec![ty.clone(), ty.clone(), ty])
            }
            IntrinsicId::GenxPow
            | IntrinsicId::GenxFmax
            | IntrinsicId::GenxFmin
            | IntrinsicId::GenxIeeeDiv => {
                let ty = overloads[0].clone();
                FunctionType::new(ty.clone(), vec![ty.clone(), ty])
            }
            _ => {
                let ty = overloads[0].clone();
                FunctionType::new(ty.clone(), vec![ty])
            }
        }
    }
}

impl fmt::Display for IntrinsicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "llvm.{}", self.base_name())
    }
}
