//! IR types
//!
//! The type lattice is intentionally small: the pass only ever needs to
//! compare signatures, pick intrinsic overloads and check operand widths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A first-class IR type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    /// Integer of the given bit width
    Int(u16),
    /// IEEE float of the given bit width (16, 32, 64)
    Float(u16),
    /// Pointer to a pointee type
    Ptr(Box<Type>),
    Function(FunctionType),
}

/// Signature of a function or of a call site
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub ret: Box<Type>,
    pub params: Vec<Type>,
}

impl FunctionType {
    pub fn new(ret: Type, params: Vec<Type>) -> Self {
        Self {
            ret: Box::new(ret),
            params,
        }
    }

    pub fn ret(&self) -> &Type {
        &self.ret
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Type {
    pub fn i1() -> Type {
        Type::Int(1)
    }

    pub fn i8() -> Type {
        Type::Int(8)
    }

    pub fn i32() -> Type {
        Type::Int(32)
    }

    pub fn i64() -> Type {
        Type::Int(64)
    }

    pub fn f32() -> Type {
        Type::Float(32)
    }

    pub fn f64() -> Type {
        Type::Float(64)
    }

    pub fn ptr_to(pointee: Type) -> Type {
        Type::Ptr(Box::new(pointee))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    /// Bit width of scalar types, `None` for everything else
    pub fn primitive_size_in_bits(&self) -> Option<u16> {
        match self {
            Type::Int(bits) | Type::Float(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Suffix used when this type overloads an intrinsic name.
    pub fn mangle(&self) -> String {
        match self {
            Type::Void => "isVoid".to_string(),
            Type::Int(bits) => format!("i{}", bits),
            Type::Float(bits) => format!("f{}", bits),
            Type::Ptr(pointee) => format!("p0{}", pointee.mangle()),
            Type::Function(fty) => {
                let mut out = format!("f_{}", fty.ret.mangle());
                for param in &fty.params {
                    out.push_str(&param.mangle());
                }
                out.push('f');
                out
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float(16) => write!(f, "half"),
            Type::Float(32) => write!(f, "float"),
            Type::Float(64) => write!(f, "double"),
            Type::Float(bits) => write!(f, "f{}", bits),
            Type::Ptr(pointee) => write!(f, "{}*", pointee),
            Type::Function(fty) => write!(f, "{}", fty),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}
