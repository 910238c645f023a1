//! IR values and instructions

use super::types::{FunctionType, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an instruction, unique within its function
pub type InstId = u32;

/// Calling convention of a function or a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallingConv {
    #[default]
    C,
    Fast,
    SpirFunc,
    SpirKernel,
}

/// Source-location tag carried by an instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLoc {
    pub line: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl DebugLoc {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            scope: None,
        }
    }
}

/// Constant operands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int { bits: u16, value: u64 },
    Float { bits: u16, value: f64 },
    Null(Type),
    Undef(Type),
}

impl Constant {
    pub fn i32(value: u32) -> Self {
        Constant::Int {
            bits: 32,
            value: value as u64,
        }
    }

    /// Integer payload, if this is an integer constant
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// An operand: anything an instruction can consume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Result of another instruction in the same function
    Inst(InstId),
    /// Formal parameter of the enclosing function
    Arg(u32),
    Const(Constant),
    /// Direct reference to a function symbol
    Function(String),
    /// Reference to a global variable symbol
    Global(String),
    /// Pointer-cast constant expression
    Cast { value: Box<Value>, to: Type },
}

impl Value {
    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(name.into())
    }

    pub fn cast(value: Value, to: Type) -> Self {
        Value::Cast {
            value: Box::new(value),
            to,
        }
    }

    /// Peel every pointer cast wrapped around this value.
    pub fn strip_pointer_casts(&self) -> &Value {
        let mut current = self;
        while let Value::Cast { value, .. } = current {
            current = value;
        }
        current
    }

    /// Name of the function this value refers to, through casts.
    pub fn referenced_function(&self) -> Option<&str> {
        match self.strip_pointer_casts() {
            Value::Function(name) => Some(name),
            _ => None,
        }
    }

    /// Rewrite every function reference named `from` to `to`.
    pub fn rename_function(&mut self, from: &str, to: &str) {
        match self {
            Value::Function(name) if name == from => *name = to.to_string(),
            Value::Cast { value, .. } => value.rename_function(from, to),
            _ => {}
        }
    }
}

/// Two-operand arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

/// Value conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastOp {
    SIToFP,
    UIToFP,
    FPToSI,
    FPToUI,
    Bitcast,
}

/// Instruction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    Call {
        callee: Value,
        /// Signature the call site expects of its callee
        fn_ty: FunctionType,
        args: Vec<Value>,
        #[serde(default)]
        conv: CallingConv,
    },
    Binary {
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Cast {
        op: CastOp,
        value: Value,
    },
    Ret(Option<Value>),
}

/// An instruction; `ty` is the type of the value it produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub ty: Type,
    pub kind: InstKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<DebugLoc>,
}

impl Instruction {
    pub fn new(id: InstId, ty: Type, kind: InstKind) -> Self {
        Self {
            id,
            name: String::new(),
            ty,
            kind,
            loc: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_loc(mut self, loc: Option<DebugLoc>) -> Self {
        self.loc = loc;
        self
    }

    /// The directly called function, if the callee is a plain function
    /// reference rather than a cast or other computed pointer.
    pub fn called_function(&self) -> Option<&str> {
        match &self.kind {
            InstKind::Call {
                callee: Value::Function(name),
                ..
            } => Some(name),
            _ => None,
        }
    }

    pub fn call_args(&self) -> &[Value] {
        match &self.kind {
            InstKind::Call { args, .. } => args,
            _ => &[],
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match &self.kind {
            InstKind::Call { callee, args, .. } => {
                let mut ops = vec![callee];
                ops.extend(args.iter());
                ops
            }
            InstKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Ret(Some(value)) => vec![value],
            InstKind::Ret(None) => Vec::new(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match &mut self.kind {
            InstKind::Call { callee, args, .. } => {
                let mut ops = vec![callee];
                ops.extend(args.iter_mut());
                ops
            }
            InstKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Cast { value, .. } => vec![value],
            InstKind::Ret(Some(value)) => vec![value],
            InstKind::Ret(None) => Vec::new(),
        }
    }
}

/// A straight-line run of instructions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub insts: Vec<Instruction>,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            insts: Vec::new(),
        }
    }

    pub fn with_insts(mut self, insts: Vec<Instruction>) -> Self {
        self.insts = insts;
        self
    }
}

impl fmt::Display for CallingConv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingConv::C => write!(f, "ccc"),
            CallingConv::Fast => write!(f, "fastcc"),
            CallingConv::SpirFunc => write!(f, "spir_func"),
            CallingConv::SpirKernel => write!(f, "spir_kernel"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Inst(id) => write!(f, "%{}", id),
            Value::Arg(index) => write!(f, "%arg{}", index),
            Value::Const(Constant::Int { bits, value }) => write!(f, "i{} {}", bits, value),
            Value::Const(Constant::Float { bits, value }) => write!(f, "f{} {:?}", bits, value),
            Value::Const(Constant::Null(ty)) => write!(f, "{} null", ty),
            Value::Const(Constant::Undef(ty)) => write!(f, "{} undef", ty),
            Value::Function(name) | Value::Global(name) => write!(f, "@{}", name),
            Value::Cast { value, to } => write!(f, "bitcast ({} to {})", value, to),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ty != Type::Void {
            write!(f, "%{} = ", self.id)?;
        }
        match &self.kind {
            InstKind::Call {
                callee, args, conv, ..
            } => {
                write!(f, "call {} {} {}(", conv, self.ty, callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")?;
            }
            InstKind::Binary { op, lhs, rhs } => {
                write!(f, "{:?} {} {}, {}", op, self.ty, lhs, rhs)?;
            }
            InstKind::Cast { op, value } => {
                write!(f, "{:?} {} to {}", op, value, self.ty)?;
            }
            InstKind::Ret(Some(value)) => write!(f, "ret {}", value)?,
            InstKind::Ret(None) => write!(f, "ret void")?,
        }
        if !self.name.is_empty() {
            write!(f, " ; {}", self.name)?;
        }
        if let Some(loc) = &self.loc {
            write!(f, " !dbg {}:{}", loc.line, loc.column)?;
        }
        Ok(())
    }
}
