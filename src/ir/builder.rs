//! Straight-line body construction
//!
//! Hands out sequential instruction ids and returns `Value`s for results so
//! callers can chain instructions without tracking ids themselves.

use super::instr::{BinOp, Block, CallingConv, DebugLoc, InstId, InstKind, Instruction, Value};
use super::types::{FunctionType, Type};

#[derive(Debug, Default)]
pub struct BlockBuilder {
    label: String,
    insts: Vec<Instruction>,
    next_id: InstId,
    loc: Option<DebugLoc>,
}

impl BlockBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Attach `loc` to every instruction built from now on.
    pub fn set_loc(&mut self, loc: Option<DebugLoc>) {
        self.loc = loc;
    }

    fn push(&mut self, ty: Type, kind: InstKind) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.insts
            .push(Instruction::new(id, ty, kind).with_loc(self.loc.clone()));
        Value::Inst(id)
    }

    /// Call through `callee` with the signature `fn_ty`.
    pub fn call(&mut self, callee: Value, fn_ty: FunctionType, args: Vec<Value>) -> Value {
        let ty = fn_ty.ret().clone();
        self.push(
            ty,
            InstKind::Call {
                callee,
                fn_ty,
                args,
                conv: CallingConv::default(),
            },
        )
    }

    /// Direct call to the function named `name`.
    pub fn call_direct(&mut self, name: &str, fn_ty: FunctionType, args: Vec<Value>) -> Value {
        self.call(Value::function(name), fn_ty, args)
    }

    pub fn binary(&mut self, op: BinOp, ty: Type, lhs: Value, rhs: Value) -> Value {
        self.push(ty, InstKind::Binary { op, lhs, rhs })
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.push(Type::Void, InstKind::Ret(value));
    }

    pub fn finish(self) -> Block {
        Block::new(self.label).with_insts(self.insts)
    }
}
