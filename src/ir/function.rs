//! Functions, function bodies and global variables

use super::error::{IrError, IrResult};
use super::instr::{Block, CallingConv, Constant, InstId, Instruction, Value};
use super::intrinsics::IntrinsicId;
use super::types::{FunctionType, Type};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Symbol visibility outside the defining module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    External,
    Internal,
}

/// Source of function bodies that are stored out-of-line.
pub trait BodyLoader {
    fn load(&self) -> Result<Vec<Block>, String>;
}

/// A body that has not been loaded yet
#[derive(Clone)]
pub struct LazyBody {
    loader: Rc<dyn BodyLoader>,
}

impl LazyBody {
    pub fn new(loader: Rc<dyn BodyLoader>) -> Self {
        Self { loader }
    }
}

impl fmt::Debug for LazyBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LazyBody")
    }
}

/// The three states a function body can be in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Body {
    Declaration,
    Defined(Vec<Block>),
    /// Present, but must be materialized before it can be inspected
    #[serde(skip)]
    Materializable(LazyBody),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub ty: FunctionType,
    #[serde(default)]
    pub conv: CallingConv,
    #[serde(default)]
    pub linkage: Linkage,
    /// Explicitly exported; survives the linkage sweep
    #[serde(default)]
    pub dll_export: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrinsic: Option<IntrinsicId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    pub body: Body,
    #[serde(skip)]
    next_inst: Option<InstId>,
}

impl Function {
    pub fn declare(name: impl Into<String>, ty: FunctionType) -> Self {
        Self {
            name: name.into(),
            ty,
            conv: CallingConv::default(),
            linkage: Linkage::External,
            dll_export: false,
            attributes: Vec::new(),
            intrinsic: None,
            params: Vec::new(),
            body: Body::Declaration,
            next_inst: None,
        }
    }

    pub fn define(name: impl Into<String>, ty: FunctionType, blocks: Vec<Block>) -> Self {
        let mut func = Self::declare(name, ty);
        func.body = Body::Defined(blocks);
        func
    }

    pub fn lazy(name: impl Into<String>, ty: FunctionType, body: LazyBody) -> Self {
        let mut func = Self::declare(name, ty);
        func.body = Body::Materializable(body);
        func
    }

    /// Declaration of an intrinsic for the given overloads
    pub fn intrinsic_decl(id: IntrinsicId, overloads: &[Type]) -> Self {
        let mut func = Self::declare(id.declaration_name(overloads), id.signature(overloads));
        func.intrinsic = Some(id);
        func
    }

    pub fn with_conv(mut self, conv: CallingConv) -> Self {
        self.conv = conv;
        self
    }

    /// True only for functions with no body at all. A materializable
    /// function has a body, it just has not been loaded.
    pub fn is_declaration(&self) -> bool {
        matches!(self.body, Body::Declaration)
    }

    pub fn is_materializable(&self) -> bool {
        matches!(self.body, Body::Materializable(_))
    }

    pub fn is_defined(&self) -> bool {
        matches!(self.body, Body::Defined(_))
    }

    pub fn return_type(&self) -> &Type {
        self.ty.ret()
    }

    pub fn arg_size(&self) -> usize {
        self.ty.arity()
    }

    /// Load an out-of-line body. No-op unless the function is materializable.
    pub fn materialize(&mut self) -> IrResult<()> {
        if let Body::Materializable(lazy) = &self.body {
            let blocks = lazy.loader.load().map_err(|reason| IrError::Materialize {
                function: self.name.clone(),
                reason,
            })?;
            self.body = Body::Defined(blocks);
            self.next_inst = None;
        }
        Ok(())
    }

    /// Loaded blocks; empty for declarations and unloaded bodies
    pub fn blocks(&self) -> &[Block] {
        match &self.body {
            Body::Defined(blocks) => blocks,
            _ => &[],
        }
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        match &mut self.body {
            Body::Defined(blocks) => blocks,
            _ => &mut [],
        }
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks().iter().flat_map(|block| block.insts.iter())
    }

    pub fn instructions_mut(&mut self) -> impl Iterator<Item = &mut Instruction> {
        self.blocks_mut().iter_mut().flat_map(|block| block.insts.iter_mut())
    }

    /// Position of an instruction as (block index, instruction index).
    pub fn locate(&self, id: InstId) -> Option<(usize, usize)> {
        self.blocks().iter().enumerate().find_map(|(b, block)| {
            block.insts.iter().position(|inst| inst.id == id).map(|i| (b, i))
        })
    }

    pub fn inst(&self, id: InstId) -> Option<&Instruction> {
        self.locate(id).map(|(b, i)| &self.blocks()[b].insts[i])
    }

    /// Allocate an instruction id not used anywhere in this body.
    pub fn fresh_id(&mut self) -> InstId {
        let next = match self.next_inst {
            Some(next) => next,
            None => self.instructions().map(|inst| inst.id + 1).max().unwrap_or(0),
        };
        self.next_inst = Some(next + 1);
        next
    }

    /// Insert `inst` right before instruction `before`, giving it a fresh
    /// id. Returns the id of the inserted instruction.
    pub fn insert_before(&mut self, before: InstId, mut inst: Instruction) -> IrResult<InstId> {
        let (b, i) = self.locate(before).ok_or_else(|| IrError::UnknownInstruction {
            function: self.name.clone(),
            id: before,
        })?;
        let id = self.fresh_id();
        inst.id = id;
        self.blocks_mut()[b].insts.insert(i, inst);
        Ok(id)
    }

    /// Redirect every use of instruction `id` to `replacement`.
    pub fn replace_all_uses_with(&mut self, id: InstId, replacement: &Value) {
        for inst in self.instructions_mut() {
            for operand in inst.operands_mut() {
                if *operand == Value::Inst(id) {
                    *operand = replacement.clone();
                }
            }
        }
    }

    pub fn remove_inst(&mut self, id: InstId) -> Option<Instruction> {
        let (b, i) = self.locate(id)?;
        Some(self.blocks_mut()[b].insts.remove(i))
    }

    /// Number of operands in this body referring to function `name`,
    /// looking through pointer casts.
    pub fn uses_of_function(&self, name: &str) -> usize {
        self.instructions()
            .flat_map(|inst| inst.operands())
            .filter(|value| value.referenced_function() == Some(name))
            .count()
    }

    pub fn rename_function_refs(&mut self, from: &str, to: &str) {
        for inst in self.instructions_mut() {
            for operand in inst.operands_mut() {
                operand.rename_function(from, to);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Constant>,
    #[serde(default)]
    pub linkage: Linkage,
}

impl GlobalVariable {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            initializer: None,
            linkage: Linkage::External,
        }
    }

    pub fn with_initializer(mut self, value: Constant) -> Self {
        self.initializer = Some(value);
        self
    }

    pub fn is_declaration(&self) -> bool {
        self.initializer.is_none()
    }
}
