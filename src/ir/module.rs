//! IR modules

use super::error::{IrError, IrResult};
use super::function::{Function, GlobalVariable};
use super::intrinsics::IntrinsicId;
use super::types::Type;
use serde::{Deserialize, Serialize};

/// An ordered collection of uniquely named functions and globals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub globals: Vec<GlobalVariable>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|func| func.name == name)
    }

    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|func| func.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|global| global.name == name)
    }

    pub fn global_mut(&mut self, name: &str) -> Option<&mut GlobalVariable> {
        self.globals.iter_mut().find(|global| global.name == name)
    }

    /// Append a function. The caller guarantees the name is free.
    pub fn add_function(&mut self, function: Function) -> usize {
        debug_assert!(self.function(&function.name).is_none(), "duplicate function {}", function.name);
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn add_global(&mut self, global: GlobalVariable) {
        debug_assert!(self.global(&global.name).is_none(), "duplicate global {}", global.name);
        self.globals.push(global);
    }

    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        let index = self.function_index(name)?;
        Some(self.functions.remove(index))
    }

    fn symbol_taken(&self, name: &str) -> bool {
        self.function(name).is_some() || self.global(name).is_some()
    }

    /// `base` if it is free, otherwise `base.N` with the smallest free N.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.symbol_taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}.{}", base, n))
            .find(|candidate| !self.symbol_taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Uses of function `name` across every materialized body. Bodies that
    /// are still out-of-line are not counted.
    pub fn function_use_count(&self, name: &str) -> usize {
        self.functions.iter().map(|func| func.uses_of_function(name)).sum()
    }

    pub fn function_use_empty(&self, name: &str) -> bool {
        self.function_use_count(name) == 0
    }

    /// Name of the declaration for intrinsic `id` specialized on
    /// `overloads`, inserting the declaration if the module lacks it.
    pub fn intrinsic_declaration(&mut self, id: IntrinsicId, overloads: &[Type]) -> String {
        let name = id.declaration_name(overloads);
        if self.function(&name).is_none() {
            self.add_function(Function::intrinsic_decl(id, overloads));
        }
        name
    }

    pub fn materialize(&mut self, name: &str) -> IrResult<()> {
        self.function_mut(name)
            .ok_or_else(|| IrError::UnknownFunction(name.to_string()))?
            .materialize()
    }

    /// Load every out-of-line body still pending.
    pub fn materialize_all(&mut self) -> IrResult<()> {
        for func in &mut self.functions {
            func.materialize()?;
        }
        Ok(())
    }

    pub fn is_materialized(&self) -> bool {
        !self.functions.iter().any(Function::is_materializable)
    }
}
