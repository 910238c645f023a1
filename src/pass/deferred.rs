//! Staged removal of instructions and functions
//!
//! Traversals never delete from the structure they are walking; they
//! record what became dead here and the owner applies it afterwards.

use crate::ir::{InstId, Module};
use log::debug;

#[derive(Debug, Default)]
pub struct DeferredDeletions {
    insts: Vec<(String, InstId)>,
    functions: Vec<String>,
}

impl DeferredDeletions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_inst(&mut self, function: &str, id: InstId) {
        self.insts.push((function.to_string(), id));
    }

    pub fn schedule_function(&mut self, name: &str) {
        if !self.functions.iter().any(|pending| pending == name) {
            self.functions.push(name.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty() && self.functions.is_empty()
    }

    pub fn pending_insts(&self) -> usize {
        self.insts.len()
    }

    /// Apply every staged deletion, instructions before functions, and
    /// clear the lists. Returns how many entities were removed.
    pub fn apply(&mut self, module: &mut Module) -> usize {
        let mut removed = 0;
        for (function, id) in self.insts.drain(..) {
            if let Some(func) = module.function_mut(&function) {
                if func.remove_inst(id).is_some() {
                    removed += 1;
                }
            }
        }
        for name in self.functions.drain(..) {
            if module.remove_function(&name).is_some() {
                debug!("removed function '{}'", name);
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockBuilder, Function, FunctionType, Type, Value};

    #[test]
    fn test_apply_clears_lists() {
        let fty = FunctionType::new(Type::f32(), vec![Type::f32()]);
        let mut builder = BlockBuilder::new("entry");
        builder.call_direct("g", fty.clone(), vec![Value::Arg(0)]);
        builder.ret(None);
        let mut module = Module::new("m");
        module.add_function(Function::define("f", fty.clone(), vec![builder.finish()]));
        module.add_function(Function::declare("g", fty));

        let mut pending = DeferredDeletions::new();
        pending.schedule_inst("f", 0);
        pending.schedule_function("g");
        pending.schedule_function("g");
        assert_eq!(pending.pending_insts(), 1);

        assert_eq!(pending.apply(&mut module), 2);
        assert!(pending.is_empty());
        assert!(module.function("g").is_none());
        assert_eq!(module.function("f").unwrap().instructions().count(), 1);
    }
}
