//! Bitcast call repair
//!
//! A call whose callee is a pointer cast of a defined function expects a
//! signature the function does not have. Each such call is redirected to a
//! clone of the function declared with the call site's signature. Clones
//! are shared between call sites expecting the same signature.

use super::deferred::DeferredDeletions;
use super::PassResult;
use crate::ir::{Function, FunctionType, InstId, InstKind, Instruction, Module, Value};
use log::{debug, warn};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub clones_created: usize,
    pub calls_redirected: usize,
    /// Calls left as-is because the arities disagree
    pub unresolved: usize,
    /// Originals deleted once every caller moved to a clone
    pub originals_removed: usize,
}

/// Cast call found during the sweep
struct CastCall {
    id: InstId,
    original: String,
    fn_ty: FunctionType,
}

#[derive(Debug, Default)]
pub struct BitcastResolver {
    clones: HashMap<(String, FunctionType), String>,
    pending: DeferredDeletions,
    stats: ResolveStats,
}

impl BitcastResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(mut self, module: &mut Module) -> PassResult<ResolveStats> {
        // Clones are appended while sweeping and are swept too.
        let mut index = 0;
        while index < module.functions.len() {
            let casts = collect_cast_calls(module, index);
            for cast in casts {
                self.redirect(module, index, cast)?;
            }
            index += 1;
        }

        self.pending.apply(module);

        let mut originals: Vec<String> = self.clones.keys().map(|(original, _)| original.clone()).collect();
        originals.sort();
        originals.dedup();
        for original in originals {
            if module.function_use_empty(&original) {
                self.pending.schedule_function(&original);
                self.stats.originals_removed += 1;
            }
        }
        self.pending.apply(module);
        self.clones.clear();

        Ok(self.stats)
    }

    fn redirect(&mut self, module: &mut Module, index: usize, cast: CastCall) -> PassResult<()> {
        let caller = module.functions[index].name.clone();
        let key = (cast.original.clone(), cast.fn_ty.clone());
        let clone_name = match self.clones.get(&key) {
            Some(name) => name.clone(),
            None => {
                let Some(name) = self.create_clone(module, &cast) else {
                    warn!(
                        "leaving call in '{}' through a cast of '{}' unresolved: call passes {} arguments, function takes {}",
                        caller,
                        cast.original,
                        cast.fn_ty.arity(),
                        module.function(&cast.original).map_or(0, Function::arg_size)
                    );
                    self.stats.unresolved += 1;
                    return Ok(());
                };
                self.clones.insert(key, name.clone());
                name
            }
        };

        let func = &mut module.functions[index];
        let Some(old) = func.inst(cast.id).cloned() else {
            return Ok(());
        };
        let InstKind::Call { args, conv, .. } = old.kind else {
            return Ok(());
        };
        let call = Instruction::new(
            0,
            old.ty,
            InstKind::Call {
                callee: Value::function(clone_name.as_str()),
                fn_ty: cast.fn_ty,
                args,
                conv,
            },
        )
        .with_name(old.name)
        .with_loc(old.loc);
        let new_id = func.insert_before(cast.id, call)?;
        func.replace_all_uses_with(cast.id, &Value::Inst(new_id));
        self.pending.schedule_inst(&caller, cast.id);
        self.stats.calls_redirected += 1;
        debug!("'{}': call through cast of '{}' now calls '{}'", caller, cast.original, clone_name);
        Ok(())
    }

    /// Copy `cast.original` under the call site's signature. Returns `None`
    /// when the signatures disagree on the number of arguments.
    fn create_clone(&mut self, module: &mut Module, cast: &CastCall) -> Option<String> {
        let original = module.function(&cast.original)?;
        if original.arg_size() != cast.fn_ty.arity() {
            return None;
        }
        let name = module.unique_name(&original.name);
        let mut clone = Function::define(name.clone(), cast.fn_ty.clone(), original.blocks().to_vec());
        clone.conv = original.conv;
        clone.linkage = original.linkage;
        clone.attributes = original.attributes.clone();
        clone.params = original.params.clone();

        module.add_function(clone);
        self.stats.clones_created += 1;
        debug!("cloned '{}' as '{}' with signature {}", cast.original, name, cast.fn_ty);
        Some(name)
    }
}

/// Calls in function `index` whose callee is a cast of a defined function.
fn collect_cast_calls(module: &Module, index: usize) -> Vec<CastCall> {
    module.functions[index]
        .instructions()
        .filter_map(|inst| match &inst.kind {
            InstKind::Call {
                callee: callee @ Value::Cast { .. },
                fn_ty,
                ..
            } => {
                let original = callee.referenced_function()?;
                let target = module.function(original)?;
                if target.is_declaration() {
                    return None;
                }
                Some(CastCall {
                    id: inst.id,
                    original: original.to_string(),
                    fn_ty: fn_ty.clone(),
                })
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, BlockBuilder, CallingConv, DebugLoc, Type};

    fn ptr_sig(pointee: Type) -> FunctionType {
        FunctionType::new(Type::f32(), vec![Type::ptr_to(pointee)])
    }

    fn cast_of(name: &str, fn_ty: &FunctionType) -> Value {
        Value::cast(Value::function(name), Type::ptr_to(Type::Function(fn_ty.clone())))
    }

    fn callee_body() -> Vec<Block> {
        let mut builder = BlockBuilder::new("entry");
        builder.ret(Some(Value::Const(crate::ir::Constant::Float { bits: 32, value: 1.0 })));
        vec![builder.finish()]
    }

    /// `main` calls `target` through casts with the given signatures.
    fn module_with_cast_calls(sigs: &[FunctionType]) -> Module {
        let mut builder = BlockBuilder::new("entry");
        builder.set_loc(Some(DebugLoc::new(10, 1)));
        let mut last = None;
        for sig in sigs {
            last = Some(builder.call(cast_of("target", sig), sig.clone(), vec![Value::Arg(0)]));
        }
        builder.ret(last);

        let mut target = Function::define("target", ptr_sig(Type::i8()), callee_body())
            .with_conv(CallingConv::SpirFunc);
        target.attributes.push("nounwind".to_string());

        let mut module = Module::new("m");
        module.add_function(target);
        module.add_function(Function::define("main", ptr_sig(Type::f32()), vec![builder.finish()]));
        module
    }

    fn direct_callees(module: &Module, func: &str) -> Vec<String> {
        module
            .function(func)
            .unwrap()
            .instructions()
            .filter_map(|inst| inst.called_function().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_same_signature_shares_clone() {
        let sig = ptr_sig(Type::f32());
        let mut module = module_with_cast_calls(&[sig.clone(), sig.clone()]);

        let stats = BitcastResolver::new().run(&mut module).unwrap();
        assert_eq!(stats.clones_created, 1);
        assert_eq!(stats.calls_redirected, 2);
        assert_eq!(direct_callees(&module, "main"), vec!["target.1", "target.1"]);

        let clone = module.function("target.1").unwrap();
        assert_eq!(clone.ty, sig);
        assert_eq!(clone.conv, CallingConv::SpirFunc);
        assert_eq!(clone.attributes, vec!["nounwind".to_string()]);
        // every caller moved, so the original is gone
        assert!(module.function("target").is_none());
        assert_eq!(stats.originals_removed, 1);
    }

    #[test]
    fn test_distinct_signatures_get_distinct_clones() {
        let mut module = module_with_cast_calls(&[ptr_sig(Type::f32()), ptr_sig(Type::i32())]);

        let stats = BitcastResolver::new().run(&mut module).unwrap();
        assert_eq!(stats.clones_created, 2);
        assert_eq!(direct_callees(&module, "main"), vec!["target.1", "target.2"]);
        assert_ne!(module.function("target.1").unwrap().ty, module.function("target.2").unwrap().ty);
    }

    #[test]
    fn test_redirected_call_keeps_uses_and_location() {
        let mut module = module_with_cast_calls(&[ptr_sig(Type::f32())]);
        BitcastResolver::new().run(&mut module).unwrap();

        let main = module.function("main").unwrap();
        let insts: Vec<_> = main.instructions().collect();
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0].loc, Some(DebugLoc::new(10, 1)));
        assert_eq!(insts[1].kind, InstKind::Ret(Some(Value::Inst(insts[0].id))));
    }

    #[test]
    fn test_arity_mismatch_is_left_unresolved() {
        let two_args = FunctionType::new(Type::f32(), vec![Type::ptr_to(Type::f32()), Type::i32()]);
        let mut builder = BlockBuilder::new("entry");
        let v = builder.call(cast_of("target", &two_args), two_args.clone(), vec![Value::Arg(0), Value::Arg(0)]);
        builder.ret(Some(v));
        let mut module = Module::new("m");
        module.add_function(Function::define("target", ptr_sig(Type::i8()), callee_body()));
        module.add_function(Function::define("main", ptr_sig(Type::f32()), vec![builder.finish()]));

        let stats = BitcastResolver::new().run(&mut module).unwrap();
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.clones_created, 0);
        assert!(module.function("target").is_some());
        assert_eq!(module.functions.len(), 2);
        assert!(direct_callees(&module, "main").is_empty());
    }

    #[test]
    fn test_cast_of_declaration_is_ignored() {
        let sig = ptr_sig(Type::f32());
        let mut module = module_with_cast_calls(&[sig]);
        module.function_mut("target").unwrap().body = crate::ir::Body::Declaration;

        let stats = BitcastResolver::new().run(&mut module).unwrap();
        assert_eq!(stats, ResolveStats::default());
    }
}
