//! Builtin lowering and linkage tightening
//!
//! Rewrites calls to catalogued builtins into target intrinsics or plain
//! arithmetic, drops lifetime markers, and finally narrows the visibility
//! of everything that is not explicitly exported.

use super::deferred::DeferredDeletions;
use super::table::{BuiltinTable, Lowering, PrefixRule};
use super::{PassError, PassResult};
use crate::ir::{
    BinOp, CallingConv, CastOp, DebugLoc, FunctionType, InstId, InstKind, Instruction, IntrinsicId,
    Linkage, Module, Type, Value,
};
use log::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoweringStats {
    pub calls_lowered: usize,
    pub lifetime_markers_dropped: usize,
    pub symbols_internalized: usize,
}

/// A call selected for rewriting, detached from the module
struct CallSite {
    id: InstId,
    name: String,
    ty: Type,
    callee: String,
    fn_ty: FunctionType,
    args: Vec<Value>,
    loc: Option<DebugLoc>,
}

impl CallSite {
    fn arg(&self, index: usize, caller: &str) -> PassResult<(Value, Type)> {
        match (self.args.get(index), self.fn_ty.params.get(index)) {
            (Some(value), Some(ty)) => Ok((value.clone(), ty.clone())),
            _ => Err(PassError::MalformedCall {
                function: caller.to_string(),
                callee: self.callee.clone(),
            }),
        }
    }
}

/// One instruction to materialize in place of a call. `Prev` stands for the
/// result of the step before it.
enum Step {
    Intrinsic {
        decl: String,
        fn_ty: FunctionType,
        args: Vec<Operand>,
    },
    Binary {
        op: BinOp,
        ty: Type,
        lhs: Value,
        rhs: Value,
    },
    Cast {
        op: CastOp,
        ty: Type,
        value: Value,
    },
}

enum Operand {
    Value(Value),
    Prev,
}

enum Rewrite {
    Delete,
    Replace(Vec<Step>),
}

pub struct BuiltinConverter<'t> {
    table: &'t BuiltinTable,
    pending: DeferredDeletions,
    stats: LoweringStats,
}

impl<'t> BuiltinConverter<'t> {
    pub fn new(table: &'t BuiltinTable) -> Self {
        Self {
            table,
            pending: DeferredDeletions::new(),
            stats: LoweringStats::default(),
        }
    }

    pub fn run(mut self, module: &mut Module, internalize_symbols: bool) -> PassResult<LoweringStats> {
        // Intrinsic declarations appended on the way have no bodies.
        let count = module.functions.len();
        for index in 0..count {
            let caller = module.functions[index].name.clone();
            for site in direct_calls(module, index) {
                let Some(rewrite) = self.plan(module, &caller, &site)? else {
                    continue;
                };
                self.apply(module, index, site, rewrite)?;
            }
        }
        self.pending.apply(module);

        if internalize_symbols {
            self.stats.symbols_internalized = internalize(module);
        }
        Ok(self.stats)
    }

    /// Decide what, if anything, replaces `site`. Intrinsic declarations
    /// needed by the rewrite are added to the module here.
    fn plan(&mut self, module: &mut Module, caller: &str, site: &CallSite) -> PassResult<Option<Rewrite>> {
        let callee = module.function(&site.callee);
        let callee_intrinsic = callee.and_then(|func| func.intrinsic);
        let ret_ty = callee.map_or_else(|| site.ty.clone(), |func| func.return_type().clone());

        match callee_intrinsic {
            Some(IntrinsicId::LifetimeStart) | Some(IntrinsicId::LifetimeEnd) => {
                self.stats.lifetime_markers_dropped += 1;
                return Ok(Some(Rewrite::Delete));
            }
            Some(IntrinsicId::Ctlz) => {
                let (src, src_ty) = site.arg(0, caller)?;
                if src_ty != Type::i32() {
                    return Err(PassError::UnsupportedOperand {
                        function: caller.to_string(),
                        intrinsic: IntrinsicId::Ctlz,
                        expected: Type::i32(),
                        found: src_ty,
                    });
                }
                let (decl, fn_ty) = intrinsic(module, IntrinsicId::GenxLzd, vec![src_ty]);
                return Ok(Some(Rewrite::Replace(vec![Step::Intrinsic {
                    decl,
                    fn_ty,
                    args: vec![Operand::Value(src)],
                }])));
            }
            _ => {}
        }

        if let Some(lowering) = self.table.lookup(&site.callee) {
            let steps = match lowering {
                Lowering::OneStep(id) => {
                    let (decl, fn_ty) = intrinsic(module, id, vec![ret_ty]);
                    vec![Step::Intrinsic {
                        decl,
                        fn_ty,
                        args: site.args.iter().cloned().map(Operand::Value).collect(),
                    }]
                }
                Lowering::TwoStep(producer, consumer) => {
                    let (_, arg_ty) = site.arg(0, caller)?;
                    let (first, first_ty) = intrinsic(module, producer, vec![arg_ty]);
                    let produced = first_ty.ret().clone();
                    let (second, second_ty) = intrinsic(module, consumer, vec![ret_ty, produced]);
                    vec![
                        Step::Intrinsic {
                            decl: first,
                            fn_ty: first_ty,
                            args: site.args.iter().cloned().map(Operand::Value).collect(),
                        },
                        Step::Intrinsic {
                            decl: second,
                            fn_ty: second_ty,
                            args: vec![Operand::Prev],
                        },
                    ]
                }
            };
            return Ok(Some(Rewrite::Replace(steps)));
        }

        let Some(rule) = PrefixRule::match_name(&site.callee) else {
            return Ok(None);
        };
        let (lhs, lhs_ty) = site.arg(0, caller)?;
        let steps = match rule {
            PrefixRule::SignedToFloat | PrefixRule::UnsignedToFloat => {
                let op = if rule == PrefixRule::SignedToFloat {
                    CastOp::SIToFP
                } else {
                    CastOp::UIToFP
                };
                vec![Step::Cast {
                    op,
                    ty: ret_ty,
                    value: lhs,
                }]
            }
            PrefixRule::MulRoundToZero | PrefixRule::AddRoundToZero => {
                let (rhs, _) = site.arg(1, caller)?;
                let op = if rule == PrefixRule::MulRoundToZero {
                    BinOp::FMul
                } else {
                    BinOp::FAdd
                };
                let (rndz, rndz_ty) = intrinsic(module, IntrinsicId::GenxRndz, vec![lhs_ty.clone()]);
                vec![
                    Step::Binary {
                        op,
                        ty: lhs_ty,
                        lhs,
                        rhs,
                    },
                    Step::Intrinsic {
                        decl: rndz,
                        fn_ty: rndz_ty,
                        args: vec![Operand::Prev],
                    },
                ]
            }
        };
        Ok(Some(Rewrite::Replace(steps)))
    }

    fn apply(&mut self, module: &mut Module, index: usize, site: CallSite, rewrite: Rewrite) -> PassResult<()> {
        let func = &mut module.functions[index];
        let steps = match rewrite {
            Rewrite::Delete => {
                self.pending.schedule_inst(&func.name, site.id);
                return Ok(());
            }
            Rewrite::Replace(steps) => steps,
        };

        let mut prev: Option<Value> = None;
        for step in steps {
            let (ty, kind) = match step {
                Step::Intrinsic { decl, fn_ty, args } => {
                    let args = args
                        .into_iter()
                        .filter_map(|arg| match arg {
                            Operand::Value(value) => Some(value),
                            Operand::Prev => prev.clone(),
                        })
                        .collect();
                    let kind = InstKind::Call {
                        callee: Value::function(decl),
                        fn_ty: fn_ty.clone(),
                        args,
                        conv: CallingConv::default(),
                    };
                    (fn_ty.ret().clone(), kind)
                }
                Step::Binary { op, ty, lhs, rhs } => (ty, InstKind::Binary { op, lhs, rhs }),
                Step::Cast { op, ty, value } => (ty, InstKind::Cast { op, value }),
            };
            let inst = Instruction::new(0, ty, kind)
                .with_name(site.name.clone())
                .with_loc(site.loc.clone());
            let id = func.insert_before(site.id, inst)?;
            prev = Some(Value::Inst(id));
        }

        if let Some(result) = prev {
            func.replace_all_uses_with(site.id, &result);
        }
        self.pending.schedule_inst(&func.name, site.id);
        self.stats.calls_lowered += 1;
        debug!("lowered call to '{}' in '{}'", site.callee, func.name);
        Ok(())
    }
}

/// Declare `id` in `module` and return its name and signature. Surplus
/// overload types are ignored.
fn intrinsic(module: &mut Module, id: IntrinsicId, mut overloads: Vec<Type>) -> (String, FunctionType) {
    overloads.truncate(id.overload_count());
    let name = module.intrinsic_declaration(id, &overloads);
    (name, id.signature(&overloads))
}

/// Direct calls in function `index`, in program order.
fn direct_calls(module: &Module, index: usize) -> Vec<CallSite> {
    module.functions[index]
        .instructions()
        .filter_map(|inst| match &inst.kind {
            InstKind::Call {
                callee: Value::Function(callee),
                fn_ty,
                args,
                ..
            } => Some(CallSite {
                id: inst.id,
                name: inst.name.clone(),
                ty: inst.ty.clone(),
                callee: callee.clone(),
                fn_ty: fn_ty.clone(),
                args: args.clone(),
                loc: inst.loc.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Mark every defined global and every defined, non-exported, non-intrinsic
/// function internal. Returns how many symbols changed visibility.
pub fn internalize(module: &mut Module) -> usize {
    let mut changed = 0;
    for global in &mut module.globals {
        if !global.is_declaration() && global.linkage != Linkage::Internal {
            global.linkage = Linkage::Internal;
            changed += 1;
        }
    }
    for func in &mut module.functions {
        if func.intrinsic.is_none()
            && !func.is_declaration()
            && !func.dll_export
            && func.linkage != Linkage::Internal
        {
            func.linkage = Linkage::Internal;
            changed += 1;
        }
    }
    changed
}
