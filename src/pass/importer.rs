//! Demand-driven library import
//!
//! Walks the call graph from every program function, materializing only the
//! library bodies that are transitively reachable. Library symbols nobody
//! needs are then dropped, and what remains is linked in as one unit.

use super::{PassError, PassResult};
use crate::ir::{InstKind, Module, Value};
use crate::linker::link_modules;
use log::debug;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Program,
    Library,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Library bodies loaded during exploration
    pub materialized: usize,
    /// Library functions dropped before linking
    pub pruned: usize,
    /// Function definitions the program gained from the link
    pub linked: usize,
}

struct Explorer<'m> {
    program: &'m mut Module,
    library: &'m mut Module,
    visited: HashSet<(Side, String)>,
    materialized: usize,
}

impl<'m> Explorer<'m> {
    fn module(&self, side: Side) -> &Module {
        match side {
            Side::Program => &*self.program,
            Side::Library => &*self.library,
        }
    }

    fn module_mut(&mut self, side: Side) -> &mut Module {
        match side {
            Side::Program => &mut *self.program,
            Side::Library => &mut *self.library,
        }
    }

    /// Where a call to `callee` from a function on `side` ends up: the
    /// local definition if there is one, otherwise a library definition
    /// of the same name.
    fn resolve(&self, side: Side, callee: &str) -> Option<Side> {
        let local_definition = self
            .module(side)
            .function(callee)
            .map_or(false, |func| !func.is_declaration());
        if local_definition {
            return Some(side);
        }
        self.library
            .function(callee)
            .filter(|func| !func.is_declaration())
            .map(|_| Side::Library)
    }

    fn explore(&mut self, side: Side, name: &str) -> PassResult<()> {
        if !self.visited.insert((side, name.to_string())) {
            return Ok(());
        }

        // Library code is convention-agnostic; every call adopts the
        // convention of the function it sits in.
        let mut callees: Vec<String> = Vec::new();
        let conv = {
            let Some(func) = self.module_mut(side).function_mut(name) else {
                return Ok(());
            };
            let conv = func.conv;
            for inst in func.instructions_mut() {
                if let InstKind::Call {
                    callee,
                    conv: call_conv,
                    ..
                } = &mut inst.kind
                {
                    *call_conv = conv;
                    if let Value::Function(callee_name) = callee {
                        if !callees.contains(callee_name) {
                            callees.push(callee_name.clone());
                        }
                    }
                }
            }
            conv
        };

        for callee in callees {
            let Some(target_side) = self.resolve(side, &callee) else {
                continue;
            };
            let module = self.module_mut(target_side);
            let Some(target) = module.function_mut(&callee) else {
                continue;
            };
            if !target.is_materializable() {
                continue;
            }
            target.materialize()?;
            target.conv = conv;
            self.materialized += 1;
            debug!("materialized '{}' for '{}'", callee, name);
            self.explore(target_side, &callee)?;
        }
        Ok(())
    }
}

/// Drop library declarations and unloaded bodies that nothing loaded
/// refers to.
fn prune_unused(library: &mut Module) -> usize {
    let unused: Vec<String> = library
        .functions
        .iter()
        .filter(|func| func.is_declaration() || func.is_materializable())
        .filter(|func| library.function_use_empty(&func.name))
        .map(|func| func.name.clone())
        .collect();
    for name in &unused {
        library.remove_function(name);
    }
    unused.len()
}

/// Pull everything the program needs out of `library` and link it in.
pub fn import_library(program: &mut Module, mut library: Module) -> PassResult<ImportStats> {
    let roots: Vec<String> = program.functions.iter().map(|func| func.name.clone()).collect();
    let materialized = {
        let mut explorer = Explorer {
            program: &mut *program,
            library: &mut library,
            visited: HashSet::new(),
            materialized: 0,
        };
        for root in &roots {
            explorer.explore(Side::Program, root)?;
        }
        explorer.materialized
    };

    let pruned = prune_unused(&mut library);
    debug!(
        "import: {} bodies loaded on demand, {} unused library symbols dropped",
        materialized, pruned
    );

    library.materialize_all().map_err(PassError::Ir)?;
    let linked = link_modules(program, library).map_err(PassError::Link)?;

    Ok(ImportStats {
        materialized,
        pruned,
        linked,
    })
}
