//! Bulk module linking
//!
//! Moves every symbol of a source module into a destination module,
//! resolving destination declarations against source definitions.

use crate::ir::{InstKind, Linkage, Module, Type, Value};
use log::debug;
use std::fmt;

pub type LinkResult<T> = Result<T, LinkError>;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Both modules define the same externally visible symbol
    DuplicateSymbol(String),
    /// The source module still has out-of-line bodies
    Unmaterialized(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::DuplicateSymbol(name) => write!(f, "symbol '{}' is defined in both modules", name),
            LinkError::Unmaterialized(name) => {
                write!(f, "cannot link '{}': body is not materialized", name)
            }
        }
    }
}

impl std::error::Error for LinkError {}

/// Link `src` into `dest`, consuming `src`.
///
/// Returns the number of function definitions `dest` gained.
pub fn link_modules(dest: &mut Module, mut src: Module) -> LinkResult<usize> {
    if let Some(func) = src.functions.iter().find(|func| func.is_materializable()) {
        return Err(LinkError::Unmaterialized(func.name.clone()));
    }

    rename_colliding_locals(dest, &mut src)?;

    for global in src.globals {
        match dest.global_mut(&global.name) {
            None => dest.add_global(global),
            Some(existing) if global.is_declaration() => {
                debug!("keeping global '{}' from destination", existing.name);
            }
            Some(existing) if existing.is_declaration() => *existing = global,
            Some(existing) => return Err(LinkError::DuplicateSymbol(existing.name.clone())),
        }
    }

    let mut linked = 0;
    for func in src.functions {
        let index = match dest.function_index(&func.name) {
            None => {
                if !func.is_declaration() {
                    linked += 1;
                }
                dest.add_function(func);
                continue;
            }
            Some(index) => index,
        };

        if func.is_declaration() {
            continue;
        }
        if !dest.functions[index].is_declaration() {
            return Err(LinkError::DuplicateSymbol(func.name));
        }

        let old_ty = dest.functions[index].ty.clone();
        let name = func.name.clone();
        let new_ty = func.ty.clone();
        dest.functions[index] = func;
        linked += 1;
        if old_ty != new_ty {
            debug!("'{}' resolved with a different signature, casting existing callers", name);
            cast_mismatched_callers(dest, &name);
        }
    }
    Ok(linked)
}

/// Give internal source definitions that clash with destination
/// definitions a fresh name; external clashes are errors.
fn rename_colliding_locals(dest: &Module, src: &mut Module) -> LinkResult<()> {
    let clashes: Vec<String> = src
        .functions
        .iter()
        .filter(|func| !func.is_declaration())
        .filter(|func| dest.function(&func.name).map_or(false, |d| !d.is_declaration()))
        .map(|func| func.name.clone())
        .collect();

    for name in clashes {
        let is_local = src.function(&name).map_or(false, |f| f.linkage == Linkage::Internal);
        if !is_local {
            return Err(LinkError::DuplicateSymbol(name));
        }
        let mut fresh = dest.unique_name(&name);
        let mut n = 1;
        while src.function(&fresh).is_some() || dest.function(&fresh).is_some() {
            fresh = format!("{}.{}", name, n);
            n += 1;
        }
        debug!("renaming local '{}' to '{}' while linking", name, fresh);
        for func in &mut src.functions {
            if func.name == name {
                func.name = fresh.clone();
            }
            func.rename_function_refs(&name, &fresh);
        }
    }
    Ok(())
}

/// Calls to `name` that expect a signature other than its declared one now
/// call through a pointer cast.
fn cast_mismatched_callers(module: &mut Module, name: &str) {
    let Some(target_ty) = module.function(name).map(|func| func.ty.clone()) else {
        return;
    };
    for func in &mut module.functions {
        for inst in func.instructions_mut() {
            if let InstKind::Call { callee, fn_ty, .. } = &mut inst.kind {
                let direct = matches!(callee, Value::Function(callee_name) if callee_name == name);
                if direct && *fn_ty != target_ty {
                    let cast_to = Type::ptr_to(Type::Function(fn_ty.clone()));
                    *callee = Value::cast(Value::function(name), cast_to);
                }
            }
        }
    }
}
