//! LLVM-flavoured text rendering, for diagnostics only

use super::function::{Body, Function, GlobalVariable, Linkage};
use super::instr::Value;
use super::module::Module;
use std::fmt;

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::External => Ok(()),
            Linkage::Internal => write!(f, "internal "),
        }
    }
}

impl fmt::Display for GlobalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.initializer {
            Some(init) => write!(f, "@{} = {}global {}", self.name, self.linkage, Value::Const(init.clone())),
            None => write!(f, "@{} = external global {}", self.name, self.ty),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_declaration() { "declare" } else { "define" };
        write!(f, "{} {}{} {} @{}(", keyword, self.linkage, self.conv, self.return_type(), self.name)?;
        for (i, param) in self.ty.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
            if let Some(name) = self.params.get(i) {
                write!(f, " %{}", name)?;
            }
        }
        write!(f, ")")?;
        if self.dll_export {
            write!(f, " dllexport")?;
        }
        match &self.body {
            Body::Declaration => writeln!(f),
            Body::Materializable(_) => writeln!(f, " ; not materialized"),
            Body::Defined(blocks) => {
                writeln!(f, " {{")?;
                for block in blocks {
                    writeln!(f, "{}:", block.label)?;
                    for inst in &block.insts {
                        writeln!(f, "  {}", inst)?;
                    }
                }
                writeln!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        for global in &self.globals {
            writeln!(f, "{}", global)?;
        }
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}
