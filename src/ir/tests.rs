//! IR model tests

use super::*;
use std::cell::Cell;
use std::rc::Rc;

struct CountingLoader {
    loads: Cell<u32>,
    fail: bool,
}

impl BodyLoader for CountingLoader {
    fn load(&self) -> Result<Vec<Block>, String> {
        self.loads.set(self.loads.get() + 1);
        if self.fail {
            return Err("corrupt body".to_string());
        }
        let mut builder = BlockBuilder::new("entry");
        let unary = FunctionType::new(Type::f32(), vec![Type::f32()]);
        let v = builder.call_direct("helper", unary, vec![Value::Arg(0)]);
        builder.ret(Some(v));
        Ok(vec![builder.finish()])
    }
}

fn unary_f32() -> FunctionType {
    FunctionType::new(Type::f32(), vec![Type::f32()])
}

#[test]
fn test_materialize_loads_once() {
    let loader = Rc::new(CountingLoader {
        loads: Cell::new(0),
        fail: false,
    });
    let mut func = Function::lazy("lib_fn", unary_f32(), LazyBody::new(loader.clone()));
    assert!(func.is_materializable());
    assert!(!func.is_declaration());
    assert!(func.blocks().is_empty());

    func.materialize().expect("materialize");
    func.materialize().expect("second materialize is a no-op");

    assert_eq!(loader.loads.get(), 1);
    assert!(func.is_defined());
    assert_eq!(func.instructions().count(), 2);
}

#[test]
fn test_materialize_failure_names_function() {
    let loader = Rc::new(CountingLoader {
        loads: Cell::new(0),
        fail: true,
    });
    let mut module = Module::new("lib");
    module.add_function(Function::lazy("broken", unary_f32(), LazyBody::new(loader)));

    let err = module.materialize_all().unwrap_err();
    assert_eq!(
        err,
        IrError::Materialize {
            function: "broken".to_string(),
            reason: "corrupt body".to_string(),
        }
    );
    assert!(!module.is_materialized());
}

#[test]
fn test_use_count_ignores_unloaded_bodies() {
    let loader = Rc::new(CountingLoader {
        loads: Cell::new(0),
        fail: false,
    });
    let mut module = Module::new("lib");
    module.add_function(Function::declare("helper", unary_f32()));
    module.add_function(Function::lazy("user", unary_f32(), LazyBody::new(loader)));

    assert!(module.function_use_empty("helper"));
    module.materialize("user").unwrap();
    assert_eq!(module.function_use_count("helper"), 1);
}

#[test]
fn test_insert_before_and_replace_uses() {
    let mut builder = BlockBuilder::new("entry");
    let call = builder.call_direct("f", unary_f32(), vec![Value::Arg(0)]);
    builder.ret(Some(call.clone()));
    let mut func = Function::define("main", unary_f32(), vec![builder.finish()]);

    let replacement = Instruction::new(0, Type::f32(), InstKind::Cast {
        op: CastOp::Bitcast,
        value: Value::Arg(0),
    });
    let new_id = func.insert_before(0, replacement).unwrap();
    assert_eq!(new_id, 2);
    assert_eq!(func.locate(new_id), Some((0, 0)));

    func.replace_all_uses_with(0, &Value::Inst(new_id));
    func.remove_inst(0);

    let ret = func.blocks()[0].insts.last().unwrap();
    assert_eq!(ret.kind, InstKind::Ret(Some(Value::Inst(new_id))));
    assert_eq!(func.instructions().count(), 2);
}

#[test]
fn test_insert_before_unknown_instruction() {
    let mut func = Function::define("main", unary_f32(), vec![Block::new("entry")]);
    let inst = Instruction::new(0, Type::Void, InstKind::Ret(None));
    assert!(matches!(
        func.insert_before(7, inst),
        Err(IrError::UnknownInstruction { id: 7, .. })
    ));
}

#[test]
fn test_unique_name() {
    let mut module = Module::new("m");
    assert_eq!(module.unique_name("foo"), "foo");
    module.add_function(Function::declare("foo", unary_f32()));
    module.add_function(Function::declare("foo.1", unary_f32()));
    assert_eq!(module.unique_name("foo"), "foo.2");
}

#[test]
fn test_intrinsic_declaration_is_reused() {
    let mut module = Module::new("m");
    let a = module.intrinsic_declaration(IntrinsicId::GenxRndz, &[Type::f32()]);
    let b = module.intrinsic_declaration(IntrinsicId::GenxRndz, &[Type::f32()]);
    assert_eq!(a, b);
    assert_eq!(module.functions.len(), 1);

    let decl = module.function(&a).unwrap();
    assert_eq!(decl.intrinsic, Some(IntrinsicId::GenxRndz));
    assert!(decl.is_declaration());
}

#[test]
fn test_cast_callee_is_not_direct() {
    let mut builder = BlockBuilder::new("entry");
    let callee = Value::cast(Value::function("f"), Type::ptr_to(Type::Function(unary_f32())));
    builder.call(callee, unary_f32(), vec![Value::Arg(0)]);
    let block = builder.finish();

    let call = &block.insts[0];
    assert_eq!(call.called_function(), None);
    if let InstKind::Call { callee, .. } = &call.kind {
        assert_eq!(callee.referenced_function(), Some("f"));
    }
}

#[test]
fn test_module_json_roundtrip_keeps_bodies() {
    let mut builder = BlockBuilder::new("entry");
    builder.set_loc(Some(DebugLoc::new(3, 9)));
    let v = builder.call_direct("g", unary_f32(), vec![Value::Arg(0)]);
    builder.ret(Some(v));
    let mut module = Module::new("m");
    module.add_function(Function::define("main", unary_f32(), vec![builder.finish()]));
    module.add_global(GlobalVariable::new("__IsSPIRV", Type::i32()));

    let text = serde_json::to_string(&module).unwrap();
    let back: Module = serde_json::from_str(&text).unwrap();
    assert_eq!(back.function("main").unwrap().blocks(), module.function("main").unwrap().blocks());
    assert!(back.global("__IsSPIRV").unwrap().is_declaration());
}

#[test]
fn test_unmaterialized_module_does_not_serialize() {
    let loader = Rc::new(CountingLoader {
        loads: Cell::new(0),
        fail: false,
    });
    let mut module = Module::new("lib");
    module.add_function(Function::lazy("lazy", unary_f32(), LazyBody::new(loader)));
    assert!(serde_json::to_string(&module).is_err());
}
