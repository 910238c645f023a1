//! Archive files on disk

use biflink::ir::{BlockBuilder, Constant, Function, FunctionType, GlobalVariable, Linkage, Module, Type, Value};
use biflink::{load_archive, save_archive, ArchiveError};
use std::fs;
use tempfile::TempDir;

fn library() -> Module {
    let sig = FunctionType::new(Type::f64(), vec![Type::f64()]);
    let mut builder = BlockBuilder::new("entry");
    let v = builder.call_direct("__builtin_IB_native_sqrtd", sig.clone(), vec![Value::Arg(0)]);
    builder.ret(Some(v));

    let mut module = Module::new("bif");
    module.add_global(GlobalVariable::new("__IsSPIRV", Type::i32()).with_initializer(Constant::i32(0)));
    let mut sqrt = Function::define("__sqrt_f64", sig.clone(), vec![builder.finish()]);
    sqrt.attributes.push("alwaysinline".to_string());
    sqrt.params.push("x".to_string());
    module.add_function(sqrt);
    module.add_function(Function::declare("__builtin_IB_native_sqrtd", sig));
    module
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bif.bifa");
    save_archive(&path, &library()).unwrap();

    let mut loaded = load_archive(&path).unwrap();
    assert!(!loaded.is_materialized());
    assert_eq!(loaded.global("__IsSPIRV").unwrap().initializer, Some(Constant::i32(0)));

    loaded.materialize_all().unwrap();
    let original = library();
    let sqrt = loaded.function("__sqrt_f64").unwrap();
    assert_eq!(sqrt.blocks(), original.function("__sqrt_f64").unwrap().blocks());
    assert_eq!(sqrt.attributes, vec!["alwaysinline".to_string()]);
    assert_eq!(sqrt.params, vec!["x".to_string()]);
    assert_eq!(sqrt.linkage, Linkage::External);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_archive(&dir.path().join("absent.bifa")).unwrap_err();
    assert!(matches!(err, ArchiveError::Io(_)));
}

#[test]
fn test_body_span_past_end_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bif.bifa");
    save_archive(&path, &library()).unwrap();

    // drop the tail of the body section, keeping the header intact
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    let err = load_archive(&path).unwrap_err();
    assert_eq!(
        err,
        ArchiveError::BodyOutOfRange {
            function: "__sqrt_f64".to_string()
        }
    );
}
