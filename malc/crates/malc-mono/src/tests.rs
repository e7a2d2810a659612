//! Monomorphization tests: identity specialization, trait-method
//! rewriting, struct specialization, and idempotence.

use malc_mir::{Builder, Callee, Module, Operand, Statement, Terminator};
use malc_sem::{FieldDef, StructDef, Type, TypeParamDecl};
use malc_util::{Span, Symbol};

use crate::{mangle, monomorphize};

fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

/// `fn id[T](x: T) -> T { return x }`
fn generic_id() -> malc_mir::Function {
    let t = sym("T");
    let mut builder = Builder::new(sym("id"), Some(Type::Param(t)));
    let x = builder.add_param(sym("x"), Type::Param(t), Span::DUMMY);
    builder.terminate(Terminator::Return(Some(Operand::Local(x))));
    let mut func = builder.build();
    func.type_params = vec![TypeParamDecl::new(t)];
    func
}

fn caller_of_id() -> malc_mir::Function {
    let mut builder = Builder::new(sym("main"), None);
    let a = builder.temp(Type::Int);
    builder.push(Statement::Call {
        dest: Some(a),
        callee: Callee::Name(sym("id")),
        args: vec![Operand::int(1, Type::Int)],
        type_args: vec![Type::Int],
    });
    let b = builder.temp(Type::Bool);
    builder.push(Statement::Call {
        dest: Some(b),
        callee: Callee::Name(sym("id")),
        args: vec![Operand::bool(true)],
        type_args: vec![Type::Bool],
    });
    builder.terminate(Terminator::Return(None));
    builder.build()
}

#[test]
fn identity_specialization() {
    let mut module = Module {
        functions: vec![generic_id(), caller_of_id()],
        ..Default::default()
    };
    monomorphize(&mut module).unwrap();

    // The template stays; both specializations appear.
    assert!(module.function(sym("id")).is_some());
    let id_int = module.function(sym("id$int")).expect("id$int exists");
    let id_bool = module.function(sym("id$bool")).expect("id$bool exists");

    assert!(id_int.type_params.is_empty());
    assert_eq!(id_int.ret, Some(Type::Int));
    assert_eq!(id_int.locals[id_int.params[0]].ty, Type::Int);
    assert_eq!(id_bool.ret, Some(Type::Bool));
    assert_eq!(id_bool.locals[id_bool.params[0]].ty, Type::Bool);

    // Both call sites are rewritten with empty type-args.
    let main = module.function(sym("main")).unwrap();
    let callees: Vec<Symbol> = main.blocks[main.entry]
        .statements
        .iter()
        .filter_map(|s| match s {
            Statement::Call {
                callee: Callee::Name(name),
                type_args,
                ..
            } => {
                assert!(type_args.is_empty());
                Some(*name)
            }
            _ => None,
        })
        .collect();
    assert_eq!(callees, vec![sym("id$int"), sym("id$bool")]);

    malc_mir::validate_monomorphized(&module).unwrap();
}

#[test]
fn missing_generic_function_is_reported() {
    let mut builder = Builder::new(sym("main"), None);
    builder.push(Statement::Call {
        dest: None,
        callee: Callee::Name(sym("ghost")),
        args: vec![],
        type_args: vec![Type::Int],
    });
    builder.terminate(Terminator::Return(None));
    let mut module = Module {
        functions: vec![builder.build()],
        ..Default::default()
    };

    let err = monomorphize(&mut module).unwrap_err();
    assert!(matches!(err, crate::MonoError::MissingFunction { .. }));
}

#[test]
fn monomorphize_is_idempotent() {
    let mut module = Module {
        functions: vec![generic_id(), caller_of_id()],
        ..Default::default()
    };
    monomorphize(&mut module).unwrap();
    let snapshot = module.clone();
    monomorphize(&mut module).unwrap();
    assert_eq!(module, snapshot);
}

/// Trait-bounded calls inside a generic rewrite to the concrete type's
/// method during specialization.
#[test]
fn trait_calls_rewrite_to_concrete_methods() {
    let t = sym("T");
    // fn area_of[T: Shape](s: T) -> float { return Shape::area(s) }
    let mut builder = Builder::new(sym("area_of"), Some(Type::Float));
    let s = builder.add_param(sym("s"), Type::Param(t), Span::DUMMY);
    let result = builder.temp(Type::Float);
    builder.push(Statement::Call {
        dest: Some(result),
        callee: Callee::Name(sym("Shape::area")),
        args: vec![Operand::Local(s)],
        type_args: vec![],
    });
    builder.terminate(Terminator::Return(Some(Operand::Local(result))));
    let mut area_of = builder.build();
    area_of.type_params = vec![TypeParamDecl {
        name: t,
        bounds: vec![sym("Shape")],
    }];

    let mut builder = Builder::new(sym("main"), None);
    builder.push(Statement::Call {
        dest: None,
        callee: Callee::Name(sym("area_of")),
        args: vec![Operand::nil()],
        type_args: vec![Type::Named(sym("Circle"))],
    });
    builder.terminate(Terminator::Return(None));

    let mut module = Module {
        functions: vec![area_of, builder.build()],
        ..Default::default()
    };
    monomorphize(&mut module).unwrap();

    let specialized = module.function(sym("area_of$Circle")).unwrap();
    let rewritten = specialized.blocks[specialized.entry]
        .statements
        .iter()
        .any(|s| {
            matches!(s, Statement::Call {
                callee: Callee::Name(name),
                ..
            } if *name == sym("Circle::area"))
        });
    assert!(rewritten, "Shape::area should become Circle::area");
}

/// Generic struct instances inside a specialized body become registered
/// concrete structs with substituted fields.
#[test]
fn struct_instances_specialize_alongside_functions() {
    let t = sym("T");
    let boxed = sym("Boxed");

    // fn wrap[T](x: T) { let b: Boxed[T]; ... }
    let mut builder = Builder::new(sym("wrap"), None);
    let x = builder.add_param(sym("x"), Type::Param(t), Span::DUMMY);
    let b = builder.add_local(
        Some(sym("b")),
        Type::Generic {
            base: boxed,
            args: vec![Type::Param(t)],
        },
        Span::DUMMY,
    );
    builder.push(Statement::MakeStruct {
        dest: b,
        ty: Type::Generic {
            base: boxed,
            args: vec![Type::Param(t)],
        },
        fields: vec![(sym("value"), Operand::Local(x))],
    });
    builder.terminate(Terminator::Return(None));
    let mut wrap = builder.build();
    wrap.type_params = vec![TypeParamDecl::new(t)];

    let mut builder = Builder::new(sym("main"), None);
    builder.push(Statement::Call {
        dest: None,
        callee: Callee::Name(sym("wrap")),
        args: vec![Operand::int(7, Type::Int)],
        type_args: vec![Type::Int],
    });
    builder.terminate(Terminator::Return(None));

    let mut module = Module {
        functions: vec![wrap, builder.build()],
        ..Default::default()
    };
    module.structs.insert(
        boxed,
        StructDef {
            name: boxed,
            type_params: vec![t],
            fields: vec![FieldDef {
                name: sym("value"),
                ty: Type::Param(t),
            }],
        },
    );

    monomorphize(&mut module).unwrap();

    let mangled = sym("Boxed$int");
    let def = module.structs.get(&mangled).expect("Boxed$int registered");
    assert_eq!(def.fields[0].ty, Type::Int);

    let specialized = module.function(sym("wrap$int")).unwrap();
    assert_eq!(
        specialized.locals[specialized.params[0]].ty,
        Type::Int
    );
    let local_b = specialized
        .locals
        .iter()
        .find(|l| l.name == Some(sym("b")))
        .unwrap();
    assert_eq!(local_b.ty, Type::Named(mangled));
}

#[test]
fn mangled_names_are_registered_once() {
    let mut module = Module {
        functions: vec![generic_id(), caller_of_id(), {
            // second caller producing the same specializations
            let mut builder = Builder::new(sym("again"), None);
            let a = builder.temp(Type::Int);
            builder.push(Statement::Call {
                dest: Some(a),
                callee: Callee::Name(sym("id")),
                args: vec![Operand::int(2, Type::Int)],
                type_args: vec![Type::Int],
            });
            builder.terminate(Terminator::Return(None));
            builder.build()
        }],
        ..Default::default()
    };
    monomorphize(&mut module).unwrap();

    let count = module
        .functions
        .iter()
        .filter(|f| f.name == mangle(sym("id"), &[Type::Int]))
        .count();
    assert_eq!(count, 1);
}
