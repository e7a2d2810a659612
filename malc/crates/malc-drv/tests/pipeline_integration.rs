//! Full-pipeline tests: typed AST in, LLVM IR (or MIR dump) out.

mod common;

use common::{sym, Program};
use malc_drv::{Compiler, Config, EmitKind};
use malc_sem::ast::{self, BinOp};
use malc_sem::{Def, EnumDef, FieldDef, StructDef, Type, TypeParamDecl, VariantDef};
use malc_util::Span;

fn compile(program: Program, config: Config) -> anyhow::Result<String> {
    let (file, info, scope) = program.finish();
    let output = Compiler::new(config).compile(&file, &info, &scope)?;
    Ok(output.text)
}

#[test]
fn arithmetic_function_emits_llvm() -> anyhow::Result<()> {
    let mut p = Program::new();
    let a = p.ident("a", Type::Int);
    let b = p.ident("b", Type::Int);
    let sum = p.binary(BinOp::Add, a, b, Type::Int);
    let body = Program::block(vec![Program::ret(sum)], None);
    p.function(
        "add",
        vec![("a", Type::Int), ("b", Type::Int)],
        Some(Type::Int),
        body,
    );

    let ir = compile(p, Config::default())?;
    assert!(ir.contains("define i64 @add(i64 %a, i64 %b)"));
    assert!(ir.contains("add i64"));
    assert!(ir.contains("ret i64"));
    Ok(())
}

/// Identity monomorphization, end to end: `id` called at `int` and
/// `bool` produces both specializations and rewrites the call sites.
#[test]
fn generic_identity_specializes_end_to_end() -> anyhow::Result<()> {
    let mut p = Program::new();

    let t = sym("T");
    let x = p.ident("x", Type::Param(t));
    let id_body = Program::block(vec![Program::ret(x)], None);
    p.generic_function(
        "id",
        vec![TypeParamDecl::new(t)],
        vec![("x", Type::Param(t))],
        Some(Type::Param(t)),
        id_body,
    );

    let one = p.int(1);
    let call_int = p.call("id", vec![one], Type::Int, vec![Type::Int]);
    let truth = p.boolean(true);
    let call_bool = p.call("id", vec![truth], Type::Bool, vec![Type::Bool]);
    let body = Program::block(
        vec![p.let_("a", call_int), p.let_("b", call_bool)],
        None,
    );
    p.function("main", vec![], None, body);

    let ir = compile(p, Config::default())?;
    assert!(ir.contains("define i64 @id_int(i64 %x)"));
    assert!(ir.contains("define i1 @id_bool(i1 %x)"));
    assert!(ir.contains("call i64 @id_int(i64 1)"));
    assert!(ir.contains("call i1 @id_bool(i1 1)"));
    Ok(())
}

/// Enum destructure through the whole pipeline.
#[test]
fn match_on_option_end_to_end() -> anyhow::Result<()> {
    let mut p = Program::new();
    let option = sym("Option");
    p.define(
        "Option",
        Def::Enum(EnumDef {
            name: option,
            type_params: vec![],
            variants: vec![
                VariantDef {
                    name: sym("Some"),
                    params: vec![Type::Int],
                },
                VariantDef {
                    name: sym("None"),
                    params: vec![],
                },
            ],
        }),
    );

    let subject = p.ident("o", Type::Named(option));
    let v_use = p.ident("v", Type::Int);
    let zero = p.int(0);
    let arms = vec![
        ast::Arm {
            pat: ast::Pattern::Enum {
                enum_name: None,
                variant: sym("Some"),
                args: vec![ast::Pattern::Binding {
                    name: sym("v"),
                    span: Span::DUMMY,
                }],
                span: Span::DUMMY,
            },
            body: Program::block(vec![], Some(v_use)),
            span: Span::DUMMY,
        },
        ast::Arm {
            pat: ast::Pattern::Enum {
                enum_name: None,
                variant: sym("None"),
                args: vec![],
                span: Span::DUMMY,
            },
            body: Program::block(vec![], Some(zero)),
            span: Span::DUMMY,
        },
    ];
    let match_expr = p.expr(
        ast::ExprKind::Match {
            subject: Box::new(subject),
            arms,
        },
        Type::Int,
    );
    let body = Program::block(vec![Program::ret(match_expr)], None);
    p.function(
        "unwrap_or_zero",
        vec![("o", Type::Named(option))],
        Some(Type::Int),
        body,
    );

    let ir = compile(p, Config::default())?;
    assert!(ir.contains("%enum.Option = type { i32, [8 x i8] }"));
    assert!(ir.contains("load i32, i32*"));
    assert!(ir.contains("zext i32"));
    assert!(ir.contains("icmp eq i64"));
    Ok(())
}

#[test]
fn if_expression_stores_both_arms() -> anyhow::Result<()> {
    let mut p = Program::new();
    let c = p.ident("c", Type::Bool);
    let one = p.int(1);
    let two = p.int(2);
    let if_expr = p.expr(
        ast::ExprKind::If(Box::new(ast::IfStmt {
            cond: c,
            then_body: Program::block(vec![], Some(one)),
            else_body: Some(ast::ElseArm::Block(Program::block(vec![], Some(two)))),
            span: Span::DUMMY,
        })),
        Type::Int,
    );
    let body = Program::block(vec![Program::ret(if_expr)], None);
    p.function("pick", vec![("c", Type::Bool)], Some(Type::Int), body);

    let ir = compile(p, Config::default())?;
    assert!(ir.contains("br i1"));
    assert!(ir.contains("store i64 1,"));
    assert!(ir.contains("store i64 2,"));
    Ok(())
}

#[test]
fn ssa_mode_emits_phi_for_if_expression() -> anyhow::Result<()> {
    let mut p = Program::new();
    let c = p.ident("c", Type::Bool);
    let one = p.int(1);
    let two = p.int(2);
    let if_expr = p.expr(
        ast::ExprKind::If(Box::new(ast::IfStmt {
            cond: c,
            then_body: Program::block(vec![], Some(one)),
            else_body: Some(ast::ElseArm::Block(Program::block(vec![], Some(two)))),
            span: Span::DUMMY,
        })),
        Type::Int,
    );
    let body = Program::block(vec![Program::ret(if_expr)], None);
    p.function("pick", vec![("c", Type::Bool)], Some(Type::Int), body);

    let config = Config {
        build_ssa: true,
        ..Config::default()
    };
    let ir = compile(p, config)?;
    assert!(ir.contains(" = phi i64 "));
    Ok(())
}

#[test]
fn while_loop_emits_header_and_backedge() -> anyhow::Result<()> {
    let mut p = Program::new();
    let n = p.ident("n", Type::Int);
    let zero = p.int(0);
    let cond = p.binary(BinOp::Gt, n, zero, Type::Bool);
    let n2 = p.ident("n", Type::Int);
    let one = p.int(1);
    let dec = p.binary(BinOp::Sub, n2, one, Type::Int);
    let target = p.ident("n", Type::Int);
    let body = Program::block(
        vec![ast::Stmt::While {
            cond,
            body: Program::block(
                vec![ast::Stmt::Assign {
                    target,
                    value: dec,
                    span: Span::DUMMY,
                }],
                None,
            ),
            span: Span::DUMMY,
        }],
        None,
    );
    p.function("countdown", vec![("n", Type::Int)], None, body);

    let ir = compile(p, Config::default())?;
    assert!(ir.contains("icmp sgt i64"));
    assert!(ir.contains("sub i64"));
    assert!(ir.contains("br label %bb1"));
    Ok(())
}

/// Struct field types survive the whole pipeline (floats store as
/// `double`, bools as `i1`).
#[test]
fn struct_literal_respects_field_types() -> anyhow::Result<()> {
    let mut p = Program::new();
    let point = sym("Point");
    p.define(
        "Point",
        Def::Struct(StructDef {
            name: point,
            type_params: vec![],
            fields: vec![
                FieldDef {
                    name: sym("x"),
                    ty: Type::Float,
                },
                FieldDef {
                    name: sym("y"),
                    ty: Type::Float,
                },
                FieldDef {
                    name: sym("active"),
                    ty: Type::Bool,
                },
            ],
        }),
    );

    let x = p.float(1.5);
    let y = p.float(2.5);
    let active = p.boolean(true);
    let lit = p.expr(
        ast::ExprKind::StructLit {
            name: point,
            fields: vec![(sym("x"), x), (sym("y"), y), (sym("active"), active)],
        },
        Type::Named(point),
    );
    let body = Program::block(vec![p.let_("p", lit)], None);
    p.function("build", vec![], None, body);

    let ir = compile(p, Config::default())?;
    assert!(ir.contains("%struct.Point = type { double, double, i1 }"));
    assert_eq!(ir.matches("store double").count(), 2);
    assert!(ir.contains("store i1 1,"));
    Ok(())
}

#[test]
fn impl_methods_mangle_and_dispatch() -> anyhow::Result<()> {
    let mut p = Program::new();
    let point = sym("Point");
    p.define(
        "Point",
        Def::Struct(StructDef {
            name: point,
            type_params: vec![],
            fields: vec![
                FieldDef {
                    name: sym("x"),
                    ty: Type::Float,
                },
                FieldDef {
                    name: sym("y"),
                    ty: Type::Float,
                },
            ],
        }),
    );

    // impl Point { fn sum(self) -> float { return self.x + self.y } }
    let self_x_target = p.ident("self", Type::Named(point));
    let self_x = p.expr(
        ast::ExprKind::Field {
            target: Box::new(self_x_target),
            field: sym("x"),
        },
        Type::Float,
    );
    let self_y_target = p.ident("self", Type::Named(point));
    let self_y = p.expr(
        ast::ExprKind::Field {
            target: Box::new(self_y_target),
            field: sym("y"),
        },
        Type::Float,
    );
    let sum = p.binary(BinOp::Add, self_x, self_y, Type::Float);
    let method = ast::FnDecl {
        name: sym("sum"),
        type_params: vec![],
        params: vec![ast::Param {
            name: sym("self"),
            ty: Type::Named(point),
            span: Span::DUMMY,
        }],
        ret: Some(Type::Float),
        body: Program::block(vec![Program::ret(sum)], None),
        span: Span::DUMMY,
    };
    p.items.push(ast::Item::Impl(ast::ImplBlock {
        self_ty: point,
        type_params: vec![],
        methods: vec![method],
        span: Span::DUMMY,
    }));

    // fn use_it(p: Point) -> float { return p.sum() }
    let receiver = p.ident("p", Type::Named(point));
    let call = p.method_call(receiver, "sum", vec![], Type::Float);
    let body = Program::block(vec![Program::ret(call)], None);
    p.function("use_it", vec![("p", Type::Named(point))], Some(Type::Float), body);

    let ir = compile(p, Config::default())?;
    assert!(ir.contains("define double @Point__sum(%struct.Point* %self)"));
    assert!(ir.contains("call double @Point__sum(%struct.Point*"));
    Ok(())
}

#[test]
fn emit_mir_produces_readable_dump() -> anyhow::Result<()> {
    let mut p = Program::new();
    let a = p.ident("a", Type::Int);
    let b = p.ident("b", Type::Int);
    let sum = p.binary(BinOp::Add, a, b, Type::Int);
    let body = Program::block(vec![Program::ret(sum)], None);
    p.function(
        "add",
        vec![("a", Type::Int), ("b", Type::Int)],
        Some(Type::Int),
        body,
    );

    let config = Config {
        emit: EmitKind::Mir,
        ..Config::default()
    };
    let text = compile(p, config)?;
    assert!(text.contains("fn add(_0: int, _1: int) -> int {"));
    assert!(text.contains("bb0:"));
    assert!(text.contains("call __add__(_0, _1)"));
    Ok(())
}

#[test]
fn output_lands_in_requested_file() -> anyhow::Result<()> {
    let mut p = Program::new();
    p.function("main", vec![], None, Program::block(vec![], None));
    let (file, info, scope) = p.finish();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out.ll");
    let output =
        Compiler::new(Config::default()).compile_to_file(&file, &info, &scope, &path)?;
    let written = std::fs::read_to_string(&path)?;
    assert_eq!(written, output.text);
    assert!(written.contains("define i32 @main()"));
    Ok(())
}
