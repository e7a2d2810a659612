//! Error paths and less-traveled constructs through the driver.

mod common;

use common::{sym, Program};
use malc_drv::{Compiler, CompileError, Config, EmitKind};
use malc_sem::ast;
use malc_sem::Type;
use malc_util::Span;

fn compile(program: Program, config: Config) -> Result<String, CompileError> {
    let (file, info, scope) = program.finish();
    Compiler::new(config).compile(&file, &info, &scope).map(|o| o.text)
}

#[test]
fn unbound_identifier_fails_lowering() {
    let mut p = Program::new();
    let ghost = p.ident("ghost", Type::Int);
    let body = Program::block(vec![Program::ret(ghost)], None);
    p.function("bad", vec![], Some(Type::Int), body);

    let err = compile(p, Config::default()).unwrap_err();
    assert!(matches!(err, CompileError::Lower(_)));
}

#[test]
fn break_outside_loop_fails_lowering() {
    let mut p = Program::new();
    let body = Program::block(vec![ast::Stmt::Break { span: Span::DUMMY }], None);
    p.function("bad", vec![], None, body);

    let err = compile(p, Config::default()).unwrap_err();
    assert!(matches!(err, CompileError::Lower(_)));
}

#[test]
fn generic_call_without_definition_fails_monomorphization() {
    let mut p = Program::new();
    let call = p.call("phantom", vec![], Type::Int, vec![Type::Int]);
    let body = Program::block(vec![p.let_("x", call)], None);
    p.function("main", vec![], None, body);

    let err = compile(p, Config::default()).unwrap_err();
    assert!(matches!(err, CompileError::Mono(_)));
}

#[test]
fn spawn_with_arguments_is_rejected() {
    let mut p = Program::new();
    p.function("task", vec![("n", Type::Int)], None, Program::block(vec![], None));
    let arg = p.int(3);
    let call = p.call("task", vec![arg], Type::Void, vec![]);
    let body = Program::block(
        vec![ast::Stmt::Go {
            task: ast::GoTask::Call(call),
            span: Span::DUMMY,
        }],
        None,
    );
    p.function("main", vec![], None, body);

    let err = compile(p, Config::default()).unwrap_err();
    assert!(matches!(err, CompileError::Lower(_)));
}

#[test]
fn spawned_block_becomes_wrapper_function() {
    let mut p = Program::new();
    let one = p.int(1);
    let block_body = Program::block(vec![p.let_("x", one)], None);
    let body = Program::block(
        vec![ast::Stmt::Go {
            task: ast::GoTask::Block(block_body),
            span: Span::DUMMY,
        }],
        None,
    );
    p.function("main", vec![], None, body);

    let ir = compile(p, Config::default()).unwrap();
    assert!(ir.contains("define void @spawn_block_0()"));
    assert!(ir.contains("call i32 @pthread_create"));
    assert!(ir.contains("bitcast (void ()* @spawn_block_0 to i8* (i8*)*)"));
}

#[test]
fn channels_lower_to_runtime_calls() {
    let mut p = Program::new();
    let chan_ty = Type::Channel(Box::new(Type::Int));

    let cap = p.int(1);
    let make = {
        let callee = p.expr(ast::ExprKind::Ident(sym("make")), Type::Void);
        p.expr(
            ast::ExprKind::Call {
                callee: Box::new(callee),
                args: vec![cap],
            },
            chan_ty.clone(),
        )
    };
    let ch1 = p.ident("ch", chan_ty.clone());
    let v = p.int(9);
    let ch2 = p.ident("ch", chan_ty.clone());
    let recv = p.expr(
        ast::ExprKind::Recv {
            channel: Box::new(ch2),
        },
        Type::Int,
    );
    let body = Program::block(
        vec![
            p.let_("ch", make),
            ast::Stmt::Send {
                channel: ch1,
                value: v,
                span: Span::DUMMY,
            },
            p.let_("got", recv),
        ],
        None,
    );
    p.function("main", vec![], None, body);

    let ir = compile(p, Config::default()).unwrap();
    assert!(ir.contains("call %Channel* @runtime_channel_new(i64 8, i64 1)"));
    assert!(ir.contains("call void @runtime_channel_send(%Channel*"));
    assert!(ir.contains("call void @runtime_channel_recv(%Channel*"));
}

#[test]
fn select_with_default_polls_once_per_round() {
    let mut p = Program::new();
    let chan_ty = Type::Channel(Box::new(Type::Int));
    let ch = p.ident("ch", chan_ty.clone());
    let body = Program::block(
        vec![ast::Stmt::Select {
            cases: vec![
                ast::SelectCase {
                    kind: ast::SelectCaseKind::Recv {
                        binding: Some(sym("v")),
                        channel: ch,
                    },
                    body: Program::block(vec![], None),
                    span: Span::DUMMY,
                },
                ast::SelectCase {
                    kind: ast::SelectCaseKind::Default,
                    body: Program::block(vec![], None),
                    span: Span::DUMMY,
                },
            ],
            span: Span::DUMMY,
        }],
        None,
    );
    p.function("wait", vec![("ch", chan_ty)], None, body);

    let ir = compile(p, Config::default()).unwrap();
    assert!(ir.contains("call i8 @runtime_channel_try_recv"));
    assert!(ir.contains("sel0.head:"));
    // The default case makes the yield+sleep tail unreachable but still
    // emitted.
    assert!(ir.contains("call void @runtime_nanosleep(i64 100000)"));
}

#[test]
fn slice_methods_map_to_runtime_entries() {
    let mut p = Program::new();
    let slice_ty = Type::Slice(Box::new(Type::Int));

    let s1 = p.ident("s", slice_ty.clone());
    let nine = p.int(9);
    let push = p.method_call(s1, "push", vec![nine], Type::Void, );
    let s2 = p.ident("s", slice_ty.clone());
    let idx = p.int(0);
    let load = p.expr(
        ast::ExprKind::Index {
            target: Box::new(s2),
            index: Box::new(idx),
        },
        Type::Int,
    );
    let body = Program::block(
        vec![ast::Stmt::Expr(push), p.let_("first", load)],
        None,
    );
    p.function("use_slice", vec![("s", slice_ty)], None, body);

    let ir = compile(p, Config::default()).unwrap();
    assert!(ir.contains("call void @runtime_slice_push(%Slice*"));
    assert!(ir.contains("call i8* @runtime_slice_get(%Slice*"));
    // Primitive push values spill through a stack slot cast to i8*.
    assert!(ir.contains("bitcast i64*"));
}

#[test]
fn for_loop_desugars_to_iterator_protocol() {
    let mut p = Program::new();
    let slice_ty = Type::Slice(Box::new(Type::Int));
    let s = p.ident("s", slice_ty.clone());
    let body = Program::block(
        vec![ast::Stmt::For {
            var: sym("x"),
            iterable: s,
            body: Program::block(vec![], None),
            span: Span::DUMMY,
        }],
        None,
    );
    p.function("iterate", vec![("s", slice_ty)], None, body);

    let config = Config {
        emit: EmitKind::Mir,
        ..Config::default()
    };
    let text = compile(p, config).unwrap();
    assert!(text.contains("call into_iter(_0)"));
    assert!(text.contains("call has_next("));
    assert!(text.contains("call next("));
    assert!(text.contains("branch"));
}

#[test]
fn sizeof_lowers_to_constant() {
    let mut p = Program::new();
    let call = {
        let callee = p.expr(ast::ExprKind::Ident(sym("sizeof")), Type::Void);
        let call = p.expr(
            ast::ExprKind::Call {
                callee: Box::new(callee),
                args: vec![],
            },
            Type::Int,
        );
        p.info.record_type_args(call.id, vec![Type::Float]);
        call
    };
    let body = Program::block(vec![Program::ret(call)], None);
    p.function("float_size", vec![], Some(Type::Int), body);

    let ir = compile(p, Config::default()).unwrap();
    assert!(ir.contains("add i64 0, 8"));
}

#[test]
fn warnings_surface_through_the_driver() {
    // A struct field referencing an unregistered type falls back to a
    // byte pointer with a warning rather than failing.
    let mut p = Program::new();
    p.define(
        "Node",
        malc_sem::Def::Struct(malc_sem::StructDef {
            name: sym("Node"),
            type_params: vec![],
            fields: vec![malc_sem::FieldDef {
                name: sym("next"),
                ty: Type::Named(sym("Forward")),
            }],
        }),
    );
    p.function("main", vec![], None, Program::block(vec![], None));

    let (file, info, scope) = p.finish();
    let output = Compiler::new(Config::default())
        .compile(&file, &info, &scope)
        .unwrap();
    assert!(output.text.contains("%struct.Node = type { i8* }"));
    assert!(!output.warnings.is_empty());
}
