//! MIR crate tests: builder, lowering, CFG analysis, SSA construction,
//! and validation.

use malc_sem::ast::{self, NodeIdGen};
use malc_sem::{Def, EnumDef, Scope, Type, TypeInfo, VariantDef};
use malc_util::{Span, Symbol};

use crate::analysis::{dominance_frontiers, ControlFlowGraph, Dominators};
use crate::builder::Builder;
use crate::lower::Lowerer;
use crate::mir::*;
use crate::ssa;
use crate::validate::{validate_module, validate_monomorphized};

fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

#[test]
fn builder_allocates_blocks_and_locals() {
    let mut builder = Builder::new(sym("f"), Some(Type::Int));
    assert_eq!(builder.entry(), BlockId(0));

    let p = builder.add_param(sym("x"), Type::Int, Span::DUMMY);
    assert_eq!(p, LocalId(0));
    let t = builder.temp(Type::Bool);
    assert_eq!(t, LocalId(1));

    let b1 = builder.new_block();
    assert_eq!(b1, BlockId(1));
}

#[test]
fn builder_seals_unterminated_blocks_with_return() {
    let mut builder = Builder::new(sym("f"), None);
    builder.push(Statement::Yield);
    let func = builder.build();

    assert_eq!(
        func.blocks[func.entry].terminator,
        Some(Terminator::Return(None))
    );
}

#[test]
fn first_terminator_wins() {
    let mut builder = Builder::new(sym("f"), None);
    let exit = builder.new_block();
    builder.terminate(Terminator::Goto(exit));
    builder.terminate(Terminator::Return(None));

    assert_eq!(
        builder.function.blocks[BlockId(0)].terminator,
        Some(Terminator::Goto(exit))
    );
}

/// Small harness that plays the type checker for lowering tests.
struct TestFile {
    ids: NodeIdGen,
    info: TypeInfo,
}

impl TestFile {
    fn new() -> Self {
        Self {
            ids: NodeIdGen::new(),
            info: TypeInfo::new(),
        }
    }

    fn expr(&mut self, kind: ast::ExprKind, ty: Type) -> ast::Expr {
        let id = self.ids.next();
        self.info.record_type(id, ty);
        ast::Expr::new(id, kind, Span::DUMMY)
    }

    fn int(&mut self, value: i64) -> ast::Expr {
        self.expr(ast::ExprKind::Literal(ast::Lit::Int(value)), Type::Int)
    }

    fn ident(&mut self, name: &str, ty: Type) -> ast::Expr {
        self.expr(ast::ExprKind::Ident(sym(name)), ty)
    }

    fn block(stmts: Vec<ast::Stmt>, tail: Option<ast::Expr>) -> ast::Block {
        ast::Block {
            stmts,
            tail: tail.map(Box::new),
            span: Span::DUMMY,
        }
    }

    fn function(&self, name: &str, params: Vec<(&str, Type)>, ret: Option<Type>, body: ast::Block) -> ast::FnDecl {
        ast::FnDecl {
            name: sym(name),
            type_params: vec![],
            params: params
                .into_iter()
                .map(|(name, ty)| ast::Param {
                    name: sym(name),
                    ty,
                    span: Span::DUMMY,
                })
                .collect(),
            ret,
            body,
            span: Span::DUMMY,
        }
    }
}

fn lower_single(
    file: TestFile,
    decl: ast::FnDecl,
    scope: &Scope,
) -> Result<Module, crate::LowerError> {
    let ast_file = ast::File {
        items: vec![ast::Item::Function(decl)],
    };
    Lowerer::new(&file.info, scope, None, None).lower_file(&ast_file)
}

#[test]
fn lower_let_and_return() {
    let mut t = TestFile::new();
    let value = t.int(41);
    let one = t.int(1);
    let x = t.ident("x", Type::Int);
    let sum = t.expr(
        ast::ExprKind::Binary {
            op: ast::BinOp::Add,
            lhs: Box::new(x),
            rhs: Box::new(one),
        },
        Type::Int,
    );

    let body = TestFile::block(
        vec![
            ast::Stmt::Let {
                name: sym("x"),
                ty: None,
                value,
                span: Span::DUMMY,
            },
            ast::Stmt::Return {
                value: Some(sum),
                span: Span::DUMMY,
            },
        ],
        None,
    );
    let decl = t.function("forty_two", vec![], Some(Type::Int), body);
    let module = lower_single(t, decl, &Scope::new()).unwrap();

    let func = module.function(sym("forty_two")).unwrap();
    let entry = &func.blocks[func.entry];
    assert!(matches!(entry.statements[0], Statement::Assign { .. }));
    assert!(matches!(
        entry.statements[1],
        Statement::Call {
            callee: Callee::Name(name),
            ..
        } if name == sym("__add__")
    ));
    assert!(matches!(entry.terminator, Some(Terminator::Return(Some(_)))));
    validate_module(&module).unwrap();
}

#[test]
fn lower_while_with_break_targets_exit() {
    let mut t = TestFile::new();
    let cond = t.expr(ast::ExprKind::Literal(ast::Lit::Bool(true)), Type::Bool);
    let body = TestFile::block(
        vec![ast::Stmt::Break { span: Span::DUMMY }],
        None,
    );
    let decl = t.function(
        "spin",
        vec![],
        None,
        TestFile::block(
            vec![ast::Stmt::While {
                cond,
                body,
                span: Span::DUMMY,
            }],
            None,
        ),
    );
    let module = lower_single(t, decl, &Scope::new()).unwrap();
    let func = module.function(sym("spin")).unwrap();

    // entry -> header; header branches to body and exit; body breaks to
    // exit.
    let header = match func.blocks[func.entry].terminator {
        Some(Terminator::Goto(b)) => b,
        ref other => panic!("expected goto header, found {:?}", other),
    };
    let (body_block, exit) = match func.blocks[header].terminator {
        Some(Terminator::Branch {
            then_block,
            else_block,
            ..
        }) => (then_block, else_block),
        ref other => panic!("expected branch, found {:?}", other),
    };
    assert_eq!(
        func.blocks[body_block].terminator,
        Some(Terminator::Goto(exit))
    );
    validate_module(&module).unwrap();
}

#[test]
fn break_outside_loop_is_rejected() {
    let mut t = TestFile::new();
    let decl = t.function(
        "bad",
        vec![],
        None,
        TestFile::block(vec![ast::Stmt::Break { span: Span::DUMMY }], None),
    );
    let err = lower_single(t, decl, &Scope::new()).unwrap_err();
    assert!(matches!(err, crate::LowerError::NoLoopContext { .. }));
}

fn option_scope() -> Scope {
    let mut scope = Scope::new();
    let name = sym("Option");
    scope.define(
        name,
        Def::Enum(EnumDef {
            name,
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
    scope
}

/// Enum destructure: `match o { Some(v) => v, None => 0 }` compiles to a
/// discriminant test against index 0, a payload access for `v`, and a
/// second test against index 1 yielding the literal.
#[test]
fn lower_enum_destructure() {
    let mut t = TestFile::new();
    let option_ty = Type::Named(sym("Option"));

    let subject = t.ident("o", option_ty.clone());
    let v_use = t.ident("v", Type::Int);
    let zero = t.int(0);

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
            body: TestFile::block(vec![], Some(v_use)),
            span: Span::DUMMY,
        },
        ast::Arm {
            pat: ast::Pattern::Enum {
                enum_name: None,
                variant: sym("None"),
                args: vec![],
                span: Span::DUMMY,
            },
            body: TestFile::block(vec![], Some(zero)),
            span: Span::DUMMY,
        },
    ];
    let match_expr = t.expr(
        ast::ExprKind::Match {
            subject: Box::new(subject),
            arms,
        },
        Type::Int,
    );
    let decl = t.function(
        "unwrap_or_zero",
        vec![("o", option_ty)],
        Some(Type::Int),
        TestFile::block(
            vec![ast::Stmt::Return {
                value: Some(match_expr),
                span: Span::DUMMY,
            }],
            None,
        ),
    );

    let module = lower_single(t, decl, &option_scope()).unwrap();
    let func = module.function(sym("unwrap_or_zero")).unwrap();

    let mut discriminants = 0;
    let mut payloads = 0;
    let mut eq_tests = 0;
    for block in func.blocks.iter() {
        for stmt in &block.statements {
            match stmt {
                Statement::Discriminant { .. } => discriminants += 1,
                Statement::VariantPayload {
                    variant_index,
                    member,
                    ..
                } => {
                    payloads += 1;
                    assert_eq!((*variant_index, *member), (0, 0));
                }
                Statement::Call {
                    callee: Callee::Name(name),
                    ..
                } if *name == sym("__eq__") => eq_tests += 1,
                _ => {}
            }
        }
    }
    assert_eq!(discriminants, 2);
    assert_eq!(payloads, 1);
    assert_eq!(eq_tests, 2);
    validate_module(&module).unwrap();
}

#[test]
fn pattern_bindings_stay_out_of_later_arms() {
    let mut t = TestFile::new();
    let option_ty = Type::Named(sym("Option"));
    let subject = t.ident("o", option_ty.clone());
    let one = t.int(1);
    let zero = t.int(0);

    // match o { Some(v) => 1, None => 0 } — `v` is bound but unused; the
    // binding assign must sit in the first arm's success block only.
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
            body: TestFile::block(vec![], Some(one)),
            span: Span::DUMMY,
        },
        ast::Arm {
            pat: ast::Pattern::Enum {
                enum_name: None,
                variant: sym("None"),
                args: vec![],
                span: Span::DUMMY,
            },
            body: TestFile::block(vec![], Some(zero)),
            span: Span::DUMMY,
        },
    ];
    let match_expr = t.expr(
        ast::ExprKind::Match {
            subject: Box::new(subject),
            arms,
        },
        Type::Int,
    );
    let decl = t.function(
        "has_value",
        vec![("o", option_ty)],
        Some(Type::Int),
        TestFile::block(
            vec![ast::Stmt::Return {
                value: Some(match_expr),
                span: Span::DUMMY,
            }],
            None,
        ),
    );
    let module = lower_single(t, decl, &option_scope()).unwrap();
    let func = module.function(sym("has_value")).unwrap();

    // Exactly one block starts with the binding assign, and that block
    // must not contain a discriminant test.
    let binding_blocks: Vec<_> = func
        .blocks
        .iter()
        .filter(|b| {
            b.statements.first().map_or(false, |s| {
                matches!(s, Statement::Assign { dest, .. }
                    if func.locals[*dest].name == Some(sym("v")))
            })
        })
        .collect();
    assert_eq!(binding_blocks.len(), 1);
    assert!(!binding_blocks[0]
        .statements
        .iter()
        .any(|s| matches!(s, Statement::Discriminant { .. })));
}

#[test]
fn dominators_of_diamond() {
    // entry -> {left, right} -> merge
    let mut builder = Builder::new(sym("d"), None);
    let left = builder.new_block();
    let right = builder.new_block();
    let merge = builder.new_block();
    builder.terminate(Terminator::Branch {
        cond: Operand::bool(true),
        then_block: left,
        else_block: right,
    });
    builder.terminate_block(left, Terminator::Goto(merge));
    builder.terminate_block(right, Terminator::Goto(merge));
    builder.terminate_block(merge, Terminator::Return(None));
    let func = builder.build();

    let cfg = ControlFlowGraph::new(&func);
    let doms = Dominators::compute(&func, &cfg);

    assert_eq!(doms.idom[func.entry], None);
    assert_eq!(doms.idom[left], Some(func.entry));
    assert_eq!(doms.idom[right], Some(func.entry));
    assert_eq!(doms.idom[merge], Some(func.entry));
    assert!(doms.dominates(func.entry, merge));
    assert!(!doms.dominates(left, merge));

    let frontiers = dominance_frontiers(&func, &cfg, &doms);
    assert_eq!(frontiers[left], vec![merge]);
    assert_eq!(frontiers[right], vec![merge]);
    assert!(frontiers[func.entry].is_empty());
}

/// Diamond phi: `x` assigned 1 in the left arm and 2 in the right arm; the
/// merge block returns it. SSA must merge the two versions with a phi.
#[test]
fn ssa_inserts_phi_for_diamond() {
    let mut builder = Builder::new(sym("d"), Some(Type::Int));
    let x = builder.add_local(Some(sym("x")), Type::Int, Span::DUMMY);
    let left = builder.new_block();
    let right = builder.new_block();
    let merge = builder.new_block();
    builder.terminate(Terminator::Branch {
        cond: Operand::bool(true),
        then_block: left,
        else_block: right,
    });
    builder.push_into(
        left,
        Statement::Assign {
            dest: x,
            value: Operand::int(1, Type::Int),
        },
    );
    builder.terminate_block(left, Terminator::Goto(merge));
    builder.push_into(
        right,
        Statement::Assign {
            dest: x,
            value: Operand::int(2, Type::Int),
        },
    );
    builder.terminate_block(right, Terminator::Goto(merge));
    builder.terminate_block(merge, Terminator::Return(Some(Operand::Local(x))));
    let func = builder.build();

    let ssa_func = ssa::build_function(&func);

    let phi = ssa_func.blocks[merge]
        .statements
        .iter()
        .find_map(|s| match s {
            Statement::Phi { dest, sources } => Some((*dest, sources.clone())),
            _ => None,
        })
        .expect("merge block should contain a phi");

    let (dest, sources) = phi;
    assert_eq!(sources.len(), 2);
    let incoming: Vec<BlockId> = sources.iter().map(|(b, _)| *b).collect();
    assert!(incoming.contains(&left));
    assert!(incoming.contains(&right));
    for (pred, op) in &sources {
        let version = op.as_local().expect("phi sources are versioned locals");
        assert_ne!(version, x, "incoming value must be a renamed version");
        let defined_in_pred = ssa_func.blocks[*pred]
            .statements
            .iter()
            .any(|s| s.dest() == Some(version));
        assert!(defined_in_pred);
    }
    assert_eq!(
        ssa_func.blocks[merge].terminator,
        Some(Terminator::Return(Some(Operand::Local(dest))))
    );
}

/// Property: after SSA construction every local is defined at most once.
#[test]
fn ssa_defines_each_local_once() {
    let mut builder = Builder::new(sym("loopy"), Some(Type::Int));
    let x = builder.add_local(Some(sym("x")), Type::Int, Span::DUMMY);
    builder.push(Statement::Assign {
        dest: x,
        value: Operand::int(0, Type::Int),
    });
    let header = builder.new_block();
    let body = builder.new_block();
    let exit = builder.new_block();
    builder.terminate(Terminator::Goto(header));
    builder.terminate_block(
        header,
        Terminator::Branch {
            cond: Operand::bool(true),
            then_block: body,
            else_block: exit,
        },
    );
    builder.push_into(
        body,
        Statement::Assign {
            dest: x,
            value: Operand::int(1, Type::Int),
        },
    );
    builder.terminate_block(body, Terminator::Goto(header));
    builder.terminate_block(exit, Terminator::Return(Some(Operand::Local(x))));
    let func = builder.build();

    let ssa_func = ssa::build_function(&func);

    let mut defs: std::collections::HashMap<LocalId, usize> = std::collections::HashMap::new();
    for block in ssa_func.blocks.iter() {
        for stmt in &block.statements {
            if let Some(dest) = stmt.dest() {
                *defs.entry(dest).or_insert(0) += 1;
            }
        }
    }
    for (local, count) in defs {
        assert!(count <= 1, "local _{} defined {} times", local.0, count);
    }
}

#[test]
fn validate_rejects_missing_terminator() {
    let mut func = Function::new(sym("broken"), None);
    func.blocks.push(BasicBlock::new());
    let module = Module {
        functions: vec![func],
        ..Default::default()
    };
    assert!(matches!(
        validate_module(&module),
        Err(crate::ValidateError::MissingTerminator { .. })
    ));
}

#[test]
fn validate_rejects_residual_type_args() {
    let mut builder = Builder::new(sym("caller"), None);
    builder.push(Statement::Call {
        dest: None,
        callee: Callee::Name(sym("id")),
        args: vec![],
        type_args: vec![Type::Int],
    });
    builder.terminate(Terminator::Return(None));
    let module = Module {
        functions: vec![builder.build()],
        ..Default::default()
    };
    assert!(validate_module(&module).is_ok());
    assert!(matches!(
        validate_monomorphized(&module),
        Err(crate::ValidateError::ResidualTypeArgs { .. })
    ));
}

#[test]
fn pretty_prints_blocks_and_statements() {
    let mut builder = Builder::new(sym("show"), Some(Type::Int));
    let x = builder.add_local(Some(sym("x")), Type::Int, Span::DUMMY);
    builder.push(Statement::Assign {
        dest: x,
        value: Operand::int(3, Type::Int),
    });
    builder.terminate(Terminator::Return(Some(Operand::Local(x))));
    let module = Module {
        functions: vec![builder.build()],
        ..Default::default()
    };

    let printed = crate::pretty::print_module(&module);
    assert!(printed.contains("fn show()"));
    assert!(printed.contains("bb0:"));
    assert!(printed.contains("_0 = const 3int"));
    assert!(printed.contains("return _0"));
}
