//! Shared harness for driver tests: builds typed ASTs the way the
//! front end would hand them over.
#![allow(dead_code)]

use malc_sem::ast::{self, NodeIdGen};
use malc_sem::{Def, Scope, Type, TypeInfo};
use malc_util::{Span, Symbol};

pub fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

/// A program under construction, playing the type checker's role.
pub struct Program {
    ids: NodeIdGen,
    pub info: TypeInfo,
    pub scope: Scope,
    pub items: Vec<ast::Item>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            ids: NodeIdGen::new(),
            info: TypeInfo::new(),
            scope: Scope::new(),
            items: Vec::new(),
        }
    }

    pub fn expr(&mut self, kind: ast::ExprKind, ty: Type) -> ast::Expr {
        let id = self.ids.next();
        self.info.record_type(id, ty);
        ast::Expr::new(id, kind, Span::DUMMY)
    }

    pub fn int(&mut self, value: i64) -> ast::Expr {
        self.expr(ast::ExprKind::Literal(ast::Lit::Int(value)), Type::Int)
    }

    pub fn float(&mut self, value: f64) -> ast::Expr {
        self.expr(ast::ExprKind::Literal(ast::Lit::Float(value)), Type::Float)
    }

    pub fn boolean(&mut self, value: bool) -> ast::Expr {
        self.expr(ast::ExprKind::Literal(ast::Lit::Bool(value)), Type::Bool)
    }

    pub fn ident(&mut self, name: &str, ty: Type) -> ast::Expr {
        self.expr(ast::ExprKind::Ident(sym(name)), ty)
    }

    pub fn binary(
        &mut self,
        op: ast::BinOp,
        lhs: ast::Expr,
        rhs: ast::Expr,
        ty: Type,
    ) -> ast::Expr {
        self.expr(
            ast::ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    /// A direct call; `type_args` land in the checker's call-site table.
    pub fn call(
        &mut self,
        name: &str,
        args: Vec<ast::Expr>,
        ret: Type,
        type_args: Vec<Type>,
    ) -> ast::Expr {
        let callee = self.expr(ast::ExprKind::Ident(sym(name)), Type::Void);
        let call = self.expr(
            ast::ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            ret,
        );
        if !type_args.is_empty() {
            self.info.record_type_args(call.id, type_args);
        }
        call
    }

    pub fn method_call(
        &mut self,
        target: ast::Expr,
        method: &str,
        args: Vec<ast::Expr>,
        ret: Type,
    ) -> ast::Expr {
        let callee = self.expr(
            ast::ExprKind::Field {
                target: Box::new(target),
                field: sym(method),
            },
            Type::Void,
        );
        self.expr(
            ast::ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            ret,
        )
    }

    pub fn block(stmts: Vec<ast::Stmt>, tail: Option<ast::Expr>) -> ast::Block {
        ast::Block {
            stmts,
            tail: tail.map(Box::new),
            span: Span::DUMMY,
        }
    }

    pub fn ret(value: ast::Expr) -> ast::Stmt {
        ast::Stmt::Return {
            value: Some(value),
            span: Span::DUMMY,
        }
    }

    pub fn let_(&mut self, name: &str, value: ast::Expr) -> ast::Stmt {
        ast::Stmt::Let {
            name: sym(name),
            ty: None,
            value,
            span: Span::DUMMY,
        }
    }

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<(&str, Type)>,
        ret: Option<Type>,
        body: ast::Block,
    ) {
        self.items.push(ast::Item::Function(ast::FnDecl {
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
        }));
    }

    pub fn generic_function(
        &mut self,
        name: &str,
        type_params: Vec<malc_sem::TypeParamDecl>,
        params: Vec<(&str, Type)>,
        ret: Option<Type>,
        body: ast::Block,
    ) {
        self.items.push(ast::Item::Function(ast::FnDecl {
            name: sym(name),
            type_params,
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
        }));
    }

    pub fn define(&mut self, name: &str, def: Def) {
        self.scope.define(sym(name), def);
    }

    pub fn finish(self) -> (ast::File, TypeInfo, Scope) {
        (ast::File { items: self.items }, self.info, self.scope)
    }
}
