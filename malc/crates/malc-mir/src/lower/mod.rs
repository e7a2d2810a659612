//! AST→MIR lowering.
//!
//! Expressions lower to operands: trivial expressions become literals,
//! everything else appends side-effecting statements to the current block
//! and yields a reference to a fresh result local. Control flow becomes
//! explicit blocks; pattern matches become discriminant/load/branch
//! chains; impl methods become mangled functions.

mod expr;
mod pattern;

use malc_sem::ast::{self, ElseArm, GoTask, IfStmt, SelectCaseKind};
use malc_sem::{MethodTable, ModuleMap, Scope, Type, TypeInfo, TypeParamDecl};
use malc_util::{FxHashMap, Span, Symbol};

use crate::builder::Builder;
use crate::error::LowerError;
use crate::mir::{
    BlockId, Callee, Function, LocalId, Module, Operand, SelectArm, SelectKind, Statement,
    Terminator,
};

/// Per-function lowering state.
pub(crate) struct FnCtx {
    pub builder: Builder,
    /// Lexical binding scopes, innermost last.
    bindings: Vec<FxHashMap<Symbol, LocalId>>,
    /// (header, exit) of each enclosing loop, innermost last.
    loops: Vec<(BlockId, BlockId)>,
}

impl FnCtx {
    fn new(builder: Builder) -> Self {
        Self {
            builder,
            bindings: vec![FxHashMap::default()],
            loops: Vec::new(),
        }
    }

    pub fn bind(&mut self, name: Symbol, local: LocalId) {
        self.bindings
            .last_mut()
            .expect("binding scope stack is never empty")
            .insert(name, local);
    }

    pub fn resolve(&self, name: Symbol) -> Option<LocalId> {
        self.bindings
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
    }

    fn push_scope(&mut self) {
        self.bindings.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.bindings.pop();
    }

    /// Switch to a fresh block if the current one is sealed, so statements
    /// lowered after `return`/`break` land in an unreachable block instead
    /// of being emitted ahead of the terminator.
    fn ensure_open(&mut self) {
        if self.builder.is_terminated() {
            let dead = self.builder.new_block();
            self.builder.switch_to(dead);
        }
    }
}

/// Lowers one type-checked file into a MIR [`Module`].
pub struct Lowerer<'a> {
    pub(crate) info: &'a TypeInfo,
    pub(crate) scope: &'a Scope,
    pub(crate) methods: Option<&'a MethodTable>,
    pub(crate) modules: Option<&'a ModuleMap>,
    pub(crate) module: Module,
    spawn_counter: usize,
    lambda_counter: usize,
    /// Wrapper functions synthesized while lowering (`spawn_block_N`,
    /// `spawn_lambda_N`, `lambda_N`), appended after the user's functions.
    pending: Vec<Function>,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        info: &'a TypeInfo,
        scope: &'a Scope,
        methods: Option<&'a MethodTable>,
        modules: Option<&'a ModuleMap>,
    ) -> Self {
        Self {
            info,
            scope,
            methods,
            modules,
            module: Module::default(),
            spawn_counter: 0,
            lambda_counter: 0,
            pending: Vec::new(),
        }
    }

    pub fn lower_file(mut self, file: &ast::File) -> Result<Module, LowerError> {
        // Type definitions first so patterns and constructors can resolve
        // them while function bodies lower.
        for item in &file.items {
            match item {
                ast::Item::Struct(decl) => {
                    self.module.structs.insert(decl.def.name, decl.def.clone());
                }
                ast::Item::Enum(decl) => {
                    self.module.enums.insert(decl.def.name, decl.def.clone());
                }
                _ => {}
            }
        }
        self.collect_scope_types();

        for item in &file.items {
            match item {
                ast::Item::Function(decl) => {
                    let func = self.lower_fn(
                        decl.name,
                        decl.type_params.clone(),
                        &decl.params,
                        decl.ret.clone(),
                        &decl.body,
                        None,
                    )?;
                    self.module.functions.push(func);
                }
                ast::Item::Impl(block) => self.lower_impl(block)?,
                ast::Item::Struct(_) | ast::Item::Enum(_) | ast::Item::Trait(_) => {}
            }
        }

        self.module.functions.append(&mut self.pending);
        Ok(self.module)
    }

    /// Struct/enum definitions the checker collected globally (and in
    /// sibling modules), sorted by name for deterministic emission order.
    fn collect_scope_types(&mut self) {
        let mut defs: Vec<_> = self.scope.iter().collect();
        if let Some(modules) = self.modules {
            for info in modules.values() {
                defs.extend(info.scope.iter());
            }
        }
        defs.sort_by_key(|(name, _)| name.as_str());
        for (name, def) in defs {
            match def {
                malc_sem::Def::Struct(s) => {
                    self.module.structs.entry(name).or_insert_with(|| s.clone());
                }
                malc_sem::Def::Enum(e) => {
                    self.module.enums.entry(name).or_insert_with(|| e.clone());
                }
                _ => {}
            }
        }
    }

    /// Lower an `impl T` block: each method becomes a function named
    /// `T::m` whose `self` parameter is retyped to `T`, with the impl's
    /// generic parameters prepended to the method's own.
    fn lower_impl(&mut self, block: &ast::ImplBlock) -> Result<(), LowerError> {
        for method in &block.methods {
            let mangled = Symbol::intern(&format!("{}::{}", block.self_ty, method.name));
            let mut type_params = block.type_params.clone();
            type_params.extend(method.type_params.iter().cloned());

            let func = self.lower_fn(
                mangled,
                type_params,
                &method.params,
                method.ret.clone(),
                &method.body,
                Some(block.self_ty),
            )?;
            self.module.functions.push(func);
        }
        Ok(())
    }

    fn lower_fn(
        &mut self,
        name: Symbol,
        type_params: Vec<TypeParamDecl>,
        params: &[ast::Param],
        ret: Option<Type>,
        body: &ast::Block,
        self_ty: Option<Symbol>,
    ) -> Result<Function, LowerError> {
        let mut cx = FnCtx::new(Builder::new(name, ret));
        cx.builder.function.type_params = type_params;

        for param in params {
            let ty = if param.name.as_str() == "self" {
                match self_ty {
                    Some(owner) => Type::Named(owner),
                    None => param.ty.clone(),
                }
            } else {
                param.ty.clone()
            };
            let id = cx.builder.add_param(param.name, ty, param.span);
            cx.bind(param.name, id);
        }

        let tail = self.lower_block(&mut cx, body)?;
        if !cx.builder.is_terminated() {
            cx.builder.terminate(Terminator::Return(tail));
        }
        Ok(cx.builder.build())
    }

    /// Lower a block's statements and return its tail operand, if any.
    pub(crate) fn lower_block(
        &mut self,
        cx: &mut FnCtx,
        block: &ast::Block,
    ) -> Result<Option<Operand>, LowerError> {
        cx.push_scope();
        for stmt in &block.stmts {
            self.lower_stmt(cx, stmt)?;
        }
        let tail = match &block.tail {
            Some(expr) => {
                cx.ensure_open();
                Some(self.lower_expr(cx, expr)?)
            }
            None => None,
        };
        cx.pop_scope();
        Ok(tail)
    }

    fn lower_stmt(&mut self, cx: &mut FnCtx, stmt: &ast::Stmt) -> Result<(), LowerError> {
        cx.ensure_open();
        match stmt {
            ast::Stmt::Let {
                name,
                ty,
                value,
                span,
            } => {
                let op = self.lower_expr(cx, value)?;
                let local_ty = match ty {
                    Some(ty) => ty.clone(),
                    None => self.expr_type(value)?,
                };
                let local = cx.builder.add_local(Some(*name), local_ty, *span);
                cx.builder.push(Statement::Assign {
                    dest: local,
                    value: op,
                });
                cx.bind(*name, local);
                Ok(())
            }
            ast::Stmt::Assign {
                target,
                value,
                span,
            } => self.lower_assign(cx, target, value, *span),
            ast::Stmt::Expr(expr) => {
                self.lower_expr(cx, expr)?;
                Ok(())
            }
            ast::Stmt::Return { value, .. } => {
                let op = match value {
                    Some(expr) => Some(self.lower_expr(cx, expr)?),
                    None => None,
                };
                cx.builder.terminate(Terminator::Return(op));
                Ok(())
            }
            ast::Stmt::If(if_stmt) => {
                let merge = cx.builder.new_block();
                self.lower_if(cx, if_stmt, None, merge)?;
                cx.builder.switch_to(merge);
                Ok(())
            }
            ast::Stmt::While { cond, body, .. } => self.lower_while(cx, cond, body),
            ast::Stmt::For {
                var,
                iterable,
                body,
                span,
            } => self.lower_for(cx, *var, iterable, body, *span),
            ast::Stmt::Break { span } => {
                let (_, exit) = *cx
                    .loops
                    .last()
                    .ok_or(LowerError::NoLoopContext {
                        keyword: "break",
                        span: *span,
                    })?;
                cx.builder.terminate(Terminator::Goto(exit));
                Ok(())
            }
            ast::Stmt::Continue { span } => {
                let (header, _) = *cx
                    .loops
                    .last()
                    .ok_or(LowerError::NoLoopContext {
                        keyword: "continue",
                        span: *span,
                    })?;
                cx.builder.terminate(Terminator::Goto(header));
                Ok(())
            }
            ast::Stmt::Go { task, span } => self.lower_go(cx, task, *span),
            ast::Stmt::Send {
                channel, value, ..
            } => {
                let channel = self.lower_expr(cx, channel)?;
                let value = self.lower_expr(cx, value)?;
                cx.builder.push(Statement::Send { channel, value });
                Ok(())
            }
            ast::Stmt::Select { cases, span } => self.lower_select(cx, cases, *span),
        }
    }

    fn lower_assign(
        &mut self,
        cx: &mut FnCtx,
        target: &ast::Expr,
        value: &ast::Expr,
        span: Span,
    ) -> Result<(), LowerError> {
        let value_op = self.lower_expr(cx, value)?;
        match &target.kind {
            ast::ExprKind::Ident(name) => {
                let local = cx.resolve(*name).ok_or_else(|| LowerError::Unbound {
                    name: name.to_string(),
                    span,
                })?;
                cx.builder.push(Statement::Assign {
                    dest: local,
                    value: value_op,
                });
                Ok(())
            }
            ast::ExprKind::Field { target, field } => {
                let target_op = self.lower_expr(cx, target)?;
                cx.builder.push(Statement::StoreField {
                    target: target_op,
                    field: *field,
                    value: value_op,
                });
                Ok(())
            }
            ast::ExprKind::Index { .. } => {
                let (base, indices) = self.lower_index_chain(cx, target)?;
                cx.builder.push(Statement::StoreIndex {
                    target: base,
                    indices,
                    value: value_op,
                });
                Ok(())
            }
            _ => Err(LowerError::Unsupported {
                what: "assignment target".to_string(),
                span,
            }),
        }
    }

    /// Shared by statement- and expression-position `if`. Condition and
    /// arms chain through fresh blocks into `merge`; when `result` is set,
    /// each arm stores its tail value before jumping.
    pub(crate) fn lower_if(
        &mut self,
        cx: &mut FnCtx,
        if_stmt: &IfStmt,
        result: Option<LocalId>,
        merge: BlockId,
    ) -> Result<(), LowerError> {
        let cond = self.lower_expr(cx, &if_stmt.cond)?;
        let then_block = cx.builder.new_block();

        match &if_stmt.else_body {
            None => {
                cx.builder.terminate(Terminator::Branch {
                    cond,
                    then_block,
                    else_block: merge,
                });
            }
            Some(arm) => {
                let else_block = cx.builder.new_block();
                cx.builder.terminate(Terminator::Branch {
                    cond,
                    then_block,
                    else_block,
                });
                cx.builder.switch_to(else_block);
                match arm {
                    ElseArm::If(nested) => self.lower_if(cx, nested, result, merge)?,
                    ElseArm::Block(block) => {
                        self.lower_arm_body(cx, block, result, merge)?;
                    }
                }
            }
        }

        cx.builder.switch_to(then_block);
        self.lower_arm_body(cx, &if_stmt.then_body, result, merge)
    }

    fn lower_arm_body(
        &mut self,
        cx: &mut FnCtx,
        block: &ast::Block,
        result: Option<LocalId>,
        merge: BlockId,
    ) -> Result<(), LowerError> {
        let tail = self.lower_block(cx, block)?;
        if let (Some(dest), Some(value)) = (result, tail) {
            cx.builder.push(Statement::Assign { dest, value });
        }
        cx.builder.terminate(Terminator::Goto(merge));
        Ok(())
    }

    fn lower_while(
        &mut self,
        cx: &mut FnCtx,
        cond: &ast::Expr,
        body: &ast::Block,
    ) -> Result<(), LowerError> {
        let header = cx.builder.new_block();
        cx.builder.terminate(Terminator::Goto(header));
        cx.builder.switch_to(header);

        let cond_op = self.lower_expr(cx, cond)?;
        let body_block = cx.builder.new_block();
        let exit = cx.builder.new_block();
        cx.builder.terminate(Terminator::Branch {
            cond: cond_op,
            then_block: body_block,
            else_block: exit,
        });

        cx.loops.push((header, exit));
        cx.builder.switch_to(body_block);
        self.lower_block(cx, body)?;
        cx.builder.terminate(Terminator::Goto(header));
        cx.loops.pop();

        cx.builder.switch_to(exit);
        Ok(())
    }

    /// `for x in it` desugars to
    /// `iter = into_iter(it); loop { if !has_next(iter) break; x = next(iter); body }`.
    /// The three callees are unresolved names bound by monomorphization or
    /// the runtime library.
    fn lower_for(
        &mut self,
        cx: &mut FnCtx,
        var: Symbol,
        iterable: &ast::Expr,
        body: &ast::Block,
        span: Span,
    ) -> Result<(), LowerError> {
        let iterable_op = self.lower_expr(cx, iterable)?;
        let iterable_ty = self.expr_type(iterable)?;
        let elem_ty = element_type(&iterable_ty);

        let iter = cx.builder.add_local(None, iterable_ty, span);
        cx.builder.push(Statement::Call {
            dest: Some(iter),
            callee: Callee::Name(Symbol::intern("into_iter")),
            args: vec![iterable_op],
            type_args: vec![],
        });

        let header = cx.builder.new_block();
        cx.builder.terminate(Terminator::Goto(header));
        cx.builder.switch_to(header);

        let has_next = cx.builder.temp(Type::Bool);
        cx.builder.push(Statement::Call {
            dest: Some(has_next),
            callee: Callee::Name(Symbol::intern("has_next")),
            args: vec![Operand::Local(iter)],
            type_args: vec![],
        });

        let body_block = cx.builder.new_block();
        let exit = cx.builder.new_block();
        cx.builder.terminate(Terminator::Branch {
            cond: Operand::Local(has_next),
            then_block: body_block,
            else_block: exit,
        });

        cx.loops.push((header, exit));
        cx.builder.switch_to(body_block);
        cx.push_scope();
        let loop_var = cx.builder.add_local(Some(var), elem_ty, span);
        cx.builder.push(Statement::Call {
            dest: Some(loop_var),
            callee: Callee::Name(Symbol::intern("next")),
            args: vec![Operand::Local(iter)],
            type_args: vec![],
        });
        cx.bind(var, loop_var);
        for stmt in &body.stmts {
            self.lower_stmt(cx, stmt)?;
        }
        if let Some(tail) = &body.tail {
            cx.ensure_open();
            self.lower_expr(cx, tail)?;
        }
        cx.pop_scope();
        cx.builder.terminate(Terminator::Goto(header));
        cx.loops.pop();

        cx.builder.switch_to(exit);
        Ok(())
    }

    /// `go` spawns a pthread against a wrapper function synthesized here.
    /// Blocks and lambdas wrap their bodies; a bare call spawns the callee
    /// directly. Spawned code cannot capture enclosing locals, so calls
    /// with arguments are rejected.
    fn lower_go(&mut self, cx: &mut FnCtx, task: &GoTask, span: Span) -> Result<(), LowerError> {
        match task {
            GoTask::Block(block) => {
                let name = Symbol::intern(&format!("spawn_block_{}", self.spawn_counter));
                self.spawn_counter += 1;
                let wrapper = self.lower_fn(name, vec![], &[], None, block, None)?;
                self.pending.push(wrapper);
                cx.builder.push(Statement::Spawn {
                    func: name,
                    args: vec![],
                    type_args: vec![],
                });
                Ok(())
            }
            GoTask::Call(call) => match &call.kind {
                ast::ExprKind::Call { callee, args } if args.is_empty() => match &callee.kind {
                    ast::ExprKind::Ident(name) => {
                        cx.builder.push(Statement::Spawn {
                            func: *name,
                            args: vec![],
                            type_args: self.info.type_args(call.id).to_vec(),
                        });
                        Ok(())
                    }
                    ast::ExprKind::Lambda {
                        params,
                        ret,
                        body,
                    } if params.is_empty() => {
                        let name =
                            Symbol::intern(&format!("spawn_lambda_{}", self.lambda_counter));
                        self.lambda_counter += 1;
                        let wrapper = self.lower_fn(name, vec![], &[], ret.clone(), body, None)?;
                        self.pending.push(wrapper);
                        cx.builder.push(Statement::Spawn {
                            func: name,
                            args: vec![],
                            type_args: vec![],
                        });
                        Ok(())
                    }
                    _ => Err(LowerError::Unsupported {
                        what: "spawned callee".to_string(),
                        span,
                    }),
                },
                _ => Err(LowerError::Unsupported {
                    what: "spawn of a call with arguments".to_string(),
                    span,
                }),
            },
        }
    }

    fn lower_select(
        &mut self,
        cx: &mut FnCtx,
        cases: &[ast::SelectCase],
        span: Span,
    ) -> Result<(), LowerError> {
        // Channel and value operands are evaluated once, before the
        // polling terminator.
        let mut arms = Vec::with_capacity(cases.len());
        let mut bodies = Vec::with_capacity(cases.len());
        for case in cases {
            let (kind, binding) = match &case.kind {
                SelectCaseKind::Send { channel, value } => {
                    let channel = self.lower_expr(cx, channel)?;
                    let value = self.lower_expr(cx, value)?;
                    (SelectKind::Send { channel, value }, None)
                }
                SelectCaseKind::Recv { binding, channel } => {
                    let channel_op = self.lower_expr(cx, channel)?;
                    let dest = match binding {
                        Some(name) => {
                            let elem_ty = match self.expr_type(channel)? {
                                Type::Channel(elem) => *elem,
                                _ => Type::Nil,
                            };
                            let local = cx.builder.add_local(Some(*name), elem_ty, span);
                            Some((*name, local))
                        }
                        None => None,
                    };
                    (
                        SelectKind::Recv {
                            dest: dest.map(|(_, local)| local),
                            channel: channel_op,
                        },
                        dest,
                    )
                }
                SelectCaseKind::Default => (SelectKind::Default, None),
            };
            let target = cx.builder.new_block();
            arms.push(SelectArm { kind, target });
            bodies.push((target, binding, &case.body));
        }

        let merge = cx.builder.new_block();
        cx.builder.terminate(Terminator::Select { cases: arms });

        for (target, binding, body) in bodies {
            cx.builder.switch_to(target);
            cx.push_scope();
            if let Some((name, local)) = binding {
                cx.bind(name, local);
            }
            for stmt in &body.stmts {
                self.lower_stmt(cx, stmt)?;
            }
            if let Some(tail) = &body.tail {
                cx.ensure_open();
                self.lower_expr(cx, tail)?;
            }
            cx.pop_scope();
            cx.builder.terminate(Terminator::Goto(merge));
        }

        cx.builder.switch_to(merge);
        Ok(())
    }

    /// Synthesize `lambda_N` from a lambda literal and return its name.
    pub(crate) fn lower_lambda(
        &mut self,
        params: &[ast::Param],
        ret: Option<Type>,
        body: &ast::Block,
    ) -> Result<Symbol, LowerError> {
        let name = Symbol::intern(&format!("lambda_{}", self.lambda_counter));
        self.lambda_counter += 1;
        let func = self.lower_fn(name, vec![], params, ret, body, None)?;
        self.pending.push(func);
        Ok(name)
    }

    pub(crate) fn expr_type(&self, expr: &ast::Expr) -> Result<Type, LowerError> {
        if let Some(ty) = self.info.type_of(expr.id) {
            return Ok(ty.clone());
        }
        // Literals are typed even without a checker entry.
        if let ast::ExprKind::Literal(lit) = &expr.kind {
            return Ok(literal_type(lit));
        }
        Err(LowerError::MissingType { span: expr.span })
    }
}

pub(crate) fn literal_type(lit: &ast::Lit) -> Type {
    match lit {
        ast::Lit::Int(_) => Type::Int,
        ast::Lit::Float(_) => Type::Float,
        ast::Lit::Bool(_) => Type::Bool,
        ast::Lit::Str(_) => Type::Str,
        ast::Lit::Nil => Type::Nil,
    }
}

fn element_type(ty: &Type) -> Type {
    match ty {
        Type::Slice(elem) | Type::Array(elem, _) | Type::Channel(elem) => (**elem).clone(),
        Type::Map(_, v) => (**v).clone(),
        // Iteration over an opaque iterable; the element is only known to
        // the runtime.
        _ => Type::Nil,
    }
}
