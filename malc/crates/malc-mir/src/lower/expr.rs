//! Expression lowering.

use malc_sem::ast::{self, BinOp, UnOp};
use malc_sem::Type;
use malc_util::Symbol;

use crate::error::LowerError;
use crate::lower::{literal_type, FnCtx, Lowerer};
use crate::mir::{Callee, ConstValue, Constant, LocalId, Operand, Statement};

/// Slice methods recognized on any receiver typed as a slice; each maps to
/// the runtime entry point of the same suffix.
const SLICE_METHODS: &[&str] = &[
    "push", "pop", "insert", "remove", "clear", "reserve", "copy", "subslice", "set", "get",
    "len",
];

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_expr(
        &mut self,
        cx: &mut FnCtx,
        expr: &ast::Expr,
    ) -> Result<Operand, LowerError> {
        match &expr.kind {
            ast::ExprKind::Literal(lit) => {
                let ty = self
                    .info
                    .type_of(expr.id)
                    .cloned()
                    .unwrap_or_else(|| literal_type(lit));
                Ok(Operand::Const(Constant {
                    ty,
                    value: const_value(lit),
                }))
            }
            ast::ExprKind::Ident(name) => {
                if let Some(local) = cx.resolve(*name) {
                    return Ok(Operand::Local(local));
                }
                // A bare function name used as a value.
                if let Some(malc_sem::Def::Fn(sig)) = self.scope.lookup(*name) {
                    let ty = Type::Fn(
                        sig.params.clone(),
                        Box::new(sig.ret.clone().unwrap_or(Type::Void)),
                    );
                    let dest = cx.builder.temp(ty);
                    cx.builder.push(Statement::MakeClosure {
                        dest,
                        func: *name,
                        env: Operand::nil(),
                    });
                    return Ok(Operand::Local(dest));
                }
                Err(LowerError::Unbound {
                    name: name.to_string(),
                    span: expr.span,
                })
            }
            ast::ExprKind::Path { ty, item } => self.lower_path_value(cx, *ty, *item, expr),
            ast::ExprKind::Binary { op, lhs, rhs } => {
                let lhs_op = self.lower_expr(cx, lhs)?;
                let rhs_op = self.lower_expr(cx, rhs)?;
                let result_ty = self
                    .info
                    .type_of(expr.id)
                    .cloned()
                    .unwrap_or_else(|| binop_result_type(*op, &self.operand_type(cx, &lhs_op)));
                let dest = cx.builder.temp(result_ty);
                cx.builder.push(Statement::Call {
                    dest: Some(dest),
                    callee: Callee::Name(Symbol::intern(binop_intrinsic(*op))),
                    args: vec![lhs_op, rhs_op],
                    type_args: vec![],
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::Unary { op, operand } => {
                let operand_op = self.lower_expr(cx, operand)?;
                let result_ty = self
                    .info
                    .type_of(expr.id)
                    .cloned()
                    .unwrap_or_else(|| self.operand_type(cx, &operand_op));
                let dest = cx.builder.temp(result_ty);
                let name = match op {
                    UnOp::Neg => "__neg__",
                    UnOp::Not => "__not__",
                };
                cx.builder.push(Statement::Call {
                    dest: Some(dest),
                    callee: Callee::Name(Symbol::intern(name)),
                    args: vec![operand_op],
                    type_args: vec![],
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::Call { callee, args } => self.lower_call(cx, expr, callee, args),
            ast::ExprKind::Field { target, field } => {
                let target_op = self.lower_expr(cx, target)?;
                let ty = self.expr_type(expr)?;
                let dest = cx.builder.temp(ty);
                cx.builder.push(Statement::LoadField {
                    dest,
                    target: target_op,
                    field: *field,
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::Index { .. } => {
                let (base, indices) = self.lower_index_chain(cx, expr)?;
                let ty = self.expr_type(expr)?;
                let dest = cx.builder.temp(ty);
                cx.builder.push(Statement::LoadIndex {
                    dest,
                    target: base,
                    indices,
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::StructLit { name, fields } => {
                let mut field_ops = Vec::with_capacity(fields.len());
                for (field, value) in fields {
                    field_ops.push((*field, self.lower_expr(cx, value)?));
                }
                let ty = self
                    .info
                    .type_of(expr.id)
                    .cloned()
                    .unwrap_or(Type::Named(*name));
                let dest = cx.builder.temp(ty.clone());
                cx.builder.push(Statement::MakeStruct {
                    dest,
                    ty,
                    fields: field_ops,
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::ArrayLit { elems } => {
                let mut elem_ops = Vec::with_capacity(elems.len());
                for elem in elems {
                    elem_ops.push(self.lower_expr(cx, elem)?);
                }
                let ty = self.expr_type(expr)?;
                let dest = cx.builder.temp(ty.clone());
                cx.builder.push(Statement::MakeArray {
                    dest,
                    ty,
                    elems: elem_ops,
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::TupleLit { elems } => {
                let mut elem_ops = Vec::with_capacity(elems.len());
                for elem in elems {
                    elem_ops.push(self.lower_expr(cx, elem)?);
                }
                let ty = self
                    .info
                    .type_of(expr.id)
                    .cloned()
                    .unwrap_or(Type::Tuple(vec![]));
                let dest = cx.builder.temp(ty);
                cx.builder.push(Statement::MakeTuple {
                    dest,
                    elems: elem_ops,
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::If(if_stmt) => {
                let ty = self.expr_type(expr)?;
                let result = cx.builder.temp(ty);
                let merge = cx.builder.new_block();
                self.lower_if(cx, if_stmt, Some(result), merge)?;
                cx.builder.switch_to(merge);
                Ok(Operand::Local(result))
            }
            ast::ExprKind::Match { subject, arms } => {
                let result = match self.info.type_of(expr.id) {
                    Some(Type::Void) | None => None,
                    Some(ty) => Some(cx.builder.temp(ty.clone())),
                };
                self.lower_match(cx, subject, arms, result)?;
                match result {
                    Some(local) => Ok(Operand::Local(local)),
                    None => Ok(Operand::nil()),
                }
            }
            ast::ExprKind::Recv { channel } => {
                let channel_op = self.lower_expr(cx, channel)?;
                let elem_ty = match self.expr_type(channel)? {
                    Type::Channel(elem) => *elem,
                    _ => self.expr_type(expr)?,
                };
                let dest = cx.builder.temp(elem_ty);
                cx.builder.push(Statement::Receive {
                    dest,
                    channel: channel_op,
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::Cast { value, ty } => {
                let value_op = self.lower_expr(cx, value)?;
                let dest = cx.builder.temp(ty.clone());
                cx.builder.push(Statement::Cast {
                    dest,
                    value: value_op,
                    ty: ty.clone(),
                });
                Ok(Operand::Local(dest))
            }
            ast::ExprKind::Lambda { params, ret, body } => {
                let func = self.lower_lambda(params, ret.clone(), body)?;
                let ty = self.info.type_of(expr.id).cloned().unwrap_or_else(|| {
                    Type::Fn(
                        params.iter().map(|p| p.ty.clone()).collect(),
                        Box::new(ret.clone().unwrap_or(Type::Void)),
                    )
                });
                let dest = cx.builder.temp(ty);
                cx.builder.push(Statement::MakeClosure {
                    dest,
                    func,
                    env: Operand::nil(),
                });
                Ok(Operand::Local(dest))
            }
        }
    }

    /// `Type::item` at value position: a payload-less enum variant.
    fn lower_path_value(
        &mut self,
        cx: &mut FnCtx,
        ty: Symbol,
        item: Symbol,
        expr: &ast::Expr,
    ) -> Result<Operand, LowerError> {
        let Some(def) = self.module.enums.get(&ty) else {
            return Err(LowerError::Unbound {
                name: format!("{}::{}", ty, item),
                span: expr.span,
            });
        };
        let index = def
            .variant_index(item)
            .ok_or_else(|| LowerError::UnknownVariant {
                enum_name: ty.to_string(),
                variant: item.to_string(),
                span: expr.span,
            })?;
        let result_ty = self
            .info
            .type_of(expr.id)
            .cloned()
            .unwrap_or(Type::Named(ty));
        let dest = cx.builder.temp(result_ty);
        cx.builder.push(Statement::MakeEnum {
            dest,
            enum_name: ty,
            variant: item,
            variant_index: index,
            values: vec![],
        });
        Ok(Operand::Local(dest))
    }

    fn lower_call(
        &mut self,
        cx: &mut FnCtx,
        expr: &ast::Expr,
        callee: &ast::Expr,
        args: &[ast::Expr],
    ) -> Result<Operand, LowerError> {
        match &callee.kind {
            ast::ExprKind::Ident(name) => {
                if let Some(op) = self.lower_builtin(cx, expr, *name, args)? {
                    return Ok(op);
                }
                let arg_ops = self.lower_args(cx, args)?;
                self.emit_call(
                    cx,
                    expr,
                    *name,
                    arg_ops,
                    self.info.type_args(expr.id).to_vec(),
                )
            }
            ast::ExprKind::Path { ty, item } => {
                // Enum variant construction, or a static method.
                let variant_index = self
                    .module
                    .enums
                    .get(ty)
                    .and_then(|def| def.variant_index(*item));
                if let Some(index) = variant_index {
                    let values = self.lower_args(cx, args)?;
                    let result_ty = self
                        .info
                        .type_of(expr.id)
                        .cloned()
                        .unwrap_or(Type::Named(*ty));
                    let dest = cx.builder.temp(result_ty);
                    cx.builder.push(Statement::MakeEnum {
                        dest,
                        enum_name: *ty,
                        variant: *item,
                        variant_index: index,
                        values,
                    });
                    return Ok(Operand::Local(dest));
                }
                let name = Symbol::intern(&format!("{}::{}", ty, item));
                let arg_ops = self.lower_args(cx, args)?;
                self.emit_call(
                    cx,
                    expr,
                    name,
                    arg_ops,
                    self.info.type_args(expr.id).to_vec(),
                )
            }
            ast::ExprKind::Field { target, field } => {
                // `p.handler()` where `handler` is a closure-typed field
                // is a field load plus an indirect call, not a method.
                if self.is_closure_field(target, *field)? {
                    let target_op = self.lower_expr(cx, target)?;
                    let field_ty = self.closure_field_type(target, *field)?;
                    let loaded = cx.builder.temp(field_ty);
                    cx.builder.push(Statement::LoadField {
                        dest: loaded,
                        target: target_op,
                        field: *field,
                    });
                    let arg_ops = self.lower_args(cx, args)?;
                    let dest = self.call_dest(cx, expr);
                    cx.builder.push(Statement::Call {
                        dest,
                        callee: Callee::Value(Operand::Local(loaded)),
                        args: arg_ops,
                        type_args: vec![],
                    });
                    return Ok(dest.map(Operand::Local).unwrap_or_else(Operand::nil));
                }
                self.lower_method_call(cx, expr, target, *field, args)
            }
            _ => {
                // Indirect call through a function value.
                let callee_op = self.lower_expr(cx, callee)?;
                let arg_ops = self.lower_args(cx, args)?;
                let dest = self.call_dest(cx, expr);
                cx.builder.push(Statement::Call {
                    dest,
                    callee: Callee::Value(callee_op),
                    args: arg_ops,
                    type_args: vec![],
                });
                Ok(dest.map(Operand::Local).unwrap_or_else(Operand::nil))
            }
        }
    }

    /// `target.method(args)`: resolve the receiver's type name, mangle the
    /// callee to `TypeName::method`, prepend the receiver as first
    /// argument, and prepend the receiver's generic-instance arguments to
    /// the call's type arguments so the method specializes alongside the
    /// type.
    fn lower_method_call(
        &mut self,
        cx: &mut FnCtx,
        expr: &ast::Expr,
        target: &ast::Expr,
        method: Symbol,
        args: &[ast::Expr],
    ) -> Result<Operand, LowerError> {
        let receiver_ty = self.expr_type(target)?;

        if let Type::Slice(elem) = &receiver_ty {
            if SLICE_METHODS.contains(&method.as_str()) {
                let elem_ty = (**elem).clone();
                return self.lower_slice_method(cx, expr, target, &elem_ty, method, args);
            }
        }

        // A receiver typed as a generic parameter dispatches through one of
        // its trait bounds; monomorphization rewrites the call to the
        // concrete type's method.
        let type_name = match &receiver_ty {
            Type::Param(param) => self.trait_bound_for(cx, *param, method),
            _ => receiver_ty.base_name(),
        }
        .ok_or_else(|| LowerError::Unsupported {
            what: format!("method call on value of type {}", receiver_ty),
            span: expr.span,
        })?;
        let mangled = Symbol::intern(&format!("{}::{}", type_name, method));

        let receiver_op = self.lower_expr(cx, target)?;
        let mut call_args = vec![receiver_op];
        call_args.extend(self.lower_args(cx, args)?);

        let mut type_args = Vec::new();
        if let Type::Generic { args: recv_args, .. } = &receiver_ty {
            type_args.extend(recv_args.iter().cloned());
        }
        type_args.extend(self.info.type_args(expr.id).iter().cloned());

        self.emit_call(cx, expr, mangled, call_args, type_args)
    }

    /// Does `target.field` name a closure-typed struct field rather than
    /// a method? The method table, when supplied, wins ties.
    fn is_closure_field(
        &self,
        target: &ast::Expr,
        field: Symbol,
    ) -> Result<bool, LowerError> {
        let Some(name) = self.expr_type(target)?.base_name() else {
            return Ok(false);
        };
        if let Some(methods) = self.methods {
            if methods.has_method(name, field) {
                return Ok(false);
            }
        }
        Ok(self
            .module
            .structs
            .get(&name)
            .and_then(|def| def.field(field))
            .map_or(false, |(_, f)| matches!(f.ty, Type::Fn(_, _))))
    }

    fn closure_field_type(
        &self,
        target: &ast::Expr,
        field: Symbol,
    ) -> Result<Type, LowerError> {
        let name = self.expr_type(target)?.base_name();
        let ty = name
            .and_then(|n| self.module.structs.get(&n))
            .and_then(|def| def.field(field))
            .map(|(_, f)| f.ty.clone());
        ty.ok_or(LowerError::MissingType { span: target.span })
    }

    /// The trait bound of `param` that declares `method`; falls back to
    /// the first bound when no trait definition settles it.
    fn trait_bound_for(&self, cx: &FnCtx, param: Symbol, method: Symbol) -> Option<Symbol> {
        let decl = cx
            .builder
            .function
            .type_params
            .iter()
            .find(|p| p.name == param)?;
        decl.bounds
            .iter()
            .copied()
            .find(|&bound| {
                self.scope
                    .lookup_trait(bound)
                    .map_or(false, |def| def.methods.iter().any(|m| m.name == method))
            })
            .or_else(|| decl.bounds.first().copied())
    }

    /// Builtins recognized by callee name or return type. Returns `None`
    /// when the call is an ordinary one.
    fn lower_builtin(
        &mut self,
        cx: &mut FnCtx,
        expr: &ast::Expr,
        name: Symbol,
        args: &[ast::Expr],
    ) -> Result<Option<Operand>, LowerError> {
        match name.as_str() {
            // `make(chan T, cap)` is detected by its return type.
            "make" => {
                let Some(ty @ Type::Channel(_)) = self.info.type_of(expr.id).cloned() else {
                    return Ok(None);
                };
                let capacity = match args.first() {
                    Some(arg) => self.lower_expr(cx, arg)?,
                    None => Operand::int(0, Type::Int),
                };
                let dest = cx.builder.temp(ty.clone());
                cx.builder.push(Statement::MakeChannel {
                    dest,
                    ty,
                    capacity,
                });
                Ok(Some(Operand::Local(dest)))
            }
            "sizeof" | "alignof" => {
                let ty = self
                    .info
                    .type_args(expr.id)
                    .first()
                    .cloned()
                    .ok_or(LowerError::MissingType { span: expr.span })?;
                let dest = cx.builder.temp(Type::Int);
                let stmt = if name.as_str() == "sizeof" {
                    Statement::SizeOf { dest, ty }
                } else {
                    Statement::AlignOf { dest, ty }
                };
                cx.builder.push(stmt);
                Ok(Some(Operand::Local(dest)))
            }
            "println" => {
                let arg = args.first().ok_or_else(|| LowerError::Unsupported {
                    what: "println without arguments".to_string(),
                    span: expr.span,
                })?;
                let arg_ty = self.expr_type(arg)?;
                let arg_op = self.lower_expr(cx, arg)?;
                let runtime = println_entry(&arg_ty);
                cx.builder.push(Statement::Call {
                    dest: None,
                    callee: Callee::Name(Symbol::intern(runtime)),
                    args: vec![arg_op],
                    type_args: vec![],
                });
                Ok(Some(Operand::nil()))
            }
            "yield" => {
                cx.builder.push(Statement::Yield);
                Ok(Some(Operand::nil()))
            }
            _ => Ok(None),
        }
    }

    /// Slice methods lower to the matching `runtime_slice_*` call. Value
    /// arguments of primitive type are spilled to a stack slot and cast to
    /// a raw byte pointer first.
    fn lower_slice_method(
        &mut self,
        cx: &mut FnCtx,
        expr: &ast::Expr,
        target: &ast::Expr,
        elem_ty: &Type,
        method: Symbol,
        args: &[ast::Expr],
    ) -> Result<Operand, LowerError> {
        let recv = self.lower_expr(cx, target)?;
        let receiver_ty = self.expr_type(target)?;

        let runtime = |suffix: &str| Symbol::intern(&format!("runtime_slice_{}", suffix));
        match method.as_str() {
            "push" | "set" | "insert" => {
                // value is always the last argument
                let mut call_args = vec![recv];
                for arg in &args[..args.len().saturating_sub(1)] {
                    call_args.push(self.lower_expr(cx, arg)?);
                }
                let value = args.last().ok_or_else(|| LowerError::Unsupported {
                    what: format!("slice `{}` without a value argument", method),
                    span: expr.span,
                })?;
                let value_op = self.lower_expr(cx, value)?;
                call_args.push(self.spill_to_bytes(cx, value_op, elem_ty));
                cx.builder.push(Statement::Call {
                    dest: None,
                    callee: Callee::Name(runtime(method.as_str())),
                    args: call_args,
                    type_args: vec![],
                });
                Ok(Operand::nil())
            }
            "pop" | "clear" | "remove" | "reserve" => {
                let mut call_args = vec![recv];
                for arg in args {
                    call_args.push(self.lower_expr(cx, arg)?);
                }
                cx.builder.push(Statement::Call {
                    dest: None,
                    callee: Callee::Name(runtime(method.as_str())),
                    args: call_args,
                    type_args: vec![],
                });
                Ok(Operand::nil())
            }
            "copy" | "subslice" => {
                let mut call_args = vec![recv];
                for arg in args {
                    call_args.push(self.lower_expr(cx, arg)?);
                }
                let dest = cx.builder.temp(receiver_ty);
                cx.builder.push(Statement::Call {
                    dest: Some(dest),
                    callee: Callee::Name(runtime(method.as_str())),
                    args: call_args,
                    type_args: vec![],
                });
                Ok(Operand::Local(dest))
            }
            "len" => {
                let dest = cx.builder.temp(Type::Int);
                cx.builder.push(Statement::Call {
                    dest: Some(dest),
                    callee: Callee::Name(runtime("len")),
                    args: vec![recv],
                    type_args: vec![],
                });
                Ok(Operand::Local(dest))
            }
            "get" => {
                let index = args.first().ok_or_else(|| LowerError::Unsupported {
                    what: "slice `get` without an index".to_string(),
                    span: expr.span,
                })?;
                let index_op = self.lower_expr(cx, index)?;
                let dest = cx.builder.temp(elem_ty.clone());
                cx.builder.push(Statement::LoadIndex {
                    dest,
                    target: recv,
                    indices: vec![index_op],
                });
                Ok(Operand::Local(dest))
            }
            _ => Err(LowerError::Unsupported {
                what: format!("slice method `{}`", method),
                span: expr.span,
            }),
        }
    }

    /// Spill a value to a stack slot and return a raw byte pointer to it.
    /// Pointer-shaped values are cast directly.
    fn spill_to_bytes(&mut self, cx: &mut FnCtx, value: Operand, ty: &Type) -> Operand {
        let raw_ty = Type::Pointer(Box::new(Type::U8));
        if ty.is_integer() || ty.is_float() || *ty == Type::Bool {
            let slot = cx.builder.temp(ty.clone());
            cx.builder.push(Statement::Assign {
                dest: slot,
                value,
            });
            let addr = cx.builder.temp(Type::Pointer(Box::new(ty.clone())));
            cx.builder.push(Statement::AddressOf {
                dest: addr,
                target: slot,
            });
            let raw = cx.builder.temp(raw_ty.clone());
            cx.builder.push(Statement::Cast {
                dest: raw,
                value: Operand::Local(addr),
                ty: raw_ty,
            });
            Operand::Local(raw)
        } else {
            let raw = cx.builder.temp(raw_ty.clone());
            cx.builder.push(Statement::Cast {
                dest: raw,
                value,
                ty: raw_ty,
            });
            Operand::Local(raw)
        }
    }

    pub(crate) fn lower_index_chain(
        &mut self,
        cx: &mut FnCtx,
        expr: &ast::Expr,
    ) -> Result<(Operand, Vec<Operand>), LowerError> {
        // a[i][j] nests leftward; collect indices outermost-last.
        let mut chain = Vec::new();
        let mut cursor = expr;
        while let ast::ExprKind::Index { target, index } = &cursor.kind {
            chain.push(index.as_ref());
            cursor = target;
        }
        let base = self.lower_expr(cx, cursor)?;
        let mut indices = Vec::with_capacity(chain.len());
        for index in chain.into_iter().rev() {
            indices.push(self.lower_expr(cx, index)?);
        }
        Ok((base, indices))
    }

    fn lower_args(
        &mut self,
        cx: &mut FnCtx,
        args: &[ast::Expr],
    ) -> Result<Vec<Operand>, LowerError> {
        args.iter().map(|arg| self.lower_expr(cx, arg)).collect()
    }

    fn call_dest(&self, cx: &mut FnCtx, expr: &ast::Expr) -> Option<LocalId> {
        match self.info.type_of(expr.id) {
            Some(Type::Void) | None => None,
            Some(ty) => Some(cx.builder.temp(ty.clone())),
        }
    }

    fn emit_call(
        &mut self,
        cx: &mut FnCtx,
        expr: &ast::Expr,
        name: Symbol,
        args: Vec<Operand>,
        type_args: Vec<Type>,
    ) -> Result<Operand, LowerError> {
        let dest = self.call_dest(cx, expr);
        cx.builder.push(Statement::Call {
            dest,
            callee: Callee::Name(name),
            args,
            type_args,
        });
        Ok(dest.map(Operand::Local).unwrap_or_else(Operand::nil))
    }

    /// The MIR type of an already-lowered operand.
    pub(crate) fn operand_type(&self, cx: &FnCtx, op: &Operand) -> Type {
        match op {
            Operand::Local(id) => cx.builder.function.locals[*id].ty.clone(),
            Operand::Const(c) => c.ty.clone(),
        }
    }
}

fn const_value(lit: &ast::Lit) -> ConstValue {
    match lit {
        ast::Lit::Int(v) => ConstValue::Int(*v),
        ast::Lit::Float(v) => ConstValue::Float(*v),
        ast::Lit::Bool(v) => ConstValue::Bool(*v),
        ast::Lit::Str(v) => ConstValue::Str(*v),
        ast::Lit::Nil => ConstValue::Nil,
    }
}

fn binop_intrinsic(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "__add__",
        BinOp::Sub => "__sub__",
        BinOp::Mul => "__mul__",
        BinOp::Div => "__div__",
        BinOp::Eq => "__eq__",
        BinOp::Ne => "__ne__",
        BinOp::Lt => "__lt__",
        BinOp::Le => "__le__",
        BinOp::Gt => "__gt__",
        BinOp::Ge => "__ge__",
        BinOp::And => "__and__",
        BinOp::Or => "__or__",
    }
}

fn binop_result_type(op: BinOp, lhs: &Type) -> Type {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => lhs.clone(),
        BinOp::Eq
        | BinOp::Ne
        | BinOp::Lt
        | BinOp::Le
        | BinOp::Gt
        | BinOp::Ge
        | BinOp::And
        | BinOp::Or => Type::Bool,
    }
}

fn println_entry(ty: &Type) -> &'static str {
    match ty {
        Type::I8 | Type::U8 => "runtime_println_i8",
        Type::I16 | Type::U16 | Type::I32 | Type::U32 => "runtime_println_i32",
        Type::Float => "runtime_println_double",
        Type::Bool => "runtime_println_bool",
        Type::Str => "runtime_println_string",
        _ => "runtime_println_i64",
    }
}
