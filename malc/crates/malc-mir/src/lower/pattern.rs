//! Pattern-match compilation.
//!
//! `match subject { pat_i => body_i, … }` lowers to a chain of test
//! blocks ending at a merge block. Fail edges from any test target the
//! next arm's check block; the last arm falls through to a synthesized
//! unreachable block. Variable bindings are prepended to the success
//! block so later arms never observe them.

use malc_sem::ast;
use malc_sem::Type;
use malc_util::{FxHashMap, Symbol};

use crate::error::LowerError;
use crate::lower::{literal_type, FnCtx, Lowerer};
use crate::mir::{
    BlockId, Callee, ConstValue, Constant, Operand, Statement, Terminator,
};

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_match(
        &mut self,
        cx: &mut FnCtx,
        subject: &ast::Expr,
        arms: &[ast::Arm],
        result: Option<crate::mir::LocalId>,
    ) -> Result<(), LowerError> {
        let subject_op = self.lower_expr(cx, subject)?;
        let subject_ty = self.expr_type(subject)?;

        let merge = cx.builder.new_block();
        // Fail target of the last arm; never reached when the match is
        // exhaustive.
        let unreachable = cx.builder.new_block();
        cx.builder
            .terminate_block(unreachable, Terminator::Goto(merge));

        let mut check = cx.builder.new_block();
        cx.builder.terminate(Terminator::Goto(check));

        for (i, arm) in arms.iter().enumerate() {
            let body_block = cx.builder.new_block();
            let fail = if i + 1 == arms.len() {
                unreachable
            } else {
                cx.builder.new_block()
            };

            cx.push_scope();
            cx.builder.switch_to(check);
            self.compile_pattern(cx, &arm.pat, &subject_op, &subject_ty, body_block, fail)?;

            cx.builder.switch_to(body_block);
            let tail = self.lower_block(cx, &arm.body)?;
            if let (Some(dest), Some(value)) = (result, tail) {
                cx.builder.push(Statement::Assign { dest, value });
            }
            cx.builder.terminate(Terminator::Goto(merge));
            cx.pop_scope();

            check = fail;
        }

        cx.builder.switch_to(merge);
        Ok(())
    }

    /// Compile one pattern against `subject`. Emits tests into the current
    /// block and seals it with a branch to `success`/`fail` (or an
    /// unconditional goto for irrefutable patterns). Sub-patterns that
    /// branch get fresh intermediate blocks, so a partial match can never
    /// claim full success.
    fn compile_pattern(
        &mut self,
        cx: &mut FnCtx,
        pattern: &ast::Pattern,
        subject: &Operand,
        subject_ty: &Type,
        success: BlockId,
        fail: BlockId,
    ) -> Result<(), LowerError> {
        match pattern {
            ast::Pattern::Wildcard { .. } => {
                cx.builder.terminate(Terminator::Goto(success));
                Ok(())
            }
            ast::Pattern::Binding { name, span } => {
                let local = cx.builder.add_local(Some(*name), subject_ty.clone(), *span);
                cx.bind(*name, local);
                cx.builder.push_front(
                    success,
                    Statement::Assign {
                        dest: local,
                        value: subject.clone(),
                    },
                );
                cx.builder.terminate(Terminator::Goto(success));
                Ok(())
            }
            ast::Pattern::Literal { value, ty, .. } => {
                let lit_ty = if *ty == Type::Nil {
                    literal_type(value)
                } else {
                    ty.clone()
                };
                let pattern_value = Operand::Const(Constant {
                    ty: lit_ty,
                    value: const_of(value),
                });
                self.emit_eq_branch(cx, subject.clone(), pattern_value, success, fail);
                Ok(())
            }
            ast::Pattern::Tuple { elems, .. } => {
                let elem_tys: Vec<Type> = match subject_ty {
                    Type::Tuple(tys) => tys.clone(),
                    _ => vec![Type::Nil; elems.len()],
                };
                self.compile_element_chain(
                    cx,
                    elems,
                    &elem_tys,
                    success,
                    fail,
                    |_, cx, index, ty| {
                        let dest = cx.builder.temp(ty.clone());
                        cx.builder.push(Statement::LoadIndex {
                            dest,
                            target: subject.clone(),
                            indices: vec![Operand::int(index as i64, Type::Int)],
                        });
                        Ok(dest)
                    },
                )
            }
            ast::Pattern::Struct { name, fields, span } => {
                let def = self
                    .module
                    .structs
                    .get(name)
                    .cloned()
                    .ok_or_else(|| LowerError::Unbound {
                        name: name.to_string(),
                        span: *span,
                    })?;

                let mut sub_patterns = Vec::with_capacity(fields.len());
                let mut field_tys = Vec::with_capacity(fields.len());
                let mut field_names = Vec::with_capacity(fields.len());
                for (field, pat) in fields {
                    let (_, field_def) =
                        def.field(*field).ok_or_else(|| LowerError::UnknownField {
                            struct_name: name.to_string(),
                            field: field.to_string(),
                            span: *span,
                        })?;
                    sub_patterns.push(pat.clone());
                    field_tys.push(field_def.ty.clone());
                    field_names.push(*field);
                }

                self.compile_element_chain(
                    cx,
                    &sub_patterns,
                    &field_tys,
                    success,
                    fail,
                    |_, cx, index, ty| {
                        let dest = cx.builder.temp(ty.clone());
                        cx.builder.push(Statement::LoadField {
                            dest,
                            target: subject.clone(),
                            field: field_names[index],
                        });
                        Ok(dest)
                    },
                )
            }
            ast::Pattern::Enum {
                enum_name,
                variant,
                args,
                span,
            } => {
                let enum_name = (*enum_name)
                    .or_else(|| subject_ty.base_name())
                    .ok_or_else(|| LowerError::Unbound {
                        name: variant.to_string(),
                        span: *span,
                    })?;
                let def = self
                    .module
                    .enums
                    .get(&enum_name)
                    .cloned()
                    .ok_or_else(|| LowerError::Unbound {
                        name: enum_name.to_string(),
                        span: *span,
                    })?;
                let index =
                    def.variant_index(*variant)
                        .ok_or_else(|| LowerError::UnknownVariant {
                            enum_name: enum_name.to_string(),
                            variant: variant.to_string(),
                            span: *span,
                        })?;
                let variant_def = &def.variants[index];
                if variant_def.params.len() != args.len() {
                    return Err(LowerError::Unsupported {
                        what: format!(
                            "pattern for `{}::{}` binds {} values, variant carries {}",
                            enum_name,
                            variant,
                            args.len(),
                            variant_def.params.len()
                        ),
                        span: *span,
                    });
                }

                // Payload types seen through the subject's instantiation.
                let subst: FxHashMap<Symbol, Type> = match subject_ty {
                    Type::Generic { args: ty_args, .. } => def
                        .type_params
                        .iter()
                        .copied()
                        .zip(ty_args.iter().cloned())
                        .collect(),
                    _ => FxHashMap::default(),
                };
                let member_tys: Vec<Type> = variant_def
                    .params
                    .iter()
                    .map(|ty| ty.substitute(&subst))
                    .collect();

                let discr = cx.builder.temp(Type::Int);
                cx.builder.push(Statement::Discriminant {
                    dest: discr,
                    target: subject.clone(),
                });
                let payload_block = cx.builder.new_block();
                self.emit_eq_branch(
                    cx,
                    Operand::Local(discr),
                    Operand::int(index as i64, Type::Int),
                    payload_block,
                    fail,
                );

                cx.builder.switch_to(payload_block);
                self.compile_element_chain(
                    cx,
                    args,
                    &member_tys,
                    success,
                    fail,
                    |_, cx, member, ty| {
                        let dest = cx.builder.temp(ty.clone());
                        cx.builder.push(Statement::VariantPayload {
                            dest,
                            target: subject.clone(),
                            variant_index: index,
                            member,
                        });
                        Ok(dest)
                    },
                )
            }
        }
    }

    /// Test a sequence of sub-patterns against extracted members, chaining
    /// through fresh intermediate blocks.
    fn compile_element_chain(
        &mut self,
        cx: &mut FnCtx,
        patterns: &[ast::Pattern],
        member_tys: &[Type],
        success: BlockId,
        fail: BlockId,
        mut extract: impl FnMut(
            &mut Self,
            &mut FnCtx,
            usize,
            &Type,
        ) -> Result<crate::mir::LocalId, LowerError>,
    ) -> Result<(), LowerError> {
        if patterns.is_empty() {
            cx.builder.terminate(Terminator::Goto(success));
            return Ok(());
        }

        for (i, pattern) in patterns.iter().enumerate() {
            let ty = member_tys.get(i).cloned().unwrap_or(Type::Nil);
            let member = extract(self, cx, i, &ty)?;
            let last = i + 1 == patterns.len();
            let next = if last { success } else { cx.builder.new_block() };
            self.compile_pattern(cx, pattern, &Operand::Local(member), &ty, next, fail)?;
            if !last {
                cx.builder.switch_to(next);
            }
        }
        Ok(())
    }

    fn emit_eq_branch(
        &mut self,
        cx: &mut FnCtx,
        lhs: Operand,
        rhs: Operand,
        then_block: BlockId,
        else_block: BlockId,
    ) {
        let cond = cx.builder.temp(Type::Bool);
        cx.builder.push(Statement::Call {
            dest: Some(cond),
            callee: Callee::Name(Symbol::intern("__eq__")),
            args: vec![lhs, rhs],
            type_args: vec![],
        });
        cx.builder.terminate(Terminator::Branch {
            cond: Operand::Local(cond),
            then_block,
            else_block,
        });
    }
}

fn const_of(lit: &ast::Lit) -> ConstValue {
    match lit {
        ast::Lit::Int(v) => ConstValue::Int(*v),
        ast::Lit::Float(v) => ConstValue::Float(*v),
        ast::Lit::Bool(v) => ConstValue::Bool(*v),
        ast::Lit::Str(v) => ConstValue::Str(*v),
        ast::Lit::Nil => ConstValue::Nil,
    }
}
