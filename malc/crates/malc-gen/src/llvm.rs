//! Textual LLVM IR emission.
//!
//! Every local gets a stack slot by default; repeated writes to the same
//! local are slot updates, which is what lets pre-SSA MIR through. A
//! per-local "direct value" flag tracks locals the emitter itself
//! produced as SSA results (field loads, arithmetic, discriminants), and
//! assignment clears it. Phi statements, present only after SSA
//! construction, are emitted as LLVM `phi` instructions fed by pinned
//! value registers.

use indexmap::IndexMap;
use malc_mir::{
    BlockId, Callee, ConstValue, Constant, Function, LocalId, Module, Operand, SelectArm,
    SelectKind, Statement, Terminator,
};
use malc_sem::{EnumDef, Type};
use malc_util::{DiagnosticHandler, FxHashMap, FxHashSet, Symbol};

use crate::error::{CodeGenError, Result};
use crate::intrinsics::Intrinsic;
use crate::runtime;
use crate::types::{enum_payload_size, llvm_type, size_of};

/// Emission result: the IR text plus accumulated warnings.
pub struct EmittedModule {
    pub ir: String,
    pub diagnostics: DiagnosticHandler,
}

/// Emit textual LLVM IR for the host triple.
pub fn emit_module(module: &Module) -> Result<EmittedModule> {
    Emitter::new(module).emit()
}

/// Replace every character outside `[A-Za-z0-9_.]` with `_`; prepend `_`
/// when the first character is a digit; map empty to `_`.
pub fn sanitize(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(name.len() + 1);
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

struct Emitter<'m> {
    module: &'m Module,
    diags: DiagnosticHandler,
    /// struct name → ordered (field, declared type); position is the GEP
    /// index.
    struct_fields: FxHashMap<Symbol, Vec<(Symbol, Type)>>,
    /// String literal pool, deduplicated by content.
    strings: IndexMap<String, usize>,
}

/// Per-function emission state.
struct FnState {
    reg: usize,
    code: String,
    slots: FxHashMap<LocalId, String>,
    direct: FxHashMap<LocalId, String>,
    /// Locals feeding a phi; their definitions pin a predictable register
    /// name so phis can reference them across blocks.
    phi_sources: FxHashSet<LocalId>,
    select_count: usize,
    is_main: bool,
}

impl FnState {
    fn new(is_main: bool) -> Self {
        Self {
            reg: 0,
            code: String::new(),
            slots: FxHashMap::default(),
            direct: FxHashMap::default(),
            phi_sources: FxHashSet::default(),
            select_count: 0,
            is_main,
        }
    }

    fn fresh(&mut self) -> String {
        let reg = format!("%reg{}", self.reg);
        self.reg += 1;
        reg
    }

    fn line(&mut self, text: impl AsRef<str>) {
        self.code.push_str("  ");
        self.code.push_str(text.as_ref());
        self.code.push('\n');
    }

    fn label(&mut self, text: impl AsRef<str>) {
        self.code.push_str(text.as_ref());
        self.code.push_str(":\n");
    }
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module) -> Self {
        let mut struct_fields = FxHashMap::default();
        for (name, def) in &module.structs {
            if def.type_params.is_empty() {
                struct_fields.insert(
                    *name,
                    def.fields.iter().map(|f| (f.name, f.ty.clone())).collect(),
                );
            }
        }
        Self {
            module,
            diags: DiagnosticHandler::new(),
            struct_fields,
            strings: IndexMap::new(),
        }
    }

    fn emit(mut self) -> Result<EmittedModule> {
        let mut bodies = String::new();
        for func in &self.module.functions {
            // Generic templates are never emitted; the monomorphizer has
            // produced concrete copies.
            if func.is_generic() {
                continue;
            }
            bodies.push_str(&self.emit_function(func)?);
            bodies.push('\n');
        }

        let mut out = String::new();
        out.push_str(runtime::MODULE_HEADER);
        out.push('\n');
        out.push_str(runtime::TARGET);
        out.push('\n');
        out.push_str(runtime::OPAQUE_TYPES);
        out.push('\n');
        out.push_str(&self.emit_type_defs());
        out.push('\n');
        out.push_str(runtime::GLOBAL_CTOR);
        out.push('\n');
        out.push_str(runtime::DECLARATIONS);
        out.push('\n');
        for (content, id) in &self.strings {
            out.push_str(&string_global(*id, content));
        }
        if !self.strings.is_empty() {
            out.push('\n');
        }
        out.push_str(&bodies);

        Ok(EmittedModule {
            ir: out,
            diagnostics: self.diags,
        })
    }

    fn emit_type_defs(&mut self) -> String {
        let mut out = String::new();
        for (name, def) in &self.module.structs {
            if !def.type_params.is_empty() {
                continue;
            }
            let mut fields = Vec::with_capacity(def.fields.len());
            for field in &def.fields {
                match llvm_type(self.module, &field.ty) {
                    Ok(ty) if ty != "void" => fields.push(ty),
                    Ok(_) => fields.push("i8".to_string()),
                    Err(_) => {
                        self.diags.warn(format!(
                            "field `{}.{}` could not be sized, falling back to byte pointer",
                            name, field.name
                        ));
                        fields.push("i8*".to_string());
                    }
                }
            }
            out.push_str(&format!(
                "%struct.{} = type {{ {} }}\n",
                sanitize(name.as_str()),
                fields.join(", ")
            ));
        }
        for (name, def) in &self.module.enums {
            out.push_str(&format!(
                "%enum.{} = type {{ i32, [{} x i8] }}\n",
                sanitize(name.as_str()),
                enum_payload_size(self.module, def)
            ));
        }
        out
    }

    fn emit_function(&mut self, func: &Function) -> Result<String> {
        let mut st = FnState::new(func.name.as_str() == "main");

        for block in func.blocks.iter() {
            for stmt in &block.statements {
                if let Statement::Phi { sources, .. } = stmt {
                    for (_, op) in sources {
                        if let Operand::Local(local) = op {
                            st.phi_sources.insert(*local);
                        }
                    }
                }
            }
        }

        let ret = if st.is_main {
            "i32".to_string()
        } else {
            match &func.ret {
                Some(ty) => llvm_type(self.module, ty)?,
                None => "void".to_string(),
            }
        };

        let mut params = Vec::with_capacity(func.params.len());
        for &param in &func.params {
            let local = &func.locals[param];
            let name = local
                .name
                .map(|n| sanitize(n.as_str()))
                .unwrap_or_else(|| format!("arg{}", param.0));
            let ty = llvm_type(self.module, &local.ty)?;
            params.push((param, format!("%{}", name), ty));
        }
        let signature: Vec<String> = params
            .iter()
            .map(|(_, name, ty)| format!("{} {}", ty, name))
            .collect();

        let mut head = format!(
            "define {} @{}({}) {{\n",
            ret,
            sanitize(func.name.as_str()),
            signature.join(", ")
        );

        // Entry prologue: parameters are spilled so they are addressable,
        // then every mappable local gets a slot.
        st.label("entry");
        for (param, name, ty) in &params {
            let slot = st.fresh();
            st.line(format!("{} = alloca {}", slot, ty));
            st.line(format!("store {} {}, {}* {}", ty, name, ty, slot));
            st.slots.insert(*param, slot);
        }
        for (id, local) in func.locals.iter_enumerated() {
            if func.params.contains(&id) {
                continue;
            }
            match llvm_type(self.module, &local.ty) {
                Ok(ty) if ty != "void" => {
                    let slot = st.fresh();
                    st.line(format!("{} = alloca {}", slot, ty));
                    st.slots.insert(id, slot);
                }
                Ok(_) => {}
                Err(_) => self.diags.warn(format!(
                    "local _{} of `{}` has no mappable type, skipping slot",
                    id.0, func.name
                )),
            }
        }

        for (id, block) in func.blocks.iter_enumerated() {
            if id != func.entry {
                st.label(block_label(func, id));
            }
            for stmt in &block.statements {
                self.emit_statement(&mut st, func, stmt)?;
            }
            let terminator =
                block
                    .terminator
                    .as_ref()
                    .ok_or_else(|| CodeGenError::MissingTerminator {
                        function: func.name.to_string(),
                        block: id.0,
                    })?;
            self.emit_terminator(&mut st, func, terminator)?;
        }

        head.push_str(&st.code);
        head.push_str("}\n");
        Ok(head)
    }

    // ---- operands ------------------------------------------------------

    /// Resolve an operand to `(register-or-literal, llvm type)`.
    fn operand_value(
        &mut self,
        st: &mut FnState,
        func: &Function,
        op: &Operand,
    ) -> Result<(String, String)> {
        match op {
            Operand::Local(id) => {
                let ty = llvm_type(self.module, &func.locals[*id].ty)?;
                if let Some(reg) = st.direct.get(id) {
                    return Ok((reg.clone(), ty));
                }
                let slot = st.slots.get(id).cloned().ok_or_else(|| {
                    CodeGenError::Internal(format!(
                        "local _{} of `{}` has no storage",
                        id.0, func.name
                    ))
                })?;
                let reg = st.fresh();
                st.line(format!("{} = load {}, {}* {}", reg, ty, ty, slot));
                Ok((reg, ty))
            }
            Operand::Const(c) => self.const_value(st, c),
        }
    }

    fn const_value(&mut self, st: &mut FnState, c: &Constant) -> Result<(String, String)> {
        match &c.value {
            ConstValue::Int(v) => {
                let ty = llvm_type(self.module, &c.ty)?;
                match ty.as_str() {
                    // Common widths inline literally.
                    "i8" | "i32" | "i64" => Ok((v.to_string(), ty)),
                    _ => {
                        let reg = st.fresh();
                        st.line(format!("{} = add {} 0, {}", reg, ty, v));
                        Ok((reg, ty))
                    }
                }
            }
            ConstValue::Float(v) => {
                let reg = st.fresh();
                st.line(format!("{} = fadd double 0.0, {}", reg, float_literal(*v)));
                Ok((reg, "double".to_string()))
            }
            ConstValue::Bool(v) => Ok((if *v { "1" } else { "0" }.to_string(), "i1".to_string())),
            ConstValue::Str(s) => {
                let content = s.as_str().to_string();
                let next = self.strings.len();
                let id = *self.strings.entry(content.clone()).or_insert(next);
                let array_len = content.len() + 1;
                let gep = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds [{} x i8], [{} x i8]* @.str.{}, i64 0, i64 0",
                    gep, array_len, array_len, id
                ));
                let reg = st.fresh();
                st.line(format!(
                    "{} = call %String* @runtime_string_new(i8* {}, i64 {})",
                    reg,
                    gep,
                    content.len()
                ));
                Ok((reg, "%String*".to_string()))
            }
            ConstValue::Nil => {
                let ty = llvm_type(self.module, &c.ty)?;
                let ty = if ty == "void" { "i8*".to_string() } else { ty };
                let reg = st.fresh();
                st.line(format!("{} = inttoptr i64 0 to {}", reg, ty));
                Ok((reg, ty))
            }
        }
    }

    /// Record the value of `dest`. Direct values stay in registers; stored
    /// values go through the slot and clear the direct flag. Locals
    /// feeding a phi additionally pin a predictable register name.
    fn define_local(
        &mut self,
        st: &mut FnState,
        func: &Function,
        dest: LocalId,
        value: String,
        direct: bool,
    ) -> Result<()> {
        let ty = llvm_type(self.module, &func.locals[dest].ty)?;
        if ty == "void" {
            return Ok(());
        }
        let value = if st.phi_sources.contains(&dest) && !ty.starts_with('{') {
            let pin = format!("%val{}", dest.0);
            st.line(format!("{} = bitcast {} {} to {}", pin, ty, value, ty));
            pin
        } else {
            value
        };
        if direct {
            st.direct.insert(dest, value);
        } else {
            let slot = st.slots.get(&dest).cloned().ok_or_else(|| {
                CodeGenError::Internal(format!("local _{} has no slot", dest.0))
            })?;
            st.line(format!("store {} {}, {}* {}", ty, value, ty, slot));
            st.direct.remove(&dest);
        }
        Ok(())
    }

    /// Spill an operand to a fresh stack slot and return an `i8*` to it.
    fn spill_operand(
        &mut self,
        st: &mut FnState,
        func: &Function,
        op: &Operand,
    ) -> Result<String> {
        let (value, ty) = self.operand_value(st, func, op)?;
        let slot = st.fresh();
        st.line(format!("{} = alloca {}", slot, ty));
        st.line(format!("store {} {}, {}* {}", ty, value, ty, slot));
        if ty == "i8" {
            return Ok(slot);
        }
        let raw = st.fresh();
        st.line(format!("{} = bitcast {}* {} to i8*", raw, ty, slot));
        Ok(raw)
    }

    fn operand_mir_type(&self, func: &Function, op: &Operand) -> Type {
        match op {
            Operand::Local(id) => func.locals[*id].ty.clone(),
            Operand::Const(c) => c.ty.clone(),
        }
    }

    /// The enum definition behind an operand type, with the substitution
    /// carried by a generic instance.
    fn enum_for(&self, ty: &Type) -> Result<(&EnumDef, FxHashMap<Symbol, Type>)> {
        let name = ty
            .base_name()
            .ok_or_else(|| CodeGenError::TypeMapping(format!("`{}` is not an enum", ty)))?;
        let def = self
            .module
            .enums
            .get(&name)
            .ok_or_else(|| CodeGenError::UnknownEnum(name.to_string()))?;
        let subst = match ty {
            Type::Generic { args, .. } => def
                .type_params
                .iter()
                .copied()
                .zip(args.iter().cloned())
                .collect(),
            _ => FxHashMap::default(),
        };
        Ok((def, subst))
    }

    fn field_of(&self, ty: &Type, field: Symbol) -> Result<(usize, Type, String)> {
        let name = ty
            .base_name()
            .ok_or_else(|| CodeGenError::TypeMapping(format!("`{}` has no fields", ty)))?;
        let fields = self
            .struct_fields
            .get(&name)
            .ok_or_else(|| CodeGenError::FieldIndex {
                struct_name: name.to_string(),
                field: field.to_string(),
            })?;
        let (index, (_, field_ty)) = fields
            .iter()
            .enumerate()
            .find(|(_, (f, _))| *f == field)
            .ok_or_else(|| CodeGenError::FieldIndex {
                struct_name: name.to_string(),
                field: field.to_string(),
            })?;
        Ok((index, field_ty.clone(), sanitize(name.as_str())))
    }

    /// `getelementptr`-on-null size trick for a pointee type.
    fn emit_size_of_pointee(&mut self, st: &mut FnState, pointee: &str) -> String {
        let gep = st.fresh();
        st.line(format!(
            "{} = getelementptr {}, {}* null, i32 1",
            gep, pointee, pointee
        ));
        let size = st.fresh();
        st.line(format!("{} = ptrtoint {}* {} to i64", size, pointee, gep));
        size
    }

    // ---- statements ----------------------------------------------------

    fn emit_statement(
        &mut self,
        st: &mut FnState,
        func: &Function,
        stmt: &Statement,
    ) -> Result<()> {
        match stmt {
            Statement::Assign { dest, value } => {
                let (value, _) = self.operand_value(st, func, value)?;
                self.define_local(st, func, *dest, value, false)
            }
            Statement::Call {
                dest,
                callee,
                args,
                ..
            } => self.emit_call(st, func, *dest, callee, args),
            Statement::LoadField {
                dest,
                target,
                field,
            } => {
                let target_ty = self.operand_mir_type(func, target);
                let (index, field_ty, name) = self.field_of(&target_ty, *field)?;
                let (obj, _) = self.operand_value(st, func, target)?;
                let field_text = llvm_type(self.module, &field_ty)?;
                let ptr = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds %struct.{}, %struct.{}* {}, i32 0, i32 {}",
                    ptr, name, name, obj, index
                ));
                let value = st.fresh();
                st.line(format!(
                    "{} = load {}, {}* {}",
                    value, field_text, field_text, ptr
                ));
                self.define_local(st, func, *dest, value, true)
            }
            Statement::StoreField {
                target,
                field,
                value,
            } => {
                let target_ty = self.operand_mir_type(func, target);
                let (index, field_ty, name) = self.field_of(&target_ty, *field)?;
                let (obj, _) = self.operand_value(st, func, target)?;
                let (value, _) = self.operand_value(st, func, value)?;
                let field_text = llvm_type(self.module, &field_ty)?;
                let ptr = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds %struct.{}, %struct.{}* {}, i32 0, i32 {}",
                    ptr, name, name, obj, index
                ));
                st.line(format!(
                    "store {} {}, {}* {}",
                    field_text, value, field_text, ptr
                ));
                Ok(())
            }
            Statement::LoadIndex {
                dest,
                target,
                indices,
            } => {
                if indices.is_empty() {
                    return Err(CodeGenError::Internal("empty index list".to_string()));
                }
                let (mut current, _) = self.operand_value(st, func, target)?;
                for index in &indices[..indices.len() - 1] {
                    let (idx, _) = self.operand_value(st, func, index)?;
                    let elem = st.fresh();
                    st.line(format!(
                        "{} = call i8* @runtime_slice_get(%Slice* {}, i64 {})",
                        elem, current, idx
                    ));
                    let next = st.fresh();
                    st.line(format!("{} = bitcast i8* {} to %Slice*", next, elem));
                    current = next;
                }
                let last = indices
                    .last()
                    .ok_or_else(|| CodeGenError::Internal("empty index list".to_string()))?;
                let (idx, _) = self.operand_value(st, func, last)?;
                let elem = st.fresh();
                st.line(format!(
                    "{} = call i8* @runtime_slice_get(%Slice* {}, i64 {})",
                    elem, current, idx
                ));
                let elem_text = llvm_type(self.module, &func.locals[*dest].ty)?;
                let ptr = st.fresh();
                st.line(format!("{} = bitcast i8* {} to {}*", ptr, elem, elem_text));
                let value = st.fresh();
                st.line(format!(
                    "{} = load {}, {}* {}",
                    value, elem_text, elem_text, ptr
                ));
                self.define_local(st, func, *dest, value, true)
            }
            Statement::StoreIndex {
                target,
                indices,
                value,
            } => {
                if indices.is_empty() {
                    return Err(CodeGenError::Internal("empty index list".to_string()));
                }
                let (mut current, _) = self.operand_value(st, func, target)?;
                for index in &indices[..indices.len() - 1] {
                    let (idx, _) = self.operand_value(st, func, index)?;
                    let elem = st.fresh();
                    st.line(format!(
                        "{} = call i8* @runtime_slice_get(%Slice* {}, i64 {})",
                        elem, current, idx
                    ));
                    let next = st.fresh();
                    st.line(format!("{} = bitcast i8* {} to %Slice*", next, elem));
                    current = next;
                }
                let last = indices
                    .last()
                    .ok_or_else(|| CodeGenError::Internal("empty index list".to_string()))?;
                let (idx, _) = self.operand_value(st, func, last)?;
                let raw = self.spill_operand(st, func, value)?;
                st.line(format!(
                    "call void @runtime_slice_set(%Slice* {}, i64 {}, i8* {})",
                    current, idx, raw
                ));
                Ok(())
            }
            Statement::MakeStruct { dest, ty, fields } => {
                let name = ty.base_name().ok_or_else(|| {
                    CodeGenError::TypeMapping(format!("`{}` is not a struct", ty))
                })?;
                let text = sanitize(name.as_str());
                let size = self.emit_size_of_pointee(st, &format!("%struct.{}", text));
                let mem = st.fresh();
                st.line(format!("{} = call i8* @runtime_alloc(i64 {})", mem, size));
                let obj = st.fresh();
                st.line(format!(
                    "{} = bitcast i8* {} to %struct.{}*",
                    obj, mem, text
                ));
                for (field, op) in fields {
                    let (index, field_ty, _) = self.field_of(ty, *field)?;
                    let field_text = llvm_type(self.module, &field_ty)?;
                    let (value, _) = self.operand_value(st, func, op)?;
                    let ptr = st.fresh();
                    st.line(format!(
                        "{} = getelementptr inbounds %struct.{}, %struct.{}* {}, i32 0, i32 {}",
                        ptr, text, text, obj, index
                    ));
                    st.line(format!(
                        "store {} {}, {}* {}",
                        field_text, value, field_text, ptr
                    ));
                }
                self.define_local(st, func, *dest, obj, false)
            }
            Statement::MakeArray { dest, ty, elems } => {
                let elem_ty = match ty {
                    Type::Slice(elem) | Type::Array(elem, _) => (**elem).clone(),
                    _ => {
                        return Err(CodeGenError::TypeMapping(format!(
                            "`{}` is not an array type",
                            ty
                        )))
                    }
                };
                let elem_size = size_of(self.module, &elem_ty);
                let slice = st.fresh();
                st.line(format!(
                    "{} = call %Slice* @runtime_slice_new(i64 {}, i64 {}, i64 {})",
                    slice,
                    elem_size,
                    elems.len(),
                    elems.len()
                ));
                for (i, elem) in elems.iter().enumerate() {
                    let raw = self.spill_operand(st, func, elem)?;
                    st.line(format!(
                        "call void @runtime_slice_set(%Slice* {}, i64 {}, i8* {})",
                        slice, i, raw
                    ));
                }
                self.define_local(st, func, *dest, slice, false)
            }
            Statement::MakeTuple { dest, elems } => {
                if elems.is_empty() {
                    return Ok(());
                }
                let mut values = Vec::with_capacity(elems.len());
                for elem in elems {
                    values.push(self.operand_value(st, func, elem)?);
                }
                let agg: Vec<&str> = values.iter().map(|(_, ty)| ty.as_str()).collect();
                let agg = format!("{{ {} }}", agg.join(", "));
                let mut current = "undef".to_string();
                for (i, (value, ty)) in values.iter().enumerate() {
                    let next = st.fresh();
                    st.line(format!(
                        "{} = insertvalue {} {}, {} {}, {}",
                        next, agg, current, ty, value, i
                    ));
                    current = next;
                }
                self.define_local(st, func, *dest, current, false)
            }
            Statement::MakeEnum {
                dest,
                enum_name,
                variant_index,
                values,
                ..
            } => {
                let def = self
                    .module
                    .enums
                    .get(enum_name)
                    .ok_or_else(|| CodeGenError::UnknownEnum(enum_name.to_string()))?;
                let text = sanitize(enum_name.as_str());
                let payload_len = enum_payload_size(self.module, def);
                let size = self.emit_size_of_pointee(st, &format!("%enum.{}", text));
                let mem = st.fresh();
                st.line(format!("{} = call i8* @runtime_alloc(i64 {})", mem, size));
                let obj = st.fresh();
                st.line(format!("{} = bitcast i8* {} to %enum.{}*", obj, mem, text));
                let tag = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds %enum.{}, %enum.{}* {}, i32 0, i32 0",
                    tag, text, text, obj
                ));
                st.line(format!("store i32 {}, i32* {}", variant_index, tag));

                if !values.is_empty() {
                    let payload = st.fresh();
                    st.line(format!(
                        "{} = getelementptr inbounds %enum.{}, %enum.{}* {}, i32 0, i32 1",
                        payload, text, text, obj
                    ));
                    if values.len() == 1 {
                        let (value, ty) = self.operand_value(st, func, &values[0])?;
                        let slot = st.fresh();
                        st.line(format!(
                            "{} = bitcast [{} x i8]* {} to {}*",
                            slot, payload_len, payload, ty
                        ));
                        st.line(format!("store {} {}, {}* {}", ty, value, ty, slot));
                    } else {
                        let mut evaluated = Vec::with_capacity(values.len());
                        for value in values {
                            evaluated.push(self.operand_value(st, func, value)?);
                        }
                        let shape: Vec<&str> =
                            evaluated.iter().map(|(_, ty)| ty.as_str()).collect();
                        let shape = format!("{{ {} }}", shape.join(", "));
                        let slot = st.fresh();
                        st.line(format!(
                            "{} = bitcast [{} x i8]* {} to {}*",
                            slot, payload_len, payload, shape
                        ));
                        for (i, (value, ty)) in evaluated.iter().enumerate() {
                            let member = st.fresh();
                            st.line(format!(
                                "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
                                member, shape, shape, slot, i
                            ));
                            st.line(format!("store {} {}, {}* {}", ty, value, ty, member));
                        }
                    }
                }
                self.define_local(st, func, *dest, obj, false)
            }
            Statement::Discriminant { dest, target } => {
                let target_ty = self.operand_mir_type(func, target);
                let (def, _) = self.enum_for(&target_ty)?;
                let text = sanitize(def.name.as_str());
                let (obj, _) = self.operand_value(st, func, target)?;
                let ptr = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds %enum.{}, %enum.{}* {}, i32 0, i32 0",
                    ptr, text, text, obj
                ));
                let tag = st.fresh();
                st.line(format!("{} = load i32, i32* {}", tag, ptr));
                let dest_text = llvm_type(self.module, &func.locals[*dest].ty)?;
                let value = if dest_text == "i32" {
                    tag
                } else {
                    let wide = st.fresh();
                    st.line(format!("{} = zext i32 {} to {}", wide, tag, dest_text));
                    wide
                };
                self.define_local(st, func, *dest, value, true)
            }
            Statement::VariantPayload {
                dest,
                target,
                variant_index,
                member,
            } => {
                let target_ty = self.operand_mir_type(func, target);
                let (def, subst) = self.enum_for(&target_ty)?;
                let text = sanitize(def.name.as_str());
                let payload_len = enum_payload_size(self.module, def);
                let variant = def.variant(*variant_index).ok_or_else(|| {
                    CodeGenError::Internal(format!(
                        "enum `{}` has no variant {}",
                        def.name, variant_index
                    ))
                })?;
                let members: Vec<Type> =
                    variant.params.iter().map(|p| p.substitute(&subst)).collect();
                let member_ty = members.get(*member).cloned().ok_or_else(|| {
                    CodeGenError::Internal(format!(
                        "variant `{}` has no member {}",
                        variant.name, member
                    ))
                })?;
                let member_text = llvm_type(self.module, &member_ty)?;

                let (obj, _) = self.operand_value(st, func, target)?;
                let payload = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds %enum.{}, %enum.{}* {}, i32 0, i32 1",
                    payload, text, text, obj
                ));
                let value = if members.len() == 1 {
                    let slot = st.fresh();
                    st.line(format!(
                        "{} = bitcast [{} x i8]* {} to {}*",
                        slot, payload_len, payload, member_text
                    ));
                    let value = st.fresh();
                    st.line(format!(
                        "{} = load {}, {}* {}",
                        value, member_text, member_text, slot
                    ));
                    value
                } else {
                    let shape: Result<Vec<String>> = members
                        .iter()
                        .map(|m| llvm_type(self.module, m))
                        .collect();
                    let shape = format!("{{ {} }}", shape?.join(", "));
                    let slot = st.fresh();
                    st.line(format!(
                        "{} = bitcast [{} x i8]* {} to {}*",
                        slot, payload_len, payload, shape
                    ));
                    let ptr = st.fresh();
                    st.line(format!(
                        "{} = getelementptr inbounds {}, {}* {}, i32 0, i32 {}",
                        ptr, shape, shape, slot, member
                    ));
                    let value = st.fresh();
                    st.line(format!(
                        "{} = load {}, {}* {}",
                        value, member_text, member_text, ptr
                    ));
                    value
                };
                self.define_local(st, func, *dest, value, true)
            }
            Statement::MakeChannel { dest, ty, capacity } => {
                let elem = match ty {
                    Type::Channel(elem) => (**elem).clone(),
                    _ => {
                        return Err(CodeGenError::TypeMapping(format!(
                            "`{}` is not a channel type",
                            ty
                        )))
                    }
                };
                let elem_size = size_of(self.module, &elem);
                let (cap, _) = self.operand_value(st, func, capacity)?;
                let chan = st.fresh();
                st.line(format!(
                    "{} = call %Channel* @runtime_channel_new(i64 {}, i64 {})",
                    chan, elem_size, cap
                ));
                self.define_local(st, func, *dest, chan, false)
            }
            Statement::Send { channel, value } => {
                let (chan, _) = self.operand_value(st, func, channel)?;
                let raw = self.spill_operand(st, func, value)?;
                st.line(format!(
                    "call void @runtime_channel_send(%Channel* {}, i8* {})",
                    chan, raw
                ));
                Ok(())
            }
            Statement::Receive { dest, channel } => {
                let (chan, _) = self.operand_value(st, func, channel)?;
                let ty = llvm_type(self.module, &func.locals[*dest].ty)?;
                let slot = st.slots.get(dest).cloned().ok_or_else(|| {
                    CodeGenError::Internal(format!("receive target _{} has no slot", dest.0))
                })?;
                let raw = st.fresh();
                st.line(format!("{} = bitcast {}* {} to i8*", raw, ty, slot));
                st.line(format!(
                    "call void @runtime_channel_recv(%Channel* {}, i8* {})",
                    chan, raw
                ));
                st.direct.remove(dest);
                if st.phi_sources.contains(dest) {
                    let value = st.fresh();
                    st.line(format!("{} = load {}, {}* {}", value, ty, ty, slot));
                    let pin = format!("%val{}", dest.0);
                    st.line(format!("{} = bitcast {} {} to {}", pin, ty, value, ty));
                }
                Ok(())
            }
            Statement::SizeOf { dest, ty } => {
                let size = size_of(self.module, ty);
                let reg = st.fresh();
                st.line(format!("{} = add i64 0, {}", reg, size));
                self.define_local(st, func, *dest, reg, true)
            }
            Statement::AlignOf { dest, ty } => {
                let align = crate::types::align_of(self.module, ty);
                let reg = st.fresh();
                st.line(format!("{} = add i64 0, {}", reg, align));
                self.define_local(st, func, *dest, reg, true)
            }
            Statement::AddressOf { dest, target } => {
                let slot = st.slots.get(target).cloned().ok_or_else(|| {
                    CodeGenError::Internal(format!("local _{} has no slot to address", target.0))
                })?;
                self.define_local(st, func, *dest, slot, true)
            }
            Statement::Cast { dest, value, ty } => {
                let src_ty = self.operand_mir_type(func, value);
                let (value, from) = self.operand_value(st, func, value)?;
                let to = llvm_type(self.module, ty)?;
                if from == to {
                    return self.define_local(st, func, *dest, value, true);
                }
                let op = cast_instruction(&src_ty, &from, ty, &to)?;
                let reg = st.fresh();
                st.line(format!("{} = {} {} {} to {}", reg, op, from, value, to));
                self.define_local(st, func, *dest, reg, true)
            }
            Statement::MakeClosure { dest, func: target, env } => {
                let mem = st.fresh();
                st.line(format!("{} = call i8* @runtime_alloc(i64 16)", mem));
                let obj = st.fresh();
                st.line(format!("{} = bitcast i8* {} to %Closure*", obj, mem));
                let fn_slot = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds %Closure, %Closure* {}, i32 0, i32 0",
                    fn_slot, obj
                ));
                let fn_ref = self.thread_entry_ref(*target);
                st.line(format!(
                    "store i8* (i8*)* {}, i8* (i8*)** {}",
                    fn_ref, fn_slot
                ));
                let env_slot = st.fresh();
                st.line(format!(
                    "{} = getelementptr inbounds %Closure, %Closure* {}, i32 0, i32 1",
                    env_slot, obj
                ));
                let (env, env_ty) = self.operand_value(st, func, env)?;
                let env = if env_ty == "i8*" {
                    env
                } else {
                    let cast = st.fresh();
                    st.line(format!("{} = bitcast {} {} to i8*", cast, env_ty, env));
                    cast
                };
                st.line(format!("store i8* {}, i8** {}", env, env_slot));
                self.define_local(st, func, *dest, obj, false)
            }
            Statement::Spawn { func: target, args, .. } => {
                if !args.is_empty() {
                    return Err(CodeGenError::Internal(
                        "spawn with arguments is not supported; the lowerer wraps spawned work"
                            .to_string(),
                    ));
                }
                let tid = st.fresh();
                st.line(format!("{} = alloca i64", tid));
                let fn_ref = self.thread_entry_ref(*target);
                let ret = st.fresh();
                st.line(format!(
                    "{} = call i32 @pthread_create(i64* {}, %struct.pthread_attr_t* null, i8* (i8*)* {}, i8* null)",
                    ret, tid, fn_ref
                ));
                Ok(())
            }
            Statement::Yield => {
                st.line("call void @runtime_legion_yield()");
                Ok(())
            }
            Statement::Phi { dest, sources } => {
                let ty = llvm_type(self.module, &func.locals[*dest].ty)?;
                let mut incoming = Vec::with_capacity(sources.len());
                for (block, op) in sources {
                    let value = self.phi_operand(op)?;
                    incoming.push(format!("[ {}, %{} ]", value, block_label(func, *block)));
                }
                let reg = st.fresh();
                st.line(format!("{} = phi {} {}", reg, ty, incoming.join(", ")));
                self.define_local(st, func, *dest, reg, true)
            }
        }
    }

    /// Phi operands cannot carry instructions; locals reference their
    /// pinned registers and constants inline.
    fn phi_operand(&mut self, op: &Operand) -> Result<String> {
        Ok(match op {
            Operand::Local(id) => format!("%val{}", id.0),
            Operand::Const(c) => match &c.value {
                ConstValue::Int(v) => v.to_string(),
                ConstValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
                ConstValue::Float(v) => float_literal(*v),
                ConstValue::Nil => "null".to_string(),
                ConstValue::Str(_) => {
                    self.diags
                        .warn("string literal reaching a phi collapses to null");
                    "null".to_string()
                }
            },
        })
    }

    fn emit_call(
        &mut self,
        st: &mut FnState,
        func: &Function,
        dest: Option<LocalId>,
        callee: &Callee,
        args: &[Operand],
    ) -> Result<()> {
        match callee {
            Callee::Name(name) => {
                if let Some(intrinsic) = Intrinsic::lookup(name.as_str()) {
                    return self.emit_intrinsic(st, func, dest, intrinsic, args);
                }
                let mut arg_text = Vec::with_capacity(args.len());
                for arg in args {
                    let (value, ty) = self.operand_value(st, func, arg)?;
                    arg_text.push(format!("{} {}", ty, value));
                }
                let ret = match dest {
                    Some(dest) => llvm_type(self.module, &func.locals[dest].ty)?,
                    None => "void".to_string(),
                };
                let call = format!(
                    "call {} @{}({})",
                    ret,
                    sanitize(name.as_str()),
                    arg_text.join(", ")
                );
                match dest {
                    Some(dest) if ret != "void" => {
                        let reg = st.fresh();
                        st.line(format!("{} = {}", reg, call));
                        self.define_local(st, func, dest, reg, false)
                    }
                    _ => {
                        st.line(call);
                        Ok(())
                    }
                }
            }
            Callee::Value(op) => self.emit_closure_call(st, func, dest, op),
        }
    }

    fn emit_intrinsic(
        &mut self,
        st: &mut FnState,
        func: &Function,
        dest: Option<LocalId>,
        intrinsic: Intrinsic,
        args: &[Operand],
    ) -> Result<()> {
        let first = args
            .first()
            .ok_or_else(|| CodeGenError::Internal("operator call without operands".into()))?;
        // Comparisons infer the operand type from their first argument,
        // not the bool result.
        let operand_ty = self.operand_mir_type(func, first);
        let is_float = operand_ty.is_float();

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.operand_value(st, func, arg)?);
        }

        let reg = st.fresh();
        if intrinsic.is_unary() {
            let (x, ty) = &values[0];
            match intrinsic {
                Intrinsic::Neg if is_float => st.line(format!("{} = fneg double {}", reg, x)),
                Intrinsic::Neg => st.line(format!("{} = sub {} 0, {}", reg, ty, x)),
                Intrinsic::Not => st.line(format!("{} = xor i1 {}, 1", reg, x)),
                _ => {
                    return Err(CodeGenError::Internal(format!(
                        "operator {:?} is not unary",
                        intrinsic
                    )))
                }
            }
        } else {
            let (lhs, ty) = values[0].clone();
            let (rhs, _) = values
                .get(1)
                .cloned()
                .ok_or_else(|| CodeGenError::Internal("binary operator with one operand".into()))?;
            let op = if is_float {
                intrinsic.float_op().ok_or_else(|| {
                    CodeGenError::Internal(format!(
                        "operator {:?} has no float form",
                        intrinsic
                    ))
                })?
            } else {
                intrinsic.int_op()
            };
            st.line(format!("{} = {} {} {}, {}", reg, op, ty, lhs, rhs));
        }

        if let Some(dest) = dest {
            self.define_local(st, func, dest, reg, true)?;
        }
        Ok(())
    }

    /// Indirect call through a `%Closure*` value: load the entry point and
    /// environment, then call `entry(env)`.
    fn emit_closure_call(
        &mut self,
        st: &mut FnState,
        func: &Function,
        dest: Option<LocalId>,
        callee: &Operand,
    ) -> Result<()> {
        let (closure, _) = self.operand_value(st, func, callee)?;
        let fn_slot = st.fresh();
        st.line(format!(
            "{} = getelementptr inbounds %Closure, %Closure* {}, i32 0, i32 0",
            fn_slot, closure
        ));
        let entry = st.fresh();
        st.line(format!(
            "{} = load i8* (i8*)*, i8* (i8*)** {}",
            entry, fn_slot
        ));
        let env_slot = st.fresh();
        st.line(format!(
            "{} = getelementptr inbounds %Closure, %Closure* {}, i32 0, i32 1",
            env_slot, closure
        ));
        let env = st.fresh();
        st.line(format!("{} = load i8*, i8** {}", env, env_slot));
        let result = st.fresh();
        st.line(format!("{} = call i8* {}(i8* {})", result, entry, env));

        if let Some(dest) = dest {
            let dest_ty = llvm_type(self.module, &func.locals[dest].ty)?;
            if dest_ty.ends_with('*') {
                let cast = st.fresh();
                st.line(format!("{} = bitcast i8* {} to {}", cast, result, dest_ty));
                self.define_local(st, func, dest, cast, false)?;
            } else if dest_ty.starts_with('i') {
                let cast = st.fresh();
                st.line(format!("{} = ptrtoint i8* {} to {}", cast, result, dest_ty));
                self.define_local(st, func, dest, cast, false)?;
            } else {
                self.diags.warn(format!(
                    "closure call result of type {} is dropped",
                    dest_ty
                ));
            }
        }
        Ok(())
    }

    /// Reference to a function as a thread entry point `i8* (i8*)*`,
    /// bitcasting from its real signature when it is known.
    fn thread_entry_ref(&self, name: Symbol) -> String {
        let text = sanitize(name.as_str());
        match self.module.function(name) {
            Some(func) => {
                let ret = func
                    .ret
                    .as_ref()
                    .and_then(|ty| llvm_type(self.module, ty).ok())
                    .unwrap_or_else(|| "void".to_string());
                let params: Vec<String> = func
                    .params
                    .iter()
                    .filter_map(|&p| llvm_type(self.module, &func.locals[p].ty).ok())
                    .collect();
                let signature = format!("{} ({})", ret, params.join(", "));
                if signature == "i8* (i8*)" {
                    format!("@{}", text)
                } else {
                    format!("bitcast ({}* @{} to i8* (i8*)*)", signature, text)
                }
            }
            None => format!("@{}", text),
        }
    }

    // ---- terminators ---------------------------------------------------

    fn emit_terminator(
        &mut self,
        st: &mut FnState,
        func: &Function,
        terminator: &Terminator,
    ) -> Result<()> {
        match terminator {
            Terminator::Return(None) => {
                if st.is_main {
                    st.line("ret i32 0");
                } else {
                    st.line("ret void");
                }
                Ok(())
            }
            Terminator::Return(Some(op)) => {
                let (value, ty) = self.operand_value(st, func, op)?;
                if st.is_main && ty != "i32" {
                    let narrowed = st.fresh();
                    st.line(format!("{} = trunc {} {} to i32", narrowed, ty, value));
                    st.line(format!("ret i32 {}", narrowed));
                } else {
                    st.line(format!("ret {} {}", ty, value));
                }
                Ok(())
            }
            Terminator::Goto(target) => {
                st.line(format!("br label %{}", block_label(func, *target)));
                Ok(())
            }
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => {
                let (value, _) = self.operand_value(st, func, cond)?;
                st.line(format!(
                    "br i1 {}, label %{}, label %{}",
                    value,
                    block_label(func, *then_block),
                    block_label(func, *else_block)
                ));
                Ok(())
            }
            Terminator::Select { cases } => self.emit_select(st, func, cases),
        }
    }

    /// `select` compiles to a polling loop: each case tries its channel
    /// operation and branches to its body on success; a full miss yields,
    /// sleeps, and retries.
    fn emit_select(&mut self, st: &mut FnState, func: &Function, cases: &[SelectArm]) -> Result<()> {
        let sel = st.select_count;
        st.select_count += 1;
        let head = format!("sel{}.head", sel);
        let wait = format!("sel{}.wait", sel);

        st.line(format!("br label %{}", head));
        st.label(&head);

        for (i, case) in cases.iter().enumerate() {
            if i > 0 {
                st.label(format!("sel{}.c{}", sel, i));
            }
            let next = if i + 1 == cases.len() {
                wait.clone()
            } else {
                format!("sel{}.c{}", sel, i + 1)
            };
            let target = block_label(func, case.target);
            match &case.kind {
                SelectKind::Send { channel, value } => {
                    let (chan, _) = self.operand_value(st, func, channel)?;
                    let raw = self.spill_operand(st, func, value)?;
                    let flag = st.fresh();
                    st.line(format!(
                        "{} = call i8 @runtime_channel_try_send(%Channel* {}, i8* {})",
                        flag, chan, raw
                    ));
                    let cond = st.fresh();
                    st.line(format!("{} = trunc i8 {} to i1", cond, flag));
                    st.line(format!(
                        "br i1 {}, label %{}, label %{}",
                        cond, target, next
                    ));
                }
                SelectKind::Recv { dest, channel } => {
                    let (chan, _) = self.operand_value(st, func, channel)?;
                    let out = match dest {
                        Some(dest) => {
                            let ty = llvm_type(self.module, &func.locals[*dest].ty)?;
                            let slot = st.slots.get(dest).cloned().ok_or_else(|| {
                                CodeGenError::MalformedSelect(format!(
                                    "receive target _{} has no slot",
                                    dest.0
                                ))
                            })?;
                            st.direct.remove(dest);
                            let raw = st.fresh();
                            st.line(format!("{} = bitcast {}* {} to i8*", raw, ty, slot));
                            raw
                        }
                        None => {
                            let scratch = st.fresh();
                            st.line(format!("{} = alloca i64", scratch));
                            let raw = st.fresh();
                            st.line(format!("{} = bitcast i64* {} to i8*", raw, scratch));
                            raw
                        }
                    };
                    let flag = st.fresh();
                    st.line(format!(
                        "{} = call i8 @runtime_channel_try_recv(%Channel* {}, i8* {})",
                        flag, chan, out
                    ));
                    let cond = st.fresh();
                    st.line(format!("{} = trunc i8 {} to i1", cond, flag));
                    st.line(format!(
                        "br i1 {}, label %{}, label %{}",
                        cond, target, next
                    ));
                }
                SelectKind::Default => {
                    st.line(format!("br label %{}", target));
                }
            }
        }

        st.label(&wait);
        st.line("call void @runtime_legion_yield()");
        st.line("call void @runtime_nanosleep(i64 100000)");
        st.line(format!("br label %{}", head));
        Ok(())
    }
}

fn block_label(func: &Function, block: BlockId) -> String {
    if block == func.entry {
        "entry".to_string()
    } else {
        format!("bb{}", block.0)
    }
}

/// LLVM spelling of a float constant. Whole numbers read naturally; the
/// rest use the exact bit pattern.
fn float_literal(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("0x{:016X}", v.to_bits())
    }
}

fn string_global(id: usize, content: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    for &byte in content.as_bytes() {
        match byte {
            b' '..=b'~' if byte != b'"' && byte != b'\\' => escaped.push(byte as char),
            _ => escaped.push_str(&format!("\\{:02X}", byte)),
        }
    }
    format!(
        "@.str.{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"\n",
        id,
        content.len() + 1,
        escaped
    )
}

fn cast_instruction(src: &Type, from: &str, dst: &Type, to: &str) -> Result<&'static str> {
    let from_ptr = from.ends_with('*');
    let to_ptr = to.ends_with('*');
    Ok(match (from_ptr, to_ptr) {
        (true, true) => "bitcast",
        (true, false) => "ptrtoint",
        (false, true) => "inttoptr",
        (false, false) => {
            if from == "double" && to == "double" {
                "bitcast"
            } else if from == "double" {
                if is_unsigned(dst) {
                    "fptoui"
                } else {
                    "fptosi"
                }
            } else if to == "double" {
                if is_unsigned(src) {
                    "uitofp"
                } else {
                    "sitofp"
                }
            } else {
                let from_bits = int_width(from).ok_or_else(|| {
                    CodeGenError::TypeMapping(format!("cannot cast from {}", from))
                })?;
                let to_bits = int_width(to).ok_or_else(|| {
                    CodeGenError::TypeMapping(format!("cannot cast to {}", to))
                })?;
                if from_bits > to_bits {
                    "trunc"
                } else if is_unsigned(src) || from_bits == 1 {
                    "zext"
                } else {
                    "sext"
                }
            }
        }
    })
}

fn is_unsigned(ty: &Type) -> bool {
    matches!(
        ty,
        Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::U128 | Type::Usize | Type::Bool
    )
}

fn int_width(ty: &str) -> Option<u32> {
    match ty {
        "i1" => Some(1),
        "i8" => Some(8),
        "i16" => Some(16),
        "i32" => Some(32),
        "i64" => Some(64),
        "i128" => Some(128),
        _ => None,
    }
}
