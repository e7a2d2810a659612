//! Human-readable MIR dump, used by the driver's `--emit-mir`-style
//! output and by tests diagnosing lowering results.

use std::fmt::Write;

use crate::mir::{
    Callee, ConstValue, Function, Module, Operand, SelectKind, Statement, Terminator,
};

pub fn print_module(module: &Module) -> String {
    let mut out = String::new();

    for (name, def) in &module.structs {
        let fields: Vec<String> = def
            .fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.ty))
            .collect();
        let _ = writeln!(out, "struct {} {{ {} }}", name, fields.join(", "));
    }
    for (name, def) in &module.enums {
        let variants: Vec<String> = def.variants.iter().map(|v| v.name.to_string()).collect();
        let _ = writeln!(out, "enum {} {{ {} }}", name, variants.join(", "));
    }
    if !module.structs.is_empty() || !module.enums.is_empty() {
        out.push('\n');
    }

    for func in &module.functions {
        print_function(&mut out, func);
        out.push('\n');
    }
    out
}

fn print_function(out: &mut String, func: &Function) {
    let params: Vec<String> = func
        .params
        .iter()
        .map(|&p| format!("_{}: {}", p.0, func.locals[p].ty))
        .collect();
    let ret = func
        .ret
        .as_ref()
        .map(|ty| format!(" -> {}", ty))
        .unwrap_or_default();
    let generics = if func.type_params.is_empty() {
        String::new()
    } else {
        let names: Vec<String> = func.type_params.iter().map(|p| p.name.to_string()).collect();
        format!("[{}]", names.join(", "))
    };
    let _ = writeln!(out, "fn {}{}({}){} {{", func.name, generics, params.join(", "), ret);

    for (id, block) in func.blocks.iter_enumerated() {
        let _ = writeln!(out, "  bb{}:", id.0);
        for stmt in &block.statements {
            let _ = writeln!(out, "    {}", fmt_statement(stmt));
        }
        match &block.terminator {
            Some(term) => {
                let _ = writeln!(out, "    {}", fmt_terminator(term));
            }
            None => {
                let _ = writeln!(out, "    <no terminator>");
            }
        }
    }
    let _ = writeln!(out, "}}");
}

fn fmt_operand(op: &Operand) -> String {
    match op {
        Operand::Local(id) => format!("_{}", id.0),
        Operand::Const(c) => match &c.value {
            ConstValue::Int(v) => format!("const {}{}", v, c.ty),
            ConstValue::Float(v) => format!("const {}", v),
            ConstValue::Bool(v) => format!("const {}", v),
            ConstValue::Str(v) => format!("const {:?}", v.as_str()),
            ConstValue::Nil => "const nil".to_string(),
        },
    }
}

fn fmt_operands(ops: &[Operand]) -> String {
    ops.iter().map(fmt_operand).collect::<Vec<_>>().join(", ")
}

fn fmt_statement(stmt: &Statement) -> String {
    match stmt {
        Statement::Assign { dest, value } => format!("_{} = {}", dest.0, fmt_operand(value)),
        Statement::Call {
            dest,
            callee,
            args,
            type_args,
        } => {
            let callee = match callee {
                Callee::Name(name) => name.to_string(),
                Callee::Value(op) => format!("({})", fmt_operand(op)),
            };
            let generics = if type_args.is_empty() {
                String::new()
            } else {
                let args: Vec<String> = type_args.iter().map(|t| t.to_string()).collect();
                format!("[{}]", args.join(", "))
            };
            match dest {
                Some(dest) => {
                    format!("_{} = call {}{}({})", dest.0, callee, generics, fmt_operands(args))
                }
                None => format!("call {}{}({})", callee, generics, fmt_operands(args)),
            }
        }
        Statement::LoadField {
            dest,
            target,
            field,
        } => format!("_{} = {}.{}", dest.0, fmt_operand(target), field),
        Statement::StoreField {
            target,
            field,
            value,
        } => format!("{}.{} = {}", fmt_operand(target), field, fmt_operand(value)),
        Statement::LoadIndex {
            dest,
            target,
            indices,
        } => format!("_{} = {}[{}]", dest.0, fmt_operand(target), fmt_operands(indices)),
        Statement::StoreIndex {
            target,
            indices,
            value,
        } => format!(
            "{}[{}] = {}",
            fmt_operand(target),
            fmt_operands(indices),
            fmt_operand(value)
        ),
        Statement::MakeStruct { dest, ty, fields } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(name, op)| format!("{}: {}", name, fmt_operand(op)))
                .collect();
            format!("_{} = {} {{ {} }}", dest.0, ty, fields.join(", "))
        }
        Statement::MakeArray { dest, elems, .. } => {
            format!("_{} = [{}]", dest.0, fmt_operands(elems))
        }
        Statement::MakeTuple { dest, elems } => {
            format!("_{} = ({})", dest.0, fmt_operands(elems))
        }
        Statement::MakeEnum {
            dest,
            enum_name,
            variant,
            variant_index,
            values,
        } => format!(
            "_{} = {}::{}#{}({})",
            dest.0,
            enum_name,
            variant,
            variant_index,
            fmt_operands(values)
        ),
        Statement::Discriminant { dest, target } => {
            format!("_{} = discriminant({})", dest.0, fmt_operand(target))
        }
        Statement::VariantPayload {
            dest,
            target,
            variant_index,
            member,
        } => format!(
            "_{} = payload({}, variant {}, member {})",
            dest.0,
            fmt_operand(target),
            variant_index,
            member
        ),
        Statement::MakeChannel { dest, ty, capacity } => {
            format!("_{} = make({}, {})", dest.0, ty, fmt_operand(capacity))
        }
        Statement::Send { channel, value } => {
            format!("send({}, {})", fmt_operand(channel), fmt_operand(value))
        }
        Statement::Receive { dest, channel } => {
            format!("_{} = recv({})", dest.0, fmt_operand(channel))
        }
        Statement::SizeOf { dest, ty } => format!("_{} = sizeof({})", dest.0, ty),
        Statement::AlignOf { dest, ty } => format!("_{} = alignof({})", dest.0, ty),
        Statement::AddressOf { dest, target } => format!("_{} = &_{}", dest.0, target.0),
        Statement::Cast { dest, value, ty } => {
            format!("_{} = {} as {}", dest.0, fmt_operand(value), ty)
        }
        Statement::MakeClosure { dest, func, env } => {
            format!("_{} = closure {}({})", dest.0, func, fmt_operand(env))
        }
        Statement::Spawn { func, args, .. } => format!("spawn {}({})", func, fmt_operands(args)),
        Statement::Yield => "yield".to_string(),
        Statement::Phi { dest, sources } => {
            let sources: Vec<String> = sources
                .iter()
                .map(|(block, op)| format!("bb{}: {}", block.0, fmt_operand(op)))
                .collect();
            format!("_{} = phi [{}]", dest.0, sources.join(", "))
        }
    }
}

fn fmt_terminator(term: &Terminator) -> String {
    match term {
        Terminator::Return(None) => "return".to_string(),
        Terminator::Return(Some(op)) => format!("return {}", fmt_operand(op)),
        Terminator::Goto(target) => format!("goto bb{}", target.0),
        Terminator::Branch {
            cond,
            then_block,
            else_block,
        } => format!(
            "branch {} ? bb{} : bb{}",
            fmt_operand(cond),
            then_block.0,
            else_block.0
        ),
        Terminator::Select { cases } => {
            let cases: Vec<String> = cases
                .iter()
                .map(|case| match &case.kind {
                    SelectKind::Send { channel, value } => format!(
                        "send({}, {}) => bb{}",
                        fmt_operand(channel),
                        fmt_operand(value),
                        case.target.0
                    ),
                    SelectKind::Recv { dest, channel } => {
                        let dest = dest.map(|d| format!("_{} = ", d.0)).unwrap_or_default();
                        format!("{}recv({}) => bb{}", dest, fmt_operand(channel), case.target.0)
                    }
                    SelectKind::Default => format!("default => bb{}", case.target.0),
                })
                .collect();
            format!("select [{}]", cases.join(", "))
        }
    }
}
