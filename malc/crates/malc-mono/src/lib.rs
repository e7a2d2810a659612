//! malc-mono - Monomorphization for the Malphas compiler
//!
//! Rewrites a module in place so that no function with a non-empty
//! type-parameter list is reachable from a call site carrying type
//! arguments. Specializations are separate functions named by the
//! mangler; generic templates stay in the module but are skipped by the
//! emitter. Trait-bounded calls inside a generic are rewritten to
//! concrete-type methods while its body is copied.

mod error;
pub mod mangle;

#[cfg(test)]
mod tests;

use malc_mir::{
    BasicBlock, BlockId, Callee, Function, Module, Operand, Statement, Terminator,
};
use malc_sem::{FieldDef, StructDef, Type, TypeParamDecl};
use malc_util::{FxHashMap, IndexVec, Symbol};

pub use error::MonoError;
pub use mangle::{mangle, type_suffix};

/// Fixed-point specialization: scan every call in every concrete
/// function; any call carrying type arguments is redirected to a
/// specialized copy and its arguments cleared. Terminates when a full
/// pass makes no rewrite, so running it again is a no-op.
pub fn monomorphize(module: &mut Module) -> Result<(), MonoError> {
    loop {
        let sites = collect_generic_calls(module);
        if sites.is_empty() {
            return Ok(());
        }
        for site in sites {
            let mangled = ensure_specialized(module, site.callee, &site.type_args)?;
            let stmt =
                &mut module.functions[site.function].blocks[site.block].statements[site.index];
            match stmt {
                Statement::Call {
                    callee, type_args, ..
                } => {
                    *callee = Callee::Name(mangled);
                    type_args.clear();
                }
                Statement::Spawn {
                    func, type_args, ..
                } => {
                    *func = mangled;
                    type_args.clear();
                }
                _ => {}
            }
        }
    }
}

struct CallSite {
    function: usize,
    block: BlockId,
    index: usize,
    callee: Symbol,
    type_args: Vec<Type>,
}

fn collect_generic_calls(module: &Module) -> Vec<CallSite> {
    let mut sites = Vec::new();
    for (fidx, func) in module.functions.iter().enumerate() {
        // Calls inside generic templates still mention type parameters;
        // they are resolved while the template is copied.
        if func.is_generic() {
            continue;
        }
        for (block, data) in func.blocks.iter_enumerated() {
            for (index, stmt) in data.statements.iter().enumerate() {
                let (callee, type_args) = match stmt {
                    Statement::Call {
                        callee: Callee::Name(name),
                        type_args,
                        ..
                    } if !type_args.is_empty() => (*name, type_args.clone()),
                    Statement::Spawn {
                        func: name,
                        type_args,
                        ..
                    } if !type_args.is_empty() => (*name, type_args.clone()),
                    _ => continue,
                };
                sites.push(CallSite {
                    function: fidx,
                    block,
                    index,
                    callee,
                    type_args,
                });
            }
        }
    }
    sites
}

/// Make sure `name` specialized over `type_args` exists in the module and
/// return its mangled name.
fn ensure_specialized(
    module: &mut Module,
    name: Symbol,
    type_args: &[Type],
) -> Result<Symbol, MonoError> {
    let mangled = mangle(name, type_args);
    if module.function(mangled).is_some() {
        return Ok(mangled);
    }

    let generic = module
        .function(name)
        .cloned()
        .ok_or_else(|| MonoError::MissingFunction {
            name: name.to_string(),
        })?;
    if generic.type_params.len() != type_args.len() {
        return Err(MonoError::ArityMismatch {
            name: name.to_string(),
            expected: generic.type_params.len(),
            got: type_args.len(),
        });
    }

    let map: FxHashMap<Symbol, Type> = generic
        .type_params
        .iter()
        .map(|p| p.name)
        .zip(type_args.iter().cloned())
        .collect();

    let specialized = specialize_function(module, &generic, mangled, &map)?;
    module.functions.push(specialized);
    Ok(mangled)
}

/// Copy `generic` under `name`, substituting the type map through locals,
/// parameters, the return type, and every type embedded in statements.
/// A block map translates successor references into the copy.
fn specialize_function(
    module: &mut Module,
    generic: &Function,
    name: Symbol,
    map: &FxHashMap<Symbol, Type>,
) -> Result<Function, MonoError> {
    let mut locals = IndexVec::new();
    for local in generic.locals.iter() {
        let mut local = local.clone();
        local.ty = subst_type(module, &local.ty, map);
        locals.push(local);
    }

    let ret = generic
        .ret
        .as_ref()
        .map(|ty| subst_type(module, ty, map));

    let mut block_map: FxHashMap<BlockId, BlockId> = FxHashMap::default();
    let mut blocks: IndexVec<BlockId, BasicBlock> = IndexVec::new();
    for (id, _) in generic.blocks.iter_enumerated() {
        block_map.insert(id, blocks.push(BasicBlock::new()));
    }

    for (id, data) in generic.blocks.iter_enumerated() {
        let new_id = block_map[&id];
        let mut statements = Vec::with_capacity(data.statements.len());
        for stmt in &data.statements {
            statements.push(subst_statement(module, stmt, map, &generic.type_params, &block_map));
        }
        let terminator = data
            .terminator
            .as_ref()
            .map(|term| remap_terminator(term, map, module, &block_map));
        blocks[new_id] = BasicBlock {
            statements,
            terminator,
        };
    }

    Ok(Function {
        name,
        type_params: Vec::new(),
        params: generic.params.clone(),
        ret,
        locals,
        blocks,
        entry: block_map[&generic.entry],
    })
}

fn subst_statement(
    module: &mut Module,
    stmt: &Statement,
    map: &FxHashMap<Symbol, Type>,
    bounds: &[TypeParamDecl],
    block_map: &FxHashMap<BlockId, BlockId>,
) -> Statement {
    let mut stmt = stmt.clone();

    // Literal operand types carry the substitution too.
    rewrite_operands(&mut stmt, &mut |op| {
        if let Operand::Const(c) = op {
            c.ty = subst_type(module, &c.ty, map);
        }
    });

    match &mut stmt {
        Statement::Call {
            callee, type_args, ..
        } => {
            for ty in type_args.iter_mut() {
                *ty = subst_type(module, ty, map);
            }
            if let Callee::Name(name) = callee {
                if let Some(rewritten) = rewrite_trait_call(*name, map, bounds) {
                    *name = rewritten;
                }
            }
        }
        Statement::Spawn { type_args, .. } => {
            for ty in type_args.iter_mut() {
                *ty = subst_type(module, ty, map);
            }
        }
        Statement::MakeStruct { ty, .. }
        | Statement::MakeArray { ty, .. }
        | Statement::MakeChannel { ty, .. }
        | Statement::SizeOf { ty, .. }
        | Statement::AlignOf { ty, .. }
        | Statement::Cast { ty, .. } => {
            *ty = subst_type(module, ty, map);
        }
        Statement::Phi { sources, .. } => {
            for (block, _) in sources.iter_mut() {
                *block = block_map[block];
            }
        }
        _ => {}
    }
    stmt
}

/// `TraitName::method` called inside a generic whose bound set carries
/// `TraitName` becomes `ConcreteType::method`.
fn rewrite_trait_call(
    name: Symbol,
    map: &FxHashMap<Symbol, Type>,
    bounds: &[TypeParamDecl],
) -> Option<Symbol> {
    let text = name.as_str();
    let (trait_name, method) = text.split_once("::")?;
    let param = bounds
        .iter()
        .find(|p| p.bounds.iter().any(|b| b.as_str() == trait_name))?;
    let concrete = map.get(&param.name)?;
    Some(Symbol::intern(&format!(
        "{}::{}",
        type_suffix(concrete),
        method
    )))
}

fn remap_terminator(
    term: &Terminator,
    map: &FxHashMap<Symbol, Type>,
    module: &mut Module,
    block_map: &FxHashMap<BlockId, BlockId>,
) -> Terminator {
    let mut term = term.clone();
    match &mut term {
        Terminator::Return(Some(Operand::Const(c))) => {
            c.ty = subst_type(module, &c.ty, map);
        }
        Terminator::Goto(target) => *target = block_map[target],
        Terminator::Branch {
            then_block,
            else_block,
            ..
        } => {
            *then_block = block_map[then_block];
            *else_block = block_map[else_block];
        }
        Terminator::Select { cases } => {
            for case in cases {
                case.target = block_map[&case.target];
            }
        }
        _ => {}
    }
    term
}

/// Apply the parameter map, then lower generic struct instances to
/// registered specializations so the emitter sees concrete names.
fn subst_type(module: &mut Module, ty: &Type, map: &FxHashMap<Symbol, Type>) -> Type {
    let substituted = ty.substitute(map);
    resolve_struct_instances(module, &substituted)
}

fn resolve_struct_instances(module: &mut Module, ty: &Type) -> Type {
    match ty {
        Type::Generic { base, args } => {
            let resolved: Vec<Type> = args
                .iter()
                .map(|a| resolve_struct_instances(module, a))
                .collect();
            // Only fully concrete instances can be laid out.
            if resolved.iter().any(contains_param) {
                return Type::Generic {
                    base: *base,
                    args: resolved,
                };
            }
            if module.structs.contains_key(base) {
                Type::Named(specialize_struct(module, *base, &resolved))
            } else {
                // Generic enums keep their instantiation; the emitter
                // resolves payload shapes against the argument list.
                Type::Generic {
                    base: *base,
                    args: resolved,
                }
            }
        }
        Type::Array(elem, len) => {
            Type::Array(Box::new(resolve_struct_instances(module, elem)), *len)
        }
        Type::Slice(elem) => Type::Slice(Box::new(resolve_struct_instances(module, elem))),
        Type::Map(k, v) => Type::Map(
            Box::new(resolve_struct_instances(module, k)),
            Box::new(resolve_struct_instances(module, v)),
        ),
        Type::Channel(elem) => Type::Channel(Box::new(resolve_struct_instances(module, elem))),
        Type::Pointer(inner) => Type::Pointer(Box::new(resolve_struct_instances(module, inner))),
        Type::Ref(inner) => Type::Ref(Box::new(resolve_struct_instances(module, inner))),
        Type::Optional(inner) => {
            Type::Optional(Box::new(resolve_struct_instances(module, inner)))
        }
        Type::Tuple(elems) => Type::Tuple(
            elems
                .iter()
                .map(|e| resolve_struct_instances(module, e))
                .collect(),
        ),
        Type::Fn(params, ret) => Type::Fn(
            params
                .iter()
                .map(|p| resolve_struct_instances(module, p))
                .collect(),
            Box::new(resolve_struct_instances(module, ret)),
        ),
        _ => ty.clone(),
    }
}

/// Register (once) and name the specialization of struct `base` over
/// concrete `args`.
fn specialize_struct(module: &mut Module, base: Symbol, args: &[Type]) -> Symbol {
    let mangled = mangle(base, args);
    if module.structs.contains_key(&mangled) {
        return mangled;
    }

    let def = module.structs[&base].clone();
    let map: FxHashMap<Symbol, Type> = def
        .type_params
        .iter()
        .copied()
        .zip(args.iter().cloned())
        .collect();

    // Reserve the slot first; recursive fields referring back to the same
    // instantiation resolve to the name instead of recursing forever.
    module.structs.insert(
        mangled,
        StructDef {
            name: mangled,
            type_params: Vec::new(),
            fields: Vec::new(),
        },
    );

    let fields: Vec<FieldDef> = def
        .fields
        .iter()
        .map(|f| FieldDef {
            name: f.name,
            ty: subst_type(module, &f.ty, &map),
        })
        .collect();
    if let Some(slot) = module.structs.get_mut(&mangled) {
        slot.fields = fields;
    }

    mangled
}

fn contains_param(ty: &Type) -> bool {
    match ty {
        Type::Param(_) => true,
        Type::Array(inner, _)
        | Type::Slice(inner)
        | Type::Channel(inner)
        | Type::Pointer(inner)
        | Type::Ref(inner)
        | Type::Optional(inner) => contains_param(inner),
        Type::Map(k, v) => contains_param(k) || contains_param(v),
        Type::Tuple(elems) => elems.iter().any(contains_param),
        Type::Fn(params, ret) => params.iter().any(contains_param) || contains_param(ret),
        Type::Generic { args, .. } => args.iter().any(contains_param),
        _ => false,
    }
}

/// Visit every operand of a statement.
fn rewrite_operands(stmt: &mut Statement, f: &mut impl FnMut(&mut Operand)) {
    match stmt {
        Statement::Assign { value, .. } => f(value),
        Statement::Call { callee, args, .. } => {
            if let Callee::Value(op) = callee {
                f(op);
            }
            args.iter_mut().for_each(&mut *f);
        }
        Statement::LoadField { target, .. } => f(target),
        Statement::StoreField { target, value, .. } => {
            f(target);
            f(value);
        }
        Statement::LoadIndex {
            target, indices, ..
        } => {
            f(target);
            indices.iter_mut().for_each(&mut *f);
        }
        Statement::StoreIndex {
            target,
            indices,
            value,
        } => {
            f(target);
            indices.iter_mut().for_each(&mut *f);
            f(value);
        }
        Statement::MakeStruct { fields, .. } => fields.iter_mut().for_each(|(_, op)| f(op)),
        Statement::MakeArray { elems, .. } | Statement::MakeTuple { elems, .. } => {
            elems.iter_mut().for_each(f)
        }
        Statement::MakeEnum { values, .. } => values.iter_mut().for_each(f),
        Statement::Discriminant { target, .. } | Statement::VariantPayload { target, .. } => {
            f(target)
        }
        Statement::MakeChannel { capacity, .. } => f(capacity),
        Statement::Send { channel, value } => {
            f(channel);
            f(value);
        }
        Statement::Receive { channel, .. } => f(channel),
        Statement::Cast { value, .. } => f(value),
        Statement::MakeClosure { env, .. } => f(env),
        Statement::Spawn { args, .. } => args.iter_mut().for_each(f),
        Statement::Phi { sources, .. } => sources.iter_mut().for_each(|(_, op)| f(op)),
        Statement::SizeOf { .. }
        | Statement::AlignOf { .. }
        | Statement::AddressOf { .. }
        | Statement::Yield => {}
    }
}
