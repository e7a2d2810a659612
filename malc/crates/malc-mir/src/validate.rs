//! MIR invariant checking.
//!
//! Run between passes in checked configurations and leaned on heavily by
//! tests. Faults here are compiler bugs, not user errors.

use malc_util::FxHashSet;

use crate::error::ValidateError;
use crate::mir::{Callee, Function, LocalId, Module, Operand, SelectKind, Statement, Terminator};
use crate::ssa::{for_each_operand, terminator_operands};

/// Check structural invariants: every block sealed, targets in range,
/// operands referring to defined locals, enum constructions tagged
/// consistently with their definitions.
pub fn validate_module(module: &Module) -> Result<(), ValidateError> {
    for func in &module.functions {
        validate_function(module, func)?;
    }
    Ok(())
}

/// Additional invariants that hold only after monomorphization: no call
/// carries type arguments.
pub fn validate_monomorphized(module: &Module) -> Result<(), ValidateError> {
    validate_module(module)?;
    for func in module.functions.iter().filter(|f| !f.is_generic()) {
        for block in func.blocks.iter() {
            for stmt in &block.statements {
                let (callee, type_args) = match stmt {
                    Statement::Call {
                        callee: Callee::Name(name),
                        type_args,
                        ..
                    } => (*name, type_args),
                    Statement::Spawn {
                        func: name,
                        type_args,
                        ..
                    } => (*name, type_args),
                    _ => continue,
                };
                if !type_args.is_empty() {
                    return Err(ValidateError::ResidualTypeArgs {
                        function: func.name.to_string(),
                        callee: callee.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_function(module: &Module, func: &Function) -> Result<(), ValidateError> {
    let block_count = func.blocks.len() as u32;

    // Locals with a definition anywhere; parameters are implicitly
    // defined on entry.
    let mut defined: FxHashSet<LocalId> = func.params.iter().copied().collect();
    for block in func.blocks.iter() {
        for stmt in &block.statements {
            if let Some(dest) = stmt.dest() {
                defined.insert(dest);
            }
        }
        if let Some(Terminator::Select { cases }) = &block.terminator {
            for case in cases {
                if let SelectKind::Recv {
                    dest: Some(dest), ..
                } = &case.kind
                {
                    defined.insert(*dest);
                }
            }
        }
    }

    for (id, block) in func.blocks.iter_enumerated() {
        let Some(terminator) = &block.terminator else {
            return Err(ValidateError::MissingTerminator {
                function: func.name.to_string(),
                block: id.0,
            });
        };
        for target in terminator.targets() {
            if target.0 >= block_count {
                return Err(ValidateError::BadTarget {
                    function: func.name.to_string(),
                    block: id.0,
                    target: target.0,
                });
            }
        }

        let mut bad_use: Option<LocalId> = None;
        let mut check = |op: &mut Operand| {
            if let Operand::Local(local) = op {
                if !defined.contains(local) && bad_use.is_none() {
                    bad_use = Some(*local);
                }
            }
        };
        let mut statements = block.statements.clone();
        for stmt in &mut statements {
            for_each_operand(stmt, &mut check);
        }
        let mut term = terminator.clone();
        terminator_operands(&mut term, &mut check);
        if let Some(local) = bad_use {
            return Err(ValidateError::UseBeforeDef {
                function: func.name.to_string(),
                local: local.0,
                block: id.0,
            });
        }

        for stmt in &block.statements {
            if let Statement::MakeEnum {
                enum_name,
                variant,
                variant_index,
                values,
                ..
            } = stmt
            {
                if let Some(def) = module.enums.get(enum_name) {
                    let expected = def.variant_index(*variant);
                    if expected != Some(*variant_index) {
                        return Err(ValidateError::VariantIndexMismatch {
                            function: func.name.to_string(),
                            variant: variant.to_string(),
                            index: *variant_index,
                            expected: expected.unwrap_or(usize::MAX),
                        });
                    }
                    if let Some(variant_def) = def.variant(*variant_index) {
                        if variant_def.params.len() != values.len() {
                            return Err(ValidateError::VariantArityMismatch {
                                function: func.name.to_string(),
                                variant: variant.to_string(),
                                got: values.len(),
                                expected: variant_def.params.len(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
