//! Structural MIR cleanup.
//!
//! Pattern compilation and `return`-heavy bodies leave blocks no path
//! reaches; dropping them keeps validation strict and the emitted IR
//! small. This is the only transformation performed on MIR besides SSA
//! construction.

use malc_util::{FxHashMap, IndexVec};

use crate::analysis::ControlFlowGraph;
use crate::mir::{BlockId, Function, Module, Statement, Terminator};

pub fn prune_module(module: &mut Module) {
    for func in &mut module.functions {
        prune_unreachable(func);
    }
}

/// Remove blocks unreachable from the entry, remapping block ids in
/// terminators and phi sources.
pub fn prune_unreachable(func: &mut Function) {
    let cfg = ControlFlowGraph::new(func);
    let reachable = cfg.reachable(func.entry);
    if reachable.len() == func.blocks.len() {
        return;
    }

    let mut remap: FxHashMap<BlockId, BlockId> = FxHashMap::default();
    let mut blocks = IndexVec::new();
    for (id, block) in func.blocks.iter_enumerated() {
        if reachable.contains(&id) {
            remap.insert(id, blocks.push(block.clone()));
        }
    }

    for block in blocks.iter_mut() {
        for stmt in &mut block.statements {
            if let Statement::Phi { sources, .. } = stmt {
                sources.retain(|(pred, _)| remap.contains_key(pred));
                for (pred, _) in sources.iter_mut() {
                    *pred = remap[pred];
                }
            }
        }
        if let Some(terminator) = &mut block.terminator {
            match terminator {
                Terminator::Goto(target) => *target = remap[target],
                Terminator::Branch {
                    then_block,
                    else_block,
                    ..
                } => {
                    *then_block = remap[then_block];
                    *else_block = remap[else_block];
                }
                Terminator::Select { cases } => {
                    for case in cases {
                        case.target = remap[&case.target];
                    }
                }
                Terminator::Return(_) => {}
            }
        }
    }

    func.entry = remap[&func.entry];
    func.blocks = blocks;
}
