//! SSA construction.
//!
//! Produces an equivalent module in which every local is defined at most
//! once: dominance frontiers drive phi placement, then a recursive walk of
//! the CFG from the entry renames definitions and uses through
//! per-variable version stacks. The emitter accepts both forms, so
//! running this pass is optional.

use malc_util::{FxHashMap, FxHashSet, Span};

use crate::analysis::{dominance_frontiers, ControlFlowGraph, Dominators};
use crate::mir::{
    BasicBlock, BlockId, Callee, Function, Local, LocalId, Module, Operand, SelectKind,
    Statement, Terminator,
};

/// Transform every function of `module` into SSA form.
pub fn build_module(module: &Module) -> Module {
    Module {
        functions: module.functions.iter().map(build_function).collect(),
        structs: module.structs.clone(),
        enums: module.enums.clone(),
    }
}

/// Transform one function into SSA form.
pub fn build_function(func: &Function) -> Function {
    let cfg = ControlFlowGraph::new(func);
    let doms = Dominators::compute(func, &cfg);
    let frontiers = dominance_frontiers(func, &cfg, &doms);

    // Definition sites per variable. Parameters are implicitly defined on
    // entry.
    let mut def_blocks: FxHashMap<LocalId, FxHashSet<BlockId>> = FxHashMap::default();
    for &param in &func.params {
        def_blocks.entry(param).or_default().insert(func.entry);
    }
    for (block, data) in func.blocks.iter_enumerated() {
        for stmt in &data.statements {
            if let Some(dest) = stmt.dest() {
                def_blocks.entry(dest).or_default().insert(block);
            }
        }
        if let Some(Terminator::Select { cases }) = &data.terminator {
            for case in cases {
                if let SelectKind::Recv {
                    dest: Some(dest), ..
                } = &case.kind
                {
                    def_blocks.entry(*dest).or_default().insert(block);
                }
            }
        }
    }

    // Phi placement: worklist over definition sites, spilling into
    // dominance frontiers.
    let mut phis_at: FxHashMap<BlockId, Vec<LocalId>> = FxHashMap::default();
    let mut vars: Vec<LocalId> = def_blocks.keys().copied().collect();
    vars.sort();
    for &var in &vars {
        let mut placed: FxHashSet<BlockId> = FxHashSet::default();
        let mut worklist: Vec<BlockId> = def_blocks[&var].iter().copied().collect();
        worklist.sort();
        let mut queued: FxHashSet<BlockId> = worklist.iter().copied().collect();

        while let Some(block) = worklist.pop() {
            for &join in &frontiers[block] {
                if placed.insert(join) {
                    phis_at.entry(join).or_default().push(var);
                    if queued.insert(join) {
                        worklist.push(join);
                    }
                }
            }
        }
    }

    let mut renamer = Renamer::new(func, phis_at);
    renamer.walk(func.entry, &cfg);
    renamer.finish(func)
}

struct Renamer {
    /// Local pool of the output function; starts as a copy of the input's
    /// so parameter ids stay stable.
    locals: malc_util::IndexVec<LocalId, Local>,
    /// Current version of each original local, innermost last.
    stacks: FxHashMap<LocalId, Vec<LocalId>>,
    /// Phi variables per block, in placement order.
    phis_at: FxHashMap<BlockId, Vec<LocalId>>,
    /// Pre-created phi result locals, keyed by (block, original var).
    phi_dests: FxHashMap<(BlockId, LocalId), LocalId>,
    /// Incoming phi operands collected while walking predecessors.
    phi_sources: FxHashMap<(BlockId, LocalId), Vec<(BlockId, Operand)>>,
    /// Rewritten statements and terminator per block.
    statements: FxHashMap<BlockId, Vec<Statement>>,
    terminators: FxHashMap<BlockId, Option<Terminator>>,
    visited: FxHashSet<BlockId>,
}

impl Renamer {
    fn new(func: &Function, phis_at: FxHashMap<BlockId, Vec<LocalId>>) -> Self {
        let mut locals = func.locals.clone();
        let mut phi_dests = FxHashMap::default();
        // Allocate phi results in block order so local numbering is
        // deterministic.
        for block in func.blocks.indices() {
            let Some(vars) = phis_at.get(&block) else {
                continue;
            };
            for &var in vars {
                let original = func.locals[var].clone();
                let dest = locals.push(Local {
                    name: original.name,
                    ty: original.ty,
                    span: Span::DUMMY,
                });
                phi_dests.insert((block, var), dest);
            }
        }

        let mut stacks: FxHashMap<LocalId, Vec<LocalId>> = FxHashMap::default();
        for &param in &func.params {
            stacks.insert(param, vec![param]);
        }

        // Stash every block's body; the walk rewrites them in place.
        let mut statements = FxHashMap::default();
        let mut terminators = FxHashMap::default();
        for (id, block) in func.blocks.iter_enumerated() {
            statements.insert(id, block.statements.clone());
            terminators.insert(id, block.terminator.clone());
        }

        Self {
            locals,
            stacks,
            phis_at,
            phi_dests,
            phi_sources: FxHashMap::default(),
            statements,
            terminators,
            visited: FxHashSet::default(),
        }
    }

    fn current(&self, var: LocalId) -> LocalId {
        self.stacks
            .get(&var)
            .and_then(|stack| stack.last())
            .copied()
            .unwrap_or(var)
    }

    fn push_version(&mut self, var: LocalId, version: LocalId, pushed: &mut Vec<LocalId>) {
        self.stacks.entry(var).or_default().push(version);
        pushed.push(var);
    }

    fn fresh_version(&mut self, var: LocalId) -> LocalId {
        let original = self.locals[var].clone();
        self.locals.push(Local {
            name: original.name,
            ty: original.ty,
            span: original.span,
        })
    }

    fn rewrite_operand(&self, op: &mut Operand) {
        if let Operand::Local(id) = op {
            *id = self.current(*id);
        }
    }

    fn walk(&mut self, block: BlockId, cfg: &ControlFlowGraph) {
        self.visited.insert(block);
        let mut pushed: Vec<LocalId> = Vec::new();

        if let Some(vars) = self.phis_at.get(&block).cloned() {
            for var in vars {
                let dest = self.phi_dests[&(block, var)];
                self.push_version(var, dest, &mut pushed);
            }
        }

        let mut stmts = self.statements.remove(&block).unwrap_or_default();
        for stmt in &mut stmts {
            for_each_operand(stmt, &mut |op| self.rewrite_operand(op));
            if let Statement::AddressOf { target, .. } = stmt {
                *target = self.current(*target);
            }
            if let Some(var) = stmt_dest(stmt) {
                let version = self.fresh_version(var);
                set_stmt_dest(stmt, version);
                self.push_version(var, version, &mut pushed);
            }
        }
        self.statements.insert(block, stmts);

        let mut terminator = self.terminators.remove(&block).unwrap_or(None);
        if let Some(term) = &mut terminator {
            terminator_operands(term, &mut |op| self.rewrite_operand(op));
            if let Terminator::Select { cases } = term {
                for case in cases {
                    if let SelectKind::Recv {
                        dest: Some(dest), ..
                    } = &mut case.kind
                    {
                        let var = *dest;
                        let version = self.fresh_version(var);
                        *dest = version;
                        self.push_version(var, version, &mut pushed);
                    }
                }
            }
        }
        self.terminators.insert(block, terminator);

        // Feed phi operands of successors with the versions live out of
        // this block, then recurse into unvisited ones.
        let successors: Vec<BlockId> = cfg.successors[block].clone();
        for &succ in &successors {
            if let Some(vars) = self.phis_at.get(&succ).cloned() {
                for var in vars {
                    let value = Operand::Local(self.current(var));
                    self.phi_sources
                        .entry((succ, var))
                        .or_default()
                        .push((block, value));
                }
            }
        }
        for &succ in &successors {
            if !self.visited.contains(&succ) {
                self.walk(succ, cfg);
            }
        }

        for var in pushed.into_iter().rev() {
            self.stacks
                .get_mut(&var)
                .expect("pushed version has a stack")
                .pop();
        }
    }

    fn finish(mut self, func: &Function) -> Function {
        let mut blocks: malc_util::IndexVec<BlockId, BasicBlock> = malc_util::IndexVec::new();
        for (id, original) in func.blocks.iter_enumerated() {
            let mut statements = Vec::new();
            if let Some(vars) = self.phis_at.get(&id) {
                for &var in vars {
                    let dest = self.phi_dests[&(id, var)];
                    let sources = self
                        .phi_sources
                        .remove(&(id, var))
                        .unwrap_or_default();
                    statements.push(Statement::Phi { dest, sources });
                }
            }
            statements.extend(self.statements.remove(&id).unwrap_or_default());
            let terminator = match self.terminators.remove(&id) {
                Some(term) => term,
                // Unreachable block: untouched by the walk.
                None => original.terminator.clone(),
            };
            blocks.push(BasicBlock {
                statements,
                terminator,
            });
        }

        Function {
            name: func.name,
            type_params: func.type_params.clone(),
            params: func.params.clone(),
            ret: func.ret.clone(),
            locals: self.locals,
            blocks,
            entry: func.entry,
        }
    }
}

/// Original destination of a statement, skipping phis (their dests are
/// pre-assigned).
fn stmt_dest(stmt: &Statement) -> Option<LocalId> {
    match stmt {
        Statement::Phi { .. } => None,
        _ => stmt.dest(),
    }
}

fn set_stmt_dest(stmt: &mut Statement, new: LocalId) {
    match stmt {
        Statement::Assign { dest, .. }
        | Statement::LoadField { dest, .. }
        | Statement::LoadIndex { dest, .. }
        | Statement::MakeStruct { dest, .. }
        | Statement::MakeArray { dest, .. }
        | Statement::MakeTuple { dest, .. }
        | Statement::MakeEnum { dest, .. }
        | Statement::Discriminant { dest, .. }
        | Statement::VariantPayload { dest, .. }
        | Statement::MakeChannel { dest, .. }
        | Statement::Receive { dest, .. }
        | Statement::SizeOf { dest, .. }
        | Statement::AlignOf { dest, .. }
        | Statement::AddressOf { dest, .. }
        | Statement::Cast { dest, .. }
        | Statement::MakeClosure { dest, .. }
        | Statement::Phi { dest, .. } => *dest = new,
        Statement::Call { dest, .. } => *dest = Some(new),
        Statement::StoreField { .. }
        | Statement::StoreIndex { .. }
        | Statement::Send { .. }
        | Statement::Spawn { .. }
        | Statement::Yield => {}
    }
}

/// Visit every operand read by a statement.
pub(crate) fn for_each_operand(stmt: &mut Statement, f: &mut impl FnMut(&mut Operand)) {
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
        Statement::MakeStruct { fields, .. } => {
            fields.iter_mut().for_each(|(_, op)| f(op));
        }
        Statement::MakeArray { elems, .. } | Statement::MakeTuple { elems, .. } => {
            elems.iter_mut().for_each(&mut *f);
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

/// Visit every operand read by a terminator.
pub(crate) fn terminator_operands(term: &mut Terminator, f: &mut impl FnMut(&mut Operand)) {
    match term {
        Terminator::Return(Some(op)) => f(op),
        Terminator::Return(None) | Terminator::Goto(_) => {}
        Terminator::Branch { cond, .. } => f(cond),
        Terminator::Select { cases } => {
            for case in cases {
                match &mut case.kind {
                    SelectKind::Send { channel, value } => {
                        f(channel);
                        f(value);
                    }
                    SelectKind::Recv { channel, .. } => f(channel),
                    SelectKind::Default => {}
                }
            }
        }
    }
}
