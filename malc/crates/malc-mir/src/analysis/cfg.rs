//! Control flow graph, dominators, and dominance frontiers.

use malc_util::{FxHashSet, IndexVec};

use crate::mir::{BlockId, Function};

/// Predecessor/successor maps for one function.
pub struct ControlFlowGraph {
    pub predecessors: IndexVec<BlockId, Vec<BlockId>>,
    pub successors: IndexVec<BlockId, Vec<BlockId>>,
}

impl ControlFlowGraph {
    pub fn new(func: &Function) -> Self {
        let mut predecessors: IndexVec<BlockId, Vec<BlockId>> =
            func.blocks.indices().map(|_| Vec::new()).collect();
        let mut successors: IndexVec<BlockId, Vec<BlockId>> =
            func.blocks.indices().map(|_| Vec::new()).collect();

        for (id, block) in func.blocks.iter_enumerated() {
            let Some(terminator) = &block.terminator else {
                continue;
            };
            for target in terminator.targets() {
                if !successors[id].contains(&target) {
                    successors[id].push(target);
                }
                if !predecessors[target].contains(&id) {
                    predecessors[target].push(id);
                }
            }
        }

        Self {
            predecessors,
            successors,
        }
    }

    /// Blocks reachable from the entry, in depth-first order.
    pub fn reachable(&self, entry: BlockId) -> FxHashSet<BlockId> {
        let mut visited = FxHashSet::default();
        let mut stack = vec![entry];
        while let Some(block) = stack.pop() {
            if !visited.insert(block) {
                continue;
            }
            for &succ in &self.successors[block] {
                if !visited.contains(&succ) {
                    stack.push(succ);
                }
            }
        }
        visited
    }

    /// Reverse postorder over reachable blocks, entry first.
    pub fn reverse_postorder(&self, entry: BlockId) -> Vec<BlockId> {
        let mut visited = FxHashSet::default();
        let mut postorder = Vec::new();
        self.postorder_from(entry, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    fn postorder_from(
        &self,
        block: BlockId,
        visited: &mut FxHashSet<BlockId>,
        out: &mut Vec<BlockId>,
    ) {
        if !visited.insert(block) {
            return;
        }
        for &succ in &self.successors[block] {
            self.postorder_from(succ, visited, out);
        }
        out.push(block);
    }
}

/// Immediate dominators, computed by iterative data flow: each pass
/// intersects (walking idom chains) the dominators of all processed
/// predecessors until the assignment is stable.
pub struct Dominators {
    /// `None` for the entry and for unreachable blocks.
    pub idom: IndexVec<BlockId, Option<BlockId>>,
    rpo_position: IndexVec<BlockId, usize>,
}

impl Dominators {
    pub fn compute(func: &Function, cfg: &ControlFlowGraph) -> Self {
        let entry = func.entry;
        let order = cfg.reverse_postorder(entry);

        let mut rpo_position: IndexVec<BlockId, usize> =
            func.blocks.indices().map(|_| usize::MAX).collect();
        for (i, &block) in order.iter().enumerate() {
            rpo_position[block] = i;
        }

        let mut idom: IndexVec<BlockId, Option<BlockId>> =
            func.blocks.indices().map(|_| None).collect();
        // The entry is its own idom while iterating; published as None.
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in order.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for &pred in &cfg.predecessors[block] {
                    if idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_position, pred, current),
                    });
                }
                if new_idom.is_some() && idom[block] != new_idom {
                    idom[block] = new_idom;
                    changed = true;
                }
            }
        }

        idom[entry] = None;
        Self { idom, rpo_position }
    }

    /// Does `a` dominate `b`?
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cursor = b;
        loop {
            if cursor == a {
                return true;
            }
            match self.idom[cursor] {
                Some(next) => cursor = next,
                None => return false,
            }
        }
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_position[block] != usize::MAX
    }
}

fn intersect(
    idom: &IndexVec<BlockId, Option<BlockId>>,
    rpo_position: &IndexVec<BlockId, usize>,
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    while a != b {
        while rpo_position[a] > rpo_position[b] {
            a = idom[a].expect("processed block has an idom");
        }
        while rpo_position[b] > rpo_position[a] {
            b = idom[b].expect("processed block has an idom");
        }
    }
    a
}

/// Dominance frontiers: for each join block, a runner walks each
/// predecessor's idom chain up to the join's idom, collecting the join
/// into every frontier passed.
pub fn dominance_frontiers(
    func: &Function,
    cfg: &ControlFlowGraph,
    doms: &Dominators,
) -> IndexVec<BlockId, Vec<BlockId>> {
    let mut frontiers: IndexVec<BlockId, Vec<BlockId>> =
        func.blocks.indices().map(|_| Vec::new()).collect();

    for block in func.blocks.indices() {
        if cfg.predecessors[block].len() < 2 {
            continue;
        }
        let Some(idom) = doms.idom[block] else {
            continue;
        };
        for &pred in &cfg.predecessors[block] {
            if !doms.is_reachable(pred) {
                continue;
            }
            let mut runner = pred;
            while runner != idom {
                if !frontiers[runner].contains(&block) {
                    frontiers[runner].push(block);
                }
                match doms.idom[runner] {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }

    frontiers
}
