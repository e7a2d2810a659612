//! MIR function builder.

use malc_sem::Type;
use malc_util::{Span, Symbol};

use crate::mir::{BasicBlock, BlockId, Function, Local, LocalId, Statement, Terminator};

/// Incrementally constructs a [`Function`].
///
/// The builder tracks a current block; statements are appended to it and
/// a terminator seals it. Sealing twice is a bug in the caller, so
/// `terminate` keeps the first terminator (lowering of `return` inside a
/// loop body, for example, leaves the rest of the body unreachable).
pub struct Builder {
    pub function: Function,
    current: BlockId,
}

impl Builder {
    pub fn new(name: Symbol, ret: Option<Type>) -> Self {
        let mut function = Function::new(name, ret);
        let entry = function.blocks.push(BasicBlock::new());
        function.entry = entry;

        Self {
            function,
            current: entry,
        }
    }

    pub fn entry(&self) -> BlockId {
        self.function.entry
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn new_block(&mut self) -> BlockId {
        self.function.blocks.push(BasicBlock::new())
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Reserve a parameter local; must be called before any body local is
    /// allocated.
    pub fn add_param(&mut self, name: Symbol, ty: Type, span: Span) -> LocalId {
        debug_assert_eq!(self.function.params.len(), self.function.locals.len());
        let id = self.function.locals.push(Local {
            name: Some(name),
            ty,
            span,
        });
        self.function.params.push(id);
        id
    }

    pub fn add_local(&mut self, name: Option<Symbol>, ty: Type, span: Span) -> LocalId {
        self.function.locals.push(Local { name, ty, span })
    }

    /// Fresh unnamed temporary.
    pub fn temp(&mut self, ty: Type) -> LocalId {
        self.add_local(None, ty, Span::DUMMY)
    }

    pub fn push(&mut self, stmt: Statement) {
        self.function.blocks[self.current].statements.push(stmt);
    }

    pub fn push_into(&mut self, block: BlockId, stmt: Statement) {
        self.function.blocks[block].statements.push(stmt);
    }

    /// Prepend a statement to `block`. Used by pattern lowering to make a
    /// binding visible to the success block without leaking it to later
    /// arms.
    pub fn push_front(&mut self, block: BlockId, stmt: Statement) {
        self.function.blocks[block].statements.insert(0, stmt);
    }

    /// Seal the current block; the first terminator wins.
    pub fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.function.blocks[self.current];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    pub fn terminate_block(&mut self, block: BlockId, terminator: Terminator) {
        let block = &mut self.function.blocks[block];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.function.blocks[self.current].terminator.is_some()
    }

    /// Finish the function: every unterminated block falls back to a bare
    /// return.
    pub fn build(mut self) -> Function {
        for block in self.function.blocks.iter_mut() {
            if block.terminator.is_none() {
                block.terminator = Some(Terminator::Return(None));
            }
        }
        self.function
    }
}
