//! MIR data model.
//!
//! A [`Module`] owns functions plus the struct and enum definitions the
//! emitter needs for layout. Blocks reference each other by [`BlockId`];
//! locals by [`LocalId`]. A block's terminator is `None` only transiently
//! during construction.

use indexmap::IndexMap;
use malc_sem::{EnumDef, StructDef, Type, TypeParamDecl};
use malc_util::{define_idx, IndexVec, Span, Symbol};

define_idx!(
    /// Identity of a local within its function.
    LocalId
);

define_idx!(
    /// Identity of a basic block within its function.
    BlockId
);

/// A lowered compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub functions: Vec<Function>,
    pub structs: IndexMap<Symbol, StructDef>,
    pub enums: IndexMap<Symbol, EnumDef>,
}

impl Module {
    pub fn function(&self, name: Symbol) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: Symbol) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }
}

/// A MIR function with an explicit control flow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Symbol,
    /// Non-empty means the function is generic and must be specialized
    /// before emission.
    pub type_params: Vec<TypeParamDecl>,
    /// Parameter locals, in declaration order. Ids are reserved before any
    /// block body is lowered.
    pub params: Vec<LocalId>,
    /// `None` denotes no return value.
    pub ret: Option<Type>,
    pub locals: IndexVec<LocalId, Local>,
    pub blocks: IndexVec<BlockId, BasicBlock>,
    pub entry: BlockId,
}

impl Function {
    pub fn new(name: Symbol, ret: Option<Type>) -> Self {
        Self {
            name,
            type_params: Vec::new(),
            params: Vec::new(),
            ret,
            locals: IndexVec::new(),
            blocks: IndexVec::new(),
            entry: BlockId(0),
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id]
    }
}

/// Local variable (or compiler temporary).
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: Option<Symbol>,
    pub ty: Type,
    pub span: Span,
}

/// Straight-line statement sequence ending in exactly one terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub statements: Vec<Statement>,
    /// `None` only while the block is under construction.
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            terminator: None,
        }
    }
}

impl Default for BasicBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Direct or indirect call target.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Name(Symbol),
    Value(Operand),
}

/// MIR statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign {
        dest: LocalId,
        value: Operand,
    },
    Call {
        dest: Option<LocalId>,
        callee: Callee,
        args: Vec<Operand>,
        /// Non-empty means the call is generic and is resolved by the
        /// monomorphizer.
        type_args: Vec<Type>,
    },
    LoadField {
        dest: LocalId,
        target: Operand,
        field: Symbol,
    },
    StoreField {
        target: Operand,
        field: Symbol,
        value: Operand,
    },
    /// Multi-dimensional element load; successive lookups are chained.
    LoadIndex {
        dest: LocalId,
        target: Operand,
        indices: Vec<Operand>,
    },
    StoreIndex {
        target: Operand,
        indices: Vec<Operand>,
        value: Operand,
    },
    MakeStruct {
        dest: LocalId,
        ty: Type,
        fields: Vec<(Symbol, Operand)>,
    },
    MakeArray {
        dest: LocalId,
        ty: Type,
        elems: Vec<Operand>,
    },
    MakeTuple {
        dest: LocalId,
        elems: Vec<Operand>,
    },
    MakeEnum {
        dest: LocalId,
        enum_name: Symbol,
        variant: Symbol,
        /// Position of `variant` in the enum definition.
        variant_index: usize,
        values: Vec<Operand>,
    },
    /// Reads the enum tag.
    Discriminant {
        dest: LocalId,
        target: Operand,
    },
    /// Reads one member of an assumed-active variant.
    VariantPayload {
        dest: LocalId,
        target: Operand,
        variant_index: usize,
        member: usize,
    },
    MakeChannel {
        dest: LocalId,
        ty: Type,
        capacity: Operand,
    },
    Send {
        channel: Operand,
        value: Operand,
    },
    Receive {
        dest: LocalId,
        channel: Operand,
    },
    SizeOf {
        dest: LocalId,
        ty: Type,
    },
    AlignOf {
        dest: LocalId,
        ty: Type,
    },
    AddressOf {
        dest: LocalId,
        target: LocalId,
    },
    Cast {
        dest: LocalId,
        value: Operand,
        ty: Type,
    },
    MakeClosure {
        dest: LocalId,
        func: Symbol,
        env: Operand,
    },
    Spawn {
        func: Symbol,
        args: Vec<Operand>,
        type_args: Vec<Type>,
    },
    Yield,
    /// Introduced only by the SSA builder.
    Phi {
        dest: LocalId,
        sources: Vec<(BlockId, Operand)>,
    },
}

impl Statement {
    /// The local this statement defines, if any.
    pub fn dest(&self) -> Option<LocalId> {
        match self {
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
            | Statement::Phi { dest, .. } => Some(*dest),
            Statement::Call { dest, .. } => *dest,
            Statement::StoreField { .. }
            | Statement::StoreIndex { .. }
            | Statement::Send { .. }
            | Statement::Spawn { .. }
            | Statement::Yield => None,
        }
    }
}

/// Block terminator.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Return(Option<Operand>),
    Goto(BlockId),
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Select {
        cases: Vec<SelectArm>,
    },
}

impl Terminator {
    /// Successor blocks, in order.
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return(_) => vec![],
            Terminator::Goto(target) => vec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Select { cases } => cases.iter().map(|c| c.target).collect(),
        }
    }
}

/// One case of a `select` terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectArm {
    pub kind: SelectKind,
    pub target: BlockId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectKind {
    Send { channel: Operand, value: Operand },
    Recv { dest: Option<LocalId>, channel: Operand },
    Default,
}

/// Statement input.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Local(LocalId),
    Const(Constant),
}

impl Operand {
    pub fn nil() -> Self {
        Operand::Const(Constant {
            ty: Type::Nil,
            value: ConstValue::Nil,
        })
    }

    pub fn int(value: i64, ty: Type) -> Self {
        Operand::Const(Constant {
            ty,
            value: ConstValue::Int(value),
        })
    }

    pub fn bool(value: bool) -> Self {
        Operand::Const(Constant {
            ty: Type::Bool,
            value: ConstValue::Bool(value),
        })
    }

    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Operand::Local(id) => Some(*id),
            Operand::Const(_) => None,
        }
    }
}

/// Literal operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: Type,
    pub value: ConstValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Symbol),
    Nil,
}
