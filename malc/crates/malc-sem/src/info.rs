//! Side tables produced by the type checker, keyed by AST node.

use malc_util::{FxHashMap, Symbol};

use crate::ast::NodeId;
use crate::types::{FnSig, Type};

/// Resolved types and call-site type arguments.
#[derive(Debug, Default)]
pub struct TypeInfo {
    node_types: FxHashMap<NodeId, Type>,
    call_type_args: FxHashMap<NodeId, Vec<Type>>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_type(&mut self, id: NodeId, ty: Type) {
        self.node_types.insert(id, ty);
    }

    pub fn record_type_args(&mut self, id: NodeId, args: Vec<Type>) {
        self.call_type_args.insert(id, args);
    }

    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.node_types.get(&id)
    }

    /// Explicit or inferred type arguments at a call site; empty when the
    /// callee is not generic.
    pub fn type_args(&self, id: NodeId) -> &[Type] {
        self.call_type_args.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Methods grouped by the type they are implemented on.
#[derive(Debug, Default)]
pub struct MethodTable {
    by_type: FxHashMap<Symbol, FxHashMap<Symbol, FnSig>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ty: Symbol, sig: FnSig) {
        self.by_type.entry(ty).or_default().insert(sig.name, sig);
    }

    pub fn lookup(&self, ty: Symbol, method: Symbol) -> Option<&FnSig> {
        self.by_type.get(&ty)?.get(&method)
    }

    pub fn has_method(&self, ty: Symbol, method: Symbol) -> bool {
        self.lookup(ty, method).is_some()
    }
}
