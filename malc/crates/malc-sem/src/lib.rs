//! malc-sem - Type-checker interface for the Malphas compiler
//!
//! This crate is the boundary between the source-level front end (lexer,
//! parser, type checker — external to this repository) and the middle end.
//! It defines the type descriptors, the typed AST the checker hands over,
//! the global scope used for struct/enum collection, and the side tables
//! (`TypeInfo`, `MethodTable`) keyed by AST node. No checking logic lives
//! here; later phases consume these structures as-is.

pub mod ast;
mod info;
mod scope;
mod types;

pub use info::{MethodTable, TypeInfo};
pub use scope::{Def, ModuleInfo, ModuleMap, Scope};
pub use types::{
    EnumDef, FieldDef, FnSig, StructDef, TraitDef, Type, TypeParamDecl, VariantDef,
};
