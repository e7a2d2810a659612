//! malc-util - Foundation types for the Malphas compiler
//!
//! Shared infrastructure used by every phase crate: string interning
//! (`Symbol`), source locations (`Span`), typed index vectors
//! (`IndexVec` / `Idx`), and diagnostic accumulation.

mod diagnostic;
mod index_vec;
mod span;
mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticHandler, Level};
pub use index_vec::{Idx, IndexVec};
pub use span::Span;
pub use symbol::Symbol;

// Re-export commonly used types
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
