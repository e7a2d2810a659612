//! malc-gen - Textual LLVM IR emission for the Malphas compiler
//!
//! Consumes a (monomorphized) MIR module read-only and produces LLVM IR
//! text for the x86_64 Linux triple, together with the runtime extern
//! declarations the emitted code links against.

mod error;
mod intrinsics;
mod llvm;
mod runtime;
mod types;

pub use error::{CodeGenError, Result};
pub use intrinsics::Intrinsic;
pub use llvm::{emit_module, sanitize, EmittedModule};
pub use types::{align_of, llvm_type, size_of};
