//! Error types for LLVM IR emission.

use thiserror::Error;

/// Fatal emission fault; partial IR is discarded by the caller.
#[derive(Debug, Error)]
pub enum CodeGenError {
    /// A type the emitter cannot translate. Should not occur after
    /// monomorphization.
    #[error("cannot map type to LLVM: {0}")]
    TypeMapping(String),

    /// Struct field accessed without a registered field-index map.
    #[error("struct `{struct_name}` has no registered field `{field}`")]
    FieldIndex { struct_name: String, field: String },

    /// Enum operation against a definition missing from the module.
    #[error("enum `{0}` is not registered in the module")]
    UnknownEnum(String),

    /// A `select` case is neither send, receive-assignment, receive, nor
    /// default.
    #[error("malformed select: {0}")]
    MalformedSelect(String),

    /// Block left unsealed by an earlier pass.
    #[error("block {block} of `{function}` has no terminator")]
    MissingTerminator { function: String, block: u32 },

    /// Internal error - indicates a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for code generation operations.
pub type Result<T> = std::result::Result<T, CodeGenError>;
