//! Error types for MIR construction and validation.

use malc_util::Span;
use thiserror::Error;

/// Fatal lowering fault. Partial MIR is discarded by the caller.
#[derive(Debug, Error)]
pub enum LowerError {
    /// Unknown AST variant.
    #[error("unsupported construct {what} at {span}")]
    Unsupported { what: String, span: Span },

    /// Identifier not in scope.
    #[error("unbound identifier `{name}` at {span}")]
    Unbound { name: String, span: Span },

    /// Pattern names a variant absent from the enum definition.
    #[error("enum `{enum_name}` has no variant `{variant}` at {span}")]
    UnknownVariant {
        enum_name: String,
        variant: String,
        span: Span,
    },

    /// Pattern names a field absent from the struct definition.
    #[error("struct `{struct_name}` has no field `{field}` at {span}")]
    UnknownField {
        struct_name: String,
        field: String,
        span: Span,
    },

    /// `break`/`continue` outside a loop.
    #[error("`{keyword}` outside of a loop at {span}")]
    NoLoopContext { keyword: &'static str, span: Span },

    /// The checker did not record a type for a node the lowerer needs.
    #[error("missing type for expression at {span}")]
    MissingType { span: Span },
}

/// MIR invariant violation found by [`crate::validate_module`].
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("function `{function}`: block bb{block} has no terminator")]
    MissingTerminator { function: String, block: u32 },

    #[error("function `{function}`: block bb{block} targets out-of-range block bb{target}")]
    BadTarget {
        function: String,
        block: u32,
        target: u32,
    },

    #[error(
        "function `{function}`: local _{local} used in bb{block} before any assignment"
    )]
    UseBeforeDef {
        function: String,
        local: u32,
        block: u32,
    },

    #[error(
        "function `{function}`: enum construction tags `{variant}` with index {index}, definition says {expected}"
    )]
    VariantIndexMismatch {
        function: String,
        variant: String,
        index: usize,
        expected: usize,
    },

    #[error(
        "function `{function}`: construction of `{variant}` carries {got} values, variant declares {expected}"
    )]
    VariantArityMismatch {
        function: String,
        variant: String,
        got: usize,
        expected: usize,
    },

    #[error(
        "function `{function}`: call to `{callee}` still carries type arguments after monomorphization"
    )]
    ResidualTypeArgs { function: String, callee: String },
}
