//! Driver-level error aggregation.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lowering failed: {0}")]
    Lower(#[from] malc_mir::LowerError),

    #[error("invalid MIR: {0}")]
    Validate(#[from] malc_mir::ValidateError),

    #[error("monomorphization failed: {0}")]
    Mono(#[from] malc_mono::MonoError),

    #[error("code generation failed: {0}")]
    CodeGen(#[from] malc_gen::CodeGenError),

    #[error("failed to write `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
