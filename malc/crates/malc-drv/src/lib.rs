//! malc-drv - Pipeline driver for the Malphas compiler middle end
//!
//! Orchestrates the passes over a type-checked file:
//!
//! ```text
//! AST + TypeInfo → lower → validate → monomorphize → prune
//!                → (optional SSA) → emit LLVM IR text
//! ```
//!
//! The CLI entry point, parser, and type checker live outside this
//! repository; the driver is the library seam they call into.

mod error;

use std::path::Path;

use malc_mir::{Lowerer, Module};
use malc_sem::{ast, MethodTable, ModuleMap, Scope, TypeInfo};
use malc_util::Diagnostic;

pub use error::CompileError;

/// What the pipeline should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitKind {
    /// Human-readable MIR dump.
    Mir,
    /// Textual LLVM IR.
    #[default]
    Ir,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub emit: EmitKind,
    /// Run SSA construction before emission. The emitter accepts both
    /// forms; stack slots are the default.
    pub build_ssa: bool,
    /// Validate MIR invariants between passes.
    pub validate: bool,
    /// Drop unreachable blocks after lowering.
    pub prune: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emit: EmitKind::Ir,
            build_ssa: false,
            validate: true,
            prune: true,
        }
    }
}

/// Pipeline output: the emitted text plus accumulated warnings.
pub struct CompileOutput {
    pub text: String,
    pub warnings: Vec<Diagnostic>,
}

/// One compilation session over a type-checked file.
pub struct Compiler {
    config: Config,
}

impl Compiler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn compile(
        &self,
        file: &ast::File,
        info: &TypeInfo,
        scope: &Scope,
    ) -> Result<CompileOutput, CompileError> {
        self.compile_with(file, info, scope, None, None)
    }

    pub fn compile_with(
        &self,
        file: &ast::File,
        info: &TypeInfo,
        scope: &Scope,
        methods: Option<&MethodTable>,
        modules: Option<&ModuleMap>,
    ) -> Result<CompileOutput, CompileError> {
        let module = self.build_mir(file, info, scope, methods, modules)?;

        match self.config.emit {
            EmitKind::Mir => Ok(CompileOutput {
                text: malc_mir::print_module(&module),
                warnings: Vec::new(),
            }),
            EmitKind::Ir => {
                let emitted = malc_gen::emit_module(&module)?;
                Ok(CompileOutput {
                    text: emitted.ir,
                    warnings: emitted.diagnostics.iter().cloned().collect(),
                })
            }
        }
    }

    /// Run the pipeline and write the result to `path`.
    pub fn compile_to_file(
        &self,
        file: &ast::File,
        info: &TypeInfo,
        scope: &Scope,
        path: &Path,
    ) -> Result<CompileOutput, CompileError> {
        let output = self.compile(file, info, scope)?;
        std::fs::write(path, &output.text).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(output)
    }

    fn build_mir(
        &self,
        file: &ast::File,
        info: &TypeInfo,
        scope: &Scope,
        methods: Option<&MethodTable>,
        modules: Option<&ModuleMap>,
    ) -> Result<Module, CompileError> {
        let mut module = Lowerer::new(info, scope, methods, modules).lower_file(file)?;
        if self.config.validate {
            malc_mir::validate_module(&module)?;
        }

        malc_mono::monomorphize(&mut module)?;
        if self.config.validate {
            malc_mir::validate_monomorphized(&module)?;
        }

        if self.config.prune {
            malc_mir::prune_module(&mut module);
        }

        if self.config.build_ssa {
            module = malc_mir::ssa::build_module(&module);
        }
        Ok(module)
    }
}
