//! Compiler boundary
//!
//! The viewer only needs G-code text. Source programs written in a higher
//! level language are turned into G-code by an external compiler reached
//! through this trait; its output is treated as opaque text.

use pathlens_core::CompileError;

/// Turns source text into G-code text.
pub trait Compiler {
    fn compile(&self, source: &str) -> Result<String, CompileError>;
}

/// Treats the source as G-code already.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

impl Compiler for PassthroughCompiler {
    fn compile(&self, source: &str) -> Result<String, CompileError> {
        Ok(source.to_string())
    }
}

impl<F> Compiler for F
where
    F: Fn(&str) -> Result<String, CompileError>,
{
    fn compile(&self, source: &str) -> Result<String, CompileError> {
        self(source)
    }
}
