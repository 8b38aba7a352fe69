//! External compiler process
//!
//! Runs a command that reads source text on stdin and writes G-code on
//! stdout. A non-zero exit status is a rejection carrying stderr.

use pathlens_core::CompileError;
use pathlens_visualizer::Compiler;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: String,
    args: Vec<String>,
}

impl ProcessCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a shell-style command line on whitespace.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Compiler for ProcessCompiler {
    fn compile(&self, source: &str) -> Result<String, CompileError> {
        let unavailable = |e: std::io::Error| CompileError::Unavailable {
            reason: format!("{}: {}", self.program, e),
        };

        debug!("Running compiler {} {:?}", self.program, self.args);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(unavailable)?;

        // Written concurrently with reading stdout to avoid a pipe deadlock
        let writer = child.stdin.take().map(|mut stdin| {
            let source = source.to_owned();
            thread::spawn(move || stdin.write_all(source.as_bytes()))
        });
        let output = child.wait_with_output().map_err(unavailable)?;
        if let Some(Ok(Err(e))) = writer.map(|w| w.join()) {
            // The compiler may exit without consuming its input
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(unavailable(e));
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.program, output.status),
                diagnostic => diagnostic.to_string(),
            };
            return Err(CompileError::Rejected { message });
        }

        String::from_utf8(output.stdout).map_err(|e| CompileError::Rejected {
            message: format!("compiler output is not UTF-8: {}", e),
        })
    }
}
