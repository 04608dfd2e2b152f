//! MicroC: a small C-like teaching language with `int`/`bool` values,
//! functions, `if`/`while` and a `print` expression.
//!
//! Source goes through [`parser::parse_program`], is optionally checked by
//! [`semantic::analyze_program`], and is executed from `main` by
//! [`interpreter::Interpreter`].

pub mod ast;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod semantic;

pub use ast::Program;
pub use error::MicroError;
pub use interpreter::{run_program, Interpreter, Value};
pub use parser::{parse_program, ParseError};
pub use semantic::analyze_program;

use std::io::Write;
use tracing::warn;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How a failed semantic analysis affects evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisPolicy {
    /// Refuse to evaluate a program that fails analysis.
    #[default]
    Strict,
    /// Log analysis errors, then evaluate anyway.
    Advisory,
    /// Skip analysis.
    Off,
}

/// Analyze `program` according to `policy`, then run it from `main`.
pub fn check_and_run<W: Write>(
    program: &Program,
    policy: AnalysisPolicy,
    interpreter: &mut Interpreter<W>,
) -> Result<Value, MicroError> {
    match policy {
        AnalysisPolicy::Strict => analyze_program(program)?,
        AnalysisPolicy::Advisory => {
            if let Err(e) = analyze_program(program) {
                warn!(error = %e, "semantic analysis failed, evaluating anyway");
            }
        }
        AnalysisPolicy::Off => {}
    }
    interpreter.run(program)
}
