//! Reader for model description files.
//!
//! Model files are Lua scripts that build and return one big table. Only the
//! data subset is understood: assignments, table constructors, field access
//! and arithmetic. Anything that needs a real interpreter is rejected.

pub mod lexer;
pub mod parser;
pub mod value;

pub use parser::{parse_file, parse_str};
pub use value::{LuaKey, LuaTable, LuaValue};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LuaError {
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar { line: usize, ch: char },
    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },
    #[error("line {line}: unterminated long comment or string")]
    UnterminatedLong { line: usize },
    #[error("line {line}: invalid escape '\\{ch}'")]
    InvalidEscape { line: usize, ch: char },
    #[error("line {line}: malformed number '{text}'")]
    MalformedNumber { line: usize, text: String },
    #[error("line {line}: expected {expected}, found {found}")]
    Expected {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("line {line}: {what} is not supported in model files")]
    Unsupported { line: usize, what: String },
    #[error("line {line}: cannot {op} {operand}")]
    Type {
        line: usize,
        op: &'static str,
        operand: String,
    },
    #[error("line {line}: cannot index a {operand} value")]
    Index { line: usize, operand: String },
    #[error("{path}: expected {expected}, found {found}")]
    Shape {
        path: String,
        expected: &'static str,
        found: String,
    },
}
