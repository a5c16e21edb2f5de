//! Bytecode emission backend.

pub mod code;
pub mod generator;
pub mod labels;
pub mod opcodes;

pub use code::{Code, ExceptionTableEntry};
pub use generator::CodeGenerator;
