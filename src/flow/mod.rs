//! Definite-assignment and exception-flow analysis.

pub mod analyzer;
pub mod context;
pub mod info;
