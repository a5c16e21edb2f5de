//! Flow analysis and bytecode generation for the JVM try construct.
//!
//! The engine takes a resolved statement tree for one method body and runs
//! the three passes a compiler needs for try/catch/finally and
//! try-with-resources:
//!
//! - **resolve**: resource-list validation, multi-catch union expansion,
//!   catch specialization ordering, hidden-local allocation
//! - **flow**: definite assignment, reachability, exception-flow tracking
//!   and null-status propagation through every try shape
//! - **codegen**: bytecode emission, including the reverse-order close
//!   protocol with exception suppression and the inlined-finally machinery
//!   for abrupt exits
//!
//! Semantic problems are collected in a [`problem::ProblemReporter`]; the
//! `Result` channel is reserved for internal failures and the fatal abort.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod flow;
pub mod lookup;
pub mod problem;
pub mod resolve;
pub mod scope;

pub use config::{Config, SourceLevel};
pub use error::{Error, Result};

use crate::ast::Block;
use crate::codegen::{Code, CodeGenerator};
use crate::flow::analyzer::FlowAnalyzer;
use crate::lookup::TypeRegistry;
use crate::problem::{Problem, ProblemReporter};
use crate::resolve::Resolver;
use crate::scope::MethodScope;

/// Outcome of compiling one method body.
#[derive(Debug)]
pub struct MethodOutput {
    /// Generated bytecode; `None` when an error-severity problem was found.
    pub code: Option<Code>,
    pub problems: Vec<Problem>,
}

/// Run the full pipeline over one method body: resolve, analyse, and (if no
/// error-severity problem was recorded) generate code.
pub fn compile_method(
    registry: &TypeRegistry,
    config: &Config,
    scope: &mut MethodScope,
    body: &mut Block,
    class_name: &str,
) -> Result<MethodOutput> {
    let mut reporter = ProblemReporter::new();

    Resolver::new(scope, registry, config, &mut reporter).resolve_method_body(body);
    FlowAnalyzer::new(scope, registry, config, &mut reporter).analyse_method_body(body);
    tracing::debug!(
        problems = reporter.problems().len(),
        snapshots = scope.recorded_state_count(),
        "analysis complete"
    );

    let code = if reporter.has_errors() {
        None
    } else {
        Some(CodeGenerator::new(scope, registry, class_name).generate_method_body(body)?)
    };
    Ok(MethodOutput { code, problems: reporter.problems().to_vec() })
}
