//! Diagnostics collaborator.
//!
//! The engine never surfaces internal inconsistencies here; everything below
//! is a user-facing problem attached to a precise source position.

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Problem categories reported by the try-construct engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKind {
    /// Catch clause that no statement in the try region can reach.
    UnreachableCatch { caught: String },
    /// A later catch clause is masked by an earlier, more general one.
    WrongSequenceOfExceptionTypes { caught: String, hidden_by: String },
    /// Same binding appears more than once in the resource list.
    DuplicateResourceReference { name: String },
    /// Resource type does not implement the closeable capability.
    ResourceHasToImplementAutoCloseable { type_name: String },
    /// Non-final field used in the resource position.
    CannotReferToNonFinalField { name: String },
    /// Local used in the resource position is reassigned somewhere.
    ResourceMustBeEffectivelyFinal { name: String },
    /// Finally block provably never falls through.
    FinallyMustCompleteNormally,
    /// Empty block without an explaining comment.
    UndocumentedEmptyBlock,
    /// Checked exception thrown with no handler in scope.
    UnhandledException { type_name: String },
    /// Local read before it is definitely assigned.
    UninitializedLocal { name: String },
    /// Final local possibly assigned both before and inside the finally block.
    FinalLocalMayAlreadyBeAssigned { name: String },
    /// Final local assigned more than once.
    FinalLocalReassigned { name: String },
    /// try-with-resources used below the Java 7 source level.
    ResourceManagementNotSupported,
    /// Existing reference used as a resource below the Java 9 source level.
    ResourceReferenceNotSupported,
}

impl ProblemKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            ProblemKind::UnreachableCatch { .. }
            | ProblemKind::WrongSequenceOfExceptionTypes { .. }
            | ProblemKind::ResourceHasToImplementAutoCloseable { .. }
            | ProblemKind::CannotReferToNonFinalField { .. }
            | ProblemKind::ResourceMustBeEffectivelyFinal { .. }
            | ProblemKind::UnhandledException { .. }
            | ProblemKind::UninitializedLocal { .. }
            | ProblemKind::FinalLocalMayAlreadyBeAssigned { .. }
            | ProblemKind::FinalLocalReassigned { .. }
            | ProblemKind::ResourceManagementNotSupported
            | ProblemKind::ResourceReferenceNotSupported => Severity::Error,
            ProblemKind::DuplicateResourceReference { .. }
            | ProblemKind::FinallyMustCompleteNormally
            | ProblemKind::UndocumentedEmptyBlock => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub kind: ProblemKind,
    pub severity: Severity,
    pub span: Span,
}

/// Append-only problem sink, one per compilation unit.
#[derive(Debug, Default)]
pub struct ProblemReporter {
    problems: Vec<Problem>,
}

impl ProblemReporter {
    pub fn new() -> Self {
        Self { problems: Vec::new() }
    }

    pub fn report(&mut self, kind: ProblemKind, span: Span) {
        let severity = kind.default_severity();
        self.problems.push(Problem { kind, severity, span });
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(|p| p.severity == Severity::Error)
    }

    /// True if some problem of the given shape was recorded.
    pub fn contains(&self, predicate: impl Fn(&ProblemKind) -> bool) -> bool {
        self.problems.iter().any(|p| predicate(&p.kind))
    }
}
