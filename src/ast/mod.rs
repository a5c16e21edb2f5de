//! Statement/expression subset consumed by the try-construct engine.
//!
//! This is a closed tagged-variant set: the engine dispatches by matching on
//! the variant, not through an open subclass hierarchy. Name binding and type
//! resolution have already happened; every node carries resolved ids.

use bitflags::bitflags;

use crate::lookup::{FieldId, TypeId};
use crate::scope::{LocalId, StateIndex};

/// Source range, for diagnostics and position mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }
}

bitflags! {
    /// Analysis tag bits, written once per compilation pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatementBits: u8 {
        const IS_REACHABLE = 1 << 0;
        /// The try block's own exit state is unreachable.
        const IS_TRY_BLOCK_EXITING = 1 << 1;
        /// The finally block provably never completes normally.
        const IS_FINALLY_BLOCK_ESCAPING = 1 << 2;
        /// Empty block that carries an explaining comment.
        const DOCUMENTED_EMPTY_BLOCK = 1 << 3;
    }
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub name: String,
    pub arguments: Vec<Expr>,
    /// Checked exceptions declared on the resolved target method.
    pub declared_thrown: Vec<TypeId>,
    pub return_type: Option<TypeId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Null(Span),
    IntLiteral(i32, Span),
    /// Instance creation; the value is definitely non-null.
    New { type_id: TypeId, span: Span },
    Read { local: LocalId, span: Span },
    FieldRead { field: FieldId, span: Span },
    Call(CallExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Null(span) | Expr::IntLiteral(_, span) => *span,
            Expr::New { span, .. } | Expr::Read { span, .. } | Expr::FieldRead { span, .. } => *span,
            Expr::Call(call) => call.span,
        }
    }

    /// Static type of the expression where one is known.
    pub fn static_type(&self) -> Option<TypeId> {
        match self {
            Expr::New { type_id, .. } => Some(*type_id),
            Expr::Call(call) => call.return_type,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
    pub bits: StatementBits,
}

impl Block {
    pub fn new(statements: Vec<Stmt>, span: Span) -> Self {
        Block { statements, span, bits: StatementBits::empty() }
    }

    pub fn is_empty_block(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Empty(Span),
    Expression(Expr),
    LocalDeclaration { local: LocalId, initializer: Option<Expr>, span: Span },
    Assign { local: LocalId, value: Expr, span: Span },
    If { condition: Expr, then_block: Block, else_block: Option<Block>, span: Span },
    /// Infinite loop; completes only via `break`.
    Loop { body: Block, span: Span },
    Break { span: Span },
    Continue { span: Span },
    Return { value: Option<Expr>, span: Span },
    Throw { exception: Expr, span: Span },
    Try(Box<TryStatement>),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Empty(span) => *span,
            Stmt::Expression(expr) => expr.span(),
            Stmt::LocalDeclaration { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Loop { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Return { span, .. }
            | Stmt::Throw { span, .. } => *span,
            Stmt::Try(try_stmt) => try_stmt.span,
        }
    }
}

/// A resource in the try header: either a fresh declaration or an existing
/// effectively-final reference.
#[derive(Debug, Clone)]
pub enum Resource {
    Declaration { local: LocalId, type_id: TypeId, initializer: Expr, span: Span },
    Reference { target: ResourceTarget, span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceTarget {
    Local(LocalId),
    Field(FieldId),
}

impl Resource {
    pub fn span(&self) -> Span {
        match self {
            Resource::Declaration { span, .. } | Resource::Reference { span, .. } => *span,
        }
    }
}

/// One catch clause argument. More than one type means a multi-catch union;
/// for specialization-ordering purposes the union expands to one throwable
/// type per alternative.
#[derive(Debug, Clone)]
pub struct CatchArgument {
    pub local: LocalId,
    pub types: Vec<TypeId>,
    pub span: Span,
}

impl CatchArgument {
    pub fn is_union(&self) -> bool {
        self.types.len() > 1
    }
}

/// Completion classification of the finally block, derived once after flow
/// analysis. Drives both merging and the code generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinallyMode {
    NoFinally,
    /// Finally never falls through; a single shared block suffices.
    DoesNotComplete,
    /// Finally may complete normally and is inlined at each exit point.
    Inline,
}

/// The try/catch/finally/try-with-resources statement.
///
/// Built by parsing, mutated during resolution (secret locals allocated,
/// caught-exception list computed), flow-analyzed once, code-generated once.
/// The bookkeeping fields are written exactly once per compilation pass.
#[derive(Debug, Clone)]
pub struct TryStatement {
    pub resources: Vec<Resource>,
    pub try_block: Block,
    pub catch_arguments: Vec<CatchArgument>,
    pub catch_blocks: Vec<Block>,
    pub finally_block: Option<Block>,
    pub span: Span,
    pub bits: StatementBits,

    // derived binding state, set by resolve()
    /// Union-expanded caught types, in clause order.
    pub caught_exception_types: Vec<TypeId>,
    /// Owning catch-block index per expanded caught type.
    pub caught_exceptions_catch_blocks: Vec<usize>,
    pub primary_exception_variable: Option<LocalId>,
    pub caught_throwable_variable: Option<LocalId>,
    pub any_exception_variable: Option<LocalId>,
    pub secret_return_value: Option<LocalId>,

    // analysis bookkeeping, set by the flow analyzer
    pub catch_exits: Vec<bool>,
    pub pre_try_init_state_index: Option<StateIndex>,
    pub post_resources_init_state_indexes: Vec<StateIndex>,
    pub post_try_init_state_index: Option<StateIndex>,
    pub catch_exit_init_state_indexes: Vec<Option<StateIndex>>,
    pub natural_exit_merge_init_state_index: Option<StateIndex>,
    pub merged_init_state_index: Option<StateIndex>,
}

impl TryStatement {
    pub fn new(
        resources: Vec<Resource>,
        try_block: Block,
        catch_arguments: Vec<CatchArgument>,
        catch_blocks: Vec<Block>,
        finally_block: Option<Block>,
        span: Span,
    ) -> Self {
        debug_assert_eq!(catch_arguments.len(), catch_blocks.len());
        TryStatement {
            resources,
            try_block,
            catch_arguments,
            catch_blocks,
            finally_block,
            span,
            bits: StatementBits::empty(),
            caught_exception_types: Vec::new(),
            caught_exceptions_catch_blocks: Vec::new(),
            primary_exception_variable: None,
            caught_throwable_variable: None,
            any_exception_variable: None,
            secret_return_value: None,
            catch_exits: Vec::new(),
            pre_try_init_state_index: None,
            post_resources_init_state_indexes: Vec::new(),
            post_try_init_state_index: None,
            catch_exit_init_state_indexes: Vec::new(),
            natural_exit_merge_init_state_index: None,
            merged_init_state_index: None,
        }
    }

    /// The finally block that actually needs machinery: present and
    /// non-empty. An empty finally block behaves like no finally at all.
    pub fn effective_finally(&self) -> Option<&Block> {
        self.finally_block.as_ref().filter(|block| !block.is_empty_block())
    }

    pub fn finally_mode(&self) -> FinallyMode {
        if self.effective_finally().is_none() {
            FinallyMode::NoFinally
        } else if self.bits.contains(StatementBits::IS_FINALLY_BLOCK_ESCAPING) {
            FinallyMode::DoesNotComplete
        } else {
            FinallyMode::Inline
        }
    }

    /// True if the resource at `index` refers to the same binding as an
    /// earlier resource in the list. Duplicates are closed only once.
    pub fn is_duplicate_resource(&self, index: usize) -> bool {
        let target = match &self.resources[index] {
            Resource::Reference { target, .. } => *target,
            Resource::Declaration { .. } => return false,
        };
        self.resources[..index].iter().any(|earlier| match earlier {
            Resource::Reference { target: seen, .. } => *seen == target,
            Resource::Declaration { local, .. } => {
                matches!(target, ResourceTarget::Local(l) if l == *local)
            }
        })
    }

    /// True if the catch block at the given index covers an unchecked
    /// exception through any of its (possibly union) alternatives.
    pub fn is_unchecked_catch_block(
        &self,
        catch_block: usize,
        registry: &crate::lookup::TypeRegistry,
    ) -> bool {
        self.caught_exception_types
            .iter()
            .zip(&self.caught_exceptions_catch_blocks)
            .any(|(&caught, &owner)| owner == catch_block && registry.is_unchecked_exception(caught))
    }

    /// Syntactic completion query used by enclosing-statement analysis:
    /// the construct completes normally only if some try/catch path does
    /// and the finally (if any) falls through.
    pub fn does_not_complete_normally(&self) -> bool {
        let finally_escapes = || {
            self.finally_block
                .as_ref()
                .map(|block| block.does_not_complete_normally())
                .unwrap_or(false)
        };
        if !self.try_block.does_not_complete_normally() {
            return finally_escapes();
        }
        for catch_block in &self.catch_blocks {
            if !catch_block.does_not_complete_normally() {
                return finally_escapes();
            }
        }
        true
    }

    /// True if some path completes this construct via `continue`.
    pub fn completes_by_continue(&self) -> bool {
        let through_finally = || match &self.finally_block {
            None => true,
            Some(finally) => !finally.does_not_complete_normally() || finally.completes_by_continue(),
        };
        if self.try_block.completes_by_continue() && through_finally() {
            return true;
        }
        if self.catch_blocks.iter().any(|block| block.completes_by_continue()) && through_finally() {
            return true;
        }
        self.finally_block
            .as_ref()
            .map(|block| block.completes_by_continue())
            .unwrap_or(false)
    }
}

impl Block {
    /// Conservative syntactic check: every path through the block ends in
    /// return/throw/continue or an escaping nested construct.
    pub fn does_not_complete_normally(&self) -> bool {
        self.statements.iter().any(|stmt| stmt.does_not_complete_normally())
    }

    pub fn completes_by_continue(&self) -> bool {
        self.statements.iter().any(|stmt| stmt.completes_by_continue())
    }
}

impl Stmt {
    pub fn does_not_complete_normally(&self) -> bool {
        match self {
            Stmt::Return { .. } | Stmt::Throw { .. } | Stmt::Continue { .. } => true,
            Stmt::If { then_block, else_block: Some(else_block), .. } => {
                then_block.does_not_complete_normally() && else_block.does_not_complete_normally()
            }
            // an infinite loop completes only via break
            Stmt::Loop { body, .. } => !body.contains_top_level_break(),
            Stmt::Try(try_stmt) => try_stmt.does_not_complete_normally(),
            _ => false,
        }
    }

    pub fn completes_by_continue(&self) -> bool {
        match self {
            Stmt::Continue { .. } => true,
            Stmt::If { then_block, else_block, .. } => {
                then_block.completes_by_continue()
                    || else_block.as_ref().map(|b| b.completes_by_continue()).unwrap_or(false)
            }
            Stmt::Try(try_stmt) => try_stmt.completes_by_continue(),
            _ => false,
        }
    }
}

impl Block {
    /// A `break` belonging to this block's own loop level (not shadowed by a
    /// nested loop).
    fn contains_top_level_break(&self) -> bool {
        self.statements.iter().any(|stmt| match stmt {
            Stmt::Break { .. } => true,
            Stmt::If { then_block, else_block, .. } => {
                then_block.contains_top_level_break()
                    || else_block.as_ref().map(|b| b.contains_top_level_break()).unwrap_or(false)
            }
            Stmt::Try(try_stmt) => {
                try_stmt.try_block.contains_top_level_break()
                    || try_stmt.catch_blocks.iter().any(|b| b.contains_top_level_break())
                    || try_stmt
                        .finally_block
                        .as_ref()
                        .map(|b| b.contains_top_level_break())
                        .unwrap_or(false)
            }
            _ => false,
        })
    }
}
