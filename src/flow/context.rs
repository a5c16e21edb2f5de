//! Flow contexts: the chain of nested handlers threading early-exit
//! information (return/break/continue/throw) to enclosing scopes.
//!
//! The chain is caller-owned and strictly tree-shaped, rooted at the
//! enclosing method. Contexts live in an arena owned by the analysis call
//! and are discarded wholesale when it returns; nodes refer to their parent
//! by id, never by alias.

use crate::ast::Span;
use crate::flow::info::FlowInfo;
use crate::lookup::{TypeId, TypeRegistry};
use crate::scope::LocalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextId(pub usize);

/// One expanded caught exception: a multi-catch union contributes one entry
/// per alternative, all owned by the same catch block.
#[derive(Debug, Clone)]
pub struct CaughtException {
    pub type_id: TypeId,
    pub catch_block: usize,
}

#[derive(Debug)]
pub struct ExceptionHandlerContext {
    pub caught: Vec<CaughtException>,
    /// Accumulated "state on exception", per catch block.
    inits_on_exception: Vec<FlowInfo>,
    /// Whether any throw site reached the expanded caught entry.
    exception_recorded: Vec<bool>,
    /// Accumulated "state on return" for deferred-assignment checking.
    inits_on_return: FlowInfo,
    /// Null facts gathered on the way to the finally block.
    inits_on_finally: FlowInfo,
}

#[derive(Debug)]
pub struct FinallyContext {
    /// Final-variable assignments observed while analyzing the finally
    /// block, re-checked against the try/catch outcome afterwards.
    deferred_final_assignments: Vec<(LocalId, Span)>,
}

#[derive(Debug)]
pub struct InsideFinallyContext {
    /// Returns crossing this statement-with-finally must contribute their
    /// initializations to the finally's deferred checking.
    inits_on_return: FlowInfo,
}

#[derive(Debug)]
pub struct LoopContext {
    inits_on_break: FlowInfo,
}

#[derive(Debug)]
pub enum ContextKind {
    Root,
    ExceptionHandler(ExceptionHandlerContext),
    Finally(FinallyContext),
    InsideStatementWithFinally(InsideFinallyContext),
    Loop(LoopContext),
}

#[derive(Debug)]
struct ContextNode {
    parent: Option<ContextId>,
    kind: ContextKind,
}

/// Arena of flow contexts for one method analysis.
#[derive(Debug)]
pub struct FlowContexts {
    nodes: Vec<ContextNode>,
    local_count: usize,
}

impl FlowContexts {
    pub fn new(local_count: usize) -> (Self, ContextId) {
        let contexts = FlowContexts {
            nodes: vec![ContextNode { parent: None, kind: ContextKind::Root }],
            local_count,
        };
        (contexts, ContextId(0))
    }

    fn push(&mut self, parent: ContextId, kind: ContextKind) -> ContextId {
        let id = ContextId(self.nodes.len());
        self.nodes.push(ContextNode { parent: Some(parent), kind });
        id
    }

    pub fn push_exception_handler(
        &mut self,
        parent: ContextId,
        caught: Vec<CaughtException>,
        catch_count: usize,
    ) -> ContextId {
        let dead = FlowInfo::dead_end(self.local_count);
        let recorded = vec![false; caught.len()];
        self.push(
            parent,
            ContextKind::ExceptionHandler(ExceptionHandlerContext {
                caught,
                inits_on_exception: vec![dead.clone(); catch_count],
                exception_recorded: recorded,
                inits_on_return: dead.clone(),
                inits_on_finally: dead,
            }),
        )
    }

    pub fn push_finally(&mut self, parent: ContextId) -> ContextId {
        self.push(parent, ContextKind::Finally(FinallyContext { deferred_final_assignments: Vec::new() }))
    }

    pub fn push_inside_statement_with_finally(&mut self, parent: ContextId) -> ContextId {
        self.push(
            parent,
            ContextKind::InsideStatementWithFinally(InsideFinallyContext {
                inits_on_return: FlowInfo::dead_end(self.local_count),
            }),
        )
    }

    pub fn push_loop(&mut self, parent: ContextId) -> ContextId {
        self.push(parent, ContextKind::Loop(LoopContext { inits_on_break: FlowInfo::dead_end(self.local_count) }))
    }

    fn parent_of(&self, id: ContextId) -> Option<ContextId> {
        self.nodes[id.0].parent
    }

    /// Walk outward from the throw site, accumulating the state at the
    /// throw into every handler whose caught type is compatible. Returns
    /// true if some handler definitely catches the exception; a handler
    /// catching only a subtype records the state but the walk continues.
    ///
    /// `_is_close_call` distinguishes synthetic close() throw sites from
    /// explicit ones; both register coverage identically.
    pub fn check_exception_handlers(
        &mut self,
        start: ContextId,
        thrown: TypeId,
        state: &FlowInfo,
        registry: &TypeRegistry,
        _is_close_call: bool,
    ) -> bool {
        let unconditional = state.unconditional_copy();
        let mut current = Some(start);
        while let Some(id) = current {
            let parent = self.parent_of(id);
            if let ContextKind::ExceptionHandler(handler) = &mut self.nodes[id.0].kind {
                // exceptional exits carry their null facts to the finally
                handler.inits_on_finally = handler.inits_on_finally.merged_with(&unconditional);
                let mut definitely_caught = false;
                for (index, entry) in handler.caught.iter().enumerate() {
                    if registry.is_compatible_with(thrown, entry.type_id) {
                        handler.exception_recorded[index] = true;
                        handler.inits_on_exception[entry.catch_block] =
                            handler.inits_on_exception[entry.catch_block].merged_with(&unconditional);
                        definitely_caught = true;
                        break;
                    }
                    if registry.is_compatible_with(entry.type_id, thrown) {
                        // the handler catches a specialization of the thrown type
                        handler.exception_recorded[index] = true;
                        handler.inits_on_exception[entry.catch_block] =
                            handler.inits_on_exception[entry.catch_block].merged_with(&unconditional);
                    }
                }
                if definitely_caught {
                    return true;
                }
            }
            current = parent;
        }
        // unchecked exceptions are implicitly caught by the outermost frame
        registry.is_unchecked_exception(thrown)
    }

    /// Record a `return` crossing all enclosing handler and
    /// statement-with-finally scopes.
    pub fn record_return(&mut self, start: ContextId, state: &FlowInfo) {
        let unconditional = state.unconditional_copy();
        let mut current = Some(start);
        while let Some(id) = current {
            let parent = self.parent_of(id);
            match &mut self.nodes[id.0].kind {
                ContextKind::ExceptionHandler(handler) => {
                    handler.inits_on_return = handler.inits_on_return.merged_with(&unconditional);
                    handler.inits_on_finally = handler.inits_on_finally.merged_with(&unconditional);
                }
                ContextKind::InsideStatementWithFinally(inside) => {
                    inside.inits_on_return = inside.inits_on_return.merged_with(&unconditional);
                }
                _ => {}
            }
            current = parent;
        }
    }

    /// Record a `break` into the nearest enclosing loop. Returns false when
    /// no loop encloses the site.
    pub fn record_break(&mut self, start: ContextId, state: &FlowInfo) -> bool {
        let mut current = Some(start);
        while let Some(id) = current {
            let parent = self.parent_of(id);
            if let ContextKind::Loop(loop_ctx) = &mut self.nodes[id.0].kind {
                loop_ctx.inits_on_break = loop_ctx.inits_on_break.merged_with(state);
                return true;
            }
            current = parent;
        }
        false
    }

    /// A `continue` transfers to the loop header; no facts survive it.
    pub fn record_continue(&mut self, start: ContextId) -> bool {
        let mut current = Some(start);
        while let Some(id) = current {
            if matches!(self.nodes[id.0].kind, ContextKind::Loop(_)) {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Propagate null facts gathered by a nested try's finally accumulator
    /// into the nearest enclosing try's own accumulator, if any.
    pub fn merge_finally_null_info(&mut self, start: ContextId, accumulated: &FlowInfo) {
        let mut current = Some(start);
        while let Some(id) = current {
            let parent = self.parent_of(id);
            if let ContextKind::ExceptionHandler(handler) = &mut self.nodes[id.0].kind {
                handler.inits_on_finally =
                    handler.inits_on_finally.clone().add_null_info_from(accumulated);
                return;
            }
            current = parent;
        }
    }

    /// Defer a final-variable assignment check if it happens inside a
    /// finally block under analysis. Returns true when deferred.
    pub fn record_final_assignment(&mut self, start: ContextId, local: LocalId, span: Span) -> bool {
        let mut current = Some(start);
        while let Some(id) = current {
            let parent = self.parent_of(id);
            if let ContextKind::Finally(finally) = &mut self.nodes[id.0].kind {
                finally.deferred_final_assignments.push((local, span));
                return true;
            }
            current = parent;
        }
        false
    }

    /// Final-variable assignments inside the finally block that were
    /// potentially already performed by the try/catch region.
    pub fn deferred_final_violations(
        &self,
        finally_ctx: ContextId,
        try_catch_info: &FlowInfo,
    ) -> Vec<(LocalId, Span)> {
        match &self.nodes[finally_ctx.0].kind {
            ContextKind::Finally(finally) => finally
                .deferred_final_assignments
                .iter()
                .filter(|(local, _)| try_catch_info.is_potentially_assigned(*local))
                .copied()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn handler(&self, id: ContextId) -> &ExceptionHandlerContext {
        match &self.nodes[id.0].kind {
            ContextKind::ExceptionHandler(handler) => handler,
            _ => panic!("not an exception handling context"),
        }
    }

    pub fn inits_on_exception(&self, id: ContextId, catch_block: usize) -> FlowInfo {
        self.handler(id).inits_on_exception[catch_block].clone()
    }

    pub fn inits_on_return(&self, id: ContextId) -> FlowInfo {
        match &self.nodes[id.0].kind {
            ContextKind::ExceptionHandler(handler) => handler.inits_on_return.clone(),
            ContextKind::InsideStatementWithFinally(inside) => inside.inits_on_return.clone(),
            _ => FlowInfo::dead_end(self.local_count),
        }
    }

    pub fn inits_on_finally(&self, id: ContextId) -> FlowInfo {
        self.handler(id).inits_on_finally.clone()
    }

    pub fn loop_inits_on_break(&self, id: ContextId) -> FlowInfo {
        match &self.nodes[id.0].kind {
            ContextKind::Loop(loop_ctx) => loop_ctx.inits_on_break.clone(),
            _ => FlowInfo::dead_end(self.local_count),
        }
    }

    /// Expanded caught entries that no throw site in the protected region
    /// could reach, as (expanded index, type, owning catch block).
    pub fn unused_caught_entries(&self, id: ContextId) -> Vec<(usize, TypeId, usize)> {
        let handler = self.handler(id);
        handler
            .caught
            .iter()
            .enumerate()
            .filter(|(index, _)| !handler.exception_recorded[*index])
            .map(|(index, entry)| (index, entry.type_id, entry.catch_block))
            .collect()
    }
}
