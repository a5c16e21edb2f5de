//! Definite-assignment and exception-flow analysis over the statement set.
//!
//! The analyzer walks each method body exactly once, threading a `FlowInfo`
//! value through every statement. Try statements additionally record
//! initialization-state snapshots into the method scope for the code
//! generator to restore at its jump targets.

use crate::ast::{
    Block, CatchArgument, Expr, Resource, ResourceTarget, Span, StatementBits, Stmt, TryStatement,
};
use crate::config::Config;
use crate::flow::context::{CaughtException, ContextId, FlowContexts};
use crate::flow::info::{FlowInfo, NullStatus, ReachMode};
use crate::lookup::{TypeId, TypeRegistry};
use crate::problem::{ProblemKind, ProblemReporter};
use crate::scope::{LocalId, MethodScope};

/// One flow-analysis pass over a method body.
pub struct FlowAnalyzer<'a> {
    scope: &'a mut MethodScope,
    registry: &'a TypeRegistry,
    config: &'a Config,
    reporter: &'a mut ProblemReporter,
    contexts: FlowContexts,
    root: ContextId,
    /// Close obligations recorded for existing-reference resources, consumed
    /// by the resource-leak analysis downstream.
    close_obligations: Vec<(ResourceTarget, Span)>,
}

impl<'a> FlowAnalyzer<'a> {
    pub fn new(
        scope: &'a mut MethodScope,
        registry: &'a TypeRegistry,
        config: &'a Config,
        reporter: &'a mut ProblemReporter,
    ) -> Self {
        let (contexts, root) = FlowContexts::new(scope.local_count());
        FlowAnalyzer { scope, registry, config, reporter, contexts, root, close_obligations: Vec::new() }
    }

    pub fn close_obligations(&self) -> &[(ResourceTarget, Span)] {
        &self.close_obligations
    }

    /// Analyse a whole method body and return its exit state.
    pub fn analyse_method_body(&mut self, body: &mut Block) -> FlowInfo {
        let initial = FlowInfo::initial(self.scope.local_count());
        let root = self.root;
        self.analyse_block(body, root, initial)
    }

    fn analyse_block(&mut self, block: &mut Block, ctx: ContextId, mut info: FlowInfo) -> FlowInfo {
        if info.is_reachable() {
            block.bits |= StatementBits::IS_REACHABLE;
        }
        for statement in &mut block.statements {
            info = self.analyse_statement(statement, ctx, info);
        }
        info
    }

    fn analyse_statement(&mut self, statement: &mut Stmt, ctx: ContextId, info: FlowInfo) -> FlowInfo {
        match statement {
            Stmt::Empty(_) => info,
            Stmt::Expression(expr) => self.analyse_expression(expr, ctx, info),
            Stmt::LocalDeclaration { local, initializer, .. } => {
                let local = *local;
                match initializer {
                    Some(value) => {
                        let mut info = self.analyse_expression(value, ctx, info);
                        info.mark_as_definitely_assigned(local);
                        self.track_assigned_null_status(&mut info, local, value);
                        info
                    }
                    None => info,
                }
            }
            Stmt::Assign { local, value, span } => {
                let (local, span) = (*local, *span);
                let mut info = self.analyse_expression(value, ctx, info);
                self.check_finality(local, span, &info, ctx);
                info.mark_as_definitely_assigned(local);
                self.track_assigned_null_status(&mut info, local, value);
                info
            }
            Stmt::If { condition, then_block, else_block, .. } => {
                let info = self.analyse_expression(condition, ctx, info);
                let then_info = self.analyse_block(then_block, ctx, info.clone());
                let else_info = match else_block {
                    Some(block) => self.analyse_block(block, ctx, info),
                    None => info,
                };
                then_info.merged_with(&else_info)
            }
            Stmt::Loop { body, .. } => {
                let loop_ctx = self.contexts.push_loop(ctx);
                self.analyse_block(body, loop_ctx, info);
                // the loop has no exit condition: only break reaches past it
                self.contexts.loop_inits_on_break(loop_ctx)
            }
            Stmt::Break { .. } => {
                self.contexts.record_break(ctx, &info);
                FlowInfo::dead_end(self.scope.local_count())
            }
            Stmt::Continue { .. } => {
                self.contexts.record_continue(ctx);
                FlowInfo::dead_end(self.scope.local_count())
            }
            Stmt::Return { value, .. } => {
                let info = match value {
                    Some(expr) => self.analyse_expression(expr, ctx, info),
                    None => info,
                };
                self.contexts.record_return(ctx, &info);
                FlowInfo::dead_end(self.scope.local_count())
            }
            Stmt::Throw { exception, span } => {
                let span = *span;
                let info = self.analyse_expression(exception, ctx, info);
                let thrown = self.thrown_type(exception);
                self.check_thrown(thrown, &info, ctx, span, false);
                FlowInfo::dead_end(self.scope.local_count())
            }
            Stmt::Try(try_statement) => self.analyse_try(try_statement, ctx, info),
        }
    }

    fn analyse_expression(&mut self, expr: &Expr, ctx: ContextId, info: FlowInfo) -> FlowInfo {
        match expr {
            Expr::Null(_) | Expr::IntLiteral(_, _) | Expr::New { .. } | Expr::FieldRead { .. } => info,
            Expr::Read { local, span } => {
                if info.is_reachable()
                    && !info.is_definitely_assigned(*local)
                    && !self.scope.local(*local).is_secret
                {
                    self.reporter.report(
                        ProblemKind::UninitializedLocal { name: self.scope.local(*local).name.clone() },
                        *span,
                    );
                }
                info
            }
            Expr::Call(call) => {
                let mut info = info;
                for argument in &call.arguments {
                    info = self.analyse_expression(argument, ctx, info);
                }
                for &thrown in &call.declared_thrown {
                    self.check_thrown(thrown, &info, ctx, call.span, false);
                }
                info
            }
        }
    }

    /// Register a thrown type with every enclosing handler and report it if
    /// it is checked and escapes the method.
    fn check_thrown(
        &mut self,
        thrown: TypeId,
        info: &FlowInfo,
        ctx: ContextId,
        span: Span,
        is_close_call: bool,
    ) {
        let caught =
            self.contexts.check_exception_handlers(ctx, thrown, info, self.registry, is_close_call);
        if !caught && self.registry.is_checked_exception(thrown) {
            self.reporter.report(
                ProblemKind::UnhandledException { type_name: self.registry.name(thrown).to_string() },
                span,
            );
        }
    }

    fn thrown_type(&self, expr: &Expr) -> TypeId {
        match expr {
            Expr::Read { local, .. } => self.scope.local(*local).type_id,
            Expr::FieldRead { field, .. } => self.registry.field(*field).type_id,
            _ => expr.static_type().unwrap_or(self.registry.well_known().throwable),
        }
    }

    fn check_finality(&mut self, local: LocalId, span: Span, info: &FlowInfo, ctx: ContextId) {
        let binding = self.scope.local(local);
        let name = binding.name.clone();
        if binding.has_to_be_effectively_final {
            // the one initializing assignment of a deferred-initialized
            // binding is permitted; any further assignment is not
            if info.is_potentially_assigned(local) {
                self.reporter.report(ProblemKind::ResourceMustBeEffectivelyFinal { name }, span);
            }
            return;
        }
        if binding.is_final {
            // assignments inside a finally block are checked after the
            // try/catch outcome is known
            if self.contexts.record_final_assignment(ctx, local, span) {
                return;
            }
            if info.is_potentially_assigned(local) {
                self.reporter.report(ProblemKind::FinalLocalReassigned { name }, span);
            }
        }
    }

    fn track_assigned_null_status(&self, info: &mut FlowInfo, local: LocalId, value: &Expr) {
        if !self.config.null_analysis {
            return;
        }
        let status = match value {
            Expr::Null(_) => NullStatus::DefinitelyNull,
            Expr::New { .. } => NullStatus::DefinitelyNonNull,
            Expr::Read { local: source, .. } => info.null_status(*source),
            _ => NullStatus::Unknown,
        };
        info.set_null_status(local, status);
    }

    // ------------------------------------------------------------------
    // try statement
    // ------------------------------------------------------------------

    fn analyse_try(&mut self, stmt: &mut TryStatement, ctx: ContextId, flow_info: FlowInfo) -> FlowInfo {
        if flow_info.is_reachable() {
            stmt.bits |= StatementBits::IS_REACHABLE;
        }
        stmt.pre_try_init_state_index = Some(self.scope.record_initialization_states(&flow_info));
        stmt.catch_exits = vec![false; stmt.catch_blocks.len()];
        stmt.catch_exit_init_state_indexes = vec![None; stmt.catch_blocks.len()];

        let caught: Vec<CaughtException> = stmt
            .caught_exception_types
            .iter()
            .zip(&stmt.caught_exceptions_catch_blocks)
            .map(|(&type_id, &catch_block)| CaughtException { type_id, catch_block })
            .collect();

        if stmt.effective_finally().is_none() {
            self.analyse_try_without_finally(stmt, ctx, flow_info, caught)
        } else {
            self.analyse_try_with_finally(stmt, ctx, flow_info, caught)
        }
    }

    fn analyse_try_without_finally(
        &mut self,
        stmt: &mut TryStatement,
        ctx: ContextId,
        flow_info: FlowInfo,
        caught: Vec<CaughtException>,
    ) -> FlowInfo {
        let handling_ctx =
            self.contexts.push_exception_handler(ctx, caught, stmt.catch_blocks.len());

        let mut try_info = flow_info.clone();
        try_info = self.analyse_resources(stmt, handling_ctx, try_info);
        try_info = self.analyse_block(&mut stmt.try_block, handling_ctx, try_info);
        if try_info.is_unreachable() {
            stmt.bits |= StatementBits::IS_TRY_BLOCK_EXITING;
        }
        stmt.post_try_init_state_index = Some(self.scope.record_initialization_states(&try_info));
        self.reset_resource_bindings(stmt, &mut try_info);
        self.complain_if_unused_exception_handlers(stmt, handling_ctx);

        for index in 0..stmt.catch_blocks.len() {
            let catch_info = self.prepare_catch_info(stmt, handling_ctx, &flow_info, &try_info, index);
            // exceptions raised inside a catch block escape to the enclosing
            // context, never back into this statement's own handlers
            let catch_info = self.analyse_block(&mut stmt.catch_blocks[index], ctx, catch_info);
            stmt.catch_exit_init_state_indexes[index] =
                Some(self.scope.record_initialization_states(&catch_info));
            stmt.catch_exits[index] = catch_info.is_unreachable();
            try_info = try_info.merged_with(&catch_info.unconditional_inits());
        }

        let finally_facts = self.contexts.inits_on_finally(handling_ctx);
        self.contexts.merge_finally_null_info(ctx, &finally_facts);
        stmt.merged_init_state_index = Some(self.scope.record_initialization_states(&try_info));
        try_info
    }

    fn analyse_try_with_finally(
        &mut self,
        stmt: &mut TryStatement,
        ctx: ContextId,
        flow_info: FlowInfo,
        caught: Vec<CaughtException>,
    ) -> FlowInfo {
        // the finally block is analysed first, against the incoming state
        // stripped of null facts (it can be entered from anywhere)
        let finally_ctx = self.contexts.push_finally(ctx);
        let finally_block = match stmt.finally_block.as_mut() {
            Some(block) => block,
            None => return flow_info,
        };
        let sub_info = self
            .analyse_block(finally_block, finally_ctx, flow_info.null_info_less_unconditional_copy())
            .unconditional_inits();
        if sub_info.is_unreachable() {
            stmt.bits |= StatementBits::IS_FINALLY_BLOCK_ESCAPING;
            self.reporter.report(ProblemKind::FinallyMustCompleteNormally, finally_block.span);
        }

        let inside_ctx = self.contexts.push_inside_statement_with_finally(ctx);
        let handling_ctx =
            self.contexts.push_exception_handler(inside_ctx, caught, stmt.catch_blocks.len());

        let mut try_info = flow_info.clone();
        try_info = self.analyse_resources(stmt, handling_ctx, try_info);
        try_info = self.analyse_block(&mut stmt.try_block, handling_ctx, try_info);
        if try_info.is_unreachable() {
            stmt.bits |= StatementBits::IS_TRY_BLOCK_EXITING;
        }
        stmt.post_try_init_state_index = Some(self.scope.record_initialization_states(&try_info));
        self.reset_resource_bindings(stmt, &mut try_info);
        self.complain_if_unused_exception_handlers(stmt, handling_ctx);

        for index in 0..stmt.catch_blocks.len() {
            let catch_info = self.prepare_catch_info(stmt, handling_ctx, &flow_info, &try_info, index);
            let catch_info = self.analyse_block(&mut stmt.catch_blocks[index], inside_ctx, catch_info);
            stmt.catch_exit_init_state_indexes[index] =
                Some(self.scope.record_initialization_states(&catch_info));
            stmt.catch_exits[index] = catch_info.is_unreachable();
            try_info = try_info.merged_with(&catch_info.unconditional_inits());
        }

        let finally_facts = self.contexts.inits_on_finally(handling_ctx);
        self.contexts.merge_finally_null_info(ctx, &finally_facts);
        stmt.natural_exit_merge_init_state_index =
            Some(self.scope.record_initialization_states(&try_info));

        // re-check final assignments made inside the finally block against
        // everything the try/catch region may already have assigned
        let combined = if try_info.is_reachable() {
            flow_info
                .unconditional_copy()
                .add_potential_initializations_from(&try_info)
                .add_potential_initializations_from(&self.contexts.inits_on_return(inside_ctx))
                .add_null_info_from(&finally_facts)
        } else {
            self.contexts.inits_on_return(inside_ctx).add_null_info_from(&finally_facts)
        };
        for (local, span) in self.contexts.deferred_final_violations(finally_ctx, &combined) {
            self.reporter.report(
                ProblemKind::FinalLocalMayAlreadyBeAssigned {
                    name: self.scope.local(local).name.clone(),
                },
                span,
            );
        }

        let merged = if sub_info.is_unreachable() {
            sub_info
        } else {
            try_info.add_initializations_from(&sub_info)
        };
        stmt.merged_init_state_index = Some(self.scope.record_initialization_states(&merged));
        merged
    }

    /// Analyse the resource list: initializers run inside the protected
    /// region, every acquired resource becomes definitely assigned and
    /// non-null, and the exceptions its `close()` declares are visible to
    /// the handlers.
    fn analyse_resources(
        &mut self,
        stmt: &mut TryStatement,
        handling_ctx: ContextId,
        mut try_info: FlowInfo,
    ) -> FlowInfo {
        stmt.post_resources_init_state_indexes = Vec::with_capacity(stmt.resources.len());
        for index in 0..stmt.resources.len() {
            let resource = stmt.resources[index].clone();
            let (resource_type, span) = match &resource {
                Resource::Declaration { local, type_id, initializer, span } => {
                    try_info = self.analyse_expression(initializer, handling_ctx, try_info);
                    try_info.mark_as_definitely_assigned(*local);
                    self.track_assigned_null_status(&mut try_info, *local, initializer);
                    if self.config.null_analysis
                        && try_info.null_status(*local) == NullStatus::Unknown
                    {
                        // an acquired resource is observed non-null by close()
                        try_info.mark_as_definitely_non_null(*local);
                    }
                    (*type_id, *span)
                }
                Resource::Reference { target, span } => {
                    if self.config.resource_leak_analysis {
                        // the try header guarantees close() runs on this binding
                        self.close_obligations.push((*target, *span));
                    }
                    let resource_type = match target {
                        ResourceTarget::Local(local) => {
                            if try_info.is_reachable() && !try_info.is_definitely_assigned(*local) {
                                self.reporter.report(
                                    ProblemKind::UninitializedLocal {
                                        name: self.scope.local(*local).name.clone(),
                                    },
                                    *span,
                                );
                            }
                            self.scope.local(*local).type_id
                        }
                        ResourceTarget::Field(field) => self.registry.field(*field).type_id,
                    };
                    (resource_type, *span)
                }
            };
            stmt.post_resources_init_state_indexes
                .push(self.scope.record_initialization_states(&try_info));
            if let Some(close) = self.registry.find_close_method(resource_type) {
                for thrown in close.thrown.clone() {
                    self.check_thrown(thrown, &try_info, handling_ctx, span, true);
                }
            }
        }
        try_info
    }

    /// Declared resource locals go out of scope with the try block.
    fn reset_resource_bindings(&self, stmt: &TryStatement, try_info: &mut FlowInfo) {
        for resource in &stmt.resources {
            if let Resource::Declaration { local, .. } = resource {
                try_info.reset_assignment_info(*local);
            }
        }
    }

    /// Entry state for one catch block.
    ///
    /// An unchecked (or partly unchecked) catch can be entered from any
    /// point of the protected region, including after a completed return
    /// expression, so only unconditional facts survive but null facts on
    /// the way to the finally are kept. A purely checked catch is entered
    /// only from the recorded throw sites, whose null facts are adopted.
    fn prepare_catch_info(
        &mut self,
        stmt: &TryStatement,
        handling_ctx: ContextId,
        flow_info: &FlowInfo,
        try_info: &FlowInfo,
        index: usize,
    ) -> FlowInfo {
        let on_exception = self.contexts.inits_on_exception(handling_ctx, index);
        let on_return = self.contexts.inits_on_return(handling_ctx);
        let mut catch_info = if stmt.is_unchecked_catch_block(index, self.registry) {
            flow_info
                .unconditional_copy()
                .add_potential_initializations_from(&on_exception)
                .add_potential_initializations_from(try_info)
                .add_potential_initializations_from(&on_return)
                .add_null_info_from(&self.contexts.inits_on_finally(handling_ctx))
        } else {
            flow_info
                .null_info_less_unconditional_copy()
                .add_potential_initializations_from(&on_exception)
                .add_null_info_from(&on_exception)
                .add_potential_initializations_from(&try_info.null_info_less_unconditional_copy())
                .add_potential_initializations_from(&on_return.null_info_less_unconditional_copy())
        };
        let argument = &stmt.catch_arguments[index];
        catch_info.mark_as_definitely_assigned(argument.local);
        if self.config.null_analysis {
            catch_info.mark_as_definitely_non_null(argument.local);
        }
        if stmt.try_block.is_empty_block() && stmt.resources.is_empty() {
            catch_info.set_reach_mode(ReachMode::UnreachableOrDead);
        }
        catch_info
    }

    /// Report catch clauses of checked exceptions that no site in the
    /// protected region can throw.
    fn complain_if_unused_exception_handlers(&mut self, stmt: &TryStatement, handling_ctx: ContextId) {
        for (_, type_id, catch_block) in self.contexts.unused_caught_entries(handling_ctx) {
            if self.registry.is_unchecked_exception(type_id) {
                continue;
            }
            if self.registry.is_broad_checked_catch(type_id)
                && !self.config.report_unused_declared_throwable_catch
            {
                continue;
            }
            let argument: &CatchArgument = &stmt.catch_arguments[catch_block];
            self.reporter.report(
                ProblemKind::UnreachableCatch { caught: self.registry.name(type_id).to_string() },
                argument.span,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn span() -> Span {
        Span::default()
    }

    struct Fixture {
        scope: MethodScope,
        registry: TypeRegistry,
        config: Config,
        reporter: ProblemReporter,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                scope: MethodScope::new(None),
                registry: TypeRegistry::with_defaults(),
                config: Config::default(),
                reporter: ProblemReporter::new(),
            }
        }

        fn analyse(&mut self, body: &mut Block) -> FlowInfo {
            let mut analyzer =
                FlowAnalyzer::new(&mut self.scope, &self.registry, &self.config, &mut self.reporter);
            analyzer.analyse_method_body(body)
        }
    }

    fn throw_new(type_id: TypeId) -> Stmt {
        Stmt::Throw { exception: Expr::New { type_id, span: span() }, span: span() }
    }

    #[test]
    fn escaping_finally_is_flagged_and_dominates_the_merge() {
        let mut fixture = Fixture::new();
        let wk = fixture.registry.well_known();
        let mut try_stmt = TryStatement::new(
            vec![],
            Block::new(vec![Stmt::Empty(span())], span()),
            vec![],
            vec![],
            Some(Block::new(vec![throw_new(wk.runtime_exception)], span())),
            span(),
        );
        let exit = {
            let mut analyzer = FlowAnalyzer::new(
                &mut fixture.scope,
                &fixture.registry,
                &fixture.config,
                &mut fixture.reporter,
            );
            let root = analyzer.root;
            analyzer.analyse_try(&mut try_stmt, root, FlowInfo::initial(0))
        };
        assert!(try_stmt.bits.contains(StatementBits::IS_FINALLY_BLOCK_ESCAPING));
        assert!(exit.is_unreachable());
        assert!(fixture
            .reporter
            .contains(|kind| matches!(kind, ProblemKind::FinallyMustCompleteNormally)));
    }

    #[test]
    fn catch_on_empty_try_is_dead_and_unreachable_catch_reported() {
        let mut fixture = Fixture::new();
        let wk = fixture.registry.well_known();
        let ex = fixture.scope.add_local("e", wk.io_exception);
        let mut try_stmt = TryStatement::new(
            vec![],
            Block::default(),
            vec![CatchArgument { local: ex, types: vec![wk.io_exception], span: span() }],
            vec![Block::default()],
            None,
            span(),
        );
        try_stmt.caught_exception_types = vec![wk.io_exception];
        try_stmt.caught_exceptions_catch_blocks = vec![0];
        let mut body = Block::new(vec![Stmt::Try(Box::new(try_stmt))], span());
        fixture.analyse(&mut body);
        assert!(fixture
            .reporter
            .contains(|kind| matches!(kind, ProblemKind::UnreachableCatch { .. })));
        if let Stmt::Try(analysed) = &body.statements[0] {
            assert!(!analysed.catch_blocks[0].bits.contains(StatementBits::IS_REACHABLE));
        } else {
            panic!("try statement expected");
        }
    }

    #[test]
    fn reference_resources_record_close_obligations_when_enabled() {
        let mut registry = TypeRegistry::with_defaults();
        let res_type = registry.define_resource_class("p.Res", vec![]);
        let mut scope = MethodScope::new(None);
        let r = scope.add_final_local("r", res_type);
        let mut config = Config::default();
        config.resource_leak_analysis = true;
        let mut reporter = ProblemReporter::new();
        let try_stmt = TryStatement::new(
            vec![Resource::Reference { target: ResourceTarget::Local(r), span: span() }],
            Block::new(vec![Stmt::Empty(span())], span()),
            vec![],
            vec![],
            None,
            span(),
        );
        let mut body = Block::new(
            vec![
                Stmt::LocalDeclaration {
                    local: r,
                    initializer: Some(Expr::New { type_id: res_type, span: span() }),
                    span: span(),
                },
                Stmt::Try(Box::new(try_stmt)),
            ],
            span(),
        );
        let mut analyzer = FlowAnalyzer::new(&mut scope, &registry, &config, &mut reporter);
        analyzer.analyse_method_body(&mut body);
        assert_eq!(analyzer.close_obligations(), &[(ResourceTarget::Local(r), span())]);
    }

    #[test]
    fn unhandled_checked_exception_is_reported_once() {
        let mut fixture = Fixture::new();
        let wk = fixture.registry.well_known();
        let mut body = Block::new(vec![throw_new(wk.io_exception)], span());
        fixture.analyse(&mut body);
        assert!(fixture.reporter.contains(
            |kind| matches!(kind, ProblemKind::UnhandledException { type_name } if type_name.contains("IOException"))
        ));
    }

    #[test]
    fn assignment_in_try_reaches_catch_only_potentially() {
        let mut fixture = Fixture::new();
        let wk = fixture.registry.well_known();
        let x = fixture.scope.add_local("x", wk.object);
        let ex = fixture.scope.add_local("e", wk.io_exception);
        let thrower = Expr::Call(crate::ast::CallExpr {
            name: "read".to_string(),
            arguments: vec![],
            declared_thrown: vec![wk.io_exception],
            return_type: None,
            span: span(),
        });
        let mut try_stmt = TryStatement::new(
            vec![],
            Block::new(
                vec![
                    Stmt::Expression(thrower),
                    Stmt::Assign { local: x, value: Expr::New { type_id: wk.object, span: span() }, span: span() },
                ],
                span(),
            ),
            vec![CatchArgument { local: ex, types: vec![wk.io_exception], span: span() }],
            vec![Block::default()],
            None,
            span(),
        );
        try_stmt.caught_exception_types = vec![wk.io_exception];
        try_stmt.caught_exceptions_catch_blocks = vec![0];
        let mut body = Block::new(vec![Stmt::Try(Box::new(try_stmt))], span());
        let exit = fixture.analyse(&mut body);
        // after the whole statement, x may or may not be assigned
        assert!(!exit.is_definitely_assigned(x));
        assert!(exit.is_potentially_assigned(x));
        assert!(!fixture.reporter.has_errors());
    }

    #[test]
    fn unchecked_catch_entry_carries_no_definite_null_facts() {
        let mut fixture = Fixture::new();
        let wk = fixture.registry.well_known();
        let x = fixture.scope.add_local("x", wk.object);
        let ex = fixture.scope.add_local("e", wk.runtime_exception);
        let thrower = Expr::Call(crate::ast::CallExpr {
            name: "shake".to_string(),
            arguments: vec![],
            declared_thrown: vec![wk.runtime_exception],
            return_type: None,
            span: span(),
        });
        let mut try_stmt = TryStatement::new(
            vec![],
            Block::new(
                vec![
                    Stmt::Expression(thrower),
                    Stmt::Assign { local: x, value: Expr::New { type_id: wk.object, span: span() }, span: span() },
                    Stmt::Return { value: None, span: span() },
                ],
                span(),
            ),
            vec![CatchArgument { local: ex, types: vec![wk.runtime_exception], span: span() }],
            vec![Block::default()],
            None,
            span(),
        );
        try_stmt.caught_exception_types = vec![wk.runtime_exception];
        try_stmt.caught_exceptions_catch_blocks = vec![0];
        let mut body = Block::new(
            vec![
                Stmt::Assign { local: x, value: Expr::Null(span()), span: span() },
                Stmt::Try(Box::new(try_stmt)),
            ],
            span(),
        );
        let exit = fixture.analyse(&mut body);
        // the handler can run before or after the assignment in the try
        // block, so neither null fact about x survives into it
        assert!(!matches!(
            exit.null_status(x),
            NullStatus::DefinitelyNull | NullStatus::DefinitelyNonNull
        ));
        assert!(!fixture.reporter.has_errors());
    }
}
