//! Resolution pass over try statements.
//!
//! Runs after name/type binding and before flow analysis. It validates the
//! resource list, expands multi-catch unions into the ordered caught-type
//! table, checks catch specialization order, and allocates the hidden locals
//! the code generator relies on.

use crate::ast::{Block, Resource, ResourceTarget, Span, StatementBits, Stmt, TryStatement};
use crate::config::Config;
use crate::lookup::{TypeId, TypeRegistry};
use crate::problem::{ProblemKind, ProblemReporter};
use crate::scope::MethodScope;

/// One resolution pass over a method body.
pub struct Resolver<'a> {
    scope: &'a mut MethodScope,
    registry: &'a TypeRegistry,
    config: &'a Config,
    reporter: &'a mut ProblemReporter,
}

impl<'a> Resolver<'a> {
    pub fn new(
        scope: &'a mut MethodScope,
        registry: &'a TypeRegistry,
        config: &'a Config,
        reporter: &'a mut ProblemReporter,
    ) -> Self {
        Resolver { scope, registry, config, reporter }
    }

    pub fn resolve_method_body(&mut self, body: &mut Block) {
        self.resolve_block(body);
    }

    fn resolve_block(&mut self, block: &mut Block) {
        for statement in &mut block.statements {
            match statement {
                Stmt::If { then_block, else_block, .. } => {
                    self.resolve_block(then_block);
                    if let Some(else_block) = else_block {
                        self.resolve_block(else_block);
                    }
                }
                Stmt::Loop { body, .. } => self.resolve_block(body),
                Stmt::Try(try_statement) => self.resolve_try(try_statement),
                _ => {}
            }
        }
    }

    fn resolve_try(&mut self, stmt: &mut TryStatement) {
        self.resolve_resources(stmt);
        self.verify_duplication_and_order(stmt);
        self.allocate_secret_locals(stmt);
        self.check_empty_blocks(stmt);

        self.resolve_block(&mut stmt.try_block);
        for catch_block in &mut stmt.catch_blocks {
            self.resolve_block(catch_block);
        }
        if let Some(finally_block) = &mut stmt.finally_block {
            self.resolve_block(finally_block);
        }
    }

    fn resolve_resources(&mut self, stmt: &mut TryStatement) {
        if !stmt.resources.is_empty() && !self.config.allows_resources() {
            self.reporter.report(ProblemKind::ResourceManagementNotSupported, stmt.span);
        }
        for index in 0..stmt.resources.len() {
            let resource = stmt.resources[index].clone();
            match &resource {
                Resource::Declaration { local, type_id, span, .. } => {
                    self.check_closeable(*type_id, *span);
                    // the binding must stay stable for the synthesized close
                    self.scope.local_mut(*local).has_to_be_effectively_final = true;
                }
                Resource::Reference { target, span } => {
                    if !self.config.allows_reference_resources() {
                        self.reporter.report(ProblemKind::ResourceReferenceNotSupported, *span);
                    }
                    match target {
                        ResourceTarget::Local(local) => {
                            self.check_closeable(self.scope.local(*local).type_id, *span);
                            if !self.scope.local(*local).is_final {
                                self.scope.local_mut(*local).has_to_be_effectively_final = true;
                            }
                        }
                        ResourceTarget::Field(field) => {
                            let binding = self.registry.field(*field);
                            self.check_closeable(binding.type_id, *span);
                            if !binding.is_final {
                                self.reporter.report(
                                    ProblemKind::CannotReferToNonFinalField {
                                        name: binding.name.clone(),
                                    },
                                    *span,
                                );
                            }
                        }
                    }
                    if stmt.is_duplicate_resource(index) {
                        let name = match target {
                            ResourceTarget::Local(local) => self.scope.local(*local).name.clone(),
                            ResourceTarget::Field(field) => self.registry.field(*field).name.clone(),
                        };
                        self.reporter
                            .report(ProblemKind::DuplicateResourceReference { name }, *span);
                    }
                }
            }
        }
    }

    fn check_closeable(&mut self, type_id: TypeId, span: Span) {
        if !self.registry.implements_auto_closeable(type_id) {
            self.reporter.report(
                ProblemKind::ResourceHasToImplementAutoCloseable {
                    type_name: self.registry.name(type_id).to_string(),
                },
                span,
            );
        }
    }

    /// Expand multi-catch unions in clause order and flag any caught type
    /// already covered by an earlier clause (or an earlier union
    /// alternative).
    fn verify_duplication_and_order(&mut self, stmt: &mut TryStatement) {
        let mut types: Vec<TypeId> = Vec::new();
        let mut owners: Vec<usize> = Vec::new();
        for (catch_block, argument) in stmt.catch_arguments.iter().enumerate() {
            for &caught in &argument.types {
                for &earlier in types.iter() {
                    if self.registry.is_compatible_with(caught, earlier) {
                        self.reporter.report(
                            ProblemKind::WrongSequenceOfExceptionTypes {
                                caught: self.registry.name(caught).to_string(),
                                hidden_by: self.registry.name(earlier).to_string(),
                            },
                            argument.span,
                        );
                    }
                }
                types.push(caught);
                owners.push(catch_block);
            }
        }
        stmt.caught_exception_types = types;
        stmt.caught_exceptions_catch_blocks = owners;
    }

    /// The try construct needs hidden locals: the primary exception and
    /// caught-throwable slots for the resource close protocol, and the
    /// any-exception plus return-value slots when a real finally block
    /// intercepts abrupt exits.
    fn allocate_secret_locals(&mut self, stmt: &mut TryStatement) {
        let throwable = self.registry.well_known().throwable;
        if !stmt.resources.is_empty() {
            stmt.primary_exception_variable =
                Some(self.scope.add_secret_local("<primaryException>", throwable));
            stmt.caught_throwable_variable =
                Some(self.scope.add_secret_local("<caughtThrowable>", throwable));
        }
        if stmt.effective_finally().is_some() {
            stmt.any_exception_variable =
                Some(self.scope.add_secret_local("<anyException>", throwable));
            if let Some(return_type) = self.scope.return_type {
                stmt.secret_return_value =
                    Some(self.scope.add_secret_local("<returnValue>", return_type));
            }
        }
    }

    fn check_empty_blocks(&mut self, stmt: &TryStatement) {
        if !self.config.report_undocumented_empty_block {
            return;
        }
        for catch_block in &stmt.catch_blocks {
            self.check_empty_block(catch_block);
        }
        if let Some(finally_block) = &stmt.finally_block {
            self.check_empty_block(finally_block);
        }
    }

    fn check_empty_block(&mut self, block: &Block) {
        if block.is_empty_block() && !block.bits.contains(StatementBits::DOCUMENTED_EMPTY_BLOCK) {
            self.reporter.report(ProblemKind::UndocumentedEmptyBlock, block.span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CatchArgument, Expr};

    fn span() -> Span {
        Span::default()
    }

    fn resolve(
        scope: &mut MethodScope,
        registry: &TypeRegistry,
        stmt: &mut TryStatement,
    ) -> ProblemReporter {
        let config = Config::default();
        let mut reporter = ProblemReporter::new();
        Resolver::new(scope, registry, &config, &mut reporter).resolve_try(stmt);
        reporter
    }

    #[test]
    fn union_expansion_keeps_clause_order_and_flags_hidden_catch() {
        let mut registry = TypeRegistry::with_defaults();
        let wk = registry.well_known();
        let sub = registry.define_exception("p.SubIo", wk.io_exception);
        let mut scope = MethodScope::new(None);
        let e1 = scope.add_local("e1", wk.exception);
        let e2 = scope.add_local("e2", wk.throwable);
        let mut stmt = TryStatement::new(
            vec![],
            Block::new(vec![Stmt::Empty(span())], span()),
            vec![
                CatchArgument { local: e1, types: vec![wk.io_exception, wk.runtime_exception], span: span() },
                CatchArgument { local: e2, types: vec![sub], span: span() },
            ],
            vec![Block::new(vec![Stmt::Empty(span())], span()); 2],
            None,
            span(),
        );
        let reporter = resolve(&mut scope, &registry, &mut stmt);
        assert_eq!(stmt.caught_exception_types, vec![wk.io_exception, wk.runtime_exception, sub]);
        assert_eq!(stmt.caught_exceptions_catch_blocks, vec![0, 0, 1]);
        // p.SubIo is already covered by the earlier IOException alternative
        assert!(reporter.contains(|kind| matches!(
            kind,
            ProblemKind::WrongSequenceOfExceptionTypes { caught, .. } if caught.contains("SubIo")
        )));
    }

    #[test]
    fn duplicate_resource_reference_is_reported() {
        let mut registry = TypeRegistry::with_defaults();
        let res_type = registry.define_resource_class("p.Res", vec![]);
        let mut scope = MethodScope::new(None);
        let r = scope.add_final_local("r", res_type);
        let mut stmt = TryStatement::new(
            vec![
                Resource::Reference { target: ResourceTarget::Local(r), span: span() },
                Resource::Reference { target: ResourceTarget::Local(r), span: span() },
            ],
            Block::new(vec![Stmt::Empty(span())], span()),
            vec![],
            vec![],
            None,
            span(),
        );
        let reporter = resolve(&mut scope, &registry, &mut stmt);
        assert!(stmt.is_duplicate_resource(1));
        assert!(reporter
            .contains(|kind| matches!(kind, ProblemKind::DuplicateResourceReference { .. })));
    }

    #[test]
    fn secret_locals_allocated_for_resources_and_finally() {
        let mut registry = TypeRegistry::with_defaults();
        let wk = registry.well_known();
        let res_type = registry.define_resource_class("p.Res", vec![]);
        let mut scope = MethodScope::new(Some(wk.object));
        let r = scope.add_local("r", res_type);
        let mut stmt = TryStatement::new(
            vec![Resource::Declaration {
                local: r,
                type_id: res_type,
                initializer: Expr::New { type_id: res_type, span: span() },
                span: span(),
            }],
            Block::new(vec![Stmt::Empty(span())], span()),
            vec![],
            vec![],
            Some(Block::new(vec![Stmt::Empty(span())], span())),
            span(),
        );
        let _ = resolve(&mut scope, &registry, &mut stmt);
        assert!(stmt.primary_exception_variable.is_some());
        assert!(stmt.caught_throwable_variable.is_some());
        assert!(stmt.any_exception_variable.is_some());
        assert!(stmt.secret_return_value.is_some());
        assert!(scope.local(r).has_to_be_effectively_final);
    }

    #[test]
    fn non_closeable_resource_type_is_rejected() {
        let mut registry = TypeRegistry::with_defaults();
        let wk = registry.well_known();
        let plain = registry.define("p.Plain", Some(wk.object), vec![], false);
        let mut scope = MethodScope::new(None);
        let r = scope.add_local("r", plain);
        let mut stmt = TryStatement::new(
            vec![Resource::Declaration {
                local: r,
                type_id: plain,
                initializer: Expr::New { type_id: plain, span: span() },
                span: span(),
            }],
            Block::new(vec![Stmt::Empty(span())], span()),
            vec![],
            vec![],
            None,
            span(),
        );
        let reporter = resolve(&mut scope, &registry, &mut stmt);
        assert!(reporter
            .contains(|kind| matches!(kind, ProblemKind::ResourceHasToImplementAutoCloseable { .. })));
    }
}
