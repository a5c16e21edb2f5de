//! Bytecode generation for the statement set, centered on the try construct.
//!
//! The generator consumes the analyzed AST together with the snapshot table
//! recorded by the flow analyzer. Every jump target restores the variable
//! table from the snapshot the analyzer took for it, so liveness stays
//! consistent no matter which path reached the target.

use crate::ast::{
    Block, Expr, FinallyMode, Resource, ResourceTarget, StatementBits, Stmt, TryStatement,
};
use crate::codegen::code::Code;
use crate::codegen::labels::{ExceptionLabelId, LabelId};
use crate::error::{Error, Result};
use crate::lookup::{TypeId, TypeRegistry};
use crate::scope::{LocalId, MethodScope, StateIndex};

/// An enclosing try statement whose close/finally machinery abrupt exits
/// must run through.
struct TryFrame<'a> {
    statement: &'a TryStatement,
    any_exception_label: Option<ExceptionLabelId>,
    finally_start_label: Option<LabelId>,
    resource_labels: Vec<ExceptionLabelId>,
    declared_labels: Vec<ExceptionLabelId>,
}

#[derive(Clone, Copy)]
struct LoopFrame {
    break_label: LabelId,
    continue_label: LabelId,
    /// Try frames pushed after this loop was entered must be traversed by
    /// break/continue; frames below it must not.
    frame_depth: usize,
}

/// One code-generation pass over a method body.
pub struct CodeGenerator<'a> {
    scope: &'a MethodScope,
    registry: &'a TypeRegistry,
    class_name: String,
    code: Code,
    enclosing: Vec<TryFrame<'a>>,
    loops: Vec<LoopFrame>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(scope: &'a MethodScope, registry: &'a TypeRegistry, class_name: &str) -> Self {
        CodeGenerator {
            scope,
            registry,
            class_name: class_name.to_string(),
            code: Code::new(),
            enclosing: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Generate the whole method body and hand back the finished buffer.
    pub fn generate_method_body(mut self, body: &'a Block) -> Result<Code> {
        self.generate_block(body)?;
        if self.scope.return_type.is_none() && !body.does_not_complete_normally() {
            self.code.return_();
        }
        if self.code.bytes().len() > u16::MAX as usize {
            return Err(Error::codegen_error("method code exceeds 65535 bytes"));
        }
        if self.scope.max_slots() > self.code.max_locals {
            self.code.max_locals = self.scope.max_slots();
        }
        tracing::debug!(
            bytes = self.code.bytes().len(),
            handlers = self.code.exception_table().len(),
            "method body generated"
        );
        Ok(self.code)
    }

    fn generate_block(&mut self, block: &'a Block) -> Result<()> {
        if !block.bits.contains(StatementBits::IS_REACHABLE) {
            return Ok(());
        }
        for statement in &block.statements {
            self.generate_statement(statement)?;
        }
        Ok(())
    }

    fn generate_statement(&mut self, statement: &'a Stmt) -> Result<()> {
        match statement {
            Stmt::Empty(_) => Ok(()),
            Stmt::Expression(expr) => {
                if self.generate_expression(expr)? {
                    self.code.pop();
                }
                Ok(())
            }
            Stmt::LocalDeclaration { local, initializer, .. } => {
                if let Some(value) = initializer {
                    self.generate_value(value)?;
                    self.store_local(*local);
                    self.code.add_variable(*local);
                }
                Ok(())
            }
            Stmt::Assign { local, value, .. } => {
                self.generate_value(value)?;
                self.store_local(*local);
                self.code.add_variable(*local);
                Ok(())
            }
            Stmt::If { condition, then_block, else_block, .. } => {
                self.generate_value(condition)?;
                let end_label = self.code.new_label();
                match else_block {
                    None => {
                        self.code.ifnull(end_label);
                        self.generate_block(then_block)?;
                    }
                    Some(else_block) => {
                        let else_label = self.code.new_label();
                        self.code.ifnull(else_label);
                        self.generate_block(then_block)?;
                        self.code.goto_(end_label);
                        self.code.place_label(else_label);
                        self.generate_block(else_block)?;
                    }
                }
                self.code.place_label(end_label);
                Ok(())
            }
            Stmt::Loop { body, .. } => {
                let continue_label = self.code.new_label();
                let break_label = self.code.new_label();
                self.code.place_label(continue_label);
                self.loops.push(LoopFrame {
                    break_label,
                    continue_label,
                    frame_depth: self.enclosing.len(),
                });
                self.generate_block(body)?;
                self.code.goto_(continue_label);
                self.loops.pop();
                self.code.place_label(break_label);
                Ok(())
            }
            Stmt::Break { .. } => self.generate_exit_to_loop(true),
            Stmt::Continue { .. } => self.generate_exit_to_loop(false),
            Stmt::Return { value, .. } => self.generate_return(value.as_ref()),
            Stmt::Throw { exception, .. } => {
                self.generate_value(exception)?;
                self.code.athrow();
                Ok(())
            }
            Stmt::Try(try_statement) => self.generate_try(try_statement),
        }
    }

    // ------------------------------------------------------------------
    // expressions
    // ------------------------------------------------------------------

    /// Returns whether the expression left a value on the stack.
    fn generate_expression(&mut self, expr: &'a Expr) -> Result<bool> {
        match expr {
            Expr::Null(_) => {
                self.code.aconst_null();
                Ok(true)
            }
            Expr::IntLiteral(value, _) => {
                self.code.load_int(*value);
                Ok(true)
            }
            Expr::New { type_id, .. } => {
                let internal = self.registry.internal_name(*type_id);
                self.code.new_instance(&internal);
                Ok(true)
            }
            Expr::Read { local, .. } => {
                self.load_local(*local);
                Ok(true)
            }
            Expr::FieldRead { field, .. } => {
                let binding = self.registry.field(*field);
                let descriptor = self.type_descriptor(binding.type_id);
                let name = binding.name.clone();
                let owner = self.class_name.clone();
                self.code.aload(0);
                self.code.getfield(&owner, &name, &descriptor);
                Ok(true)
            }
            Expr::Call(call) => {
                self.code.aload(0);
                let mut descriptor = String::from("(");
                for argument in &call.arguments {
                    descriptor.push_str(&self.expression_descriptor(argument));
                    self.generate_value(argument)?;
                }
                descriptor.push(')');
                match call.return_type {
                    Some(return_type) => descriptor.push_str(&self.type_descriptor(return_type)),
                    None => descriptor.push('V'),
                }
                let owner = self.class_name.clone();
                self.code.invoke_virtual(
                    &owner,
                    &call.name,
                    &descriptor,
                    1 + call.arguments.len() as u16,
                    call.return_type.is_some(),
                );
                Ok(call.return_type.is_some())
            }
        }
    }

    fn generate_value(&mut self, expr: &'a Expr) -> Result<()> {
        if !self.generate_expression(expr)? {
            return Err(Error::internal_error("expression used as value produces none"));
        }
        Ok(())
    }

    fn type_descriptor(&self, type_id: TypeId) -> String {
        if type_id == self.registry.well_known().int_primitive {
            "I".to_string()
        } else {
            format!("L{};", self.registry.internal_name(type_id))
        }
    }

    fn expression_descriptor(&self, expr: &Expr) -> String {
        match expr {
            Expr::IntLiteral(_, _) => "I".to_string(),
            Expr::Read { local, .. } => self.type_descriptor(self.scope.local(*local).type_id),
            Expr::FieldRead { field, .. } => self.type_descriptor(self.registry.field(*field).type_id),
            _ => match expr.static_type() {
                Some(type_id) => self.type_descriptor(type_id),
                None => "Ljava/lang/Object;".to_string(),
            },
        }
    }

    fn store_local(&mut self, local: LocalId) {
        let binding = self.scope.local(local);
        if binding.type_id == self.registry.well_known().int_primitive {
            self.code.istore(binding.slot);
        } else {
            self.code.astore(binding.slot);
        }
    }

    fn load_local(&mut self, local: LocalId) {
        let binding = self.scope.local(local);
        if binding.type_id == self.registry.well_known().int_primitive {
            self.code.iload(binding.slot);
        } else {
            self.code.aload(binding.slot);
        }
    }

    // ------------------------------------------------------------------
    // abrupt exits through enclosing close/finally machinery
    // ------------------------------------------------------------------

    fn generate_return(&mut self, value: Option<&'a Expr>) -> Result<()> {
        if let Some(expr) = value {
            self.generate_value(expr)?;
        }
        if self.enclosing.is_empty() {
            self.emit_return_op(value.is_some());
            return Ok(());
        }
        // park the value while the crossed finally blocks run
        let saved = if value.is_some() {
            self.enclosing.iter().rev().find_map(|frame| frame.statement.secret_return_value)
        } else {
            None
        };
        if let Some(local) = saved {
            self.store_local(local);
            self.code.add_variable(local);
        }
        let mut escaping = false;
        let lowest = 0;
        for index in (lowest..self.enclosing.len()).rev() {
            if self.generate_finally_block(index)? {
                escaping = true;
                break;
            }
        }
        if !escaping {
            if let Some(local) = saved {
                self.load_local(local);
            }
            self.emit_return_op(value.is_some());
        }
        self.reenter_handlers(lowest);
        Ok(())
    }

    fn emit_return_op(&mut self, has_value: bool) {
        match self.scope.return_type {
            Some(return_type) if has_value => {
                if return_type == self.registry.well_known().int_primitive {
                    self.code.ireturn();
                } else {
                    self.code.areturn();
                }
            }
            _ => self.code.return_(),
        }
    }

    fn generate_exit_to_loop(&mut self, is_break: bool) -> Result<()> {
        let frame = self
            .loops
            .last()
            .copied()
            .ok_or_else(|| Error::internal_error("break or continue outside of a loop"))?;
        let mut escaping = false;
        for index in (frame.frame_depth..self.enclosing.len()).rev() {
            if self.generate_finally_block(index)? {
                escaping = true;
                break;
            }
        }
        if !escaping {
            let target = if is_break { frame.break_label } else { frame.continue_label };
            self.code.goto_(target);
        }
        self.reenter_handlers(frame.frame_depth);
        Ok(())
    }

    /// Run one crossed statement's exit machinery: close its resources and
    /// inline or route to its finally block. Returns true when the finally
    /// never completes, in which case the exit sequence ends here.
    fn generate_finally_block(&mut self, index: usize) -> Result<bool> {
        let statement = self.enclosing[index].statement;
        let any_exception_label = self.enclosing[index].any_exception_label;
        let finally_start_label = self.enclosing[index].finally_start_label;
        let resource_labels = self.enclosing[index].resource_labels.clone();
        let declared_labels = self.enclosing[index].declared_labels.clone();

        let resource_count = statement.resources.len();
        if resource_count > 0 {
            for i in (1..=resource_count).rev() {
                self.code.exception_end_if_open(resource_labels[i]);
                let exit_label = self.code.new_label();
                self.generate_close_sequence(statement, i - 1, exit_label)?;
                self.code.place_label(exit_label);
            }
            self.code.exception_end_if_open(resource_labels[0]);
        }

        match statement.finally_mode() {
            FinallyMode::DoesNotComplete => {
                let label = finally_start_label
                    .ok_or_else(|| Error::internal_error("missing shared finally entry label"))?;
                self.code.goto_(label);
                Ok(true)
            }
            FinallyMode::NoFinally => {
                for &label in &declared_labels {
                    self.code.exception_end_if_open(label);
                }
                Ok(false)
            }
            FinallyMode::Inline => {
                let state = statement.natural_exit_merge_init_state_index;
                if let Some(index) = state {
                    self.code.push_state_index(index);
                }
                if let Some(label) = any_exception_label {
                    self.code.exception_end_if_open(label);
                }
                for &label in &declared_labels {
                    self.code.exception_end_if_open(label);
                }
                let block = statement
                    .effective_finally()
                    .ok_or_else(|| Error::internal_error("inline finally without a finally block"))?;
                self.generate_finally_body(index, block)?;
                if state.is_some() {
                    self.code.pop_state_index();
                }
                Ok(false)
            }
        }
    }

    /// Generate a finally body with the owning statement (and everything
    /// nested inside it) removed from the abrupt-exit path: a return inside
    /// a finally block does not re-run that same finally.
    fn generate_finally_body(&mut self, index: usize, block: &'a Block) -> Result<()> {
        let saved = self.enclosing.split_off(index);
        let result = self.generate_block(block);
        self.enclosing.extend(saved);
        result
    }

    /// Reinstall the protected ranges that the exit sequence closed.
    fn reenter_handlers(&mut self, from: usize) {
        let mut reopen: Vec<(Option<ExceptionLabelId>, Vec<ExceptionLabelId>, Vec<ExceptionLabelId>)> =
            Vec::new();
        for frame in &self.enclosing[from..] {
            reopen.push((
                frame.any_exception_label,
                frame.declared_labels.clone(),
                frame.resource_labels.clone(),
            ));
        }
        for (any, declared, resources) in reopen {
            if let Some(label) = any {
                self.exception_start_if_closed(label);
            }
            for label in declared {
                self.exception_start_if_closed(label);
            }
            for label in resources.into_iter().rev() {
                self.exception_start_if_closed(label);
            }
        }
    }

    fn exception_start_if_closed(&mut self, label: ExceptionLabelId) {
        if !self.code.exception_label_open(label) {
            self.code.exception_start(label);
        }
    }

    // ------------------------------------------------------------------
    // the try statement
    // ------------------------------------------------------------------

    fn generate_try(&mut self, stmt: &'a TryStatement) -> Result<()> {
        if !stmt.bits.contains(StatementBits::IS_REACHABLE) {
            return Ok(());
        }
        let entry_pc = self.code.pc();
        let finally_mode = stmt.finally_mode();
        let max_catches = stmt.catch_blocks.len();
        let resource_count = stmt.resources.len();

        // handler rows dispatch in label-creation order. The resource-close
        // regions are innermost and must win over the declared catches, so
        // an exception from the protected region runs the close protocol and
        // only its rethrow reaches a catch clause; the any-exception row
        // comes last.
        let mut resource_labels = Vec::with_capacity(resource_count + 1);
        if resource_count > 0 {
            for _ in 0..=resource_count {
                resource_labels.push(self.code.new_exception_label(vec![None]));
            }
        }

        // one label per catch clause; a union contributes one table row per
        // alternative on the same label
        let mut declared_labels = Vec::with_capacity(max_catches);
        for argument in &stmt.catch_arguments {
            let types = argument
                .types
                .iter()
                .map(|&type_id| Some(self.registry.internal_name(type_id)))
                .collect();
            let label = self.code.new_exception_label(types);
            self.code.exception_start(label);
            declared_labels.push(label);
        }
        let any_exception_label = if finally_mode != FinallyMode::NoFinally {
            let label = self.code.new_exception_label(vec![None]);
            self.code.exception_start(label);
            Some(label)
        } else {
            None
        };
        let finally_start_label =
            (finally_mode == FinallyMode::DoesNotComplete).then(|| self.code.new_label());

        // resource acquisition under progressively nested protected regions:
        // region i protects everything from the acquisition of resource i on
        if resource_count > 0 {
            let primary = self.primary_exception(stmt)?;
            let caught = self.caught_throwable(stmt)?;
            self.code.aconst_null();
            self.store_local(primary);
            self.code.add_variable(primary);
            self.code.aconst_null();
            self.store_local(caught);
            self.code.add_variable(caught);
            for i in 0..=resource_count {
                self.code.exception_start(resource_labels[i]);
                if i < resource_count {
                    self.generate_resource_acquisition(&stmt.resources[i])?;
                }
            }
        }

        self.enclosing.push(TryFrame {
            statement: stmt,
            any_exception_label,
            finally_start_label,
            resource_labels: resource_labels.clone(),
            declared_labels: declared_labels.clone(),
        });

        self.generate_block(&stmt.try_block)?;

        if resource_count > 0 {
            self.generate_resource_close_protocol(stmt, &resource_labels)?;
        }

        let try_block_has_code = self.code.pc() != entry_pc;
        if try_block_has_code {
            let natural_exit = self.code.new_label();
            let mut post_catches_finally: Option<LabelId> = None;
            for &label in &declared_labels {
                self.code.exception_end_if_open(label);
            }
            let mut requires_natural_exit = false;
            if !stmt.bits.contains(StatementBits::IS_TRY_BLOCK_EXITING) {
                match finally_mode {
                    FinallyMode::Inline => {
                        requires_natural_exit = true;
                        self.restore_state(stmt.natural_exit_merge_init_state_index);
                        self.code.goto_(natural_exit);
                    }
                    FinallyMode::NoFinally => {
                        self.restore_state(stmt.natural_exit_merge_init_state_index);
                        self.code.goto_(natural_exit);
                    }
                    FinallyMode::DoesNotComplete => {
                        let label = finally_start_label.ok_or_else(|| {
                            Error::internal_error("missing shared finally entry label")
                        })?;
                        self.code.goto_(label);
                    }
                }
            }
            if let Some(label) = any_exception_label {
                self.code.exception_end_if_open(label);
            }
            if max_catches > 0 {
                let after_catches = self.code.new_label();
                post_catches_finally = Some(after_catches);
                for i in 0..max_catches {
                    // a handler no throw site can reach gets no code either
                    if self.code.exception_label_count(declared_labels[i]) == 0 {
                        continue;
                    }
                    if let Some(label) = any_exception_label {
                        self.code.exception_start(label);
                    }
                    self.restore_state(stmt.pre_try_init_state_index);
                    self.code.push_exception_on_stack();
                    self.code.place_exception_handler(declared_labels[i]);
                    let catch_local = stmt.catch_arguments[i].local;
                    self.store_local(catch_local);
                    self.code.add_variable(catch_local);
                    self.generate_block(&stmt.catch_blocks[i])?;
                    if let Some(label) = any_exception_label {
                        self.code.exception_end_if_open(label);
                    }
                    if !stmt.catch_exits[i] {
                        match finally_mode {
                            FinallyMode::Inline => {
                                let merge = stmt.natural_exit_merge_init_state_index;
                                if let Some(index) = merge {
                                    self.code.push_state_index(index);
                                }
                                self.restore_state(stmt.catch_exit_init_state_indexes[i]);
                                let block = stmt.effective_finally().ok_or_else(|| {
                                    Error::internal_error("inline finally without a finally block")
                                })?;
                                let own_frame = self.enclosing.len() - 1;
                                self.generate_finally_body(own_frame, block)?;
                                self.code.goto_(after_catches);
                                if merge.is_some() {
                                    self.code.pop_state_index();
                                }
                            }
                            FinallyMode::NoFinally => {
                                self.restore_state(stmt.natural_exit_merge_init_state_index);
                                self.code.goto_(natural_exit);
                            }
                            FinallyMode::DoesNotComplete => {
                                let label = finally_start_label.ok_or_else(|| {
                                    Error::internal_error("missing shared finally entry label")
                                })?;
                                self.code.goto_(label);
                            }
                        }
                    }
                }
            }

            // synthetic any-exception handler feeding the finally block
            if let Some(any_label) = any_exception_label {
                self.code.push_exception_on_stack();
                self.restore_state(stmt.pre_try_init_state_index);
                self.code.place_exception_handler(any_label);
                let block = stmt
                    .effective_finally()
                    .ok_or_else(|| Error::internal_error("finally machinery without a block"))?;
                let own_frame = self.enclosing.len() - 1;
                match finally_mode {
                    FinallyMode::Inline => {
                        let any_var = stmt.any_exception_variable.ok_or_else(|| {
                            Error::internal_error("missing any-exception slot")
                        })?;
                        self.store_local(any_var);
                        self.code.add_variable(any_var);
                        self.generate_finally_body(own_frame, block)?;
                        self.load_local(any_var);
                        self.code.athrow();
                        self.code.remove_variable(any_var);
                    }
                    FinallyMode::DoesNotComplete => {
                        self.code.pop();
                        let label = finally_start_label.ok_or_else(|| {
                            Error::internal_error("missing shared finally entry label")
                        })?;
                        self.code.place_label(label);
                        self.generate_finally_body(own_frame, block)?;
                    }
                    FinallyMode::NoFinally => unreachable!("any-exception label implies a finally"),
                }
                if requires_natural_exit && finally_mode == FinallyMode::Inline {
                    let merge = stmt.natural_exit_merge_init_state_index;
                    if let Some(index) = merge {
                        self.code.push_state_index(index);
                    }
                    self.restore_state(merge);
                    self.code.place_label(natural_exit);
                    self.generate_finally_body(own_frame, block)?;
                    if let Some(label) = post_catches_finally {
                        self.code.goto_(label);
                    }
                    if merge.is_some() {
                        self.code.pop_state_index();
                    }
                }
                if let Some(label) = post_catches_finally {
                    self.code.place_label(label);
                }
            } else {
                self.code.place_label(natural_exit);
                if let Some(label) = post_catches_finally {
                    self.code.place_label(label);
                }
            }
        } else if let Some(block) = stmt.effective_finally() {
            // the protected region produced no code; only the finally runs
            let own_frame = self.enclosing.len() - 1;
            self.generate_finally_body(own_frame, block)?;
        }

        self.restore_state(stmt.merged_init_state_index);
        self.enclosing.pop();
        Ok(())
    }

    /// Normal-path closes in reverse acquisition order, then one handler per
    /// protected region performing the primary/suppressed merge before the
    /// rethrow.
    fn generate_resource_close_protocol(
        &mut self,
        stmt: &'a TryStatement,
        resource_labels: &[ExceptionLabelId],
    ) -> Result<()> {
        let primary = self.primary_exception(stmt)?;
        let caught = self.caught_throwable(stmt)?;
        let resource_count = stmt.resources.len();
        let try_exits = stmt.bits.contains(StatementBits::IS_TRY_BLOCK_EXITING);
        for i in (0..=resource_count).rev() {
            let exit_label = self.code.new_label();
            self.code.exception_end_if_open(resource_labels[i]);
            if !try_exits {
                if i > 0 {
                    // state right after the concluded try block
                    self.restore_state(stmt.post_try_init_state_index);
                    self.generate_close_sequence(stmt, i - 1, exit_label)?;
                }
                self.code.goto_(exit_label);
            }
            // handler entry: state as it was when region i opened
            let snapshot = if i > 0 {
                Some(stmt.post_resources_init_state_indexes[i - 1])
            } else {
                stmt.pre_try_init_state_index
            };
            self.restore_state(snapshot);
            self.code.push_exception_on_stack();
            self.code.place_exception_handler(resource_labels[i]);
            if i == resource_count {
                // innermost region: this exception is the primary one
                self.store_local(primary);
            } else {
                let else_label = self.code.new_label();
                let post_else_label = self.code.new_label();
                self.store_local(caught);
                self.load_local(primary);
                self.code.ifnonnull(else_label);
                self.load_local(caught);
                self.store_local(primary);
                self.code.goto_(post_else_label);
                self.code.place_label(else_label);
                self.load_local(primary);
                self.load_local(caught);
                self.code.if_acmpeq(post_else_label);
                self.load_local(primary);
                self.load_local(caught);
                self.code.invoke_throwable_add_suppressed();
                self.code.place_label(post_else_label);
            }
            if i > 0 {
                let post_close_label = self.code.new_label();
                self.generate_close_sequence(stmt, i - 1, post_close_label)?;
                self.code.place_label(post_close_label);
            }
            self.load_local(primary);
            self.code.athrow();
            self.code.place_label(exit_label);
        }
        self.code.remove_variable(primary);
        self.code.remove_variable(caught);
        Ok(())
    }

    fn generate_resource_acquisition(&mut self, resource: &'a Resource) -> Result<()> {
        match resource {
            Resource::Declaration { local, initializer, .. } => {
                self.generate_value(initializer)?;
                self.store_local(*local);
                self.code.add_variable(*local);
                Ok(())
            }
            // the binding already holds the resource value
            Resource::Reference { .. } => Ok(()),
        }
    }

    /// Null-guarded `close()` on one resource; duplicates of an earlier
    /// resource are closed only once.
    fn generate_close_sequence(
        &mut self,
        stmt: &'a TryStatement,
        resource_index: usize,
        null_target: LabelId,
    ) -> Result<()> {
        if stmt.is_duplicate_resource(resource_index) {
            return Ok(());
        }
        let resource_type = self.load_resource(stmt, resource_index)?;
        self.code.ifnull(null_target);
        self.load_resource(stmt, resource_index)?;
        let close = self.registry.find_close_method(resource_type).ok_or_else(|| {
            Error::internal_error(format!(
                "no close() visible on resource type {}",
                self.registry.name(resource_type)
            ))
        })?;
        let owner = self.registry.internal_name(close.declaring);
        self.code.invoke_no_arg_void(&owner, "close", close.on_interface);
        Ok(())
    }

    fn load_resource(&mut self, stmt: &'a TryStatement, index: usize) -> Result<TypeId> {
        match &stmt.resources[index] {
            Resource::Declaration { local, .. } => {
                self.load_local(*local);
                Ok(self.scope.local(*local).type_id)
            }
            Resource::Reference { target: ResourceTarget::Local(local), .. } => {
                self.load_local(*local);
                Ok(self.scope.local(*local).type_id)
            }
            Resource::Reference { target: ResourceTarget::Field(field), .. } => {
                let binding = self.registry.field(*field);
                let descriptor = self.type_descriptor(binding.type_id);
                let name = binding.name.clone();
                let owner = self.class_name.clone();
                self.code.aload(0);
                self.code.getfield(&owner, &name, &descriptor);
                Ok(binding.type_id)
            }
        }
    }

    fn restore_state(&mut self, snapshot: Option<StateIndex>) {
        if let Some(index) = snapshot {
            self.code.remove_not_definitely_assigned_variables(self.scope, index);
            self.code.add_definitely_assigned_variables(self.scope, index);
        }
    }

    fn primary_exception(&self, stmt: &TryStatement) -> Result<LocalId> {
        stmt.primary_exception_variable
            .ok_or_else(|| Error::internal_error("missing primary exception slot"))
    }

    fn caught_throwable(&self, stmt: &TryStatement) -> Result<LocalId> {
        stmt.caught_throwable_variable
            .ok_or_else(|| Error::internal_error("missing caught throwable slot"))
    }
}
