//! The bytecode buffer.
//!
//! Emits real instruction bytes, resolves forward branches through labels,
//! builds the exception table, and tracks local-variable liveness against
//! the initialization-state snapshots recorded by the flow analyzer.

use std::fmt::Write as _;

use crate::codegen::labels::{BranchLabel, ExceptionLabel, ExceptionLabelId, LabelId};
use crate::codegen::opcodes::{self, mnemonic};
use crate::scope::{LocalId, MethodScope, StateIndex};

/// One row of the method's exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Internal name of the caught type; `None` catches any throwable.
    pub catch_type: Option<String>,
}

/// Symbolic method reference in the buffer's mini constant pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub on_interface: bool,
}

/// Liveness range of one local, for the variable table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRange {
    pub local: LocalId,
    pub start_pc: u16,
    pub end_pc: Option<u16>,
}

#[derive(Debug, Default)]
pub struct Code {
    bytes: Vec<u8>,
    labels: Vec<BranchLabel>,
    exception_labels: Vec<ExceptionLabel>,
    method_refs: Vec<MethodRef>,
    class_refs: Vec<String>,
    field_refs: Vec<String>,
    constants: Vec<i32>,
    live_ranges: Vec<LiveRange>,
    state_index_stack: Vec<StateIndex>,
    stack: u16,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl Code {
    pub fn new() -> Self {
        Code::default()
    }

    pub fn pc(&self) -> u16 {
        self.bytes.len() as u16
    }

    fn emit(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn emit2(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn push(&mut self, count: u16) {
        self.stack += count;
        if self.stack > self.max_stack {
            self.max_stack = self.stack;
        }
    }

    fn pop_stack(&mut self, count: u16) {
        self.stack = self.stack.saturating_sub(count);
    }

    /// At a handler entry the operand stack holds exactly the exception.
    pub fn push_exception_on_stack(&mut self) {
        self.stack = 1;
        if self.max_stack == 0 {
            self.max_stack = 1;
        }
    }

    // ------------------------------------------------------------------
    // simple instructions
    // ------------------------------------------------------------------

    pub fn aconst_null(&mut self) {
        self.emit(opcodes::ACONST_NULL);
        self.push(1);
    }

    pub fn load_int(&mut self, value: i32) {
        match value {
            -1..=5 => self.emit((opcodes::ICONST_0 as i32 + value) as u8),
            -128..=127 => {
                self.emit(opcodes::BIPUSH);
                self.emit(value as i8 as u8);
            }
            -32768..=32767 => {
                self.emit(opcodes::SIPUSH);
                self.emit2(value as i16 as u16);
            }
            _ => {
                let index = self.constant(value);
                self.emit(opcodes::LDC);
                self.emit(index);
            }
        }
        self.push(1);
    }

    pub fn aload(&mut self, slot: u16) {
        self.load_slot(opcodes::ALOAD, opcodes::ALOAD_0, slot);
    }

    pub fn iload(&mut self, slot: u16) {
        self.load_slot(opcodes::ILOAD, opcodes::ILOAD_0, slot);
    }

    fn load_slot(&mut self, op: u8, short_base: u8, slot: u16) {
        self.emit_slot_op(op, short_base, slot);
        self.push(1);
        if slot + 1 > self.max_locals {
            self.max_locals = slot + 1;
        }
    }

    pub fn astore(&mut self, slot: u16) {
        self.store_slot(opcodes::ASTORE, opcodes::ASTORE_0, slot);
    }

    pub fn istore(&mut self, slot: u16) {
        self.store_slot(opcodes::ISTORE, opcodes::ISTORE_0, slot);
    }

    fn store_slot(&mut self, op: u8, short_base: u8, slot: u16) {
        self.emit_slot_op(op, short_base, slot);
        self.pop_stack(1);
        if slot + 1 > self.max_locals {
            self.max_locals = slot + 1;
        }
    }

    fn emit_slot_op(&mut self, op: u8, short_base: u8, slot: u16) {
        if slot <= 3 {
            self.emit(short_base + slot as u8);
        } else if slot <= 0xff {
            self.emit(op);
            self.emit(slot as u8);
        } else {
            self.emit(opcodes::WIDE);
            self.emit(op);
            self.emit2(slot);
        }
    }

    pub fn pop(&mut self) {
        self.emit(opcodes::POP);
        self.pop_stack(1);
    }

    pub fn dup(&mut self) {
        self.emit(opcodes::DUP);
        self.push(1);
    }

    pub fn athrow(&mut self) {
        self.emit(opcodes::ATHROW);
        self.pop_stack(1);
    }

    pub fn return_(&mut self) {
        self.emit(opcodes::RETURN);
    }

    pub fn areturn(&mut self) {
        self.emit(opcodes::ARETURN);
        self.pop_stack(1);
    }

    pub fn ireturn(&mut self) {
        self.emit(opcodes::IRETURN);
        self.pop_stack(1);
    }

    // ------------------------------------------------------------------
    // constant pool surrogates
    // ------------------------------------------------------------------

    fn constant(&mut self, value: i32) -> u8 {
        if let Some(index) = self.constants.iter().position(|&c| c == value) {
            return index as u8;
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u8
    }

    fn class_ref(&mut self, internal_name: &str) -> u16 {
        if let Some(index) = self.class_refs.iter().position(|c| c == internal_name) {
            return index as u16;
        }
        self.class_refs.push(internal_name.to_string());
        (self.class_refs.len() - 1) as u16
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str, on_interface: bool) -> u16 {
        if let Some(index) = self.method_refs.iter().position(|m| {
            m.owner == owner && m.name == name && m.descriptor == descriptor
        }) {
            return index as u16;
        }
        self.method_refs.push(MethodRef {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            on_interface,
        });
        (self.method_refs.len() - 1) as u16
    }

    fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let symbol = format!("{owner}.{name}:{descriptor}");
        if let Some(index) = self.field_refs.iter().position(|f| *f == symbol) {
            return index as u16;
        }
        self.field_refs.push(symbol);
        (self.field_refs.len() - 1) as u16
    }

    /// `new` + `dup` + `invokespecial <init>()V`.
    pub fn new_instance(&mut self, internal_name: &str) {
        let class = self.class_ref(internal_name);
        self.emit(opcodes::NEW);
        self.emit2(class);
        self.push(1);
        self.dup();
        let init = self.method_ref(internal_name, "<init>", "()V", false);
        self.emit(opcodes::INVOKESPECIAL);
        self.emit2(init);
        self.pop_stack(1);
    }

    pub fn getfield(&mut self, owner: &str, name: &str, descriptor: &str) {
        let field = self.field_ref(owner, name, descriptor);
        self.emit(opcodes::GETFIELD);
        self.emit2(field);
        // pops the receiver, pushes the value
    }

    /// Invoke a zero-argument void method on the receiver at TOS.
    pub fn invoke_no_arg_void(&mut self, owner: &str, name: &str, on_interface: bool) {
        let method = self.method_ref(owner, name, "()V", on_interface);
        if on_interface {
            self.emit(opcodes::INVOKEINTERFACE);
            self.emit2(method);
            self.emit(1); // one stack slot for the receiver
            self.emit(0);
        } else {
            self.emit(opcodes::INVOKEVIRTUAL);
            self.emit2(method);
        }
        self.pop_stack(1);
    }

    pub fn invoke_virtual(&mut self, owner: &str, name: &str, descriptor: &str, popped: u16, pushes: bool) {
        let method = self.method_ref(owner, name, descriptor, false);
        self.emit(opcodes::INVOKEVIRTUAL);
        self.emit2(method);
        self.pop_stack(popped);
        if pushes {
            self.push(1);
        }
    }

    /// `Throwable.addSuppressed(Throwable)` on the two references at TOS.
    pub fn invoke_throwable_add_suppressed(&mut self) {
        self.invoke_virtual(
            "java/lang/Throwable",
            "addSuppressed",
            "(Ljava/lang/Throwable;)V",
            2,
            false,
        );
    }

    // ------------------------------------------------------------------
    // branch labels
    // ------------------------------------------------------------------

    pub fn new_label(&mut self) -> LabelId {
        self.labels.push(BranchLabel::default());
        LabelId(self.labels.len() - 1)
    }

    fn branch(&mut self, op: u8, label: LabelId) {
        let opcode_pc = self.pc();
        self.emit(op);
        match self.labels[label.0].position {
            Some(target) => {
                let offset = target as i32 - opcode_pc as i32;
                self.emit2(offset as i16 as u16);
            }
            None => {
                let operand_pc = self.pc();
                self.labels[label.0].forward_refs.push(operand_pc);
                self.emit2(0);
            }
        }
    }

    pub fn goto_(&mut self, label: LabelId) {
        self.branch(opcodes::GOTO, label);
    }

    pub fn ifnull(&mut self, label: LabelId) {
        self.branch(opcodes::IFNULL, label);
        self.pop_stack(1);
    }

    pub fn ifnonnull(&mut self, label: LabelId) {
        self.branch(opcodes::IFNONNULL, label);
        self.pop_stack(1);
    }

    pub fn if_acmpeq(&mut self, label: LabelId) {
        self.branch(opcodes::IF_ACMPEQ, label);
        self.pop_stack(2);
    }

    pub fn place_label(&mut self, label: LabelId) {
        let target = self.pc();
        let refs = std::mem::take(&mut self.labels[label.0].forward_refs);
        self.labels[label.0].position = Some(target);
        for operand_pc in refs {
            let opcode_pc = operand_pc - 1;
            let offset = (target as i32 - opcode_pc as i32) as i16 as u16;
            let bytes = offset.to_be_bytes();
            self.bytes[operand_pc as usize] = bytes[0];
            self.bytes[operand_pc as usize + 1] = bytes[1];
        }
    }

    // ------------------------------------------------------------------
    // exception labels
    // ------------------------------------------------------------------

    pub fn new_exception_label(&mut self, catch_types: Vec<Option<String>>) -> ExceptionLabelId {
        self.exception_labels.push(ExceptionLabel::new(catch_types));
        ExceptionLabelId(self.exception_labels.len() - 1)
    }

    pub fn exception_start(&mut self, label: ExceptionLabelId) {
        let pc = self.pc();
        self.exception_labels[label.0].place_start(pc);
    }

    pub fn exception_end(&mut self, label: ExceptionLabelId) {
        let pc = self.pc();
        self.exception_labels[label.0].place_end(pc);
    }

    pub fn exception_end_if_open(&mut self, label: ExceptionLabelId) {
        if self.exception_labels[label.0].has_open_range() {
            self.exception_end(label);
        }
    }

    pub fn place_exception_handler(&mut self, label: ExceptionLabelId) {
        let pc = self.pc();
        self.exception_labels[label.0].handler_pc = Some(pc);
    }

    pub fn exception_label_count(&self, label: ExceptionLabelId) -> usize {
        self.exception_labels[label.0].count()
    }

    pub fn exception_label_open(&self, label: ExceptionLabelId) -> bool {
        self.exception_labels[label.0].has_open_range()
    }

    /// The handler table in label-creation order, skipping empty ranges and
    /// labels that never protected any code.
    pub fn exception_table(&self) -> Vec<ExceptionTableEntry> {
        let mut table = Vec::new();
        for label in &self.exception_labels {
            let handler_pc = match label.handler_pc {
                Some(pc) => pc,
                None => continue,
            };
            for &(start_pc, end) in &label.ranges {
                let end_pc = match end {
                    Some(pc) if pc > start_pc => pc,
                    _ => continue,
                };
                for catch_type in &label.catch_types {
                    table.push(ExceptionTableEntry {
                        start_pc,
                        end_pc,
                        handler_pc,
                        catch_type: catch_type.clone(),
                    });
                }
            }
        }
        table
    }

    // ------------------------------------------------------------------
    // variable liveness and state restoration
    // ------------------------------------------------------------------

    pub fn add_variable(&mut self, local: LocalId) {
        if self.open_range(local).is_none() {
            let pc = self.pc();
            self.live_ranges.push(LiveRange { local, start_pc: pc, end_pc: None });
        }
    }

    pub fn remove_variable(&mut self, local: LocalId) {
        let pc = self.pc();
        if let Some(range) = self.open_range(local) {
            range.end_pc = Some(pc);
        }
    }

    fn open_range(&mut self, local: LocalId) -> Option<&mut LiveRange> {
        self.live_ranges.iter_mut().find(|r| r.local == local && r.end_pc.is_none())
    }

    /// Close the liveness range of every local the snapshot does not prove
    /// definitely assigned. Restores the variable table to a jump target's
    /// incoming state; pushed state indexes further constrain the result so
    /// a finally block inlined at several exits only keeps the intersection.
    pub fn remove_not_definitely_assigned_variables(&mut self, scope: &MethodScope, index: StateIndex) {
        let pc = self.pc();
        let pushed = &self.state_index_stack;
        for range in &mut self.live_ranges {
            if range.end_pc.is_some() {
                continue;
            }
            let assigned = scope.initialization_state(index).is_definitely_assigned(range.local)
                && pushed
                    .iter()
                    .all(|&s| scope.initialization_state(s).is_definitely_assigned(range.local));
            if !assigned {
                range.end_pc = Some(pc);
            }
        }
    }

    /// Reopen ranges for locals the snapshot (and every pushed state) proves
    /// definitely assigned.
    pub fn add_definitely_assigned_variables(&mut self, scope: &MethodScope, index: StateIndex) {
        for id in 0..scope.local_count() {
            let local = LocalId(id as u32);
            let assigned = scope.initialization_state(index).is_definitely_assigned(local)
                && self
                    .state_index_stack
                    .iter()
                    .all(|&s| scope.initialization_state(s).is_definitely_assigned(local));
            if assigned {
                self.add_variable(local);
            }
        }
    }

    pub fn live_ranges(&self) -> &[LiveRange] {
        &self.live_ranges
    }

    pub fn push_state_index(&mut self, index: StateIndex) {
        self.state_index_stack.push(index);
    }

    pub fn pop_state_index(&mut self) {
        self.state_index_stack.pop();
    }

    // ------------------------------------------------------------------
    // disassembly
    // ------------------------------------------------------------------

    /// Human-readable instruction listing, for tests and debugging.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let mut pc = 0usize;
        while pc < self.bytes.len() {
            let opcode_pc = pc;
            let op = self.bytes[pc];
            pc += 1;
            let name = mnemonic(op).unwrap_or("unknown");
            let _ = write!(out, "{opcode_pc:>5}: ");
            match op {
                opcodes::BIPUSH => {
                    let value = self.bytes[pc] as i8;
                    pc += 1;
                    let _ = writeln!(out, "bipush {value}");
                }
                opcodes::SIPUSH => {
                    let value = self.read_u16(pc) as i16;
                    pc += 2;
                    let _ = writeln!(out, "sipush {value}");
                }
                opcodes::LDC => {
                    let index = self.bytes[pc] as usize;
                    pc += 1;
                    let _ = writeln!(out, "ldc {}", self.constants[index]);
                }
                opcodes::ALOAD | opcodes::ASTORE | opcodes::ILOAD | opcodes::ISTORE => {
                    let slot = self.bytes[pc];
                    pc += 1;
                    let _ = writeln!(out, "{name} {slot}");
                }
                opcodes::WIDE => {
                    let wide_op = self.bytes[pc];
                    let slot = self.read_u16(pc + 1);
                    pc += 3;
                    let wide_name = mnemonic(wide_op).unwrap_or("unknown");
                    let _ = writeln!(out, "wide {wide_name} {slot}");
                }
                opcodes::GOTO
                | opcodes::IFNULL
                | opcodes::IFNONNULL
                | opcodes::IF_ACMPEQ
                | opcodes::IF_ACMPNE => {
                    let offset = self.read_u16(pc) as i16;
                    pc += 2;
                    let target = opcode_pc as i32 + offset as i32;
                    let _ = writeln!(out, "{name} {target}");
                }
                opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL => {
                    let index = self.read_u16(pc) as usize;
                    pc += 2;
                    let m = &self.method_refs[index];
                    let _ = writeln!(out, "{name} {}.{}{}", m.owner, m.name, m.descriptor);
                }
                opcodes::INVOKEINTERFACE => {
                    let index = self.read_u16(pc) as usize;
                    pc += 4;
                    let m = &self.method_refs[index];
                    let _ = writeln!(out, "invokeinterface {}.{}{}", m.owner, m.name, m.descriptor);
                }
                opcodes::NEW | opcodes::CHECKCAST => {
                    let index = self.read_u16(pc) as usize;
                    pc += 2;
                    let _ = writeln!(out, "{name} {}", self.class_refs[index]);
                }
                opcodes::GETFIELD => {
                    let index = self.read_u16(pc) as usize;
                    pc += 2;
                    let _ = writeln!(out, "getfield {}", self.field_refs[index]);
                }
                _ => {
                    let _ = writeln!(out, "{name}");
                }
            }
        }
        out
    }

    fn read_u16(&self, at: usize) -> u16 {
        u16::from_be_bytes([self.bytes[at], self.bytes[at + 1]])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_branch_is_patched_when_placed() {
        let mut code = Code::new();
        let label = code.new_label();
        code.aconst_null();
        code.ifnull(label);
        code.aconst_null();
        code.pop();
        code.place_label(label);
        code.return_();
        // ifnull at pc 1, target pc 6: offset 5
        assert_eq!(code.bytes()[1], opcodes::IFNULL);
        assert_eq!(&code.bytes()[2..4], &5i16.to_be_bytes());
        assert!(code.disassemble().contains("ifnull 6"));
    }

    #[test]
    fn exception_table_skips_empty_and_unopened_ranges() {
        let mut code = Code::new();
        let used = code.new_exception_label(vec![Some("java/io/IOException".to_string())]);
        let unused = code.new_exception_label(vec![None]);
        code.exception_start(used);
        code.aconst_null();
        code.pop();
        code.exception_end(used);
        // empty reopened range
        code.exception_start(used);
        code.exception_end(used);
        code.place_exception_handler(used);
        code.push_exception_on_stack();
        code.athrow();
        let table = code.exception_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].start_pc, 0);
        assert_eq!(table[0].end_pc, 2);
        assert_eq!(table[0].handler_pc, 2);
        assert_eq!(table[0].catch_type.as_deref(), Some("java/io/IOException"));
        assert_eq!(code.exception_label_count(unused), 0);
    }

    #[test]
    fn state_restoration_tracks_liveness_against_snapshots() {
        use crate::flow::info::FlowInfo;
        let mut scope = MethodScope::new(None);
        let registry = crate::lookup::TypeRegistry::with_defaults();
        let a = scope.add_local("a", registry.well_known().object);
        let mut assigned = FlowInfo::initial(1);
        assigned.mark_as_definitely_assigned(a);
        let unassigned = FlowInfo::initial(1);
        let assigned_index = scope.record_initialization_states(&assigned);
        let unassigned_index = scope.record_initialization_states(&unassigned);

        let mut code = Code::new();
        code.add_variable(a);
        code.aconst_null();
        code.pop();
        code.remove_not_definitely_assigned_variables(&scope, unassigned_index);
        assert!(code.live_ranges().iter().all(|r| r.end_pc.is_some()));
        code.add_definitely_assigned_variables(&scope, assigned_index);
        assert!(code.live_ranges().iter().any(|r| r.end_pc.is_none()));
    }
}
