//! Method-scope bindings: local variable slots and the method-wide
//! initialization-state snapshot table shared between the flow analyzer and
//! the code generator.

use crate::flow::info::FlowInfo;
use crate::lookup::TypeId;

/// Identity of a local variable within one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

/// Index into the method's snapshot table. Indices are append-only and
/// monotonically increasing; each try statement reads back only the indices
/// it allocated itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateIndex(pub usize);

#[derive(Debug, Clone)]
pub struct LocalVariable {
    pub name: String,
    pub type_id: TypeId,
    pub slot: u16,
    pub is_final: bool,
    /// Set when the local is used in a resource position and must therefore
    /// never be reassigned.
    pub has_to_be_effectively_final: bool,
    /// Hidden local synthesized by the try construct (primary exception,
    /// caught throwable, any-exception, return value holders).
    pub is_secret: bool,
}

/// Per-method binding state owned by one analysis/generation pair.
#[derive(Debug)]
pub struct MethodScope {
    locals: Vec<LocalVariable>,
    init_states: Vec<FlowInfo>,
    next_slot: u16,
    pub return_type: Option<TypeId>,
}

impl MethodScope {
    pub fn new(return_type: Option<TypeId>) -> Self {
        Self {
            locals: Vec::new(),
            init_states: Vec::new(),
            // slot 0 is `this`
            next_slot: 1,
            return_type,
        }
    }

    pub fn add_local(&mut self, name: &str, type_id: TypeId) -> LocalId {
        self.add_local_full(name, type_id, false, false)
    }

    pub fn add_final_local(&mut self, name: &str, type_id: TypeId) -> LocalId {
        self.add_local_full(name, type_id, true, false)
    }

    /// Allocate a hidden local for the try construct's own bookkeeping.
    pub fn add_secret_local(&mut self, name: &str, type_id: TypeId) -> LocalId {
        self.add_local_full(name, type_id, false, true)
    }

    fn add_local_full(&mut self, name: &str, type_id: TypeId, is_final: bool, is_secret: bool) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(LocalVariable {
            name: name.to_string(),
            type_id,
            slot: self.next_slot,
            is_final,
            has_to_be_effectively_final: false,
            is_secret,
        });
        self.next_slot += 1;
        id
    }

    pub fn local(&self, id: LocalId) -> &LocalVariable {
        &self.locals[id.0 as usize]
    }

    pub fn local_mut(&mut self, id: LocalId) -> &mut LocalVariable {
        &mut self.locals[id.0 as usize]
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    pub fn max_slots(&self) -> u16 {
        self.next_slot
    }

    /// Record one snapshot of the incoming initialization state and return
    /// its index. The table is append-only; nothing is ever rewritten.
    pub fn record_initialization_states(&mut self, info: &FlowInfo) -> StateIndex {
        let index = StateIndex(self.init_states.len());
        self.init_states.push(info.clone());
        index
    }

    pub fn initialization_state(&self, index: StateIndex) -> &FlowInfo {
        &self.init_states[index.0]
    }

    pub fn recorded_state_count(&self) -> usize {
        self.init_states.len()
    }
}
