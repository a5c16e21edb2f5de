//! Flow state at one program point: definite/potential assignment bits per
//! local slot, an independent nullness lattice, and a reachability tag.
//!
//! States have value semantics. Every branch works on its own copy; merging
//! is explicit. The assignment facts live in u64 bit words (one bit per
//! local), the nullness lattice in a per-local byte.

use crate::scope::LocalId;

const WORD: usize = 64;

/// Nullness lattice per local slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullStatus {
    Unknown,
    DefinitelyNull,
    DefinitelyNonNull,
    PotentiallyNull,
    PotentiallyNonNull,
}

impl NullStatus {
    fn weaken(self) -> NullStatus {
        match self {
            NullStatus::DefinitelyNull => NullStatus::PotentiallyNull,
            NullStatus::DefinitelyNonNull => NullStatus::PotentiallyNonNull,
            other => other,
        }
    }

    fn is_definite(self) -> bool {
        matches!(self, NullStatus::DefinitelyNull | NullStatus::DefinitelyNonNull)
    }

    /// Merge of two incoming paths: agreeing facts survive, disagreeing
    /// definite facts degrade to potential, contradictions cancel out.
    fn merged_with(self, other: NullStatus) -> NullStatus {
        use NullStatus::*;
        if self == other {
            return self;
        }
        let a = self.weaken();
        let b = other.weaken();
        match (a, b) {
            (x, y) if x == y => x,
            (Unknown, y) => y,
            (x, Unknown) => x,
            // potentially-null vs potentially-non-null: nothing trustworthy left
            _ => Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachMode {
    Reachable,
    UnreachableOrDead,
}

/// Flow state for one program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowInfo {
    definite: Vec<u64>,
    potential: Vec<u64>,
    nullness: Vec<NullStatus>,
    reach_mode: ReachMode,
}

fn words_for(locals: usize) -> usize {
    locals.div_ceil(WORD)
}

impl FlowInfo {
    /// Initial state: nothing assigned, nothing known, reachable.
    pub fn initial(local_count: usize) -> Self {
        FlowInfo {
            definite: vec![0; words_for(local_count)],
            potential: vec![0; words_for(local_count)],
            nullness: vec![NullStatus::Unknown; local_count],
            reach_mode: ReachMode::Reachable,
        }
    }

    /// The universal dead end: no facts, unreachable.
    pub fn dead_end(local_count: usize) -> Self {
        let mut info = FlowInfo::initial(local_count);
        info.reach_mode = ReachMode::UnreachableOrDead;
        info
    }

    pub fn is_reachable(&self) -> bool {
        self.reach_mode == ReachMode::Reachable
    }

    pub fn is_unreachable(&self) -> bool {
        self.reach_mode == ReachMode::UnreachableOrDead
    }

    pub fn set_reach_mode(&mut self, mode: ReachMode) {
        self.reach_mode = mode;
    }

    fn bit(id: LocalId) -> (usize, u64) {
        (id.0 as usize / WORD, 1u64 << (id.0 as usize % WORD))
    }

    pub fn mark_as_definitely_assigned(&mut self, id: LocalId) {
        let (word, mask) = Self::bit(id);
        self.definite[word] |= mask;
        self.potential[word] |= mask;
    }

    /// Drop all assignment and nullness facts for a local going out of scope.
    pub fn reset_assignment_info(&mut self, id: LocalId) {
        let (word, mask) = Self::bit(id);
        self.definite[word] &= !mask;
        self.potential[word] &= !mask;
        self.nullness[id.0 as usize] = NullStatus::Unknown;
    }

    pub fn is_definitely_assigned(&self, id: LocalId) -> bool {
        let (word, mask) = Self::bit(id);
        self.definite[word] & mask != 0
    }

    pub fn is_potentially_assigned(&self, id: LocalId) -> bool {
        let (word, mask) = Self::bit(id);
        self.potential[word] & mask != 0
    }

    pub fn null_status(&self, id: LocalId) -> NullStatus {
        self.nullness[id.0 as usize]
    }

    pub fn mark_as_definitely_null(&mut self, id: LocalId) {
        self.nullness[id.0 as usize] = NullStatus::DefinitelyNull;
    }

    pub fn mark_as_definitely_non_null(&mut self, id: LocalId) {
        self.nullness[id.0 as usize] = NullStatus::DefinitelyNonNull;
    }

    pub fn set_null_status(&mut self, id: LocalId, status: NullStatus) {
        self.nullness[id.0 as usize] = status;
    }

    /// State reachable if either path reached this point. Dead branches
    /// contribute no constraints; otherwise definite facts intersect,
    /// potential facts union, nullness merges per lattice.
    pub fn merged_with(&self, other: &FlowInfo) -> FlowInfo {
        if self.is_unreachable() {
            return other.clone();
        }
        if other.is_unreachable() {
            return self.clone();
        }
        let mut merged = self.clone();
        for (word, value) in merged.definite.iter_mut().zip(&other.definite) {
            *word &= value;
        }
        for (word, value) in merged.potential.iter_mut().zip(&other.potential) {
            *word |= value;
        }
        for (status, &value) in merged.nullness.iter_mut().zip(&other.nullness) {
            *status = status.merged_with(value);
        }
        merged
    }

    /// Keep only guaranteed facts: potential-only assignments are dropped,
    /// nullness keeps its definite entries. Used when crossing an exception
    /// boundary where only unconditional initializations are trustworthy.
    pub fn unconditional_inits(mut self) -> FlowInfo {
        self.potential.copy_from_slice(&self.definite);
        for status in &mut self.nullness {
            if !status.is_definite() {
                *status = NullStatus::Unknown;
            }
        }
        self
    }

    /// Independent snapshot reduced to unconditional facts.
    pub fn unconditional_copy(&self) -> FlowInfo {
        self.clone().unconditional_inits()
    }

    /// Unconditional copy additionally stripped of all nullness detail.
    /// A catch or finally entry can be reached from any point in the
    /// protected region, so no null fact survives.
    pub fn null_info_less_unconditional_copy(&self) -> FlowInfo {
        let mut copy = self.unconditional_copy();
        for status in &mut copy.nullness {
            *status = NullStatus::Unknown;
        }
        copy
    }

    /// Union the other state's assignments into the potential facts only.
    /// Nullness facts the other state carries merge through the lattice, so
    /// a disagreeing contribution degrades a definite fact instead of
    /// leaving it standing.
    pub fn add_potential_initializations_from(mut self, other: &FlowInfo) -> FlowInfo {
        if other.is_unreachable() {
            return self;
        }
        for (word, (def, pot)) in self
            .potential
            .iter_mut()
            .zip(other.definite.iter().zip(&other.potential))
        {
            *word |= def | pot;
        }
        for (status, &value) in self.nullness.iter_mut().zip(&other.nullness) {
            if value != NullStatus::Unknown {
                *status = status.merged_with(value);
            }
        }
        self
    }

    /// Adopt the other state's nullness facts wherever it has any.
    pub fn add_null_info_from(mut self, other: &FlowInfo) -> FlowInfo {
        for (status, &value) in self.nullness.iter_mut().zip(&other.nullness) {
            if value != NullStatus::Unknown {
                *status = value;
            }
        }
        self
    }

    /// Append the other state's guaranteed facts: its definite assignments
    /// become definite here (the finally block always runs), its potential
    /// ones stay potential.
    pub fn add_initializations_from(mut self, other: &FlowInfo) -> FlowInfo {
        for (word, value) in self.definite.iter_mut().zip(&other.definite) {
            *word |= value;
        }
        for (word, (def, pot)) in self
            .potential
            .iter_mut()
            .zip(other.definite.iter().zip(&other.potential))
        {
            *word |= def | pot;
        }
        for (status, &value) in self.nullness.iter_mut().zip(&other.nullness) {
            if value.is_definite() {
                *status = value;
            } else if value != NullStatus::Unknown {
                *status = status.merged_with(value);
            }
        }
        self
    }
}
