//! Branch and exception-handler labels.
//!
//! Labels are arena-allocated by the code buffer and referred to by index.
//! A branch label collects forward references until it is placed; an
//! exception label collects protected ranges that may be closed and reopened
//! around inlined finally blocks.

/// Index of a branch label in the owning code buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelId(pub usize);

/// Index of an exception label in the owning code buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionLabelId(pub usize);

#[derive(Debug, Default)]
pub struct BranchLabel {
    /// Resolved target pc, once placed.
    pub position: Option<u16>,
    /// Operand positions of emitted branches still waiting for the target.
    pub forward_refs: Vec<u16>,
}

/// One entry of the handler table under construction. Every range opened on
/// the label is protected by the same handler; `catch_types` holds one
/// internal name per caught type, `None` meaning any throwable.
#[derive(Debug)]
pub struct ExceptionLabel {
    pub catch_types: Vec<Option<String>>,
    pub ranges: Vec<(u16, Option<u16>)>,
    pub handler_pc: Option<u16>,
}

impl ExceptionLabel {
    pub fn new(catch_types: Vec<Option<String>>) -> Self {
        ExceptionLabel { catch_types, ranges: Vec::new(), handler_pc: None }
    }

    /// Open a protected range. Reopening at the pc a range just closed on
    /// collapses the two into one.
    pub fn place_start(&mut self, pc: u16) {
        if let Some(range) = self.ranges.last_mut() {
            if range.1 == Some(pc) {
                range.1 = None;
                return;
            }
        }
        self.ranges.push((pc, None));
    }

    /// Close the open range; a range that protected no code is discarded.
    pub fn place_end(&mut self, pc: u16) {
        match self.ranges.last_mut() {
            Some((start, end @ None)) => {
                if *start == pc {
                    self.ranges.pop();
                } else {
                    *end = Some(pc);
                }
            }
            _ => {}
        }
    }

    pub fn has_open_range(&self) -> bool {
        matches!(self.ranges.last(), Some((_, None)))
    }

    /// Number of surviving ranges; zero means the label never protected any
    /// code and its handler is elided.
    pub fn count(&self) -> usize {
        self.ranges.len()
    }
}
