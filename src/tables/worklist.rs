//! The pending worklist: an explicit stack instead of native recursion.
//!
//! Object graphs can be arbitrarily deep and cyclic, so the driver never
//! walks them on the call stack. Objects whose bytes have been bulk-copied
//! but whose reference slots are still unresolved wait here as buffer
//! offsets. Offsets, not pointers, because the buffer may move under growth.

use crate::format::BufOffset;

/// A stack of buffer offsets still needing their reference slots resolved.
///
/// The stack is terminated by a unique sentinel value (offset 0, which no
/// real object can occupy) pushed at construction; draining stops once the
/// sentinel is popped and the worklist refuses further use.
#[derive(Debug)]
pub struct PendingWorklist {
    stack: Vec<BufOffset>,
    finished: bool,
}

impl PendingWorklist {
    /// Creates a worklist with the terminating sentinel already pushed.
    pub fn new() -> Self {
        Self {
            stack: vec![BufOffset::NULL],
            finished: false,
        }
    }

    /// Pushes an offset whose object still needs its slots walked.
    pub fn push(&mut self, offset: BufOffset) {
        debug_assert!(!offset.is_null(), "sentinel offset pushed as work");
        self.stack.push(offset);
    }

    /// Pops the next offset to process, or `None` once the sentinel has been
    /// reached and draining is complete.
    pub fn pop(&mut self) -> Option<BufOffset> {
        if self.finished {
            return None;
        }
        match self.stack.pop() {
            Some(offset) if offset.is_null() => {
                self.finished = true;
                None
            }
            Some(offset) => Some(offset),
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Number of offsets waiting (sentinel excluded).
    pub fn len(&self) -> usize {
        self.stack
            .iter()
            .filter(|offset| !offset.is_null())
            .count()
    }

    /// Returns true if no work is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingWorklist {
    fn default() -> Self {
        Self::new()
    }
}
