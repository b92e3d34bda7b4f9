//! Bounded queue of delayed corrections.
//!
//! A delayed typo leaves a wrong fragment on screen and schedules its fix for
//! a later character position. Fixing means backspacing from the current
//! position to the start of the fragment and retyping everything after it.

use typist_core::types::CorrectionTask;

/// Outstanding corrections allowed per session.
pub const MAX_PENDING_CORRECTIONS: usize = 2;

/// Corrections ordered by the position of their wrong fragment.
#[derive(Debug)]
pub struct CorrectionQueue {
    tasks: Vec<CorrectionTask>,
    capacity: usize,
}

impl Default for CorrectionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrectionQueue {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PENDING_CORRECTIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }

    /// Queue a task. Returns false, leaving the queue untouched, when full.
    pub fn push(&mut self, task: CorrectionTask) -> bool {
        if self.is_full() {
            return false;
        }
        self.tasks.push(task);
        true
    }

    /// Remove the earliest task due at `position` together with every task
    /// queued after it.
    pub fn take_due(&mut self, position: usize) -> Vec<CorrectionTask> {
        match self
            .tasks
            .iter()
            .position(|t| t.scheduled_fix_at_char_index <= position)
        {
            Some(idx) => self.tasks.drain(idx..).collect(),
            None => Vec::new(),
        }
    }

    pub fn drain_all(&mut self) -> Vec<CorrectionTask> {
        std::mem::take(&mut self.tasks)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorrectionTask> {
        self.tasks.iter()
    }
}

/// Keystrokes needed to undo a batch of corrections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backtrack {
    /// Backspaces from the cursor to the start of the first fragment.
    pub backspaces: usize,
    /// Text index from which the correct characters are retyped.
    pub retype_from: usize,
}

/// Plan the backtrack for `tasks` (as returned by `take_due`) with the cursor
/// after `position` characters of the text.
pub fn plan_backtrack(tasks: &[CorrectionTask], position: usize) -> Option<Backtrack> {
    let first = tasks.first()?;
    let retype_from = first.inserted_at_char_index.min(position);
    let extra: isize = tasks
        .iter()
        .map(|t| t.wrong_fragment.chars().count() as isize - t.len() as isize)
        .sum();
    let backspaces = ((position - retype_from) as isize + extra).max(0) as usize;
    Some(Backtrack {
        backspaces,
        retype_from,
    })
}
