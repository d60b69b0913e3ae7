//! Undo log shared by the paymaster state and the in-memory chain.

/// Position in a [`Journal`] that a unit of work can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    index: usize,
}

/// Records the previous value of every mutation so nested units of work can be undone.
///
/// Entries are only retained while at least one checkpoint is open.
#[derive(Debug, Clone)]
pub struct Journal<E> {
    entries: Vec<E>,
    depth: usize,
}

impl<E> Default for Journal<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            depth: 0,
        }
    }
}

impl<E> Journal<E> {
    pub fn record(&mut self, entry: E) {
        if self.depth > 0 {
            self.entries.push(entry);
        }
    }

    pub fn checkpoint(&mut self) -> Checkpoint {
        self.depth += 1;
        Checkpoint {
            index: self.entries.len(),
        }
    }

    pub fn checkpoint_commit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.entries.clear();
        }
    }

    /// Pops every entry recorded since `checkpoint`, newest first.
    pub fn checkpoint_revert(&mut self, checkpoint: Checkpoint) -> Vec<E> {
        self.depth = self.depth.saturating_sub(1);
        let mut undone = self.entries.split_off(checkpoint.index);
        undone.reverse();
        if self.depth == 0 {
            self.entries.clear();
        }
        undone
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
