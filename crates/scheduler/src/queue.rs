use std::collections::VecDeque;

use crate::job::{Job, JobId};
use crate::priority::{Cursor, SelectionSequence};

/// Owning envelope a job travels in while it sits in a tier.
pub(crate) struct QueuedJob {
    pub(crate) id: JobId,
    pub(crate) job: Box<dyn Job>,
    /// Consecutive important re-admissions without an intervening normal one.
    pub(crate) important_streak: u32,
}

impl QueuedJob {
    pub(crate) fn new(id: JobId, job: Box<dyn Job>) -> Self {
        Self {
            id,
            job,
            important_streak: 0,
        }
    }
}

/// One FIFO per priority tier.
pub(crate) struct TierQueues {
    tiers: Vec<VecDeque<QueuedJob>>,
}

impl TierQueues {
    pub(crate) fn new(levels: usize) -> Self {
        Self {
            tiers: (0..levels.max(1)).map(|_| VecDeque::new()).collect(),
        }
    }

    pub(crate) fn levels(&self) -> usize {
        self.tiers.len()
    }

    pub(crate) fn lowest_tier(&self) -> usize {
        self.tiers.len() - 1
    }

    pub(crate) fn push_back(&mut self, tier: usize, entry: QueuedJob) {
        let tier = tier.min(self.lowest_tier());
        self.tiers[tier].push_back(entry);
    }

    pub(crate) fn push_front(&mut self, tier: usize, entry: QueuedJob) {
        let tier = tier.min(self.lowest_tier());
        self.tiers[tier].push_front(entry);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tiers.iter().all(VecDeque::is_empty)
    }

    pub(crate) fn len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub(crate) fn depths(&self) -> Vec<usize> {
        self.tiers.iter().map(VecDeque::len).collect()
    }

    /// Walk the sequence from `cursor` and pop the front of the first
    /// non-empty tier, returning the tier it came from.
    ///
    /// Visits at most one full cycle; every tier appears in the sequence,
    /// so `None` means all tiers are empty.
    pub(crate) fn pop_next(
        &mut self,
        sequence: &SelectionSequence,
        cursor: &mut Cursor,
    ) -> Option<(usize, QueuedJob)> {
        for _ in 0..sequence.len() {
            let tier = sequence.advance(cursor);
            if let Some(entry) = self.tiers[tier].pop_front() {
                return Some((tier, entry));
            }
        }
        None
    }

    /// Take every queued job out, highest tier first.
    pub(crate) fn drain_all(&mut self) -> Vec<QueuedJob> {
        self.tiers.iter_mut().flat_map(|q| q.drain(..)).collect()
    }
}
