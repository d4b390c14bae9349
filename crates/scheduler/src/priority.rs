//! Priority tiers and the weighted round-robin selection sequence.
//!
//! Tiers are ranked 0 (highest) through P-1 (lowest). Instead of always
//! draining the highest non-empty tier, workers walk a precomputed cyclic
//! sequence in which tier 0 appears P times and tier P-1 once, so lower
//! tiers keep making progress under sustained high-priority load.

use serde::{Deserialize, Serialize};

/// Requested tier for an admission. Lower value = higher priority.
///
/// Values beyond the configured tier count are clamped at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(usize);

impl Priority {
    /// Tier 0.
    pub const HIGHEST: Priority = Priority(0);

    pub const fn new(tier: usize) -> Self {
        Self(tier)
    }

    pub const fn tier(self) -> usize {
        self.0
    }

    /// Clamp into `[0, levels - 1]`.
    pub fn clamped(self, levels: usize) -> usize {
        self.0.min(levels.saturating_sub(1))
    }
}

impl From<usize> for Priority {
    fn from(tier: usize) -> Self {
        Self(tier)
    }
}

impl From<u32> for Priority {
    fn from(tier: u32) -> Self {
        Self(tier as usize)
    }
}

// Bare integer literals infer as i32; negative requests clamp to tier 0.
impl From<i32> for Priority {
    fn from(tier: i32) -> Self {
        Self(tier.max(0) as usize)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// The cyclic traversal order over tier indices.
///
/// Built as `for i in 0..P { 0..=i }`, e.g. `[0, 0,1, 0,1,2, 0,1,2,3]` for P = 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSequence {
    order: Vec<usize>,
    levels: usize,
}

impl SelectionSequence {
    pub fn new(levels: usize) -> Self {
        let levels = levels.max(1);
        let order = (0..levels).flat_map(|i| 0..=i).collect();
        Self { order, levels }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Number of slots tier `tier` owns in one cycle.
    pub fn weight(&self, tier: usize) -> usize {
        self.order.iter().filter(|&&t| t == tier).count()
    }

    /// Advance `cursor` one slot (wrapping) and return the tier it now names.
    pub fn advance(&self, cursor: &mut Cursor) -> usize {
        cursor.pos = (cursor.pos + 1) % self.order.len();
        self.order[cursor.pos]
    }
}

/// A worker's private position in the [`SelectionSequence`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pos: usize,
}

impl Cursor {
    pub fn position(&self) -> usize {
        self.pos
    }
}
