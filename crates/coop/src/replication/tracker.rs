use indexmap::IndexSet;

use crate::net::UpdateType;

/// Pending facets in first-marked order. A facet is pending at most once.
#[derive(Debug, Clone, Default)]
pub struct DirtySet {
    pending: IndexSet<UpdateType>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the facet was already pending.
    pub fn mark(&mut self, kind: UpdateType) -> bool {
        self.pending.insert(kind)
    }

    pub fn contains(&self, kind: UpdateType) -> bool {
        self.pending.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn drain(&mut self) -> impl Iterator<Item = UpdateType> + '_ {
        self.pending.drain(..)
    }
}

/// Accepts a value only after it has been observed unchanged for `delay_ms`.
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    stable: Option<T>,
    candidate: Option<(T, u64)>,
    delay_ms: u64,
}

impl<T: Clone + PartialEq> Debounced<T> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            stable: None,
            candidate: None,
            delay_ms,
        }
    }

    pub fn stable(&self) -> Option<&T> {
        self.stable.as_ref()
    }

    /// Feeds the current value. Returns the new stable value on the tick it settles.
    pub fn observe(&mut self, value: T, now_ms: u64) -> Option<&T> {
        if self.stable.as_ref() == Some(&value) {
            self.candidate = None;
            return None;
        }

        match &self.candidate {
            Some((pending, since)) if *pending == value => {
                if now_ms.saturating_sub(*since) < self.delay_ms {
                    return None;
                }
            }
            _ => {
                self.candidate = Some((value, now_ms));
                return None;
            }
        }

        self.candidate = None;
        self.stable = Some(value);
        self.stable.as_ref()
    }

    /// Forgets the stable value so the next settled observation fires again.
    pub fn reset(&mut self) {
        self.stable = None;
        self.candidate = None;
    }
}
