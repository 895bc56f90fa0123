use std::collections::BTreeSet;

/// Hands out the smallest free positive id to each connecting peer.
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    active: BTreeSet<u32>,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u32 {
        let mut candidate = 1;
        for &id in &self.active {
            if id != candidate {
                break;
            }
            candidate += 1;
        }
        self.active.insert(candidate);
        candidate
    }

    pub fn release(&mut self, id: u32) -> bool {
        self.active.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_sequentially() {
        let mut ids = IdentityAllocator::new();
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);
        assert_eq!(ids.allocate(), 3);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_reuses_smallest_released() {
        let mut ids = IdentityAllocator::new();
        let first = ids.allocate();
        let middle = ids.allocate();
        let last = ids.allocate();

        assert!(ids.release(middle));
        assert!(!ids.release(middle));
        assert_eq!(ids.len(), 2);
        assert_eq!(ids.allocate(), middle);

        assert!(ids.release(first));
        assert!(ids.release(last));
        assert_eq!(ids.allocate(), first);
        assert_eq!(ids.allocate(), last);
    }

    #[test]
    fn test_release_unknown() {
        let mut ids = IdentityAllocator::new();
        assert!(!ids.release(4));
        assert!(ids.is_empty());
    }
}
