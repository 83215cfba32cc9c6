//! Process-lifetime set of notified message ids.

use std::collections::{HashSet, VecDeque};

/// Retention policy for [`SeenSet`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Keep every id for the life of the process.
    #[default]
    Unbounded,
    /// Keep at most `capacity` ids, evicting the oldest first.
    Bounded {
        /// Maximum number of retained ids. Must be non-zero.
        capacity: usize,
    },
}

impl DedupPolicy {
    /// Build from an optional capacity, `None` meaning unbounded.
    pub fn from_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::Bounded {
                capacity: capacity.max(1),
            },
            None => Self::Unbounded,
        }
    }
}

/// Ids that have already produced a notification.
///
/// Shared across reconnects: the owner holds one instance for the whole
/// process, never one per connection.
#[derive(Debug, Default)]
pub struct SeenSet {
    policy: DedupPolicy,
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenSet {
    /// Create an empty set with the given policy.
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Insert `id`, returning `true` if it was not already present.
    pub fn check_and_insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        let _ = self.ids.insert(id.to_owned());
        if let DedupPolicy::Bounded { capacity } = self.policy {
            self.order.push_back(id.to_owned());
            while self.order.len() > capacity {
                if let Some(oldest) = self.order.pop_front() {
                    let _ = self.ids.remove(&oldest);
                }
            }
        }
        true
    }

    /// Whether `id` has been seen.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of retained ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no ids are retained.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_wins() {
        let mut seen = SeenSet::default();
        assert!(seen.check_and_insert("m1"));
        assert!(!seen.check_and_insert("m1"));
        assert!(seen.check_and_insert("m2"));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn unbounded_keeps_everything() {
        let mut seen = SeenSet::new(DedupPolicy::Unbounded);
        for i in 0..10_000 {
            assert!(seen.check_and_insert(&i.to_string()));
        }
        assert!(seen.contains("0"));
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn bounded_evicts_oldest() {
        let mut seen = SeenSet::new(DedupPolicy::Bounded { capacity: 2 });
        assert!(seen.check_and_insert("a"));
        assert!(seen.check_and_insert("b"));
        assert!(seen.check_and_insert("c"));
        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
        assert_eq!(seen.len(), 2);
        // An evicted id notifies again.
        assert!(seen.check_and_insert("a"));
    }

    #[test]
    fn duplicate_does_not_refresh_position() {
        let mut seen = SeenSet::new(DedupPolicy::Bounded { capacity: 2 });
        let _ = seen.check_and_insert("a");
        let _ = seen.check_and_insert("b");
        assert!(!seen.check_and_insert("a"));
        let _ = seen.check_and_insert("c");
        assert!(!seen.contains("a"));
    }

    #[test]
    fn policy_from_capacity() {
        assert_eq!(DedupPolicy::from_capacity(None), DedupPolicy::Unbounded);
        assert_eq!(
            DedupPolicy::from_capacity(Some(0)),
            DedupPolicy::Bounded { capacity: 1 }
        );
        assert_eq!(
            DedupPolicy::from_capacity(Some(500)),
            DedupPolicy::Bounded { capacity: 500 }
        );
    }
}
