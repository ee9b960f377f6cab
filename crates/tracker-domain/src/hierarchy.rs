//! Bounded walks over parent-pointer trees (board parents, ticket parents).
//!
//! Acyclicity is enforced on write, but walks never rely on it: every walk
//! carries a visited set and a depth limit.

use std::collections::HashSet;
use tracker_core::{TrackerError, TrackerResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep {
    /// First visit, keep walking.
    Continue,
    /// Node seen before: the chain loops.
    Cycle,
    /// Depth limit reached.
    TooDeep,
}

#[derive(Debug)]
pub struct WalkGuard {
    visited: HashSet<Uuid>,
    max_depth: usize,
}

impl WalkGuard {
    pub fn new(start: Uuid, max_depth: usize) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start);
        Self { visited, max_depth }
    }

    pub fn visit(&mut self, id: Uuid) -> WalkStep {
        if !self.visited.insert(id) {
            return WalkStep::Cycle;
        }
        // `visited` includes the start node
        if self.visited.len() > self.max_depth + 1 {
            return WalkStep::TooDeep;
        }
        WalkStep::Continue
    }

    pub fn depth(&self) -> usize {
        self.visited.len() - 1
    }
}

/// Would linking `child` under `new_parent` close a loop? `ancestors_of_parent`
/// is the parent's own ancestor chain (any order).
pub fn ensure_no_cycle(
    child: Uuid,
    new_parent: Uuid,
    ancestors_of_parent: &[Uuid],
    what: &str,
) -> TrackerResult<()> {
    if child == new_parent || ancestors_of_parent.contains(&child) {
        return Err(TrackerError::InvalidState(format!(
            "{} {} cannot be nested under its own descendant {}",
            what, child, new_parent
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_guard_detects_loop() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut guard = WalkGuard::new(a, 64);
        assert_eq!(guard.visit(b), WalkStep::Continue);
        assert_eq!(guard.visit(a), WalkStep::Cycle);
        assert_eq!(guard.visit(b), WalkStep::Cycle);
    }

    #[test]
    fn test_walk_guard() {
        let start = Uuid::new_v4();
        let mut guard = WalkGuard::new(start, 2);
        assert_eq!(guard.visit(Uuid::new_v4()), WalkStep::Continue);
        assert_eq!(guard.visit(start), WalkStep::Cycle);
        assert_eq!(guard.visit(Uuid::new_v4()), WalkStep::Continue);
        assert_eq!(guard.depth(), 2);
        assert_eq!(guard.visit(Uuid::new_v4()), WalkStep::TooDeep);
    }

    #[test]
    fn test_ensure_no_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert!(ensure_no_cycle(a, b, &[c], "Board").is_ok());
        assert!(ensure_no_cycle(a, a, &[], "Board").is_err());
        // b's ancestors include a: a under b would loop
        assert!(ensure_no_cycle(a, b, &[c, a], "Board").is_err());
    }
}
