//! Per-conversion bookkeeping: the visited set and the depth guard.
//!
//! Both directions create a fresh [`Visited`] for every top-level call. The
//! encoder keys it by host allocation address and stores the Lua value
//! produced for it; the decoder keys it by Lua table address and stores the
//! host value produced for it.

use rustc_hash::FxHashMap;

use crate::error::ConversionError;

/// Identity-keyed memo of already converted values.
#[derive(Debug)]
pub struct Visited<V> {
    seen: FxHashMap<usize, V>,
}

impl<V> Default for Visited<V> {
    fn default() -> Self {
        Self {
            seen: FxHashMap::default(),
        }
    }
}

impl<V: Clone> Visited<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `identity` converted to `produced`.
    pub fn mark(&mut self, identity: usize, produced: V) {
        self.seen.insert(identity, produced);
    }

    /// Record a composite unless it is empty. Runtimes share one empty
    /// instance, so recording it would merge unrelated values.
    pub fn mark_composite(&mut self, identity: usize, len: usize, produced: V) -> bool {
        if len == 0 {
            return false;
        }
        self.mark(identity, produced);
        true
    }

    pub fn lookup(&self, identity: usize) -> Option<V> {
        let hit = self.seen.get(&identity).cloned();
        if hit.is_some() {
            tracing::trace!(target: "luar::tracker", identity, "visited hit");
        }
        hit
    }
}

/// Recursion guard for one top-level conversion.
#[derive(Debug, Clone, Copy)]
pub struct Depth {
    current: usize,
    limit: usize,
}

impl Depth {
    pub fn new(limit: usize) -> Self {
        Self { current: 0, limit }
    }

    pub fn descend(&mut self) -> Result<(), ConversionError> {
        if self.current >= self.limit {
            return Err(ConversionError::DepthExceeded { limit: self.limit });
        }
        self.current += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.current = self.current.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_marked_value() {
        let mut visited = Visited::new();
        assert_eq!(visited.lookup(0x10), None);
        visited.mark(0x10, "table");
        assert_eq!(visited.lookup(0x10), Some("table"));
        assert_eq!(visited.lookup(0x11), None);
    }

    #[test]
    fn empty_composites_are_not_recorded() {
        let mut visited = Visited::new();
        assert!(!visited.mark_composite(0x20, 0, 1));
        assert_eq!(visited.lookup(0x20), None);
        assert!(visited.mark_composite(0x20, 3, 1));
        assert_eq!(visited.lookup(0x20), Some(1));
    }

    #[test]
    fn depth_limit() {
        let mut depth = Depth::new(2);
        depth.descend().unwrap();
        depth.descend().unwrap();
        assert!(matches!(
            depth.descend(),
            Err(ConversionError::DepthExceeded { limit: 2 })
        ));
        depth.ascend();
        assert!(depth.descend().is_ok());
        assert!(depth.descend().is_err());
    }
}
