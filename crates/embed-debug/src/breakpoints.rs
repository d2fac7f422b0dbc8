//! Versioned breakpoint storage.
//! - BreakpointStore: path → breakpoint set, global dirty counter
//! - ResolvedBreakpoints: engine-side cache keyed on the dirty stamp

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::protocol::BreakpointSpec;

/// Breakpoints for one source path, stamped with the counter value at which
/// they were set.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointEntry {
    pub breakpoints: Vec<BreakpointSpec>,
    pub dirty: u64,
}

impl BreakpointEntry {
    /// Distinct lines carrying a breakpoint. Entries without a usable
    /// `line` are skipped.
    #[must_use]
    pub fn lines(&self) -> HashSet<u32> {
        self.breakpoints.iter().filter_map(BreakpointSpec::line).collect()
    }
}

/// Session-wide breakpoint table.
///
/// Every update bumps a single global counter, whatever path it touches.
/// Engines compare the counter against the stamp their resolved tables were
/// built at and re-resolve lazily.
#[derive(Debug, Default)]
pub struct BreakpointStore {
    entries: HashMap<String, BreakpointEntry>,
    dirty_counter: u64,
}

impl BreakpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the breakpoints for `path`.
    pub fn set_breakpoints(&mut self, path: impl Into<String>, breakpoints: Vec<BreakpointSpec>) {
        self.dirty_counter = self.dirty_counter.saturating_add(1);
        self.entries.insert(
            path.into(),
            BreakpointEntry {
                breakpoints,
                dirty: self.dirty_counter,
            },
        );
    }

    #[must_use]
    pub fn get_breakpoints(&self, path: &str) -> Option<&BreakpointEntry> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn dirty_counter(&self) -> u64 {
        self.dirty_counter
    }

    /// Number of paths with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Counts as an update.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty_counter = self.dirty_counter.saturating_add(1);
    }
}

/// Resolved breakpoint positions for one source unit.
///
/// `P` is whatever the engine breaks on (bytecode offsets, statement ids).
/// The set is rebuilt only when the store's counter moved past the stamp it
/// was built at.
#[derive(Debug)]
pub struct ResolvedBreakpoints<P> {
    stamp: Option<u64>,
    positions: HashSet<P>,
}

impl<P> Default for ResolvedBreakpoints<P> {
    fn default() -> Self {
        Self {
            stamp: None,
            positions: HashSet::new(),
        }
    }
}

impl<P: Eq + Hash> ResolvedBreakpoints<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `position` in `path` carries a breakpoint.
    ///
    /// `resolve` maps the path's breakpoint entry to positions and runs only
    /// when the cached set is stale.
    pub fn is_hit<F>(&mut self, store: &BreakpointStore, path: &str, position: &P, resolve: F) -> bool
    where
        F: FnOnce(&BreakpointEntry) -> HashSet<P>,
    {
        let counter = store.dirty_counter();
        if self.stamp != Some(counter) {
            self.positions = store
                .get_breakpoints(path)
                .map(resolve)
                .unwrap_or_default();
            self.stamp = Some(counter);
        }
        self.positions.contains(position)
    }

    /// Stamp the cached set was built at.
    #[must_use]
    pub fn stamp(&self) -> Option<u64> {
        self.stamp
    }
}
