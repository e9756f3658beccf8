//! Keyed reconciliation of a dataset against the elements already on screen.
//!
//! [`diff`] only looks at key strings, so the same plan drives every renderer
//! regardless of what the elements are.

use std::collections::{HashMap, HashSet};

/// The three disjoint outcomes of joining new data against existing elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join<N> {
    /// Indices into the incoming data that need a new element
    pub enter: Vec<usize>,
    /// Incoming data index paired with the existing element it rebinds to
    pub update: Vec<(usize, N)>,
    /// Existing elements with no incoming datum
    pub exit: Vec<N>,
}

impl<N> Join<N> {
    /// Number of elements alive once the plan is applied
    #[cfg(test)]
    fn live_count(&self) -> usize {
        self.enter.len() + self.update.len()
    }
}

/// Compute enter/update/exit for `incoming` keys against `existing` elements.
///
/// The first occurrence of a key wins on both sides: a repeated incoming key
/// is ignored, and a repeated existing key sends the later element to exit.
/// This keeps at most one live element per key.
pub fn diff<N: Copy>(existing: &[(N, String)], incoming: &[String]) -> Join<N> {
    let mut by_key: HashMap<&str, N> = HashMap::with_capacity(existing.len());
    let mut exit = Vec::new();
    for (node, key) in existing {
        if by_key.contains_key(key.as_str()) {
            exit.push(*node);
        } else {
            by_key.insert(key.as_str(), *node);
        }
    }

    let mut enter = Vec::new();
    let mut update = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(incoming.len());
    for (i, key) in incoming.iter().enumerate() {
        if !seen.insert(key.as_str()) {
            continue;
        }
        match by_key.remove(key.as_str()) {
            Some(node) => update.push((i, node)),
            None => enter.push(i),
        }
    }

    // Whatever is left in the index was not claimed; keep document order.
    for (node, key) in existing {
        if by_key.remove(key.as_str()).is_some() {
            exit.push(*node);
        }
    }

    Join { enter, update, exit }
}
