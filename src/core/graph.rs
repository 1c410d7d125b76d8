//! core::graph
//!
//! In-memory view of the stack forest.
//!
//! # Architecture
//!
//! Nodes are tracked branches plus trunk. Each tracked branch has exactly
//! one edge, pointing at its base. Children are derived from those edges
//! and kept in name order so every traversal is deterministic.
//!
//! # Invariants
//!
//! The graph itself accepts any edge set; [`crate::core::verify`] is what
//! rejects cycles and branches that never reach trunk.

use super::types::BranchName;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Parent/children index over tracked branches.
#[derive(Debug, Default, Clone)]
pub struct StackGraph {
    /// Base of each tracked branch
    parents: BTreeMap<BranchName, BranchName>,
    /// Children of each base, derived from `parents`
    children: BTreeMap<BranchName, BTreeSet<BranchName>>,
}

impl StackGraph {
    /// Create an empty stack graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(branch, base)` pairs.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = (&'a BranchName, &'a BranchName)>) -> Self {
        let mut graph = Self::new();
        for (child, parent) in edges {
            graph.add_edge(child.clone(), parent.clone());
        }
        graph
    }

    /// Set `child`'s base to `parent`, replacing any previous edge.
    pub fn add_edge(&mut self, child: BranchName, parent: BranchName) {
        if let Some(old) = self.parents.get(&child) {
            if let Some(siblings) = self.children.get_mut(old) {
                siblings.remove(&child);
            }
        }
        self.children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        self.parents.insert(child, parent);
    }

    /// Get the parent of a branch.
    pub fn parent(&self, branch: &BranchName) -> Option<&BranchName> {
        self.parents.get(branch)
    }

    /// Direct children of a branch, in name order.
    pub fn children(&self, branch: &BranchName) -> Vec<BranchName> {
        self.children
            .get(branch)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `branch` has an edge (is tracked).
    pub fn contains(&self, branch: &BranchName) -> bool {
        self.parents.contains_key(branch)
    }

    /// All tracked branches, in name order.
    pub fn branches(&self) -> impl Iterator<Item = &BranchName> {
        self.parents.keys()
    }

    /// Find a branch that lies on a cycle, if any.
    pub fn find_cycle(&self) -> Option<BranchName> {
        let mut cleared: HashSet<&BranchName> = HashSet::new();

        for start in self.parents.keys() {
            let mut path: Vec<&BranchName> = Vec::new();
            let mut current = Some(start);
            while let Some(branch) = current {
                if cleared.contains(branch) {
                    break;
                }
                if path.contains(&branch) {
                    return Some(branch.clone());
                }
                path.push(branch);
                current = self.parents.get(branch);
            }
            cleared.extend(path);
        }
        None
    }

    /// Everything above `branch`, breadth first, siblings in name order.
    pub fn descendants(&self, branch: &BranchName) -> Vec<BranchName> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut queue: VecDeque<BranchName> = self.children(branch).into();

        while let Some(current) = queue.pop_front() {
            if &current == branch || !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(self.children(&current));
            result.push(current);
        }
        result
    }

    /// `branch` followed by its descendants, parents always before children.
    ///
    /// This is the order restacks run in.
    ///
    /// ```
    /// use gstack::core::graph::StackGraph;
    /// use gstack::core::types::BranchName;
    ///
    /// let main = BranchName::new("main").unwrap();
    /// let a = BranchName::new("a").unwrap();
    /// let b = BranchName::new("b").unwrap();
    ///
    /// let mut graph = StackGraph::new();
    /// graph.add_edge(a.clone(), main.clone());
    /// graph.add_edge(b.clone(), a.clone());
    ///
    /// assert_eq!(graph.upstack_order(&a), vec![a, b]);
    /// ```
    pub fn upstack_order(&self, branch: &BranchName) -> Vec<BranchName> {
        let mut order = vec![branch.clone()];
        order.extend(self.descendants(branch));
        order
    }
}
