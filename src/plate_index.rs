// 🔤 Plate Index - prefix trie over plate strings
//
// Plates share jurisdiction/series prefixes, so prefix search walks the
// prefix once and then enumerates only the matching subtree.
//
// Nodes live in an arena; the root is always slot 0. Children are kept in
// a BTreeMap so enumeration visits them in ascending character order.

use std::collections::BTreeMap;

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: BTreeMap<char, NodeId>,
    /// A complete plate ends here
    terminal: bool,
}

impl TrieNode {
    fn is_prunable(&self) -> bool {
        !self.terminal && self.children.is_empty()
    }
}

#[derive(Debug)]
pub struct PlateIndex {
    nodes: Vec<TrieNode>,
    free: Vec<NodeId>,
    /// Number of complete plates
    len: usize,
}

impl Default for PlateIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PlateIndex {
    pub fn new() -> Self {
        PlateIndex {
            nodes: vec![TrieNode::default()],
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Insert a plate. Idempotent; the empty string is ignored.
    ///
    /// Returns true when the plate was not present before.
    pub fn insert(&mut self, plate: &str) -> bool {
        if plate.is_empty() {
            return false;
        }

        let mut node = ROOT;
        for ch in plate.chars() {
            node = match self.nodes[node].children.get(&ch) {
                Some(&child) => child,
                None => {
                    let child = self.allocate();
                    self.nodes[node].children.insert(ch, child);
                    child
                }
            };
        }

        if self.nodes[node].terminal {
            return false;
        }
        self.nodes[node].terminal = true;
        self.len += 1;
        true
    }

    pub fn contains(&self, plate: &str) -> bool {
        !plate.is_empty() && self.walk(plate).map_or(false, |node| self.nodes[node].terminal)
    }

    /// Remove a plate, pruning the trailing chain nothing else uses.
    ///
    /// Returns false if the plate was not present.
    pub fn remove(&mut self, plate: &str) -> bool {
        if plate.is_empty() {
            return false;
        }

        // Record the path so it can be unwound leaf to root
        let mut path: Vec<(NodeId, char)> = Vec::with_capacity(plate.len());
        let mut node = ROOT;
        for ch in plate.chars() {
            match self.nodes[node].children.get(&ch) {
                Some(&child) => {
                    path.push((node, ch));
                    node = child;
                }
                None => return false,
            }
        }

        if !self.nodes[node].terminal {
            return false;
        }
        self.nodes[node].terminal = false;
        self.len -= 1;

        while let Some((parent, ch)) = path.pop() {
            if !self.nodes[node].is_prunable() {
                break;
            }
            self.nodes[parent].children.remove(&ch);
            self.release(node);
            node = parent;
        }

        true
    }

    /// Every plate starting with `prefix`, in ascending character order.
    ///
    /// An empty prefix matches nothing.
    pub fn search_by_prefix(&self, prefix: &str) -> Vec<String> {
        let mut result = Vec::new();
        if prefix.is_empty() {
            return result;
        }

        let Some(start) = self.walk(prefix) else {
            return result;
        };

        // Depth-first; children pushed in reverse so the smallest pops first
        let mut stack = vec![(start, prefix.to_string())];
        while let Some((node, plate)) = stack.pop() {
            if self.nodes[node].terminal {
                result.push(plate.clone());
            }
            for (&ch, &child) in self.nodes[node].children.iter().rev() {
                let mut next = plate.clone();
                next.push(ch);
                stack.push((child, next));
            }
        }

        result
    }

    fn walk(&self, prefix: &str) -> Option<NodeId> {
        let mut node = ROOT;
        for ch in prefix.chars() {
            node = *self.nodes[node].children.get(&ch)?;
        }
        Some(node)
    }

    fn allocate(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = TrieNode::default();
                id
            }
            None => {
                self.nodes.push(TrieNode::default());
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = TrieNode::default();
        self.free.push(id);
    }
}

// ============================================================================
// TESTS
// ============================================================================
