// 🌳 Owner Index - AVL tree keyed by driver's license number
//
// One node per owner, holding the owner's name and every plate they hold.
// Nodes live in an arena and link to each other by index, so rotations
// are index reassignments rather than pointer surgery.

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Arena slot of a tree node
pub type NodeId = usize;

// ============================================================================
// NODE
// ============================================================================

#[derive(Debug, Clone, Default)]
struct OwnerNode {
    license_number: String,
    owner_name: String,
    plates: Vec<String>,
    /// 1 + max(height(left), height(right)); a leaf is 1
    height: i32,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl OwnerNode {
    fn new(license_number: &str, owner_name: &str, plate: &str) -> Self {
        OwnerNode {
            license_number: license_number.to_string(),
            owner_name: owner_name.to_string(),
            plates: vec![plate.to_string()],
            height: 1,
            left: None,
            right: None,
        }
    }
}

/// What a lookup by license number returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerEntry {
    pub license_number: String,
    pub owner_name: String,
    /// In insertion order
    pub plates: Vec<String>,
}

// ============================================================================
// OWNER INDEX
// ============================================================================

#[derive(Debug, Default)]
pub struct OwnerIndex {
    nodes: Vec<OwnerNode>,
    /// Released slots, reused before the arena grows
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
}

impl OwnerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owners (tree nodes)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the whole tree (0 when empty)
    pub fn height(&self) -> i32 {
        self.height_of(self.root)
    }

    /// Add a plate under an owner.
    ///
    /// An existing license number gets the plate appended (no uniqueness
    /// check here); a new one gets a fresh node and the path is rebalanced.
    pub fn insert(&mut self, license_number: &str, owner_name: &str, plate: &str) {
        let root = self.root;
        self.root = Some(self.insert_at(root, license_number, owner_name, plate));
    }

    /// Detach a plate from an owner.
    ///
    /// Returns `Ok(true)` when the owner's last plate went and the node was
    /// deleted, `Ok(false)` when the owner still holds other plates.
    pub fn remove(&mut self, license_number: &str, plate: &str) -> RegistryResult<bool> {
        let id = self
            .find_node(license_number)
            .ok_or_else(|| RegistryError::OwnerNotFound(license_number.to_string()))?;

        let plates = &mut self.nodes[id].plates;
        let position = plates
            .iter()
            .position(|p| p == plate)
            .ok_or_else(|| RegistryError::PlateNotFound(plate.to_string()))?;
        plates.remove(position);

        if !plates.is_empty() {
            return Ok(false);
        }

        let root = self.root;
        self.root = self.delete_at(root, license_number);
        Ok(true)
    }

    /// Replace the stored owner name. False when the license is unknown.
    pub fn rename(&mut self, license_number: &str, owner_name: &str) -> bool {
        match self.find_node(license_number) {
            Some(id) => {
                self.nodes[id].owner_name = owner_name.to_string();
                true
            }
            None => false,
        }
    }

    /// Owner name + plates for a license number
    pub fn find_by_owner(&self, license_number: &str) -> Option<OwnerEntry> {
        self.find_node(license_number).map(|id| self.entry(id))
    }

    /// All owners in ascending license-number order (in-order walk)
    pub fn owners(&self) -> Vec<OwnerEntry> {
        let mut result = Vec::with_capacity(self.len);
        let mut stack = Vec::new();
        let mut current = self.root;

        while current.is_some() || !stack.is_empty() {
            while let Some(id) = current {
                stack.push(id);
                current = self.nodes[id].left;
            }
            if let Some(id) = stack.pop() {
                result.push(self.entry(id));
                current = self.nodes[id].right;
            }
        }

        result
    }

    /// Walk the whole tree checking order, stored heights and AVL balance.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut count = 0;
        self.check_subtree(self.root, None, None, &mut count)?;
        if count != self.len {
            return Err(format!("reachable nodes {} != len {}", count, self.len));
        }
        Ok(())
    }

    // ========================================================================
    // INSERT
    // ========================================================================

    fn insert_at(
        &mut self,
        node: Option<NodeId>,
        license_number: &str,
        owner_name: &str,
        plate: &str,
    ) -> NodeId {
        let id = match node {
            Some(id) => id,
            None => {
                self.len += 1;
                return self.allocate(OwnerNode::new(license_number, owner_name, plate));
            }
        };

        match license_number.cmp(self.nodes[id].license_number.as_str()) {
            Ordering::Less => {
                let left = self.nodes[id].left;
                let new_left = self.insert_at(left, license_number, owner_name, plate);
                self.nodes[id].left = Some(new_left);
            }
            Ordering::Greater => {
                let right = self.nodes[id].right;
                let new_right = self.insert_at(right, license_number, owner_name, plate);
                self.nodes[id].right = Some(new_right);
            }
            Ordering::Equal => {
                // Same owner: append, never a second node
                self.nodes[id].plates.push(plate.to_string());
                return id;
            }
        }

        self.rebalance_after_insert(id, license_number)
    }

    /// Pick the rotation from where the inserted key went
    fn rebalance_after_insert(&mut self, id: NodeId, license_number: &str) -> NodeId {
        self.update_height(id);
        let balance = self.balance(id);

        if balance > 1 {
            if let Some(left) = self.nodes[id].left {
                if license_number < self.nodes[left].license_number.as_str() {
                    // Left-Left
                    return self.rotate_right(id);
                }
                // Left-Right
                self.nodes[id].left = Some(self.rotate_left(left));
                return self.rotate_right(id);
            }
        }

        if balance < -1 {
            if let Some(right) = self.nodes[id].right {
                if license_number > self.nodes[right].license_number.as_str() {
                    // Right-Right
                    return self.rotate_left(id);
                }
                // Right-Left
                self.nodes[id].right = Some(self.rotate_right(right));
                return self.rotate_left(id);
            }
        }

        id
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    fn delete_at(&mut self, node: Option<NodeId>, license_number: &str) -> Option<NodeId> {
        let id = node?;

        match license_number.cmp(self.nodes[id].license_number.as_str()) {
            Ordering::Less => {
                let left = self.nodes[id].left;
                self.nodes[id].left = self.delete_at(left, license_number);
            }
            Ordering::Greater => {
                let right = self.nodes[id].right;
                self.nodes[id].right = self.delete_at(right, license_number);
            }
            Ordering::Equal => match (self.nodes[id].left, self.nodes[id].right) {
                (None, None) => {
                    self.release(id);
                    return None;
                }
                (Some(child), None) | (None, Some(child)) => {
                    self.release(id);
                    return Some(child);
                }
                (Some(_), Some(right)) => {
                    // Pull the in-order successor's payload up, then delete
                    // the successor (at most one child) from the right subtree.
                    let successor = self.leftmost(right);
                    let key = self.nodes[successor].license_number.clone();
                    let owner_name = std::mem::take(&mut self.nodes[successor].owner_name);
                    let plates = std::mem::take(&mut self.nodes[successor].plates);

                    let node = &mut self.nodes[id];
                    node.license_number = key.clone();
                    node.owner_name = owner_name;
                    node.plates = plates;

                    self.nodes[id].right = self.delete_at(Some(right), &key);
                }
            },
        }

        Some(self.rebalance_after_remove(id))
    }

    /// Pick the rotation from the heavy child's own balance
    fn rebalance_after_remove(&mut self, id: NodeId) -> NodeId {
        self.update_height(id);
        let balance = self.balance(id);

        if balance > 1 {
            if let Some(left) = self.nodes[id].left {
                if self.balance(left) >= 0 {
                    return self.rotate_right(id);
                }
                self.nodes[id].left = Some(self.rotate_left(left));
                return self.rotate_right(id);
            }
        }

        if balance < -1 {
            if let Some(right) = self.nodes[id].right {
                if self.balance(right) <= 0 {
                    return self.rotate_left(id);
                }
                self.nodes[id].right = Some(self.rotate_right(right));
                return self.rotate_left(id);
            }
        }

        id
    }

    // ========================================================================
    // ROTATIONS + HEIGHTS
    // ========================================================================

    fn rotate_right(&mut self, y: NodeId) -> NodeId {
        let Some(x) = self.nodes[y].left else {
            return y;
        };
        let t2 = self.nodes[x].right;

        self.nodes[x].right = Some(y);
        self.nodes[y].left = t2;

        self.update_height(y);
        self.update_height(x);
        x
    }

    fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self.nodes[x].right else {
            return x;
        };
        let t2 = self.nodes[y].left;

        self.nodes[y].left = Some(x);
        self.nodes[x].right = t2;

        self.update_height(x);
        self.update_height(y);
        y
    }

    fn height_of(&self, node: Option<NodeId>) -> i32 {
        node.map_or(0, |id| self.nodes[id].height)
    }

    fn update_height(&mut self, id: NodeId) {
        let left = self.height_of(self.nodes[id].left);
        let right = self.height_of(self.nodes[id].right);
        self.nodes[id].height = 1 + left.max(right);
    }

    fn balance(&self, id: NodeId) -> i32 {
        self.height_of(self.nodes[id].left) - self.height_of(self.nodes[id].right)
    }

    // ========================================================================
    // ARENA + LOOKUP HELPERS
    // ========================================================================

    fn allocate(&mut self, node: OwnerNode) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = OwnerNode::default();
        self.free.push(id);
        self.len -= 1;
    }

    fn find_node(&self, license_number: &str) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(id) = current {
            current = match license_number.cmp(self.nodes[id].license_number.as_str()) {
                Ordering::Less => self.nodes[id].left,
                Ordering::Greater => self.nodes[id].right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        id
    }

    fn entry(&self, id: NodeId) -> OwnerEntry {
        let node = &self.nodes[id];
        OwnerEntry {
            license_number: node.license_number.clone(),
            owner_name: node.owner_name.clone(),
            plates: node.plates.clone(),
        }
    }

    /// Returns the subtree height, checking every node on the way
    fn check_subtree(
        &self,
        node: Option<NodeId>,
        lower: Option<&str>,
        upper: Option<&str>,
        count: &mut usize,
    ) -> Result<i32, String> {
        let Some(id) = node else {
            return Ok(0);
        };
        let n = &self.nodes[id];
        *count += 1;

        if lower.map_or(false, |lo| n.license_number.as_str() <= lo)
            || upper.map_or(false, |hi| n.license_number.as_str() >= hi)
        {
            return Err(format!("order violated at {}", n.license_number));
        }
        if n.plates.is_empty() {
            return Err(format!("empty plate list at {}", n.license_number));
        }

        let left = self.check_subtree(n.left, lower, Some(n.license_number.as_str()), count)?;
        let right = self.check_subtree(n.right, Some(n.license_number.as_str()), upper, count)?;

        if n.height != 1 + left.max(right) {
            return Err(format!(
                "stale height at {}: stored {}, actual {}",
                n.license_number,
                n.height,
                1 + left.max(right)
            ));
        }
        if (left - right).abs() > 1 {
            return Err(format!(
                "unbalanced at {}: {} vs {}",
                n.license_number, left, right
            ));
        }

        Ok(n.height)
    }
}

// ============================================================================
// TESTS
// ============================================================================
