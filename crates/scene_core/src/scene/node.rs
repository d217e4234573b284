//! Scene graph nodes
//!
//! A [`SceneGraphNode`] is the traversal and bookkeeping side of an entity:
//! tree membership, the cached hierarchical bounding box, the per-node
//! priority and the render-context masks. Nodes live in a [`SceneGraph`]
//! arena and refer to each other through [`NodeId`] handles, so a stale
//! handle degrades into "no such node" instead of a dangling pointer.

use crate::foundation::collections::{EntityId, NodeId, SlotMap};
use crate::scene::AABB;

/// Default node priority
pub const PRIORITY_DEFAULT: i16 = 0;

/// Priority that forces a node ahead of (or, negated, behind) every sibling
pub const PRIORITY_SENTINEL: i16 = 10000;

/// How a render-context mask update combines with the current mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskOp {
    /// Overwrite the mask
    Replace(u32),
    /// OR bits into the mask
    Add(u32),
    /// Clear bits from the mask
    Remove(u32),
}

impl MaskOp {
    fn apply(self, mask: u32) -> u32 {
        match self {
            Self::Replace(bits) => bits,
            Self::Add(bits) => mask | bits,
            Self::Remove(bits) => mask & !bits,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingMask {
    node: NodeId,
    op: MaskOp,
    cascade: bool,
}

/// One node of the scene graph
#[derive(Debug, Clone)]
pub struct SceneGraphNode {
    entity: EntityId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,

    // Hierarchical box in the owning entity's local frame
    bbox: AABB,
    box_valid: bool,

    priority: i16,
    children_sort_pending: bool,

    // Contexts this node's entity is drawn in
    render_mask: u32,
    // render_mask of this node OR-ed with every descendant's
    subtree_mask: u32,
}

impl SceneGraphNode {
    fn new(entity: EntityId, priority: i16) -> Self {
        Self {
            entity,
            parent: None,
            children: Vec::new(),
            bbox: AABB::empty(),
            box_valid: false,
            priority,
            children_sort_pending: false,
            render_mask: 0,
            subtree_mask: 0,
        }
    }

    /// Entity this node belongs to
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Parent node, if attached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in their current order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Ordering key among siblings (higher first)
    pub fn priority(&self) -> i16 {
        self.priority
    }

    /// Render contexts this node is drawn in
    pub fn render_mask(&self) -> u32 {
        self.render_mask
    }

    /// Union of the render masks of this node and its whole subtree
    pub fn subtree_mask(&self) -> u32 {
        self.subtree_mask
    }

    /// Whether the cached hierarchical box is current
    pub fn is_box_valid(&self) -> bool {
        self.box_valid
    }
}

/// Arena holding every node of a scene
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneGraphNode>,
    pending_masks: Vec<PendingMask>,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node for `entity`
    pub fn insert(&mut self, entity: EntityId, priority: i16) -> NodeId {
        self.nodes.insert(SceneGraphNode::new(entity, clamp_priority(priority)))
    }

    /// Unlink and drop a node
    ///
    /// Remaining children are detached, not destroyed; the entity layer is
    /// expected to have re-homed them already.
    pub fn remove(&mut self, node: NodeId) -> Option<SceneGraphNode> {
        if let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) {
            self.remove_child(parent, node);
        }
        let removed = self.nodes.remove(node)?;
        for &child in &removed.children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = None;
            }
        }
        self.pending_masks.retain(|p| p.node != node);
        Some(removed)
    }

    /// Look up a node
    pub fn get(&self, node: NodeId) -> Option<&SceneGraphNode> {
        self.nodes.get(node)
    }

    /// Whether `node` is still alive
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no node
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `child` to `parent`, moving it out of its previous parent
    ///
    /// No-op when either node is missing, when `child == parent` or when
    /// `child` is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.nodes.contains_key(parent) {
            return;
        }
        if self.ancestors(parent).any(|a| a == child) {
            return;
        }
        let Some(previous) = self.nodes.get(child).map(|n| n.parent) else {
            return;
        };
        if previous == Some(parent) {
            return;
        }
        if let Some(previous) = previous {
            self.remove_child(previous, child);
        }

        let child_mask = self.nodes[child].subtree_mask;
        self.nodes[child].parent = Some(parent);
        let parent_node = &mut self.nodes[parent];
        parent_node.children.push(child);
        parent_node.children_sort_pending = true;

        self.invalidate_box(parent);
        self.or_into_ancestors(Some(parent), child_mask);
    }

    /// Remove `child` from `parent` without destroying it
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(parent_node) = self.nodes.get_mut(parent) else {
            return;
        };
        let Some(index) = parent_node.children.iter().position(|&c| c == child) else {
            return;
        };
        parent_node.children.remove(index);
        parent_node.children_sort_pending = true;
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = None;
        }

        self.invalidate_box(parent);
        self.refresh_ancestor_masks(parent);
    }

    /// Iterate from `node`'s parent up to the root
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(node).and_then(|n| n.parent), move |&current| {
            self.nodes.get(current).and_then(|n| n.parent)
        })
    }

    // ========== Bounding box cache ==========

    /// Mark `node` and every strict ancestor as needing a box recompute
    pub fn invalidate_box(&mut self, node: NodeId) {
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(n) = self.nodes.get_mut(id) else {
                break;
            };
            n.box_valid = false;
            current = n.parent;
        }
    }

    /// Cached hierarchical box, `None` when it must be recomputed
    pub fn cached_box(&self, node: NodeId) -> Option<AABB> {
        self.nodes
            .get(node)
            .filter(|n| n.box_valid)
            .map(|n| n.bbox)
    }

    pub(crate) fn store_box(&mut self, node: NodeId, bbox: AABB) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.bbox = bbox;
            n.box_valid = true;
        }
    }

    // ========== Priority ==========

    /// Set the ordering key of `node`
    ///
    /// Priority is never inherited: children keep their own values. With
    /// `cascade` the parent's child list is re-sorted right away, otherwise
    /// it is re-sorted lazily on the next ordered access.
    pub fn set_priority(&mut self, node: NodeId, priority: i16, cascade: bool) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        n.priority = clamp_priority(priority);
        let Some(parent) = n.parent else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children_sort_pending = true;
        }
        if cascade {
            self.sort_children(parent);
        }
    }

    /// Sort the children of `node` by descending priority if needed
    ///
    /// The sort is stable, so equal priorities keep insertion order.
    pub fn sort_children(&mut self, node: NodeId) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        if !n.children_sort_pending {
            return;
        }
        let mut children = n.children.clone();
        children.sort_by_key(|&c| {
            std::cmp::Reverse(self.nodes.get(c).map_or(PRIORITY_DEFAULT, |n| n.priority))
        });
        let n = &mut self.nodes[node];
        n.children = children;
        n.children_sort_pending = false;
    }

    // ========== Render-context masks ==========

    /// Update the render-context mask of `node`
    ///
    /// With `immediate` the change is applied now; otherwise it is queued
    /// until [`SceneGraph::flush_render_context_masks`]. With `cascade` every
    /// descendant receives the same update.
    pub fn update_render_context_mask(&mut self, node: NodeId, op: MaskOp, immediate: bool, cascade: bool) {
        if !self.nodes.contains_key(node) {
            return;
        }
        if immediate {
            self.apply_mask(node, op, cascade);
        } else {
            self.pending_masks.push(PendingMask { node, op, cascade });
        }
    }

    /// Apply every queued mask update in submission order
    pub fn flush_render_context_masks(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_masks);
        let count = pending.len();
        for update in pending {
            self.apply_mask(update.node, update.op, update.cascade);
        }
        count
    }

    /// Number of queued mask updates
    pub fn pending_mask_count(&self) -> usize {
        self.pending_masks.len()
    }

    /// Whether `node` is drawn in any context of `context_mask`
    pub fn is_visible_in(&self, node: NodeId, context_mask: u32) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|n| n.render_mask & context_mask != 0)
    }

    fn apply_mask(&mut self, node: NodeId, op: MaskOp, cascade: bool) {
        if !self.nodes.contains_key(node) {
            return;
        }
        if cascade {
            for id in self.subtree(node) {
                let n = &mut self.nodes[id];
                n.render_mask = op.apply(n.render_mask);
            }
        } else {
            let n = &mut self.nodes[node];
            n.render_mask = op.apply(n.render_mask);
        }
        self.recompute_subtree_masks(node);
        if let Some(parent) = self.nodes[node].parent {
            self.refresh_ancestor_masks(parent);
        }
    }

    fn or_into_ancestors(&mut self, start: Option<NodeId>, bits: u32) {
        let mut current = start;
        while let Some(id) = current {
            let Some(n) = self.nodes.get_mut(id) else {
                break;
            };
            n.subtree_mask |= bits;
            current = n.parent;
        }
    }

    fn aggregate_mask(&self, node: NodeId) -> u32 {
        let n = &self.nodes[node];
        n.children
            .iter()
            .filter_map(|&c| self.nodes.get(c))
            .fold(n.render_mask, |acc, c| acc | c.subtree_mask)
    }

    fn refresh_ancestor_masks(&mut self, start: NodeId) {
        let mut current = Some(start);
        while let Some(id) = current {
            if !self.nodes.contains_key(id) {
                break;
            }
            let mask = self.aggregate_mask(id);
            let n = &mut self.nodes[id];
            n.subtree_mask = mask;
            current = n.parent;
        }
    }

    fn recompute_subtree_masks(&mut self, node: NodeId) {
        // Reverse pre-order visits every child before its parent.
        for id in self.subtree(node).into_iter().rev() {
            let mask = self.aggregate_mask(id);
            self.nodes[id].subtree_mask = mask;
        }
    }

    // ========== Structure ==========

    /// `node` and all its descendants in pre-order
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.nodes.contains_key(node) {
            return order;
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(n) = self.nodes.get(id) {
                stack.extend(n.children.iter().rev().copied().filter(|c| self.nodes.contains_key(*c)));
            }
        }
        order
    }

    /// Detach every node below `node`, leaving each one parentless and
    /// childless
    ///
    /// Nodes are not destroyed and mask updates queued for the subtree are
    /// dropped. Must not run while a traversal holds child lists of this
    /// subtree.
    pub fn clear(&mut self, node: NodeId) {
        let subtree = self.subtree(node);
        self.pending_masks.retain(|p| !subtree.contains(&p.node));
        for &id in &subtree {
            let n = &mut self.nodes[id];
            if id != node {
                n.parent = None;
            }
            n.children.clear();
            n.children_sort_pending = false;
            n.box_valid = false;
            n.subtree_mask = n.render_mask;
        }
        if let Some(parent) = self.nodes[node].parent {
            self.invalidate_box(parent);
            self.refresh_ancestor_masks(parent);
        }
    }
}

fn clamp_priority(priority: i16) -> i16 {
    priority.clamp(-PRIORITY_SENTINEL, PRIORITY_SENTINEL)
}
