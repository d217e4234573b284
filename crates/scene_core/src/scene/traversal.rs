//! Ordered scene traversal
//!
//! Walks both layer roots depth-first, children in priority order. Subtrees
//! whose aggregate render mask has no bit in common with the requested
//! context are skipped without visiting a single node.

use crate::foundation::collections::{EntityId, NodeId};
use crate::foundation::math::Mat4;
use crate::scene::{Layer, Scene, AABB};

/// Callbacks driven by [`Scene::traverse`]
pub trait SceneVisitor {
    /// Called before the children of `id`; return `false` to skip them
    fn enter_entity(&mut self, scene: &Scene, id: EntityId) -> bool;

    /// Called after the children of `id`
    fn exit_entity(&mut self, _scene: &Scene, _id: EntityId) {}
}

/// What a renderer needs to draw one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    /// Entity to draw
    pub entity: EntityId,
    /// World matrix at collection time
    pub world: Mat4,
    /// World-space box of the entity's own geometry
    pub world_box: AABB,
    /// Mirrored basis; the renderer flips the front face
    pub indirect: bool,
}

struct EntityCollector(Vec<EntityId>);

impl SceneVisitor for EntityCollector {
    fn enter_entity(&mut self, _scene: &Scene, id: EntityId) -> bool {
        self.0.push(id);
        true
    }
}

struct DrawCollector(Vec<DrawItem>);

impl SceneVisitor for DrawCollector {
    fn enter_entity(&mut self, scene: &Scene, id: EntityId) -> bool {
        if let Some(entity) = scene.entity(id) {
            self.0.push(DrawItem {
                entity: id,
                world: entity.world,
                world_box: entity.geometry_box.transformed(&entity.world),
                indirect: entity.is_indirect(),
            });
        }
        true
    }
}

impl Scene {
    /// Visit every entity drawn in `context_mask`, scene layer first
    ///
    /// Deferred render-context mask updates are applied first and pending
    /// child sorts are resolved on the way down. Entities that are not drawn
    /// in the context are not reported, but their descendants still are.
    pub fn traverse<V: SceneVisitor + ?Sized>(&mut self, context_mask: u32, visitor: &mut V) {
        self.graph.flush_render_context_masks();
        for root in [self.root(Layer::Scene), self.root(Layer::Overlay)] {
            let node = self.entities[root].node;
            self.visit_node(node, context_mask, visitor);
        }
    }

    /// Entities drawn in `context_mask`, in traversal order
    pub fn visible_entities(&mut self, context_mask: u32) -> Vec<EntityId> {
        let mut collector = EntityCollector(Vec::new());
        self.traverse(context_mask, &mut collector);
        collector.0
    }

    /// Draw list for `context_mask`, in traversal order
    pub fn collect_draw_items(&mut self, context_mask: u32) -> Vec<DrawItem> {
        let mut collector = DrawCollector(Vec::new());
        self.traverse(context_mask, &mut collector);
        collector.0
    }

    fn visit_node<V: SceneVisitor + ?Sized>(&mut self, node: NodeId, context_mask: u32, visitor: &mut V) {
        self.graph.sort_children(node);
        let Some(n) = self.graph.get(node) else {
            return;
        };
        if n.subtree_mask() & context_mask == 0 {
            return;
        }
        let entity = n.entity();
        let drawn = n.render_mask() & context_mask != 0;
        // Snapshot so visitors observing the scene cannot invalidate the walk
        let children = n.children().to_vec();

        let descend = !drawn || visitor.enter_entity(self, entity);
        if descend {
            for child in children {
                self.visit_node(child, context_mask, visitor);
            }
        }
        if drawn {
            visitor.exit_entity(self, entity);
        }
    }
}
