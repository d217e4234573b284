//! Entity hierarchy and transform propagation
//!
//! [`Scene`] is the object table of the core: it owns every entity, its
//! scene graph node and its optional skin. Parent/child relations are
//! handles into the table, so destroying an entity can never leave a
//! dangling owner behind.
//!
//! Every mutation of a local or world matrix goes through
//! [`Scene::world_matrix_changed`], which keeps `world = parent.world * local`
//! true for the whole subtree before control returns to the caller.

use log::{debug, trace, warn};

use crate::config::SceneConfig;
use crate::foundation::collections::{EntityId, NodeId, SecondaryMap, SlotMap};
use crate::foundation::math::{restore_axis_scales, Mat4, Mat4Ext, Quat, Transform, Vec3};
use crate::scene::{Entity, Layer, MaskOp, MoveableFlags, SceneGraph};
use crate::skin::Skin;

/// Why a hierarchy operation was rejected
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyError {
    /// The handle does not resolve to a live entity
    #[error("entity {0:?} does not exist")]
    MissingEntity(EntityId),

    /// An entity cannot be its own parent
    #[error("entity {0:?} cannot be parented to itself")]
    SelfParent(EntityId),

    /// The new parent is a descendant of the entity
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// Entity being moved
        child: EntityId,
        /// Requested parent
        parent: EntityId,
    },

    /// Root entities are fixed
    #[error("root entity {0:?} cannot be moved, reparented or destroyed")]
    RootEntity(EntityId),

    /// The parent world matrix is singular so a local matrix cannot be derived
    #[error("parent of {0:?} has a singular world matrix")]
    SingularParent(EntityId),
}

/// The scene: entity table, node graph and skins
#[derive(Debug)]
pub struct Scene {
    pub(crate) config: SceneConfig,
    pub(crate) entities: SlotMap<EntityId, Entity>,
    pub(crate) graph: SceneGraph,
    pub(crate) skins: SecondaryMap<EntityId, Skin>,
    scene_root: EntityId,
    overlay_root: EntityId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl Scene {
    /// Create a scene holding only the two well-known roots
    pub fn new(config: SceneConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("Scene created with invalid configuration: {e}");
        }
        let mut entities = SlotMap::with_key();
        let mut graph = SceneGraph::new();

        let mut make_root = |name: &str, layer: Layer| {
            entities.insert_with_key(|key| {
                let node = graph.insert(key, config.default_priority);
                let mut root = Entity::new(name.to_string(), layer, node);
                root.is_root = true;
                root
            })
        };
        let scene_root = make_root("scene_root", Layer::Scene);
        let overlay_root = make_root("overlay_root", Layer::Overlay);

        Self {
            config,
            entities,
            graph,
            skins: SecondaryMap::new(),
            scene_root,
            overlay_root,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The root entity of `layer`
    pub fn root(&self, layer: Layer) -> EntityId {
        match layer {
            Layer::Scene => self.scene_root,
            Layer::Overlay => self.overlay_root,
        }
    }

    /// The node graph
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    // ========== Entity table ==========

    /// Create an entity attached to the root of `layer`
    pub fn create_entity(&mut self, name: impl Into<String>, layer: Layer) -> EntityId {
        let priority = self.config.default_priority;
        let graph = &mut self.graph;
        let name = name.into();
        let id = self.entities.insert_with_key(|key| {
            let node = graph.insert(key, priority);
            Entity::new(name, layer, node)
        });

        let root = self.root(layer);
        self.link(id, root);
        self.world_matrix_changed(id, false, false);
        trace!("Created entity {id:?} under {layer:?} root");
        id
    }

    /// Destroy an entity, promoting its children to its former parent
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        match self.try_destroy_entity(id) {
            Ok(()) => true,
            Err(e) => {
                debug!("destroy_entity rejected: {e}");
                false
            }
        }
    }

    /// Destroy an entity, reporting why it was refused
    pub fn try_destroy_entity(&mut self, id: EntityId) -> Result<(), HierarchyError> {
        let entity = self.entities.get(id).ok_or(HierarchyError::MissingEntity(id))?;
        if entity.is_root {
            return Err(HierarchyError::RootEntity(id));
        }
        let layer = entity.layer;
        let parent = entity
            .parent
            .filter(|p| self.entities.contains_key(*p))
            .unwrap_or_else(|| self.root(layer));
        let children = entity.children.clone();
        let keep_world = self.config.keep_world_on_destroy;

        for child in children {
            if let Err(e) = self.try_set_parent(child, Some(parent), keep_world) {
                // The former parent cannot be below this entity, but a stale
                // child handle can still show up here.
                debug!("Could not promote child {child:?}: {e}");
            }
        }

        self.unlink(id);
        if let Some(entity) = self.entities.remove(id) {
            self.graph.remove(entity.node);
        }
        self.skins.remove(id);
        trace!("Destroyed entity {id:?}");
        Ok(())
    }

    /// Whether `id` resolves to a live entity
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Look up an entity
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Number of entities, roots excluded
    pub fn entity_count(&self) -> usize {
        self.entities.len() - 2
    }

    /// Every non-root entity
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .iter()
            .filter(|(_, e)| !e.is_root)
            .map(|(id, _)| id)
    }

    /// Scene graph node of `id`
    pub fn node_of(&self, id: EntityId) -> Option<NodeId> {
        self.entities.get(id).map(|e| e.node)
    }

    // ========== Hierarchy ==========

    /// Parent of `id`; a root when the entity is detached
    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(id).and_then(|e| e.parent)
    }

    /// Children of `id`, empty when the entity does not exist
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.entities.get(id).map_or(&[], |e| e.children.as_slice())
    }

    /// Number of direct children of `id`
    pub fn child_count(&self, id: EntityId) -> usize {
        self.children(id).len()
    }

    /// Layer of `id`
    pub fn layer(&self, id: EntityId) -> Option<Layer> {
        self.entities.get(id).map(|e| e.layer)
    }

    /// True when `id` has an explicit (non-root) parent
    pub fn is_attached(&self, id: EntityId) -> bool {
        self.parent(id)
            .and_then(|p| self.entities.get(p))
            .is_some_and(|p| !p.is_root)
    }

    /// True when `ancestor` is a strict ancestor of `of`
    ///
    /// The walk is bounded by the entity count so a corrupted chain cannot
    /// loop forever.
    pub fn is_ancestor(&self, ancestor: EntityId, of: EntityId) -> bool {
        let mut current = self.parent(of);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.entities.len() {
                warn!("Parent chain of {of:?} does not terminate");
                return false;
            }
            current = self.parent(id);
        }
        false
    }

    /// Move `child` under `parent` (or under its layer root for `None`)
    ///
    /// Returns `false` and leaves the hierarchy untouched when the move is
    /// rejected.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>, keep_world: bool) -> bool {
        match self.try_set_parent(child, parent, keep_world) {
            Ok(()) => true,
            Err(e) => {
                debug!("set_parent rejected: {e}");
                false
            }
        }
    }

    /// Move `child` under `parent`, reporting why a move was refused
    ///
    /// With `keep_world` the local matrix is re-derived so the entity does
    /// not visually move; otherwise the local matrix is kept and the world
    /// matrix follows the new parent.
    pub fn try_set_parent(
        &mut self,
        child: EntityId,
        parent: Option<EntityId>,
        keep_world: bool,
    ) -> Result<(), HierarchyError> {
        let entity = self.entities.get(child).ok_or(HierarchyError::MissingEntity(child))?;
        if entity.is_root {
            return Err(HierarchyError::RootEntity(child));
        }
        let target = parent.unwrap_or_else(|| self.root(entity.layer));
        if !self.entities.contains_key(target) {
            return Err(HierarchyError::MissingEntity(target));
        }
        if target == child {
            return Err(HierarchyError::SelfParent(child));
        }
        if self.is_ancestor(child, target) {
            return Err(HierarchyError::WouldCreateCycle { child, parent: target });
        }
        if entity.parent == Some(target) {
            return Ok(());
        }

        self.unlink(child);

        let parent_world = self.entities[target].world;
        if keep_world {
            if let Some(inverse) = self.entities[target].inverse_world_matrix() {
                let e = &mut self.entities[child];
                e.local = inverse * e.world;
            }
        }

        self.link(child, target);
        let e = &mut self.entities[child];
        e.world = parent_world * e.local;
        self.world_matrix_changed(child, true, false);
        Ok(())
    }

    fn unlink(&mut self, child: EntityId) {
        let Some(entity) = self.entities.get_mut(child) else {
            return;
        };
        let node = entity.node;
        if let Some(old_parent) = entity.parent.take() {
            if let Some(p) = self.entities.get_mut(old_parent) {
                p.children.retain(|&c| c != child);
                let parent_node = p.node;
                self.graph.remove_child(parent_node, node);
            }
        }
    }

    fn link(&mut self, child: EntityId, parent: EntityId) {
        let child_node = self.entities[child].node;
        let p = &mut self.entities[parent];
        p.children.push(child);
        let parent_node = p.node;
        self.entities[child].parent = Some(parent);
        self.graph.add_child(parent_node, child_node);
    }

    // ========== Matrices ==========

    /// Transform of `id` relative to its parent
    pub fn local_matrix(&self, id: EntityId) -> Option<Mat4> {
        self.entities.get(id).map(|e| e.local)
    }

    /// Transform of `id` relative to the global origin
    pub fn world_matrix(&self, id: EntityId) -> Option<Mat4> {
        self.entities.get(id).map(|e| e.world)
    }

    /// Inverse world matrix of `id`, `None` if missing or singular
    pub fn inverse_world_matrix(&mut self, id: EntityId) -> Option<Mat4> {
        self.entities.get_mut(id)?.inverse_world_matrix()
    }

    /// Transform-derived flags of `id`
    pub fn flags(&self, id: EntityId) -> Option<MoveableFlags> {
        self.entities.get(id).map(|e| e.flags)
    }

    /// Clear `HAS_MOVED` on every entity
    pub fn clear_moved_flags(&mut self) {
        for (_, e) in &mut self.entities {
            e.flags.remove(MoveableFlags::HAS_MOVED);
        }
    }

    /// Replace the local matrix of `id`
    ///
    /// With `keep_children_world` the direct children get new local matrices
    /// so that they stay where they are in world space.
    pub fn set_local_matrix(&mut self, id: EntityId, local: Mat4, keep_children_world: bool) -> bool {
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        if entity.is_root {
            debug!("Ignoring local matrix change on root {id:?}");
            return false;
        }
        let parent_world = self.parent_world(id);
        let fixed_children: Vec<(EntityId, Mat4)> = if keep_children_world {
            entity
                .children
                .iter()
                .filter_map(|&c| self.entities.get(c).map(|e| (c, e.world)))
                .collect()
        } else {
            Vec::new()
        };

        let e = &mut self.entities[id];
        e.local = local;
        e.world = parent_world * local;

        if keep_children_world {
            if let Some(inverse) = e.world.affine_inverse() {
                for (child, world) in fixed_children {
                    self.entities[child].local = inverse * world;
                }
            }
        }
        self.world_matrix_changed(id, true, false);
        true
    }

    /// Replace the world matrix of `id`, deriving its local matrix
    ///
    /// Refused when the parent world matrix is singular.
    pub fn set_world_matrix(&mut self, id: EntityId, world: Mat4, keep_children_world: bool) -> bool {
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        if entity.is_root {
            debug!("Ignoring world matrix change on root {id:?}");
            return false;
        }
        let parent = entity.parent;
        let local = match parent {
            Some(parent) if self.entities.contains_key(parent) => {
                match self.entities[parent].inverse_world_matrix() {
                    Some(inverse) => inverse * world,
                    None => {
                        debug!("{}", HierarchyError::SingularParent(id));
                        return false;
                    }
                }
            }
            _ => world,
        };
        self.set_local_matrix(id, local, keep_children_world)
    }

    /// Refresh everything derived from the world matrix of `id`
    ///
    /// Drops the cached inverse, recomputes the handedness flags and
    /// invalidates the node box together with its ancestors. With
    /// `update_children` every descendant's world matrix is recomputed from
    /// its parent; with `keep_scale` each descendant keeps the axis lengths of
    /// its own local matrix regardless of the scale above it.
    pub fn world_matrix_changed(&mut self, id: EntityId, update_children: bool, keep_scale: bool) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        entity.world_changed();
        let node = entity.node;
        self.graph.invalidate_box(node);
        if !update_children {
            return;
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let parent = &mut self.entities[current];
            let parent_world = parent.world;
            let parent_inverse = if keep_scale { parent.inverse_world_matrix() } else { None };
            let children = parent.children.clone();

            for child in children {
                let Some(e) = self.entities.get_mut(child) else {
                    continue;
                };
                e.world = parent_world * e.local;
                if let Some(inverse) = parent_inverse {
                    restore_axis_scales(&mut e.world, &e.local);
                    e.local = inverse * e.world;
                }
                e.world_changed();
                let child_node = e.node;
                self.graph.invalidate_box(child_node);
                stack.push(child);
            }
        }
    }

    fn parent_world(&self, id: EntityId) -> Mat4 {
        self.parent(id)
            .and_then(|p| self.entities.get(p))
            .map_or_else(Mat4::identity, |p| p.world)
    }

    // ========== Position / orientation / scale ==========

    /// Local position of `id`
    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        self.entities.get(id).map(|e| e.local.translation_part())
    }

    /// Move `id` to `position` in its parent's frame
    pub fn set_position(&mut self, id: EntityId, position: Vec3, keep_children_world: bool) -> bool {
        let Some(mut local) = self.local_matrix(id) else {
            return false;
        };
        local.set_translation_part(&position);
        self.set_local_matrix(id, local, keep_children_world)
    }

    /// Offset `id` by `delta` in its parent's frame
    pub fn translate(&mut self, id: EntityId, delta: Vec3, keep_children_world: bool) -> bool {
        self.position(id)
            .is_some_and(|p| self.set_position(id, p + delta, keep_children_world))
    }

    /// Local orientation of `id`
    pub fn orientation(&self, id: EntityId) -> Option<Quat> {
        self.entities.get(id).map(|e| Transform::from_matrix(&e.local).rotation)
    }

    /// Replace the local orientation of `id`, keeping position and scale
    pub fn set_orientation(&mut self, id: EntityId, rotation: Quat, keep_children_world: bool) -> bool {
        let Some(local) = self.local_matrix(id) else {
            return false;
        };
        let mut transform = Transform::from_matrix(&local);
        transform.rotation = rotation;
        self.set_local_matrix(id, transform.to_matrix(), keep_children_world)
    }

    /// Local scale of `id` (a mirrored basis reports a negative X)
    pub fn scale(&self, id: EntityId) -> Option<Vec3> {
        self.entities.get(id).map(|e| Transform::from_matrix(&e.local).scale)
    }

    /// Replace the local scale of `id`, keeping position and orientation
    pub fn set_scale(&mut self, id: EntityId, scale: Vec3, keep_children_world: bool) -> bool {
        let Some(local) = self.local_matrix(id) else {
            return false;
        };
        let mut transform = Transform::from_matrix(&local);
        transform.scale = scale;
        self.set_local_matrix(id, transform.to_matrix(), keep_children_world)
    }

    // ========== Node bookkeeping ==========

    /// Ordering key of `id` among its siblings
    pub fn priority(&self, id: EntityId) -> Option<i16> {
        self.node_of(id)
            .and_then(|n| self.graph.get(n))
            .map(crate::scene::SceneGraphNode::priority)
    }

    /// Set the ordering key of `id`; see [`SceneGraph::set_priority`]
    pub fn set_priority(&mut self, id: EntityId, priority: i16, cascade: bool) -> bool {
        let Some(node) = self.node_of(id) else {
            return false;
        };
        self.graph.set_priority(node, priority, cascade);
        true
    }

    /// Replace the render-context mask of `id`
    ///
    /// Cascades to descendants when the configuration says so.
    pub fn set_render_context_mask(&mut self, id: EntityId, mask: u32, immediate: bool) -> bool {
        let cascade = self.config.cascade_render_masks;
        self.update_render_context_mask(id, MaskOp::Replace(mask), immediate, cascade)
    }

    /// OR `bits` into the render-context mask of `id`
    pub fn add_render_context_mask(&mut self, id: EntityId, bits: u32, immediate: bool) -> bool {
        let cascade = self.config.cascade_render_masks;
        self.update_render_context_mask(id, MaskOp::Add(bits), immediate, cascade)
    }

    /// Clear `bits` from the render-context mask of `id`
    pub fn remove_render_context_mask(&mut self, id: EntityId, bits: u32, immediate: bool) -> bool {
        let cascade = self.config.cascade_render_masks;
        self.update_render_context_mask(id, MaskOp::Remove(bits), immediate, cascade)
    }

    /// Apply `op` to the render-context mask of `id`
    pub fn update_render_context_mask(&mut self, id: EntityId, op: MaskOp, immediate: bool, cascade: bool) -> bool {
        let Some(node) = self.node_of(id) else {
            return false;
        };
        self.graph.update_render_context_mask(node, op, immediate, cascade);
        true
    }

    /// Apply deferred mask updates; returns how many were applied
    pub fn flush_render_context_masks(&mut self) -> usize {
        self.graph.flush_render_context_masks()
    }

    /// Render-context mask of `id`
    pub fn render_context_mask(&self, id: EntityId) -> Option<u32> {
        self.node_of(id)
            .and_then(|n| self.graph.get(n))
            .map(crate::scene::SceneGraphNode::render_mask)
    }

    /// Whether `id` is drawn in any context of `context_mask`
    pub fn is_visible_in(&self, id: EntityId, context_mask: u32) -> bool {
        self.node_of(id)
            .is_some_and(|n| self.graph.is_visible_in(n, context_mask))
    }

    /// Flatten the hierarchy for a global reset
    ///
    /// Every entity ends up directly under its layer root with its world
    /// transform preserved; priorities and render masks return to their
    /// defaults. Entities are not destroyed.
    pub fn reset_hierarchy(&mut self) {
        for root in [self.scene_root, self.overlay_root] {
            let node = self.entities[root].node;
            self.graph.clear(node);
            self.entities[root].children.clear();
        }

        let ids: Vec<EntityId> = self.entity_ids().collect();
        let priority = self.config.default_priority;
        for &id in &ids {
            let root = self.root(self.entities[id].layer);
            let e = &mut self.entities[id];
            e.local = e.world;
            e.children.clear();
            e.parent = None;
            let node = e.node;
            self.graph.set_priority(node, priority, false);
            self.graph.update_render_context_mask(node, MaskOp::Replace(0), true, false);
            self.link(id, root);
        }
        for id in ids {
            self.world_matrix_changed(id, false, false);
        }
        debug!("Scene hierarchy reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::HALF_PI;
    use approx::assert_relative_eq;

    fn translation(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::new_translation(&Vec3::new(x, y, z))
    }

    #[test]
    fn test_new_entity_hangs_from_layer_root() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        let b = scene.create_entity("b", Layer::Overlay);

        assert_eq!(scene.parent(a), Some(scene.root(Layer::Scene)));
        assert_eq!(scene.parent(b), Some(scene.root(Layer::Overlay)));
        assert!(!scene.is_attached(a));
        assert_eq!(scene.entity_count(), 2);
    }

    #[test]
    fn test_world_follows_parent() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_local_matrix(child, translation(0.0, 1.0, 0.0), false);
        assert!(scene.set_parent(child, Some(parent), false));

        scene.set_local_matrix(parent, translation(5.0, 0.0, 0.0), false);

        let world = scene.world_matrix(child).unwrap();
        assert_relative_eq!(world.translation_part(), Vec3::new(5.0, 1.0, 0.0), epsilon = 1e-6);
        assert!(scene.is_attached(child));
    }

    #[test]
    fn test_self_parent_rejected() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        assert_eq!(scene.try_set_parent(a, Some(a), true), Err(HierarchyError::SelfParent(a)));
    }

    #[test]
    fn test_roots_are_fixed() {
        let mut scene = Scene::default();
        let root = scene.root(Layer::Scene);
        let a = scene.create_entity("a", Layer::Scene);

        assert_eq!(scene.try_set_parent(root, Some(a), false), Err(HierarchyError::RootEntity(root)));
        assert!(!scene.destroy_entity(root));
        assert!(!scene.set_local_matrix(root, translation(1.0, 0.0, 0.0), false));
    }

    #[test]
    fn test_set_parent_none_rehomes_under_layer_root() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Overlay);
        let b = scene.create_entity("b", Layer::Scene);
        scene.set_parent(a, Some(b), true);

        assert!(scene.set_parent(a, None, true));
        assert_eq!(scene.parent(a), Some(scene.root(Layer::Overlay)));
        assert!(scene.children(b).is_empty());
    }

    #[test]
    fn test_keep_children_world_fixed() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);
        scene.set_local_matrix(child, translation(1.0, 0.0, 0.0), false);
        let before = scene.world_matrix(child).unwrap();

        scene.set_local_matrix(parent, translation(0.0, 3.0, 0.0) * Mat4::rotation_z(HALF_PI), true);

        assert_relative_eq!(scene.world_matrix(child).unwrap(), before, epsilon = 1e-5);
        assert_relative_eq!(
            scene.world_matrix(parent).unwrap() * scene.local_matrix(child).unwrap(),
            before,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_set_world_matrix_derives_local() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);
        scene.set_local_matrix(parent, translation(2.0, 0.0, 0.0), false);

        assert!(scene.set_world_matrix(child, translation(2.0, 2.0, 0.0), false));

        assert_relative_eq!(
            scene.local_matrix(child).unwrap().translation_part(),
            Vec3::new(0.0, 2.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_set_world_matrix_under_singular_parent_refused() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);
        scene.set_local_matrix(parent, Mat4::new_nonuniform_scaling(&Vec3::new(0.0, 1.0, 1.0)), false);

        assert!(!scene.set_world_matrix(child, translation(1.0, 0.0, 0.0), false));
        assert_eq!(scene.local_matrix(child), Some(Mat4::identity()));
    }

    #[test]
    fn test_set_world_matrix_under_tiny_parent_scale() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);
        scene.set_local_matrix(parent, Mat4::new_scaling(1.0e-4), false);

        assert!(scene.set_world_matrix(child, translation(1.0e-4, 0.0, 0.0), false));
        assert_relative_eq!(
            scene.local_matrix(child).unwrap().translation_part(),
            Vec3::new(1.0, 0.0, 0.0),
            max_relative = 1e-4
        );
    }

    #[test]
    fn test_keep_scale_ignores_parent_scale() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);

        let e = &mut scene.entities[parent];
        e.local = Mat4::new_scaling(4.0);
        e.world = e.local;
        scene.world_matrix_changed(parent, true, true);

        let child_world = scene.world_matrix(child).unwrap();
        assert_relative_eq!(child_world.axis_scales(), Vec3::repeat(1.0), epsilon = 1e-5);
        assert_relative_eq!(
            scene.world_matrix(parent).unwrap() * scene.local_matrix(child).unwrap(),
            child_world,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_mirrored_parent_marks_subtree_indirect() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);

        scene.set_scale(parent, Vec3::new(-1.0, 1.0, 1.0), false);

        assert!(scene.flags(parent).unwrap().contains(MoveableFlags::INDIRECT_MATRIX));
        assert!(scene.flags(child).unwrap().contains(MoveableFlags::INDIRECT_MATRIX));
    }

    #[test]
    fn test_position_scale_setters() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);

        scene.set_position(a, Vec3::new(1.0, 2.0, 3.0), false);
        scene.set_scale(a, Vec3::new(2.0, 2.0, 2.0), false);
        scene.translate(a, Vec3::new(1.0, 0.0, 0.0), false);

        assert_relative_eq!(scene.position(a).unwrap(), Vec3::new(2.0, 2.0, 3.0), epsilon = 1e-6);
        assert_relative_eq!(scene.scale(a).unwrap(), Vec3::repeat(2.0), epsilon = 1e-6);
    }

    #[test]
    fn test_destroy_promotes_children() {
        let mut scene = Scene::default();
        let grand = scene.create_entity("grand", Layer::Scene);
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(parent, Some(grand), false);
        scene.set_parent(child, Some(parent), false);
        scene.set_local_matrix(parent, translation(1.0, 0.0, 0.0), false);
        let before = scene.world_matrix(child).unwrap();

        assert!(scene.destroy_entity(parent));

        assert!(!scene.contains(parent));
        assert_eq!(scene.parent(child), Some(grand));
        assert_eq!(scene.children(grand), &[child]);
        assert_relative_eq!(scene.world_matrix(child).unwrap(), before, epsilon = 1e-6);
        assert!(!scene.destroy_entity(parent));
    }

    #[test]
    fn test_moved_flags_cleared() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        scene.clear_moved_flags();
        assert!(!scene.flags(a).unwrap().contains(MoveableFlags::HAS_MOVED));

        scene.translate(a, Vec3::x(), false);
        assert!(scene.flags(a).unwrap().contains(MoveableFlags::HAS_MOVED));
    }

    #[test]
    fn test_reset_hierarchy_flattens() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        let b = scene.create_entity("b", Layer::Scene);
        scene.set_local_matrix(a, translation(1.0, 0.0, 0.0), false);
        scene.set_local_matrix(b, translation(0.0, 1.0, 0.0), false);
        scene.set_parent(b, Some(a), false);
        scene.add_render_context_mask(b, 0b1, true);
        let b_world = scene.world_matrix(b).unwrap();

        scene.reset_hierarchy();

        assert_eq!(scene.parent(b), Some(scene.root(Layer::Scene)));
        assert!(scene.children(a).is_empty());
        assert_eq!(scene.render_context_mask(b), Some(0));
        assert_relative_eq!(scene.world_matrix(b).unwrap(), b_world, epsilon = 1e-6);
        assert_relative_eq!(scene.local_matrix(b).unwrap(), b_world, epsilon = 1e-6);
    }

    #[test]
    fn test_reset_hierarchy_discards_queued_masks() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        let b = scene.create_entity("b", Layer::Overlay);
        scene.add_render_context_mask(a, 0b1, false);
        scene.add_render_context_mask(b, 0b10, false);

        scene.reset_hierarchy();
        scene.flush_render_context_masks();

        assert_eq!(scene.render_context_mask(a), Some(0));
        assert_eq!(scene.render_context_mask(b), Some(0));
    }
}
