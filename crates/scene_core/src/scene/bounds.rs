//! Hierarchical bounding boxes
//!
//! A node's box is expressed in its entity's local frame and covers the
//! entity's own geometry plus every descendant. It is rebuilt on demand from
//! the node cache: only nodes invalidated since the last read are visited.

use log::trace;

use crate::foundation::collections::EntityId;
use crate::scene::{Scene, AABB};

impl Scene {
    /// Set the box of the entity's own geometry (local frame)
    ///
    /// Fed by the mesh layer whenever the geometry changes.
    pub fn set_geometry_box(&mut self, id: EntityId, bbox: AABB) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.geometry_box = bbox;
        let node = entity.node;
        self.graph.invalidate_box(node);
        true
    }

    /// Box of the entity's own geometry, in its local frame or in world space
    pub fn geometry_box(&self, id: EntityId, local: bool) -> Option<AABB> {
        let entity = self.entities.get(id)?;
        Some(if local {
            entity.geometry_box
        } else {
            entity.geometry_box.transformed(&entity.world)
        })
    }

    /// Box of the entity and its whole subtree, in its local frame or in
    /// world space
    ///
    /// Children whose frame cannot be expressed locally (singular world
    /// matrix) contribute an empty box.
    pub fn bounding_box(&mut self, id: EntityId, local: bool) -> Option<AABB> {
        if !self.entities.contains_key(id) {
            return None;
        }
        let bbox = self.hierarchical_box(id);
        if local {
            Some(bbox)
        } else {
            Some(bbox.transformed(&self.entities[id].world))
        }
    }

    /// Mark the box of `id` and its ancestors for recomputation
    pub fn invalidate_box(&mut self, id: EntityId) -> bool {
        let Some(node) = self.node_of(id) else {
            return false;
        };
        self.graph.invalidate_box(node);
        true
    }

    /// Whether the cached box of `id` is current
    pub fn is_box_valid(&self, id: EntityId) -> bool {
        self.node_of(id)
            .and_then(|n| self.graph.cached_box(n))
            .is_some()
    }

    fn hierarchical_box(&mut self, id: EntityId) -> AABB {
        let Some(entity) = self.entities.get_mut(id) else {
            return AABB::empty();
        };
        let node = entity.node;
        if let Some(cached) = self.graph.cached_box(node) {
            return cached;
        }

        let mut bbox = entity.geometry_box;
        let inverse = entity.inverse_world_matrix();
        let children = entity.children.clone();

        for child in children {
            let child_box = self.hierarchical_box(child);
            let (Some(inverse), Some(child_entity)) = (inverse, self.entities.get(child)) else {
                continue;
            };
            let to_local = inverse * child_entity.world;
            bbox = bbox.union(&child_box.transformed(&to_local));
        }

        trace!("Recomputed hierarchical box of {id:?}");
        self.graph.store_box(node, bbox);
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::scene::Layer;
    use approx::assert_relative_eq;

    fn unit_box() -> AABB {
        AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(1.0))
    }

    #[test]
    fn test_leaf_box_is_geometry_box() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        scene.set_geometry_box(a, unit_box());
        scene.set_position(a, Vec3::new(10.0, 0.0, 0.0), false);

        assert_eq!(scene.bounding_box(a, true), Some(unit_box()));
        let world = scene.bounding_box(a, false).unwrap();
        assert_relative_eq!(world.center(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_box_without_geometry_is_empty() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        assert!(scene.bounding_box(a, true).unwrap().is_empty());
    }

    #[test]
    fn test_child_box_expressed_in_parent_frame() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);
        scene.set_geometry_box(child, unit_box());
        scene.set_local_matrix(parent, Mat4::new_scaling(2.0), false);
        scene.set_position(child, Vec3::new(3.0, 0.0, 0.0), false);

        let local = scene.bounding_box(parent, true).unwrap();
        assert_relative_eq!(local.min, Vec3::new(2.0, -1.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(local.max, Vec3::new(4.0, 1.0, 1.0), epsilon = 1e-5);

        let world = scene.bounding_box(parent, false).unwrap();
        assert_relative_eq!(world.min, Vec3::new(4.0, -2.0, -2.0), epsilon = 1e-5);
        assert_relative_eq!(world.max, Vec3::new(8.0, 2.0, 2.0), epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_parent_drops_child_volume() {
        let mut scene = Scene::default();
        let parent = scene.create_entity("parent", Layer::Scene);
        let child = scene.create_entity("child", Layer::Scene);
        scene.set_parent(child, Some(parent), false);
        scene.set_geometry_box(child, unit_box());
        scene.set_local_matrix(parent, Mat4::new_nonuniform_scaling(&Vec3::new(0.0, 1.0, 1.0)), false);

        assert!(scene.bounding_box(parent, true).unwrap().is_empty());
        // The child itself still reports its own geometry
        assert_eq!(scene.bounding_box(child, true), Some(unit_box()));
    }

    #[test]
    fn test_box_cached_until_invalidated() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        scene.set_geometry_box(a, unit_box());
        assert!(!scene.is_box_valid(a));

        scene.bounding_box(a, true);
        assert!(scene.is_box_valid(a));

        scene.invalidate_box(a);
        assert!(!scene.is_box_valid(a));
    }

    #[test]
    fn test_missing_entity_has_no_box() {
        let mut scene = Scene::default();
        let a = scene.create_entity("a", Layer::Scene);
        scene.destroy_entity(a);
        assert_eq!(scene.bounding_box(a, false), None);
        assert_eq!(scene.geometry_box(a, true), None);
    }
}
