//! Spatial entities
//!
//! An [`Entity`] carries the transform state of one object: its local and
//! world matrices, the cached inverse world matrix, its own geometry box and
//! its place in the entity hierarchy. Entities never own each other; the
//! [`crate::scene::Scene`] arena owns them all and parent/child links are
//! plain handles.

use bitflags::bitflags;

use crate::foundation::collections::{EntityId, NodeId};
use crate::foundation::math::{Mat4, Mat4Ext};
use crate::scene::AABB;

bitflags! {
    /// State bits derived from an entity's transform
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MoveableFlags: u32 {
        /// World basis has a negative determinant (mirrored).
        /// Consumers flip winding/lighting; the matrix is never corrected.
        const INDIRECT_MATRIX = 1 << 0;
        /// World basis is singular; the inverse world matrix is unavailable
        const DEGENERATE = 1 << 1;
        /// World matrix changed since the last `clear_moved_flags`
        const HAS_MOVED = 1 << 2;
    }
}

/// Which well-known root an unparented entity hangs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layer {
    /// Regular 3D content
    #[default]
    Scene,
    /// Content drawn on top of the scene (gizmos, HUD models, ...)
    Overlay,
}

/// One spatial object of the scene
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) name: String,
    pub(crate) layer: Layer,
    pub(crate) is_root: bool,

    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) node: NodeId,

    pub(crate) local: Mat4,
    pub(crate) world: Mat4,
    pub(crate) inverse_world: Option<Mat4>,
    pub(crate) inverse_valid: bool,

    pub(crate) geometry_box: AABB,
    pub(crate) flags: MoveableFlags,
}

impl Entity {
    pub(crate) fn new(name: String, layer: Layer, node: NodeId) -> Self {
        Self {
            name,
            layer,
            is_root: false,
            parent: None,
            children: Vec::new(),
            node,
            local: Mat4::identity(),
            world: Mat4::identity(),
            inverse_world: Some(Mat4::identity()),
            inverse_valid: true,
            geometry_box: AABB::empty(),
            flags: MoveableFlags::empty(),
        }
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer classification
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// True for the two well-known root entities
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Parent entity (a root when the entity is detached)
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Child entities in insertion order
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Scene graph node of this entity
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Transform relative to the parent
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local
    }

    /// Transform relative to the global origin
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world
    }

    /// Inverse of the world matrix, `None` when it is singular
    pub fn inverse_world_matrix(&mut self) -> Option<Mat4> {
        if !self.inverse_valid {
            self.inverse_world = self.world.affine_inverse();
            self.inverse_valid = true;
        }
        self.inverse_world
    }

    /// Box of the entity's own geometry in its local frame
    pub fn geometry_box(&self) -> AABB {
        self.geometry_box
    }

    /// Transform-derived state bits
    pub fn flags(&self) -> MoveableFlags {
        self.flags
    }

    /// World basis is mirrored
    pub fn is_indirect(&self) -> bool {
        self.flags.contains(MoveableFlags::INDIRECT_MATRIX)
    }

    /// Refresh everything derived from the world matrix
    ///
    /// The inverse is only dropped here and rebuilt on the next read.
    pub(crate) fn world_changed(&mut self) {
        self.inverse_valid = false;
        let det = self.world.basis_determinant();
        self.flags.set(MoveableFlags::INDIRECT_MATRIX, det < 0.0);
        self.flags.set(MoveableFlags::DEGENERATE, self.world.is_singular_basis());
        self.flags.insert(MoveableFlags::HAS_MOVED);
    }
}
