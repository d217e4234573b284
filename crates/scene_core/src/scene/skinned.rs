//! Skins attached to scene entities
//!
//! A skin lives and dies with its owner entity. Bone poses are read straight
//! from the entity table.

use log::debug;

use crate::foundation::collections::EntityId;
use crate::scene::Scene;
use crate::skin::{Skin, SkinError, StridedBuffer};

impl Scene {
    /// Skin of `owner`
    pub fn skin(&self, owner: EntityId) -> Option<&Skin> {
        self.skins.get(owner)
    }

    /// Mutable skin of `owner`
    pub fn skin_mut(&mut self, owner: EntityId) -> Option<&mut Skin> {
        self.skins.get_mut(owner)
    }

    /// Whether `owner` carries a skin
    pub fn has_skin(&self, owner: EntityId) -> bool {
        self.skins.contains_key(owner)
    }

    /// Skin of `owner`, created with the configured blending mode if absent
    ///
    /// `None` when `owner` does not exist.
    pub fn get_or_create_skin(&mut self, owner: EntityId) -> Option<&mut Skin> {
        if !self.entities.contains_key(owner) {
            return None;
        }
        let weighted = self.config.weighted_skinning;
        let entry = self.skins.entry(owner)?;
        Some(entry.or_insert_with(|| Skin::new(weighted)))
    }

    /// Detach and return the skin of `owner`
    pub fn remove_skin(&mut self, owner: EntityId) -> Option<Skin> {
        self.skins.remove(owner)
    }

    /// Recompute the bone transforms of `owner`'s skin for the current pose
    ///
    /// Returns `false` when there is no skin, the owner's world matrix is
    /// singular, or no bone is bound any more.
    pub fn construct_bone_transfo_matrices(&mut self, owner: EntityId) -> bool {
        let Some(inverse) = self.inverse_world_matrix(owner) else {
            return false;
        };
        let Some(skin) = self.skins.get_mut(owner) else {
            return false;
        };
        skin.construct_bone_transfo_matrices(&self.entities, &inverse) > 0
    }

    /// Deform `owner`'s mesh into the given buffers; see [`Skin::calc_points`]
    pub fn calc_skin_points(
        &mut self,
        owner: EntityId,
        vertex_count: usize,
        positions: Option<StridedBuffer<'_>>,
        normals: Option<StridedBuffer<'_>>,
    ) -> bool {
        match self.try_calc_skin_points(owner, vertex_count, positions, normals) {
            Ok(_) => true,
            Err(e) => {
                debug!("calc_skin_points failed: {e}");
                false
            }
        }
    }

    /// Deform `owner`'s mesh, returning the number of vertices written
    pub fn try_calc_skin_points(
        &mut self,
        owner: EntityId,
        vertex_count: usize,
        positions: Option<StridedBuffer<'_>>,
        normals: Option<StridedBuffer<'_>>,
    ) -> Result<usize, SkinError> {
        if !self.skins.contains_key(owner) {
            return Err(SkinError::MissingSkin(owner));
        }
        let owner_inverse = self.inverse_world_matrix(owner);
        let skin = self.skins.get_mut(owner).ok_or(SkinError::MissingSkin(owner))?;
        skin.calc_points(&self.entities, owner_inverse, vertex_count, positions, normals)
    }
}
