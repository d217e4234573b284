//! Linear blend skinning
//!
//! Each bone's transform maps bind-pose mesh data to its current pose in the
//! owner's local frame:
//!
//! ```text
//! T_b = inverse(owner.world) * bone.world * bone.initial_inverse * object_init
//! ```
//!
//! Skinned positions are accumulated bone by bone from the cached
//! [`BonePoint`] lists, so every matrix is applied once per influence.

use log::{debug, trace};

use crate::foundation::collections::{EntityId, SlotMap};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::Entity;
use crate::skin::{BonePoint, Skin, SkinError, StridedBuffer};

/// Where a skin reads the current pose of its bones
pub trait PoseSource {
    /// World matrix of `bone`, `None` when it no longer exists
    fn bone_world(&self, bone: EntityId) -> Option<Mat4>;
}

impl PoseSource for SlotMap<EntityId, Entity> {
    fn bone_world(&self, bone: EntityId) -> Option<Mat4> {
        self.get(bone).map(|e| *e.world_matrix())
    }
}

impl Skin {
    /// Recompute every bone transform for the current pose
    ///
    /// Bones whose entity has disappeared are unbound and contribute nothing
    /// from then on. Returns the number of bones that are still bound.
    pub fn construct_bone_transfo_matrices(&mut self, poses: &impl PoseSource, owner_inverse: &Mat4) -> usize {
        let mut bound = 0;
        let object_init = self.object_init;
        for (index, bone) in self.bones.iter_mut().enumerate() {
            let Some(entity) = bone.bone else {
                continue;
            };
            match poses.bone_world(entity) {
                Some(world) => {
                    bone.transform = owner_inverse * world * bone.initial_inverse * object_init;
                    bound += 1;
                }
                None => {
                    debug!("Bone {index} lost its entity {entity:?}, unbinding it");
                    bone.bone = None;
                }
            }
        }
        bound
    }

    /// Write skinned positions (and optionally normals) of the first
    /// `vertex_count` vertices
    ///
    /// `vertex_count` is clamped to the vertices the skin and the buffers
    /// actually hold. Normals are rotated by each bone's basis and left
    /// unnormalized. When no bone is usable (none bound, or the owner's world
    /// matrix is singular) the rest pose is copied instead. Returns how many
    /// positions were written.
    pub fn calc_points(
        &mut self,
        poses: &impl PoseSource,
        owner_inverse: Option<Mat4>,
        vertex_count: usize,
        positions: Option<StridedBuffer<'_>>,
        normals: Option<StridedBuffer<'_>>,
    ) -> Result<usize, SkinError> {
        let mut positions = positions.ok_or(SkinError::MissingOutputBuffer)?;
        let mut normals = normals;

        let count = vertex_count.min(self.vertices.len()).min(positions.len());
        if count < vertex_count {
            debug!("Skinning {count} of {vertex_count} requested vertices");
        }
        let normal_count = normals
            .as_ref()
            .map_or(0, |n| count.min(self.normals.len()).min(n.len()));

        let bound = match owner_inverse {
            Some(inverse) => self.construct_bone_transfo_matrices(poses, &inverse),
            None => 0,
        };
        if bound == 0 {
            trace!("No usable bone, copying the rest pose");
            self.copy_rest_pose(count, normal_count, &mut positions, normals.as_mut());
            return Ok(count);
        }

        if !self.points_valid {
            self.build_bone_point_lists();
        }
        self.init_points(count, normal_count, &mut positions, normals.as_mut());

        for (bone, points) in self.bones.iter().zip(&self.bone_points) {
            if bone.bone.is_none() {
                continue;
            }
            accumulate(&bone.transform, points, count, normal_count, &mut positions, normals.as_mut());
        }
        Ok(count)
    }

    fn copy_rest_pose(
        &self,
        count: usize,
        normal_count: usize,
        positions: &mut StridedBuffer<'_>,
        normals: Option<&mut StridedBuffer<'_>>,
    ) {
        for (i, vertex) in self.vertices.iter().take(count).enumerate() {
            positions.set(i, &vertex.position);
        }
        if let Some(normals) = normals {
            for (i, normal) in self.normals.iter().take(normal_count).enumerate() {
                normals.set(i, normal);
            }
        }
    }

    fn init_points(
        &self,
        count: usize,
        normal_count: usize,
        positions: &mut StridedBuffer<'_>,
        mut normals: Option<&mut StridedBuffer<'_>>,
    ) {
        for (i, vertex) in self.vertices.iter().take(count).enumerate() {
            let share = if self.weighted { vertex.rest_share() } else { 0.0 };
            positions.set(i, &(vertex.position * share));
            if i < normal_count {
                if let Some(normals) = normals.as_deref_mut() {
                    normals.set(i, &(self.normals[i] * share));
                }
            }
        }
    }
}

fn accumulate(
    transform: &Mat4,
    points: &[BonePoint],
    count: usize,
    normal_count: usize,
    positions: &mut StridedBuffer<'_>,
    mut normals: Option<&mut StridedBuffer<'_>>,
) {
    for point in points {
        if point.vertex >= count {
            continue;
        }
        let moved = transform * point.weighted_position;
        positions.add(point.vertex, &Vec3::new(moved.x, moved.y, moved.z));
        if point.vertex < normal_count {
            if let Some(normals) = normals.as_deref_mut() {
                normals.add(point.vertex, &transform.rotate_only(&point.weighted_normal));
            }
        }
    }
}
