//! Skeletal skinning
//!
//! A [`Skin`] deforms a mesh by a weighted set of bone entities. Bones are
//! ordinary scene entities; the skin only reads their world matrices and
//! writes the deformed vertices into caller-owned [`StridedBuffer`]s.

mod blend;
mod buffer;
mod data;

pub use blend::PoseSource;
pub use buffer::{StridedBuffer, ELEMENT_SIZE};
pub use data::{
    BoneInfluence, BonePoint, Skin, SkinBoneData, SkinVertexData, MAX_BONES_PER_VERTEX,
    UNIT_WEIGHT_EPSILON,
};

use crate::foundation::collections::EntityId;

/// Skinning errors
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinError {
    /// No position buffer was supplied
    #[error("no output buffer for skinned positions")]
    MissingOutputBuffer,

    /// Elements would overlap
    #[error("stride of {stride} bytes is smaller than one element ({required} bytes)")]
    StrideTooSmall {
        /// Requested stride
        stride: usize,
        /// Size of one element
        required: usize,
    },

    /// The entity carries no skin
    #[error("entity {0:?} has no skin")]
    MissingSkin(EntityId),
}
