//! Skin tables: bones, per-vertex influences and the cached bone point lists

use log::warn;
use smallvec::SmallVec;

use crate::foundation::collections::EntityId;
use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Influences stored inline per vertex; more spill to the heap
pub const MAX_BONES_PER_VERTEX: usize = 4;

/// Tolerance for treating a lone influence as a full binding
pub const UNIT_WEIGHT_EPSILON: f32 = 1.0e-6;

/// One bone acting on a vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneInfluence {
    /// Index into the skin's bone table
    pub bone: u32,
    /// Share of the vertex this bone moves
    pub weight: f32,
}

impl BoneInfluence {
    /// Create an influence
    pub fn new(bone: u32, weight: f32) -> Self {
        Self { bone, weight }
    }
}

/// Rest data of one skinned vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinVertexData {
    pub(crate) influences: SmallVec<[BoneInfluence; MAX_BONES_PER_VERTEX]>,
    pub(crate) position: Vec3,
}

impl SkinVertexData {
    /// Bones acting on this vertex
    pub fn influences(&self) -> &[BoneInfluence] {
        &self.influences
    }

    /// Rest position in the owner's bind frame
    pub fn initial_position(&self) -> Vec3 {
        self.position
    }

    /// Sum of all influence weights
    pub fn weight_sum(&self) -> f32 {
        self.influences.iter().map(|i| i.weight).sum()
    }

    /// Share of the rest pose kept by this vertex in weighted mode
    ///
    /// Unbound vertices keep the whole rest pose and a vertex bound to a
    /// single bone at full weight keeps none of it.
    pub fn rest_share(&self) -> f32 {
        match self.influences.as_slice() {
            [] => 1.0,
            [single] if (single.weight - 1.0).abs() <= UNIT_WEIGHT_EPSILON => 0.0,
            _ => 1.0 - self.weight_sum(),
        }
    }
}

/// One bone of a skin
#[derive(Debug, Clone, PartialEq)]
pub struct SkinBoneData {
    pub(crate) bone: Option<EntityId>,
    pub(crate) initial_inverse: Mat4,
    pub(crate) transform: Mat4,
}

impl Default for SkinBoneData {
    fn default() -> Self {
        Self {
            bone: None,
            initial_inverse: Mat4::identity(),
            transform: Mat4::identity(),
        }
    }
}

impl SkinBoneData {
    /// Entity driving this bone
    pub fn bone(&self) -> Option<EntityId> {
        self.bone
    }

    /// Inverse world matrix of the bone at bind time
    pub fn initial_inverse(&self) -> Mat4 {
        self.initial_inverse
    }

    /// Rest-to-current transform computed by the last bone update
    pub fn transform(&self) -> Mat4 {
        self.transform
    }
}

/// Weighted rest data of one vertex, grouped under the bone that moves it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePoint {
    /// `(p * w, w)`, so a single matrix product yields `w * T(p)`
    pub weighted_position: Vec4,
    /// Rest normal scaled by the weight
    pub weighted_normal: Vec3,
    /// Vertex written by this point
    pub vertex: usize,
}

/// Skinning data attached to an entity
#[derive(Debug, Clone)]
pub struct Skin {
    pub(crate) object_init: Mat4,
    pub(crate) bones: Vec<SkinBoneData>,
    pub(crate) vertices: Vec<SkinVertexData>,
    pub(crate) normals: Vec<Vec3>,
    pub(crate) weighted: bool,
    pub(crate) bone_points: Vec<Vec<BonePoint>>,
    pub(crate) points_valid: bool,
}

impl Default for Skin {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Skin {
    /// Create an empty skin
    pub fn new(weighted: bool) -> Self {
        Self {
            object_init: Mat4::identity(),
            bones: Vec::new(),
            vertices: Vec::new(),
            normals: Vec::new(),
            weighted,
            bone_points: Vec::new(),
            points_valid: false,
        }
    }

    // ========== Tables ==========

    /// Number of bones
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Resize the bone table; new bones are unbound
    pub fn set_bone_count(&mut self, count: usize) {
        self.bones.resize_with(count, SkinBoneData::default);
        self.points_valid = false;
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Resize the vertex table; new vertices sit at the origin, unbound
    pub fn set_vertex_count(&mut self, count: usize) {
        self.vertices.resize_with(count, SkinVertexData::default);
        self.points_valid = false;
    }

    /// Number of rest normals
    pub fn normal_count(&self) -> usize {
        self.normals.len()
    }

    /// Resize the rest normal table; normal `i` belongs to vertex `i`
    pub fn set_normal_count(&mut self, count: usize) {
        self.normals.resize(count, Vec3::zeros());
        self.points_valid = false;
    }

    // ========== Bones ==========

    /// Bone `index`
    pub fn bone(&self, index: usize) -> Option<&SkinBoneData> {
        self.bones.get(index)
    }

    /// Bind bone `index` to an entity (or unbind it)
    pub fn set_bone_entity(&mut self, index: usize, entity: Option<EntityId>) -> bool {
        let Some(bone) = self.bones.get_mut(index) else {
            return false;
        };
        bone.bone = entity;
        true
    }

    /// Set the bind-time inverse world matrix of bone `index`
    pub fn set_bone_initial_inverse(&mut self, index: usize, inverse: Mat4) -> bool {
        let Some(bone) = self.bones.get_mut(index) else {
            return false;
        };
        bone.initial_inverse = inverse;
        true
    }

    /// Matrix taking mesh data into the owner's bind frame
    pub fn object_init_matrix(&self) -> Mat4 {
        self.object_init
    }

    /// Set the matrix taking mesh data into the owner's bind frame
    pub fn set_object_init_matrix(&mut self, matrix: Mat4) {
        self.object_init = matrix;
    }

    // ========== Vertices ==========

    /// Vertex `index`
    pub fn vertex(&self, index: usize) -> Option<&SkinVertexData> {
        self.vertices.get(index)
    }

    /// Set the rest position of vertex `index`
    pub fn set_vertex_initial_position(&mut self, index: usize, position: Vec3) -> bool {
        let Some(vertex) = self.vertices.get_mut(index) else {
            return false;
        };
        vertex.position = position;
        self.points_valid = false;
        true
    }

    /// Rest normal `index`
    pub fn normal(&self, index: usize) -> Option<Vec3> {
        self.normals.get(index).copied()
    }

    /// Set rest normal `index`
    pub fn set_normal(&mut self, index: usize, normal: Vec3) -> bool {
        let Some(slot) = self.normals.get_mut(index) else {
            return false;
        };
        *slot = normal;
        self.points_valid = false;
        true
    }

    /// Replace every influence of vertex `index`
    ///
    /// Negative weights are dropped to zero. Weights summing above one are
    /// scaled down so the sum is exactly one.
    pub fn set_vertex_influences(&mut self, index: usize, influences: &[BoneInfluence]) -> bool {
        let Some(vertex) = self.vertices.get_mut(index) else {
            return false;
        };
        vertex.influences = influences
            .iter()
            .map(|i| BoneInfluence::new(i.bone, i.weight.max(0.0)))
            .collect();
        let sum = vertex.weight_sum();
        if sum > 1.0 + UNIT_WEIGHT_EPSILON {
            warn!("Vertex {index} weights sum to {sum}, normalizing");
            for influence in &mut vertex.influences {
                influence.weight /= sum;
            }
        }
        self.points_valid = false;
        true
    }

    /// Append one influence to vertex `index`
    pub fn add_vertex_influence(&mut self, index: usize, bone: u32, weight: f32) -> bool {
        let Some(vertex) = self.vertices.get(index) else {
            return false;
        };
        let mut influences = vertex.influences.clone();
        influences.push(BoneInfluence::new(bone, weight));
        self.set_vertex_influences(index, &influences)
    }

    // ========== Mode ==========

    /// Whether vertices keep `1 - Σw` of their rest position
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Switch between weighted and plain blending
    pub fn set_weighted(&mut self, weighted: bool) {
        self.weighted = weighted;
    }

    // ========== Bone point lists ==========

    /// Per-bone weighted rest data, rebuilt if any table changed
    pub fn bone_points(&mut self) -> &[Vec<BonePoint>] {
        if !self.points_valid {
            self.build_bone_point_lists();
        }
        &self.bone_points
    }

    /// Whether the bone point lists match the tables
    pub fn are_bone_points_valid(&self) -> bool {
        self.points_valid
    }

    /// Group every weighted vertex contribution under its bone
    ///
    /// Influences naming a bone outside the table and zero weights are
    /// skipped.
    pub fn build_bone_point_lists(&mut self) {
        let mut lists: Vec<Vec<BonePoint>> = vec![Vec::new(); self.bones.len()];
        for (vertex, data) in self.vertices.iter().enumerate() {
            let normal = self.normals.get(vertex).copied().unwrap_or_else(Vec3::zeros);
            for influence in &data.influences {
                if influence.weight <= 0.0 {
                    continue;
                }
                let Some(list) = lists.get_mut(influence.bone as usize) else {
                    continue;
                };
                let w = influence.weight;
                let p = data.position * w;
                list.push(BonePoint {
                    weighted_position: Vec4::new(p.x, p.y, p.z, w),
                    weighted_normal: normal * w,
                    vertex,
                });
            }
        }
        self.bone_points = lists;
        self.points_valid = true;
    }
}
