//! End-to-end scenarios over the whole scene: hierarchy, boxes and skinning
//! working together.

use approx::assert_relative_eq;

use crate::foundation::collections::EntityId;
use crate::foundation::math::constants::{HALF_PI, PI};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::{HierarchyError, Layer, Scene, AABB};
use crate::skin::{BoneInfluence, StridedBuffer};

fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::new(x, y, z))
}

fn unit_box() -> AABB {
    AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5))
}

fn assert_world_invariant(scene: &Scene) {
    for id in scene.entity_ids() {
        let parent = scene.parent(id).unwrap();
        let expected = scene.world_matrix(parent).unwrap() * scene.local_matrix(id).unwrap();
        assert_relative_eq!(scene.world_matrix(id).unwrap(), expected, epsilon = 1e-4);
    }
}

/// Chain `root -> e0 -> e1 -> ...`
fn chain(scene: &mut Scene, len: usize) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = Vec::with_capacity(len);
    for i in 0..len {
        let id = scene.create_entity(format!("e{i}"), Layer::Scene);
        if let Some(&last) = ids.last() {
            scene.set_parent(id, Some(last), false);
        }
        ids.push(id);
    }
    ids
}

#[test]
fn test_world_invariant_survives_mixed_edits() {
    let mut scene = Scene::default();
    let ids = chain(&mut scene, 4);
    let side = scene.create_entity("side", Layer::Scene);

    scene.set_local_matrix(ids[0], translation(1.0, 0.0, 0.0) * Mat4::rotation_y(HALF_PI), false);
    scene.set_scale(ids[1], Vec3::new(2.0, 1.0, 0.5), false);
    scene.set_position(ids[2], Vec3::new(0.0, 4.0, 0.0), true);
    scene.set_parent(side, Some(ids[2]), true);
    scene.set_world_matrix(ids[3], translation(-3.0, 0.0, 2.0), false);
    scene.set_local_matrix(ids[1], Mat4::rotation_x(PI / 3.0), true);
    scene.set_parent(ids[2], None, true);
    scene.destroy_entity(ids[1]);

    assert_world_invariant(&scene);
}

#[test]
fn test_cycles_rejected_without_side_effects() {
    let mut scene = Scene::default();
    let ids = chain(&mut scene, 3);
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    assert_eq!(
        scene.try_set_parent(a, Some(c), true),
        Err(HierarchyError::WouldCreateCycle { child: a, parent: c })
    );
    assert!(!scene.set_parent(b, Some(c), false));

    assert_eq!(scene.parent(a), Some(scene.root(Layer::Scene)));
    assert_eq!(scene.children(a), &[b]);
    assert_eq!(scene.children(b), &[c]);
    assert!(scene.is_ancestor(a, c));
    assert!(!scene.is_ancestor(c, a));
}

#[test]
fn test_box_is_union_of_geometry_and_children() {
    let mut scene = Scene::default();
    let parent = scene.create_entity("parent", Layer::Scene);
    let left = scene.create_entity("left", Layer::Scene);
    let right = scene.create_entity("right", Layer::Scene);
    scene.set_parent(left, Some(parent), false);
    scene.set_parent(right, Some(parent), false);

    scene.set_geometry_box(parent, unit_box());
    scene.set_geometry_box(left, unit_box());
    scene.set_geometry_box(right, AABB::new(Vec3::zeros(), Vec3::new(1.0, 2.0, 1.0)));
    scene.set_local_matrix(parent, translation(0.0, 0.0, 7.0) * Mat4::rotation_z(0.3), false);
    scene.set_position(left, Vec3::new(-4.0, 0.0, 0.0), false);
    scene.set_local_matrix(right, translation(3.0, 1.0, 0.0) * Mat4::rotation_y(HALF_PI), false);

    let expected = [left, right].iter().fold(unit_box(), |acc, &child| {
        let child_box = scene.geometry_box(child, true).unwrap();
        acc.union(&child_box.transformed(&scene.local_matrix(child).unwrap()))
    });
    let local = scene.bounding_box(parent, true).unwrap();
    assert_relative_eq!(local.min, expected.min, epsilon = 1e-5);
    assert_relative_eq!(local.max, expected.max, epsilon = 1e-5);

    let world = scene.bounding_box(parent, false).unwrap();
    let expected_world = expected.transformed(&scene.world_matrix(parent).unwrap());
    assert_relative_eq!(world.min, expected_world.min, epsilon = 1e-5);
    assert_relative_eq!(world.max, expected_world.max, epsilon = 1e-5);
}

#[test]
fn test_invalidation_stops_at_ancestors() {
    let mut scene = Scene::default();
    let a = scene.create_entity("a", Layer::Scene);
    let b = scene.create_entity("b", Layer::Scene);
    let b_sibling = scene.create_entity("b_sibling", Layer::Scene);
    let a_sibling = scene.create_entity("a_sibling", Layer::Scene);
    scene.set_parent(b, Some(a), false);
    scene.set_parent(b_sibling, Some(a), false);

    let all = [scene.root(Layer::Scene), a, b, b_sibling, a_sibling];
    for &id in &all {
        scene.set_geometry_box(id, unit_box());
    }
    for &id in &all {
        scene.bounding_box(id, true);
        assert!(scene.is_box_valid(id));
    }

    scene.translate(b, Vec3::x(), false);

    assert!(!scene.is_box_valid(b));
    assert!(!scene.is_box_valid(a));
    assert!(!scene.is_box_valid(scene.root(Layer::Scene)));
    assert!(scene.is_box_valid(b_sibling));
    assert!(scene.is_box_valid(a_sibling));
}

#[test]
fn test_keep_world_round_trip() {
    let mut scene = Scene::default();
    let a = scene.create_entity("a", Layer::Scene);
    let b = scene.create_entity("b", Layer::Scene);
    scene.set_local_matrix(a, translation(2.0, -1.0, 0.0) * Mat4::rotation_z(0.7), false);
    scene.set_parent(b, Some(a), false);
    scene.set_local_matrix(b, translation(0.0, 3.0, 1.0) * Mat4::new_scaling(1.5), false);
    let world = scene.world_matrix(b).unwrap();

    assert!(scene.set_parent(b, None, true));
    assert_eq!(scene.parent(b), Some(scene.root(Layer::Scene)));
    assert_relative_eq!(scene.world_matrix(b).unwrap(), world, epsilon = 1e-5);

    assert!(scene.set_parent(b, Some(a), true));
    assert_eq!(scene.parent(b), Some(a));
    assert_relative_eq!(scene.world_matrix(b).unwrap(), world, epsilon = 1e-5);
    assert_relative_eq!(
        scene.local_matrix(b).unwrap(),
        scene.inverse_world_matrix(a).unwrap() * world,
        epsilon = 1e-5
    );
}

struct Rig {
    scene: Scene,
    owner: EntityId,
    bones: Vec<EntityId>,
}

/// An owner mesh with `bone_count` bones bound at `bind` poses
fn rig(bind: &[Mat4], rest: &[Vec3]) -> Rig {
    let mut scene = Scene::default();
    let owner = scene.create_entity("mesh", Layer::Scene);
    let bones: Vec<EntityId> = bind
        .iter()
        .enumerate()
        .map(|(i, pose)| {
            let bone = scene.create_entity(format!("bone{i}"), Layer::Scene);
            scene.set_world_matrix(bone, *pose, false);
            bone
        })
        .collect();

    let skin = scene.get_or_create_skin(owner).unwrap();
    skin.set_bone_count(bones.len());
    skin.set_vertex_count(rest.len());
    for (i, (&bone, pose)) in bones.iter().zip(bind).enumerate() {
        skin.set_bone_entity(i, Some(bone));
        skin.set_bone_initial_inverse(i, pose.affine_inverse().unwrap());
    }
    for (i, p) in rest.iter().enumerate() {
        skin.set_vertex_initial_position(i, *p);
    }
    Rig { scene, owner, bones }
}

fn skinned(rig: &mut Rig, count: usize) -> Vec<Vec3> {
    let mut out = vec![[0.0f32; 3]; count];
    assert!(rig.scene.calc_skin_points(rig.owner, count, Some(StridedBuffer::from_vec3_slice(&mut out)), None));
    out.into_iter().map(Vec3::from).collect()
}

#[test]
fn test_partial_weights_blend_with_rest_pose() {
    let bind = [translation(1.0, 0.0, 0.0), translation(0.0, 1.0, 0.0)];
    let p = Vec3::new(0.5, 0.25, -1.0);
    let mut rig = rig(&bind, &[p]);
    rig.scene.skin_mut(rig.owner).unwrap().set_vertex_influences(
        0,
        &[BoneInfluence::new(0, 0.3), BoneInfluence::new(1, 0.4)],
    );

    let pose0 = translation(1.0, 0.0, 2.0) * Mat4::rotation_y(HALF_PI);
    let pose1 = translation(0.0, 5.0, 0.0) * Mat4::rotation_x(0.4);
    rig.scene.set_world_matrix(rig.bones[0], pose0, false);
    rig.scene.set_world_matrix(rig.bones[1], pose1, false);

    let t0 = pose0 * bind[0].affine_inverse().unwrap();
    let t1 = pose1 * bind[1].affine_inverse().unwrap();
    let expected = t0.rotate_and_translate(&p) * 0.3 + t1.rotate_and_translate(&p) * 0.4 + p * 0.3;

    assert_relative_eq!(skinned(&mut rig, 1)[0], expected, epsilon = 1e-5);
}

#[test]
fn test_single_full_weight_follows_bone_exactly() {
    let bind = [translation(0.0, 2.0, 0.0)];
    let p = Vec3::new(3.0, 2.0, 1.0);
    let mut rig = rig(&bind, &[p]);
    rig.scene
        .skin_mut(rig.owner)
        .unwrap()
        .set_vertex_influences(0, &[BoneInfluence::new(0, 1.0)]);

    let pose = translation(0.0, 2.0, 0.0) * Mat4::rotation_z(HALF_PI);
    rig.scene.set_world_matrix(rig.bones[0], pose, false);

    let expected = (pose * bind[0].affine_inverse().unwrap()).rotate_and_translate(&p);
    assert_relative_eq!(skinned(&mut rig, 1)[0], expected, epsilon = 1e-5);
}

#[test]
fn test_lost_bone_falls_back_to_rest_pose() {
    let rest = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
    let mut rig = rig(&[translation(0.0, 0.0, 1.0)], &rest);
    let skin = rig.scene.skin_mut(rig.owner).unwrap();
    skin.set_vertex_influences(0, &[BoneInfluence::new(0, 1.0)]);
    skin.set_vertex_influences(1, &[BoneInfluence::new(0, 0.5)]);
    rig.scene.translate(rig.bones[0], Vec3::new(0.0, 4.0, 0.0), false);

    rig.scene.destroy_entity(rig.bones[0]);

    let points = skinned(&mut rig, 2);
    assert_eq!(points, rest.to_vec());
    assert_eq!(rig.scene.skin(rig.owner).unwrap().bone(0).unwrap().bone(), None);
}
