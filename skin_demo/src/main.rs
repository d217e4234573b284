//! Skinning demo application
//!
//! Builds a two-bone arm wrapped in a skinned tube, bends the elbow over a
//! few frames and logs the deformed vertices together with the entities
//! visible in each render context.
//!
//! Usage: `skin_demo [config.toml|config.ron]`

use scene_core::foundation::logging;
use scene_core::prelude::*;

const RING_COUNT: usize = 5;
const RING_SIZE: usize = 4;
const VERTEX_COUNT: usize = RING_COUNT * RING_SIZE;
const SEGMENT_LENGTH: f32 = 2.0;
const FRAME_COUNT: usize = 5;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("skinning: {0}")]
    Skin(#[from] SkinError),

    #[error("no free render context")]
    NoRenderContext,
}

struct SkinDemo {
    scene: Scene,
    arm: EntityId,
    elbow: EntityId,
    mesh: EntityId,
    main_view: RenderContext,
    shadow_pass: RenderContext,
}

impl SkinDemo {
    fn new(config: SceneConfig) -> Result<Self, DemoError> {
        let mut scene = Scene::new(config);
        let mut contexts = RenderContextRegistry::new();
        let main_view = contexts.allocate().ok_or(DemoError::NoRenderContext)?;
        let shadow_pass = contexts.allocate().ok_or(DemoError::NoRenderContext)?;

        let mesh = scene.create_entity("tube", Layer::Scene);
        let arm = scene.create_entity("upper_arm", Layer::Scene);
        let elbow = scene.create_entity("forearm", Layer::Scene);
        scene.set_parent(arm, Some(mesh), false);
        scene.set_parent(elbow, Some(arm), false);
        scene.set_position(elbow, Vec3::new(0.0, SEGMENT_LENGTH, 0.0), false);

        scene.add_render_context_mask(mesh, main_view.mask() | shadow_pass.mask(), true);
        scene.add_render_context_mask(elbow, main_view.mask(), true);
        scene.set_priority(elbow, 10, true);

        let mut demo = Self {
            scene,
            arm,
            elbow,
            mesh,
            main_view,
            shadow_pass,
        };
        demo.bind_skin();
        Ok(demo)
    }

    /// Rings of vertices along Y, blended between the two bones near the elbow
    fn bind_skin(&mut self) {
        let bind = [
            self.scene.world_matrix(self.arm).unwrap_or_else(Mat4::identity),
            self.scene.world_matrix(self.elbow).unwrap_or_else(Mat4::identity),
        ];
        let bones = [self.arm, self.elbow];
        let Some(skin) = self.scene.get_or_create_skin(self.mesh) else {
            return;
        };
        skin.set_bone_count(bones.len());
        skin.set_vertex_count(VERTEX_COUNT);
        for (index, (bone, pose)) in bones.iter().zip(bind).enumerate() {
            skin.set_bone_entity(index, Some(*bone));
            skin.set_bone_initial_inverse(index, pose.affine_inverse().unwrap_or_else(Mat4::identity));
        }

        let mut mesh_box = AABB::empty();
        for ring in 0..RING_COUNT {
            let height = ring as f32 * SEGMENT_LENGTH / 2.0;
            // 0 at the shoulder, 1 at the wrist
            let along = ring as f32 / (RING_COUNT - 1) as f32;
            let forearm_weight = ((along - 0.25) * 2.0).clamp(0.0, 1.0);
            for corner in 0..RING_SIZE {
                let angle = corner as f32 * std::f32::consts::TAU / RING_SIZE as f32;
                let position = Vec3::new(0.3 * angle.cos(), height, 0.3 * angle.sin());
                let vertex = ring * RING_SIZE + corner;
                skin.set_vertex_initial_position(vertex, position);
                skin.set_vertex_influences(
                    vertex,
                    &[
                        BoneInfluence::new(0, 1.0 - forearm_weight),
                        BoneInfluence::new(1, forearm_weight),
                    ],
                );
                mesh_box.extend_point(&position);
            }
        }
        self.scene.set_geometry_box(self.mesh, mesh_box);
    }

    fn frame(&mut self, frame: usize) -> Result<(), DemoError> {
        let bend = frame as f32 / (FRAME_COUNT - 1) as f32 * std::f32::consts::FRAC_PI_2;
        self.scene.set_orientation(self.elbow, Quat::from_axis_angle(&Vec3::z_axis(), bend), false);
        self.scene.flush_render_context_masks();

        let mut positions = vec![[0.0f32; 3]; VERTEX_COUNT];
        let written = self.scene.try_calc_skin_points(
            self.mesh,
            VERTEX_COUNT,
            Some(StridedBuffer::from_vec3_slice(&mut positions)),
            None,
        )?;

        log::info!("Frame {frame}: elbow bent by {:.1} degrees", bend.to_degrees());
        for (ring, chunk) in positions[..written].chunks(RING_SIZE).enumerate() {
            let center = chunk.iter().map(|p| Vec3::from(*p)).sum::<Vec3>() / chunk.len() as f32;
            log::info!("  ring {ring}: center ({:.2}, {:.2}, {:.2})", center.x, center.y, center.z);
        }
        if let Some(bounds) = self.scene.bounding_box(self.mesh, false) {
            log::debug!("  mesh bounds {:?} .. {:?}", bounds.min, bounds.max);
        }

        for (name, context) in [("main view", self.main_view), ("shadow pass", self.shadow_pass)] {
            let visible: Vec<String> = self
                .scene
                .visible_entities(context.mask())
                .into_iter()
                .filter_map(|id| self.scene.entity(id).map(|e| e.name().to_string()))
                .collect();
            log::info!("  {name}: {}", visible.join(", "));
        }
        self.scene.clear_moved_flags();
        Ok(())
    }

    fn run(&mut self) -> Result<(), DemoError> {
        for frame in 0..FRAME_COUNT {
            self.frame(frame)?;
        }
        Ok(())
    }
}

fn load_config() -> Result<SceneConfig, DemoError> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(SceneConfig::default());
    };
    let config = SceneConfig::load_from_file(&path)?;
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init_with_level(&config.log_level);

    log::info!("Starting skinning demo");
    let mut demo = SkinDemo::new(config)?;
    demo.run()?;
    log::info!("Skinning demo finished after {FRAME_COUNT} frames");
    Ok(())
}
