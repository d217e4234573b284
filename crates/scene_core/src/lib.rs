//! # Scene Core
//!
//! Scene graph and skinning core for a 3D engine.
//!
//! ## Features
//!
//! - **Entity Hierarchy**: Parent/child transforms kept consistent on every edit
//! - **Bounding Volumes**: Lazily recomputed hierarchical boxes
//! - **Render Contexts**: Per-node visibility masks with subtree pruning
//! - **Priority Ordering**: Stable per-node ordering of siblings
//! - **Skinning**: Weighted linear blend skinning into strided vertex buffers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_core::prelude::*;
//!
//! let mut scene = Scene::new(SceneConfig::default());
//! let arm = scene.create_entity("arm", Layer::Scene);
//! let hand = scene.create_entity("hand", Layer::Scene);
//! scene.set_parent(hand, Some(arm), false);
//! scene.set_position(hand, Vec3::new(0.0, 1.0, 0.0), false);
//!
//! let mut contexts = RenderContextRegistry::new();
//! let main_view = contexts.allocate().unwrap();
//! scene.add_render_context_mask(hand, main_view.mask(), true);
//!
//! for id in scene.visible_entities(main_view.mask()) {
//!     let world_box = scene.bounding_box(id, false);
//!     println!("{id:?}: {world_box:?}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod scene;
pub mod skin;

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, SceneConfig},
        foundation::{
            collections::{EntityId, NodeId},
            math::{Mat4, Mat4Ext, Quat, Transform, Vec3},
        },
        scene::{
            DrawItem, HierarchyError, Layer, MaskOp, MoveableFlags, RenderContext,
            RenderContextRegistry, Scene, SceneVisitor, AABB,
        },
        skin::{BoneInfluence, Skin, SkinError, StridedBuffer},
    };
}
