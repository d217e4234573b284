//! Scene graph
//!
//! Spatial entities arranged in a parent/child hierarchy, with the
//! bookkeeping a renderer pulls from every frame.
//!
//! ## Architecture
//!
//! ```text
//! Scene (object table)
//!   ├─ Entity        local/world matrices, geometry box, flags
//!   ├─ SceneGraphNode hierarchical box cache, priority, render masks
//!   └─ Skin          bone-driven vertex deformation
//! ```
//!
//! - Every matrix change propagates down the subtree immediately
//! - Bounding boxes are invalidated upward and recomputed on read
//! - Traversal visits children in priority order and prunes by render context

mod aabb;
mod bounds;
mod entity;
mod hierarchy;
mod node;
mod render_context;
mod skinned;
mod traversal;

#[cfg(test)]
mod scenario_tests;

pub use aabb::AABB;
pub use entity::{Entity, Layer, MoveableFlags};
pub use hierarchy::{HierarchyError, Scene};
pub use node::{MaskOp, SceneGraph, SceneGraphNode, PRIORITY_DEFAULT, PRIORITY_SENTINEL};
pub use render_context::{RenderContext, RenderContextRegistry, MAX_RENDER_CONTEXTS};
pub use traversal::{DrawItem, SceneVisitor};
