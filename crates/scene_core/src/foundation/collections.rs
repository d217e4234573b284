//! Specialized collection types

pub use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Stable, generational handle to an entity in a [`crate::scene::Scene`]
    ///
    /// A handle whose entity was destroyed never resolves again, even if the
    /// slot is reused.
    pub struct EntityId;

    /// Stable, generational handle to a scene graph node
    pub struct NodeId;
}
