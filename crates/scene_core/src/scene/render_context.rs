//! Render-context masks
//!
//! Every drawing surface (main view, shadow map, picking pass, ...) owns one
//! bit of a 32-bit mask. Nodes store the OR of the contexts they are drawn
//! in; see [`crate::scene::Scene::set_render_context_mask`].

use log::{debug, warn};

/// Largest number of simultaneously allocated contexts
pub const MAX_RENDER_CONTEXTS: usize = u32::BITS as usize;

/// One allocated render context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderContext {
    index: u8,
}

impl RenderContext {
    /// Slot of this context, `0..MAX_RENDER_CONTEXTS`
    pub fn index(self) -> usize {
        usize::from(self.index)
    }

    /// Single-bit mask identifying this context
    pub fn mask(self) -> u32 {
        1 << self.index
    }
}

/// Hands out render-context bits
#[derive(Debug, Default, Clone)]
pub struct RenderContextRegistry {
    allocated: u32,
}

impl RenderContextRegistry {
    /// Create a registry with every slot free
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lowest free slot, `None` when all are taken
    pub fn allocate(&mut self) -> Option<RenderContext> {
        let free = !self.allocated;
        if free == 0 {
            warn!("All {MAX_RENDER_CONTEXTS} render contexts are in use");
            return None;
        }
        // trailing_zeros of a non-zero u32 is at most 31
        let index = free.trailing_zeros() as u8;
        self.allocated |= 1 << index;
        debug!("Allocated render context {index}");
        Some(RenderContext { index })
    }

    /// Return a context to the pool
    ///
    /// Entities keep the released bit in their masks; callers that reuse the
    /// slot should clear it from the scene first.
    pub fn release(&mut self, context: RenderContext) -> bool {
        let bit = context.mask();
        if self.allocated & bit == 0 {
            return false;
        }
        self.allocated &= !bit;
        true
    }

    /// Mask of every allocated context
    pub fn allocated_mask(&self) -> u32 {
        self.allocated
    }

    /// Number of allocated contexts
    pub fn len(&self) -> usize {
        self.allocated.count_ones() as usize
    }

    /// True when no context is allocated
    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }
}
