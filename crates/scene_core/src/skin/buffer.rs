//! Caller-owned strided vertex buffers
//!
//! Skinned points are written straight into the mesh layer's interleaved
//! vertex storage. A [`StridedBuffer`] views that storage as a sequence of
//! `[f32; 3]` elements spaced `stride` bytes apart; it never allocates.

use std::mem::size_of;

use crate::foundation::math::Vec3;
use crate::skin::SkinError;

/// Size in bytes of one element
pub const ELEMENT_SIZE: usize = size_of::<[f32; 3]>();

/// Mutable view of `[f32; 3]` elements spaced `stride` bytes apart
#[derive(Debug)]
pub struct StridedBuffer<'a> {
    data: &'a mut [u8],
    stride: usize,
}

impl<'a> StridedBuffer<'a> {
    /// Wrap raw bytes; the first element starts at offset 0
    pub fn new(data: &'a mut [u8], stride: usize) -> Result<Self, SkinError> {
        if stride < ELEMENT_SIZE {
            return Err(SkinError::StrideTooSmall {
                stride,
                required: ELEMENT_SIZE,
            });
        }
        Ok(Self { data, stride })
    }

    /// Wrap a tightly packed slice of vectors
    pub fn from_vec3_slice(data: &'a mut [[f32; 3]]) -> Self {
        Self {
            data: bytemuck::cast_slice_mut(data),
            stride: ELEMENT_SIZE,
        }
    }

    /// Byte distance between consecutive elements
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of complete elements in the buffer
    pub fn len(&self) -> usize {
        if self.data.len() < ELEMENT_SIZE {
            0
        } else {
            (self.data.len() - ELEMENT_SIZE) / self.stride + 1
        }
    }

    /// True when not even one element fits
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read element `index`
    pub fn get(&self, index: usize) -> Option<Vec3> {
        let bytes = self.data.get(self.range(index)?)?;
        Some(Vec3::from(bytemuck::pod_read_unaligned::<[f32; 3]>(bytes)))
    }

    /// Overwrite element `index`; out-of-range indices are ignored
    pub fn set(&mut self, index: usize, value: &Vec3) -> bool {
        let Some(range) = self.range(index) else {
            return false;
        };
        let Some(bytes) = self.data.get_mut(range) else {
            return false;
        };
        let value: [f32; 3] = (*value).into();
        bytes.copy_from_slice(bytemuck::bytes_of(&value));
        true
    }

    /// Add `value` to element `index`
    pub fn add(&mut self, index: usize, value: &Vec3) -> bool {
        match self.get(index) {
            Some(current) => self.set(index, &(current + value)),
            None => false,
        }
    }

    fn range(&self, index: usize) -> Option<std::ops::Range<usize>> {
        let start = index.checked_mul(self.stride)?;
        let end = start.checked_add(ELEMENT_SIZE)?;
        (end <= self.data.len()).then_some(start..end)
    }
}
