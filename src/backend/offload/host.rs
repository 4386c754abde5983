//! Aligned host-primary array storage

use crate::element::StreamElement;
use crate::error::{Error, Result};
use std::alloc::{alloc_zeroed, dealloc, Layout as AllocLayout};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Host allocation alignment, sized to match common device page/transfer
/// granularity (2 MiB).
pub(crate) const HOST_ALIGNMENT: usize = 2 * 1024 * 1024;

/// Owned host allocation aligned to [`HOST_ALIGNMENT`]
///
/// The offload backend's primary storage for each array: allocated directly
/// on the host at construction, shadowed on the device, and written only by
/// update-from-device transfers. Zero-initialized so a read-back before
/// `init_arrays` observes defined (if meaningless) contents.
pub(crate) struct HostBuffer<T: StreamElement> {
    ptr: NonNull<u8>,
    len: usize,
    layout: AllocLayout,
    _marker: PhantomData<T>,
}

// The buffer exclusively owns its allocation; T is Pod.
unsafe impl<T: StreamElement> Send for HostBuffer<T> {}
unsafe impl<T: StreamElement> Sync for HostBuffer<T> {}

impl<T: StreamElement> HostBuffer<T> {
    /// Allocate storage for `len` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocation fails.
    pub fn new(len: usize) -> Result<Self> {
        let size_bytes = len * std::mem::size_of::<T>();
        let layout = AllocLayout::from_size_align(size_bytes.max(1), HOST_ALIGNMENT)
            .map_err(|_| Error::OutOfMemory { size: size_bytes })?;

        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(Error::OutOfMemory { size: size_bytes })?;

        Ok(Self {
            ptr,
            len,
            layout,
            _marker: PhantomData,
        })
    }

    /// View the buffer as a slice of elements
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast::<T>(), self.len) }
    }

    /// View the buffer as a mutable slice of elements
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().cast::<T>(), self.len) }
    }
}

impl<T: StreamElement> Drop for HostBuffer<T> {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_initialized_and_aligned() {
        let buf = HostBuffer::<f32>::new(1024).unwrap();
        assert_eq!(buf.as_slice().len(), 1024);
        assert!(buf.as_slice().iter().all(|&x| x == 0.0));
        assert_eq!(buf.as_slice().as_ptr() as usize % HOST_ALIGNMENT, 0);
    }

    #[test]
    fn writes_round_trip() {
        let mut buf = HostBuffer::<f64>::new(16).unwrap();
        for (i, x) in buf.as_mut_slice().iter_mut().enumerate() {
            *x = i as f64;
        }
        assert_eq!(buf.as_slice()[15], 15.0);
    }
}
