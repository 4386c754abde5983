//! Directive-offload backend (requires `offload` feature)
//!
//! Arrays live in aligned host memory with a device-side shadow allocation
//! mapped in at construction. Kernels execute on the shadow buffers through
//! wgpu compute shaders; every dispatch is followed by a blocking wait, and
//! read-back performs an explicit full update-from-device before copying
//! into caller storage.

mod context;
mod device;
mod host;
mod shaders;
mod stream;

pub use device::is_offload_available;
pub use stream::OffloadStream;
