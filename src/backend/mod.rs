//! Backend contract and its peer implementations
//!
//! A backend binds the six stream kernels to one parallel-execution
//! technology. Two peers implement the same contract:
//!
//! - [`dispatch`]: data-parallel loops over a rayon worker pool, with
//!   host-mirror storage synchronized on demand (`dispatch` feature)
//! - [`offload`]: host-primary arrays shadowed by wgpu device buffers, with
//!   explicit update-from-device transfers (`offload` feature)
//!
//! The backend is selected once at process start; no runtime switching.

use crate::element::StreamElement;
use crate::error::Result;

#[cfg(feature = "dispatch")]
pub mod dispatch;

#[cfg(feature = "offload")]
pub mod offload;

/// Uniform operation surface every execution technology must provide
///
/// A backend instance exclusively owns three device-resident arrays A, B, C
/// of `array_size` elements for its entire lifetime. Contents are undefined
/// until [`init_arrays`](StreamBackend::init_arrays) has run. Device
/// resources are released on `Drop`, device mappings before host storage.
///
/// # Synchronization
///
/// `init_arrays` and every compute kernel block the calling thread until the
/// device-side work they trigger has completed; a kernel returning `Ok` is a
/// synchronization barrier, not a submission receipt. External timing depends
/// on this. Kernels issued sequentially on one instance observe a total
/// order; element processing order *within* one kernel is unspecified.
///
/// # Errors
///
/// Construction failures (device unavailable, allocation failure, index out
/// of range) are unrecoverable setup errors; the driver terminates the run.
/// No operation returns a partial result.
pub trait StreamBackend<T: StreamElement>: Sized {
    /// Short name for reports and logs
    const NAME: &'static str;

    /// Allocate or map device memory for three arrays of `array_size`
    /// elements on the device selected by `device_index`.
    fn new(array_size: usize, device_index: usize) -> Result<Self>;

    /// Set every element of A, B, C to the given values, on the device side,
    /// and wait for completion.
    fn init_arrays(&mut self, init_a: T, init_b: T, init_c: T) -> Result<()>;

    /// C[i] = A[i]
    fn copy(&mut self) -> Result<()>;

    /// B[i] = scalar * C[i], with the fixed [`START_SCALAR`] constant
    ///
    /// [`START_SCALAR`]: crate::element::StreamElement::START_SCALAR
    fn mul(&mut self) -> Result<()>;

    /// C[i] = A[i] + B[i]
    fn add(&mut self) -> Result<()>;

    /// A[i] = B[i] + scalar * C[i]
    fn triad(&mut self) -> Result<()>;

    /// Sum over i of A[i] * B[i], returned to the host
    ///
    /// A parallel reduction: the accumulation order of the partial sums is
    /// implementation- and run-dependent, so results are numerically close
    /// but not bitwise reproducible across runs or backends. Consumers must
    /// verify with a tolerance scaled by the array length.
    fn dot(&mut self) -> Result<T>;

    /// Copy the current device-resident contents of A, B, C into the three
    /// caller-provided slices, each of length `array_size`.
    ///
    /// Flushes all pending device work and performs a device-to-host
    /// transfer first; the result reflects every previously completed kernel.
    /// Never mutates device-resident data, so calling it twice in a row
    /// yields identical results.
    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()>;

    /// Element count of each array, fixed at construction
    fn array_size(&self) -> usize;

    /// Human-readable listing of the devices this backend can address
    ///
    /// Informational only, independent of any live instance. Backends whose
    /// underlying technology exposes no device list return a fixed message
    /// rather than failing.
    fn list_devices() -> String;

    /// Name of the device at `index`, or a fixed placeholder when the
    /// information is unavailable
    fn device_name(index: usize) -> String;

    /// Driver identifier of the device at `index`, or a fixed placeholder
    fn device_driver(index: usize) -> String;
}
