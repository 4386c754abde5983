//! # bwstream
//!
//! **Memory-bandwidth stream microbenchmark with pluggable parallel
//! execution backends.**
//!
//! bwstream measures sustained memory bandwidth by repeatedly executing six
//! data-parallel kernels (initialize, copy, mul, add, triad, dot) over three
//! equally-sized arrays. The same kernel set runs unmodified against
//! different execution technologies behind one contract,
//! [`StreamBackend`](backend::StreamBackend):
//!
//! - **dispatch** (default): data-parallel loops over a rayon worker pool
//! - **offload**: host-primary arrays shadowed by wgpu device buffers, with
//!   explicit device-to-host updates
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bwstream::prelude::*;
//!
//! let mut stream = DispatchStream::<f64>::new(1 << 20, 0)?;
//! stream.init_arrays(0.1, 0.2, 0.0)?;
//! stream.copy()?;
//! stream.triad()?;
//! let sum = stream.dot()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `dispatch` (default): rayon general-dispatch backend
//! - `offload`: wgpu directive-offload backend (f32 only)
//!
//! ## Numerical notes
//!
//! `dot` is a parallel reduction whose accumulation order depends on the
//! backend and the run; verify its result with a tolerance scaled by the
//! array length, never bitwise.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod element;
pub mod error;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::StreamBackend;
    pub use crate::element::{DType, StreamElement};
    pub use crate::error::{Error, Result};

    #[cfg(feature = "dispatch")]
    pub use crate::backend::dispatch::DispatchStream;

    #[cfg(feature = "offload")]
    pub use crate::backend::offload::{is_offload_available, OffloadStream};
}

/// Default backend based on enabled features
///
/// - With `offload` feature: [`backend::offload::OffloadStream`]
/// - Otherwise: [`backend::dispatch::DispatchStream`]
#[cfg(feature = "offload")]
pub type DefaultStream<T> = backend::offload::OffloadStream<T>;

/// Default backend based on enabled features
#[cfg(all(feature = "dispatch", not(feature = "offload")))]
pub type DefaultStream<T> = backend::dispatch::DispatchStream<T>;
