//! General-dispatch backend (requires `dispatch` feature)
//!
//! Kernels are expressed as data-parallel loops submitted to a rayon worker
//! pool. The pool's lifecycle is process-wide: exactly one live
//! [`DispatchStream`] may exist at a time, and its construction/destruction
//! pair brackets the runtime's init/shutdown.

mod runtime;
mod stream;

pub use runtime::RuntimeGuard;
pub use stream::DispatchStream;
