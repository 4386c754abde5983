//! Error types for bwstream

use crate::element::DType;
use thiserror::Error;

/// Result type alias using bwstream's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing or driving a stream backend
///
/// Every variant produced during construction is a fatal setup condition:
/// the benchmark has no retry or partial-results mode, so the driver
/// terminates the process on any of these.
#[derive(Error, Debug)]
pub enum Error {
    /// No usable compute device was found for the backend
    #[error("No usable device found for the {backend} backend")]
    DeviceUnavailable {
        /// Backend that performed the search
        backend: &'static str,
    },

    /// Device index outside the enumerable range
    #[error("Device index {index} out of range ({count} device(s) available)")]
    InvalidDevice {
        /// The requested index
        index: usize,
        /// Number of devices the backend can address
        count: usize,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// A second general-dispatch instance was constructed while one is live
    ///
    /// The dispatch runtime's init/shutdown lifecycle is process-wide and not
    /// reference-counted; at most one instance may be live at a time.
    #[error("Dispatch runtime already active: at most one live instance per process")]
    RuntimeActive,

    /// Element type not supported by this backend
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// Zero-length arrays cannot be benchmarked
    #[error("Invalid array size: {size} (must be positive)")]
    InvalidArraySize {
        /// The requested element count
        size: usize,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create a backend error from any displayable cause
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_device_range() {
        let err = Error::InvalidDevice { index: 7, count: 2 };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn display_names_dtype_and_op() {
        let err = Error::unsupported_dtype(DType::F64, "offload kernels");
        assert!(err.to_string().contains("F64"));
        assert!(err.to_string().contains("offload kernels"));
    }
}
