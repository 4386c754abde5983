//! Element trait mapping Rust float types to the benchmark's dtype system

use bytemuck::{Pod, Zeroable};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Div, Mul, Sub};

/// Element precision of a stream run
///
/// A backend instance is constructed for exactly one dtype; the dtype never
/// changes over the instance's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit IEEE 754 float
    F32,
    /// 64-bit IEEE 754 float
    F64,
}

impl DType {
    /// Size of one element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "float"),
            DType::F64 => write!(f, "double"),
        }
    }
}

/// Trait for types that can be elements of the three stream arrays
///
/// Connects Rust's type system to the runtime dtype tag. Implemented for
/// `f32` and `f64` only; a single build of the benchmark uses one type
/// consistently.
///
/// # Bounds
/// - `Pod + Zeroable` - byte-level host/device buffer transfer (bytemuck)
/// - arithmetic + `Sum` - kernel bodies and the dot reduction
/// - `Send + Sync` - elements are shared across kernel worker threads
pub trait StreamElement:
    Copy
    + Clone
    + Send
    + Sync
    + Pod
    + Zeroable
    + PartialOrd
    + fmt::Display
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Sum
{
    /// The corresponding dtype tag for this Rust type
    const DTYPE: DType;

    /// Fixed scalar constant used by the `mul` and `triad` kernels
    ///
    /// Process-wide and immutable; safely read by any number of concurrent
    /// kernel workers.
    const START_SCALAR: Self;

    /// Machine epsilon, used to scale verification tolerances
    const EPSILON: Self;

    /// Convert to f64 for verification arithmetic
    fn to_f64(self) -> f64;

    /// Convert from f64
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// Absolute value
    fn abs(self) -> Self;
}

impl StreamElement for f32 {
    const DTYPE: DType = DType::F32;
    const START_SCALAR: f32 = 0.4;
    const EPSILON: f32 = f32::EPSILON;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn abs(self) -> Self {
        f32::abs(self)
    }
}

impl StreamElement for f64 {
    const DTYPE: DType = DType::F64;
    const START_SCALAR: f64 = 0.4;
    const EPSILON: f64 = f64::EPSILON;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}
