//! Rayon-backed stream implementation

use rayon::prelude::*;
use rayon::ThreadPool;

use super::runtime::RuntimeGuard;
use crate::backend::StreamBackend;
use crate::element::StreamElement;
use crate::error::{Error, Result};

/// General-dispatch stream backend
///
/// Device residency is modeled with owned `Vec` storage mutated exclusively
/// through the worker pool; paired host mirrors are created once at
/// construction and populated only during
/// [`read_arrays`](StreamBackend::read_arrays) via a deep copy.
///
/// Every kernel runs under [`ThreadPool::install`], which returns only after
/// all workers have finished - that return is the fence the contract
/// requires. The parallelism degree is chosen by the pool, not the caller.
pub struct DispatchStream<T: StreamElement> {
    _runtime: RuntimeGuard,
    pool: ThreadPool,
    array_size: usize,
    device_a: Vec<T>,
    device_b: Vec<T>,
    device_c: Vec<T>,
    mirror_a: Vec<T>,
    mirror_b: Vec<T>,
    mirror_c: Vec<T>,
}

impl<T: StreamElement> StreamBackend<T> for DispatchStream<T> {
    const NAME: &'static str = "dispatch";

    fn new(array_size: usize, device_index: usize) -> Result<Self> {
        if array_size == 0 {
            return Err(Error::InvalidArraySize { size: array_size });
        }
        // The wrapped dispatch library has no enumerable device list; the
        // host is the single implicit device 0.
        if device_index != 0 {
            return Err(Error::InvalidDevice {
                index: device_index,
                count: 1,
            });
        }

        let runtime = RuntimeGuard::acquire()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .build()
            .map_err(|e| Error::backend(format!("failed to build worker pool: {e}")))?;
        log::debug!(
            "dispatch backend: {} workers, {} elements per array",
            pool.current_num_threads(),
            array_size
        );

        Ok(Self {
            _runtime: runtime,
            pool,
            array_size,
            device_a: vec![T::zero(); array_size],
            device_b: vec![T::zero(); array_size],
            device_c: vec![T::zero(); array_size],
            mirror_a: vec![T::zero(); array_size],
            mirror_b: vec![T::zero(); array_size],
            mirror_c: vec![T::zero(); array_size],
        })
    }

    fn init_arrays(&mut self, init_a: T, init_b: T, init_c: T) -> Result<()> {
        let (a, b, c) = (&mut self.device_a, &mut self.device_b, &mut self.device_c);
        self.pool.install(|| {
            a.par_iter_mut().for_each(|x| *x = init_a);
            b.par_iter_mut().for_each(|x| *x = init_b);
            c.par_iter_mut().for_each(|x| *x = init_c);
        });
        Ok(())
    }

    fn copy(&mut self) -> Result<()> {
        let (a, c) = (&self.device_a, &mut self.device_c);
        self.pool.install(|| {
            c.par_iter_mut()
                .zip(a.par_iter())
                .for_each(|(c, a)| *c = *a);
        });
        Ok(())
    }

    fn mul(&mut self) -> Result<()> {
        let scalar = T::START_SCALAR;
        let (b, c) = (&mut self.device_b, &self.device_c);
        self.pool.install(|| {
            b.par_iter_mut()
                .zip(c.par_iter())
                .for_each(|(b, c)| *b = scalar * *c);
        });
        Ok(())
    }

    fn add(&mut self) -> Result<()> {
        let (a, b, c) = (&self.device_a, &self.device_b, &mut self.device_c);
        self.pool.install(|| {
            c.par_iter_mut()
                .zip(a.par_iter().zip(b.par_iter()))
                .for_each(|(c, (a, b))| *c = *a + *b);
        });
        Ok(())
    }

    fn triad(&mut self) -> Result<()> {
        let scalar = T::START_SCALAR;
        let (a, b, c) = (&mut self.device_a, &self.device_b, &self.device_c);
        self.pool.install(|| {
            a.par_iter_mut()
                .zip(b.par_iter().zip(c.par_iter()))
                .for_each(|(a, (b, c))| *a = *b + scalar * *c);
        });
        Ok(())
    }

    fn dot(&mut self) -> Result<T> {
        let (a, b) = (&self.device_a, &self.device_b);
        // Partial sums combine in whatever order the workers finish; only
        // numerical closeness is guaranteed, not bitwise reproducibility.
        let sum = self.pool.install(|| {
            a.par_iter()
                .zip(b.par_iter())
                .map(|(a, b)| *a * *b)
                .reduce(T::zero, |x, y| x + y)
        });
        Ok(sum)
    }

    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()> {
        // Deep copy device -> mirror, then mirror -> caller storage. Kernels
        // are fenced at return, so the mirrors see every completed kernel.
        self.mirror_a.copy_from_slice(&self.device_a);
        self.mirror_b.copy_from_slice(&self.device_b);
        self.mirror_c.copy_from_slice(&self.device_c);
        a.copy_from_slice(&self.mirror_a);
        b.copy_from_slice(&self.mirror_b);
        c.copy_from_slice(&self.mirror_c);
        Ok(())
    }

    fn array_size(&self) -> usize {
        self.array_size
    }

    fn list_devices() -> String {
        // The dispatch library exposes no enumerable device list.
        "0: Dispatch worker pool (host)".to_string()
    }

    fn device_name(_index: usize) -> String {
        "Device name unavailable".to_string()
    }

    fn device_driver(_index: usize) -> String {
        "Device driver unavailable".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_is_a_stub() {
        assert_eq!(
            <DispatchStream<f64> as StreamBackend<f64>>::device_name(3),
            "Device name unavailable"
        );
        assert_eq!(
            <DispatchStream<f64> as StreamBackend<f64>>::device_driver(0),
            "Device driver unavailable"
        );
        assert!(<DispatchStream<f64> as StreamBackend<f64>>::list_devices().contains("0:"));
    }
}
