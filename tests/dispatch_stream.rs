//! Integration tests for the general-dispatch backend
//!
//! The dispatch runtime allows one live instance per process, so every test
//! takes a shared lock before constructing a stream.

#![cfg(feature = "dispatch")]

use bwstream::prelude::*;
use std::sync::{Mutex, MutexGuard};

static LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

const N: usize = 1024;

fn tolerance(n: usize) -> f64 {
    f64::EPSILON * 100.0 * n as f64
}

fn initialized(init: (f64, f64, f64)) -> DispatchStream<f64> {
    let mut stream = DispatchStream::<f64>::new(N, 0).unwrap();
    stream.init_arrays(init.0, init.1, init.2).unwrap();
    stream
}

fn read(stream: &mut DispatchStream<f64>) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = stream.array_size();
    let (mut a, mut b, mut c) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    stream.read_arrays(&mut a, &mut b, &mut c).unwrap();
    (a, b, c)
}

#[test]
fn init_then_read_back_is_exact() {
    let _guard = serial();
    let mut stream = initialized((0.1, 0.2, 0.0));
    let (a, b, c) = read(&mut stream);
    assert!(a.iter().all(|&x| x == 0.1));
    assert!(b.iter().all(|&x| x == 0.2));
    assert!(c.iter().all(|&x| x == 0.0));
}

#[test]
fn copy_writes_a_into_c_exactly() {
    let _guard = serial();
    let mut stream = initialized((0.1, 0.2, 0.0));
    stream.copy().unwrap();
    let (a, _, c) = read(&mut stream);
    // Copy introduces no rounding.
    assert_eq!(a, c);
}

#[test]
fn mul_scales_c_into_b() {
    let _guard = serial();
    let mut stream = initialized((0.1, 0.2, 0.5));
    stream.mul().unwrap();
    let (_, b, c) = read(&mut stream);
    let scalar = <f64 as StreamElement>::START_SCALAR;
    for (x, y) in b.iter().zip(c.iter()) {
        assert!((x - scalar * y).abs() <= f64::EPSILON * 100.0);
    }
}

#[test]
fn add_sums_a_and_b_into_c() {
    let _guard = serial();
    let mut stream = initialized((0.1, 0.2, 9.0));
    stream.add().unwrap();
    let (a, b, c) = read(&mut stream);
    for ((x, y), z) in a.iter().zip(b.iter()).zip(c.iter()) {
        assert!((x + y - z).abs() <= f64::EPSILON * 100.0);
    }
}

#[test]
fn triad_writes_a_from_b_and_c() {
    let _guard = serial();
    let mut stream = initialized((9.0, 0.2, 0.5));
    stream.triad().unwrap();
    let (a, b, c) = read(&mut stream);
    let scalar = <f64 as StreamElement>::START_SCALAR;
    for ((x, y), z) in a.iter().zip(b.iter()).zip(c.iter()) {
        assert!((x - (y + scalar * z)).abs() <= f64::EPSILON * 100.0);
    }
}

#[test]
fn dot_of_ones_counts_elements() {
    let _guard = serial();
    let mut stream = initialized((1.0, 1.0, 1.0));
    let sum = stream.dot().unwrap();
    assert!((sum - N as f64).abs() <= tolerance(N));
}

#[test]
fn read_arrays_is_idempotent() {
    let _guard = serial();
    let mut stream = initialized((0.1, 0.2, 0.0));
    stream.triad().unwrap();
    let first = read(&mut stream);
    let second = read(&mut stream);
    assert_eq!(first, second);
}

#[test]
fn add_recomputes_c_rather_than_accumulating() {
    let _guard = serial();
    let mut stream = DispatchStream::<f64>::new(4, 0).unwrap();
    stream.init_arrays(1.0, 2.0, 3.0).unwrap();

    stream.copy().unwrap();
    let (mut a, mut b, mut c) = (vec![0.0; 4], vec![0.0; 4], vec![0.0; 4]);
    stream.read_arrays(&mut a, &mut b, &mut c).unwrap();
    assert_eq!(c, vec![1.0; 4]);

    stream.add().unwrap();
    stream.read_arrays(&mut a, &mut b, &mut c).unwrap();
    assert_eq!(c, vec![3.0; 4]);
}

#[test]
fn kernels_observe_prior_kernel_writes() {
    let _guard = serial();
    let mut stream = initialized((2.0, 0.0, 0.0));
    // copy: c = 2; mul: b = 0.4 * 2 = 0.8; add: c = 2 + 0.8
    stream.copy().unwrap();
    stream.mul().unwrap();
    stream.add().unwrap();
    let (_, b, c) = read(&mut stream);
    assert!(b.iter().all(|&x| (x - 0.8).abs() <= f64::EPSILON * 100.0));
    assert!(c.iter().all(|&x| (x - 2.8).abs() <= f64::EPSILON * 100.0));
}

#[test]
fn f32_run_works() {
    let _guard = serial();
    let mut stream = DispatchStream::<f32>::new(N, 0).unwrap();
    stream.init_arrays(1.0, 1.0, 1.0).unwrap();
    let sum = stream.dot().unwrap();
    assert!((sum - N as f32).abs() <= f32::EPSILON * 100.0 * N as f32);
}

#[test]
fn out_of_range_device_index_is_fatal() {
    let _guard = serial();
    let err = DispatchStream::<f64>::new(N, 1)
        .err()
        .expect("construction should fail");
    assert!(matches!(err, Error::InvalidDevice { index: 1, count: 1 }));
}

#[test]
fn zero_array_size_is_rejected() {
    let _guard = serial();
    assert!(matches!(
        DispatchStream::<f64>::new(0, 0),
        Err(Error::InvalidArraySize { size: 0 })
    ));
}

#[test]
fn second_live_instance_is_rejected() {
    let _guard = serial();
    let first = DispatchStream::<f64>::new(N, 0).unwrap();
    assert!(matches!(
        DispatchStream::<f64>::new(N, 0),
        Err(Error::RuntimeActive)
    ));
    drop(first);
    // The runtime slot frees on drop.
    let _second = DispatchStream::<f64>::new(N, 0).unwrap();
}
