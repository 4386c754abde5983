//! bwstream driver binary
//!
//! Selects one backend at startup, runs the timed kernel loop, verifies the
//! final array contents against the analytically expected values, and prints
//! a bandwidth report. Construction failures abort the whole run; there is
//! no partial-results mode.

use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use bwstream::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "bwstream")]
#[command(about = "Memory-bandwidth stream microbenchmark", long_about = None)]
#[command(version)]
struct Cli {
    /// Elements per array
    #[arg(short = 's', long, default_value_t = 1 << 25)]
    arraysize: usize,

    /// Number of timed trials
    #[arg(short = 'n', long, default_value_t = 100)]
    numtimes: usize,

    /// Device index to run on
    #[arg(long, default_value_t = 0)]
    device: usize,

    /// Use 32-bit floats instead of 64-bit
    #[arg(long)]
    float: bool,

    /// Execution backend
    #[arg(long, value_enum, default_value_t = BackendKind::default())]
    backend: BackendKind,

    /// List available devices and exit
    #[arg(long)]
    list: bool,

    /// Emit CSV instead of the formatted table
    #[arg(long)]
    csv: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendKind {
    /// Data-parallel worker pool on the host
    Dispatch,
    /// Device offload via mapped shadow buffers
    Offload,
}

impl Default for BackendKind {
    fn default() -> Self {
        #[cfg(feature = "dispatch")]
        return BackendKind::Dispatch;
        #[cfg(not(feature = "dispatch"))]
        return BackendKind::Offload;
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.to_possible_value().ok_or(std::fmt::Error)?;
        f.write_str(value.get_name())
    }
}

/// Per-kernel timing record
struct KernelTiming {
    name: &'static str,
    /// Bytes moved per invocation
    bytes: usize,
    /// Seconds per trial
    times: Vec<f64>,
}

impl KernelTiming {
    fn new(name: &'static str, arrays_touched: usize, array_bytes: usize, trials: usize) -> Self {
        Self {
            name,
            bytes: arrays_touched * array_bytes,
            times: Vec::with_capacity(trials),
        }
    }

    fn min(&self) -> f64 {
        self.times.iter().copied().fold(f64::INFINITY, f64::min)
    }

    fn max(&self) -> f64 {
        self.times.iter().copied().fold(0.0, f64::max)
    }

    fn avg(&self) -> f64 {
        self.times.iter().sum::<f64>() / self.times.len() as f64
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list {
        list_devices(cli.backend);
        return ExitCode::SUCCESS;
    }

    let outcome = if cli.float {
        run_backend::<f32>(&cli)
    } else {
        run_backend::<f64>(&cli)
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            // Verification failed; the report already named the arrays.
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("bwstream: fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn list_devices(kind: BackendKind) {
    match kind {
        #[cfg(feature = "dispatch")]
        BackendKind::Dispatch => {
            println!("{}", <DispatchStream<f64> as StreamBackend<f64>>::list_devices());
        }
        #[cfg(feature = "offload")]
        BackendKind::Offload => {
            println!("{}", <OffloadStream<f32> as StreamBackend<f32>>::list_devices());
        }
        #[allow(unreachable_patterns)]
        other => {
            eprintln!("bwstream: backend {other:?} not compiled in");
        }
    }
}

fn run_backend<T: StreamElement>(cli: &Cli) -> Result<bool> {
    match cli.backend {
        #[cfg(feature = "dispatch")]
        BackendKind::Dispatch => run::<T, DispatchStream<T>>(cli),
        #[cfg(feature = "offload")]
        BackendKind::Offload => run::<T, OffloadStream<T>>(cli),
        #[allow(unreachable_patterns)]
        other => Err(Error::backend(format!("backend {other:?} not compiled in"))),
    }
}

/// Initial array values, matching the upstream harness
const INIT_A: f64 = 0.1;
const INIT_B: f64 = 0.2;
const INIT_C: f64 = 0.0;

fn run<T: StreamElement, S: StreamBackend<T>>(cli: &Cli) -> Result<bool> {
    let size = cli.arraysize;
    let array_bytes = size * T::DTYPE.size_bytes();

    if !cli.csv {
        println!("bwstream");
        println!("Backend: {}", S::NAME);
        println!("Device: {}  Driver: {}", S::device_name(cli.device), S::device_driver(cli.device));
        println!(
            "Running kernels {} times on {} arrays of {} elements ({:.1} MB each)",
            cli.numtimes,
            T::DTYPE,
            size,
            array_bytes as f64 * 1.0e-6,
        );
    }

    let mut stream = S::new(size, cli.device)?;
    stream.init_arrays(
        T::from_f64(INIT_A),
        T::from_f64(INIT_B),
        T::from_f64(INIT_C),
    )?;

    let mut timings = [
        KernelTiming::new("Copy", 2, array_bytes, cli.numtimes),
        KernelTiming::new("Mul", 2, array_bytes, cli.numtimes),
        KernelTiming::new("Add", 3, array_bytes, cli.numtimes),
        KernelTiming::new("Triad", 3, array_bytes, cli.numtimes),
        KernelTiming::new("Dot", 2, array_bytes, cli.numtimes),
    ];
    let mut last_sum = T::zero();

    for _ in 0..cli.numtimes {
        let t = Instant::now();
        stream.copy()?;
        timings[0].times.push(t.elapsed().as_secs_f64());

        let t = Instant::now();
        stream.mul()?;
        timings[1].times.push(t.elapsed().as_secs_f64());

        let t = Instant::now();
        stream.add()?;
        timings[2].times.push(t.elapsed().as_secs_f64());

        let t = Instant::now();
        stream.triad()?;
        timings[3].times.push(t.elapsed().as_secs_f64());

        let t = Instant::now();
        last_sum = stream.dot()?;
        timings[4].times.push(t.elapsed().as_secs_f64());
    }

    let mut a = vec![T::zero(); size];
    let mut b = vec![T::zero(); size];
    let mut c = vec![T::zero(); size];
    stream.read_arrays(&mut a, &mut b, &mut c)?;
    let ok = verify::<T>(cli.numtimes, &a, &b, &c, last_sum);

    report(cli, &timings);
    Ok(ok)
}

/// Check final array contents against the analytically expected values.
///
/// Replays the kernel sequence on scalars, then compares the average
/// per-element error against an epsilon-scaled bound. The dot result gets a
/// looser bound because its accumulation order is unspecified.
fn verify<T: StreamElement>(numtimes: usize, a: &[T], b: &[T], c: &[T], sum: T) -> bool {
    let scalar = T::START_SCALAR.to_f64();
    let (mut gold_a, mut gold_b, mut gold_c) = (INIT_A, INIT_B, INIT_C);
    for _ in 0..numtimes {
        gold_c = gold_a;
        gold_b = scalar * gold_c;
        gold_c = gold_a + gold_b;
        gold_a = gold_b + scalar * gold_c;
    }
    let gold_sum = gold_a * gold_b * a.len() as f64;

    let epsilon = T::EPSILON.to_f64();
    let tolerance = epsilon * 100.0;

    let avg_err = |xs: &[T], gold: f64| {
        xs.iter().map(|x| (x.to_f64() - gold).abs()).sum::<f64>() / xs.len() as f64
    };

    let mut ok = true;
    for (name, err) in [
        ("a", avg_err(a, gold_a)),
        ("b", avg_err(b, gold_b)),
        ("c", avg_err(c, gold_c)),
    ] {
        if err > tolerance {
            eprintln!("Validation failed on {name}[]. Average error {err}");
            ok = false;
        }
    }

    let sum_err = ((sum.to_f64() - gold_sum) / gold_sum).abs();
    if sum_err > epsilon * 100.0 * a.len() as f64 {
        eprintln!("Validation failed on sum. Error {sum_err}");
        ok = false;
    }
    ok
}

fn report(cli: &Cli, timings: &[KernelTiming]) {
    if cli.csv {
        println!("function,num_times,n_elements,sizeof,max_mbytes_per_sec,min_runtime,max_runtime,avg_runtime");
        for t in timings {
            println!(
                "{},{},{},{},{:.3},{:.5},{:.5},{:.5}",
                t.name,
                cli.numtimes,
                cli.arraysize,
                t.bytes / cli.arraysize,
                1.0e-6 * t.bytes as f64 / t.min(),
                t.min(),
                t.max(),
                t.avg(),
            );
        }
    } else {
        println!(
            "{:<9}{:>14}{:>12}{:>12}{:>12}",
            "Function", "MBytes/sec", "Min (sec)", "Max", "Average"
        );
        for t in timings {
            println!(
                "{:<9}{:>14.3}{:>12.5}{:>12.5}{:>12.5}",
                t.name,
                1.0e-6 * t.bytes as f64 / t.min(),
                t.min(),
                t.max(),
                t.avg(),
            );
        }
    }
}
