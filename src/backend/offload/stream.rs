//! wgpu-backed stream implementation

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::Buffer;

use super::context::OffloadContext;
use super::device::enumerate_details;
use super::host::HostBuffer;
use super::shaders::{elementwise_groups, KernelPipelines, DOT_NUM_GROUPS};
use crate::backend::StreamBackend;
use crate::element::{DType, StreamElement};
use crate::error::{Error, Result};

/// Kernel parameter block, mirrored by `StreamParams` in the WGSL source.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct KernelParams {
    n: u32,
    scalar: f32,
    init_a: f32,
    init_b: f32,
    init_c: f32,
    pad: [u32; 3],
}

/// Directive-offload stream backend
///
/// The three arrays live in aligned host memory allocated at construction;
/// a shadow storage buffer per array is created on the device at the same
/// time without copying data. Kernels execute against the shadow buffers,
/// and each dispatch is followed by a blocking wait on the submitted work so
/// the call does not return before the kernel's device-visible effects are
/// complete. `read_arrays` pulls all three shadows back into the host
/// allocations before copying into caller storage.
///
/// Device resources are declared before the host buffers so drop order
/// releases the shadow allocations first.
pub struct OffloadStream<T: StreamElement> {
    ctx: OffloadContext,
    pipelines: KernelPipelines,
    d_a: Buffer,
    d_b: Buffer,
    d_c: Buffer,
    d_partials: Buffer,
    d_params: Buffer,
    staging: Buffer,
    array_size: usize,
    h_a: HostBuffer<T>,
    h_b: HostBuffer<T>,
    h_c: HostBuffer<T>,
}

impl<T: StreamElement> OffloadStream<T> {
    fn params(&self, init: (T, T, T)) -> KernelParams {
        KernelParams {
            n: self.array_size as u32,
            scalar: T::START_SCALAR.to_f64() as f32,
            init_a: init.0.to_f64() as f32,
            init_b: init.1.to_f64() as f32,
            init_c: init.2.to_f64() as f32,
            pad: [0; 3],
        }
    }

    /// Dispatch one kernel and block until the device has executed it.
    fn launch(
        &self,
        entry: &'static str,
        buffers: [&Buffer; 3],
        groups: u32,
        params: KernelParams,
    ) -> Result<()> {
        self.ctx
            .queue
            .write_buffer(&self.d_params, 0, bytemuck::bytes_of(&params));

        let pipeline = self.pipelines.pipeline(entry);
        let bind_group = self
            .pipelines
            .bind_group(&[buffers[0], buffers[1], buffers[2], &self.d_params]);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(entry) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(entry),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, Some(&bind_group), &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }

        self.ctx.submit_and_wait(encoder)
    }

    /// Elementwise kernel over the full a/b/c bind set.
    fn launch_elementwise(&self, entry: &'static str) -> Result<()> {
        let params = self.params((T::zero(), T::zero(), T::zero()));
        self.launch(
            entry,
            [&self.d_a, &self.d_b, &self.d_c],
            elementwise_groups(self.array_size),
            params,
        )
    }

    /// Update one array from its device shadow into host storage.
    ///
    /// Associated function so callers can borrow the host buffer mutably
    /// while the context, staging, and shadow buffers stay shared.
    fn update_from_device(
        ctx: &OffloadContext,
        staging: &Buffer,
        shadow: &Buffer,
        host: &mut [T],
    ) -> Result<()> {
        let bytes = std::mem::size_of_val(host) as u64;
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("update_from_device"),
            });
        encoder.copy_buffer_to_buffer(shadow, 0, staging, 0, bytes);
        ctx.submit_and_wait(encoder)?;
        ctx.read_buffer(staging, host)
    }
}

impl<T: StreamElement> StreamBackend<T> for OffloadStream<T> {
    const NAME: &'static str = "offload";

    fn new(array_size: usize, device_index: usize) -> Result<Self> {
        if array_size == 0 {
            return Err(Error::InvalidArraySize { size: array_size });
        }
        if T::DTYPE != DType::F32 {
            return Err(Error::unsupported_dtype(
                T::DTYPE,
                "offload kernels (WGSL has no f64)",
            ));
        }

        let ctx = OffloadContext::new(device_index)?;
        let pipelines = KernelPipelines::new(Arc::clone(&ctx.device));

        // Host-primary allocations.
        let h_a = HostBuffer::new(array_size)?;
        let h_b = HostBuffer::new(array_size)?;
        let h_c = HostBuffer::new(array_size)?;

        // Device shadow allocations, mapped in with no data transfer.
        let array_bytes = (array_size * std::mem::size_of::<T>()) as u64;
        let d_a = ctx.create_storage_buffer("stream_a", array_bytes);
        let d_b = ctx.create_storage_buffer("stream_b", array_bytes);
        let d_c = ctx.create_storage_buffer("stream_c", array_bytes);

        let partial_bytes = u64::from(DOT_NUM_GROUPS) * std::mem::size_of::<f32>() as u64;
        let d_partials = ctx.create_storage_buffer("stream_dot_partials", partial_bytes);
        let d_params = ctx.create_uniform_buffer(
            "stream_params",
            std::mem::size_of::<KernelParams>() as u64,
        );
        let staging = ctx.create_staging_buffer("stream_staging", array_bytes.max(partial_bytes));

        Ok(Self {
            ctx,
            pipelines,
            d_a,
            d_b,
            d_c,
            d_partials,
            d_params,
            staging,
            array_size,
            h_a,
            h_b,
            h_c,
        })
    }

    fn init_arrays(&mut self, init_a: T, init_b: T, init_c: T) -> Result<()> {
        let params = self.params((init_a, init_b, init_c));
        self.launch(
            "init_f32",
            [&self.d_a, &self.d_b, &self.d_c],
            elementwise_groups(self.array_size),
            params,
        )
    }

    fn copy(&mut self) -> Result<()> {
        self.launch_elementwise("copy_f32")
    }

    fn mul(&mut self) -> Result<()> {
        self.launch_elementwise("mul_f32")
    }

    fn add(&mut self) -> Result<()> {
        self.launch_elementwise("add_f32")
    }

    fn triad(&mut self) -> Result<()> {
        self.launch_elementwise("triad_f32")
    }

    fn dot(&mut self) -> Result<T> {
        // Partial-sum buffer takes the slot array C occupies in the
        // elementwise kernels; the final accumulation happens on the host.
        let params = self.params((T::zero(), T::zero(), T::zero()));
        self.launch(
            "dot_f32",
            [&self.d_a, &self.d_b, &self.d_partials],
            DOT_NUM_GROUPS,
            params,
        )?;

        let mut partials = vec![0.0f32; DOT_NUM_GROUPS as usize];
        let bytes = std::mem::size_of_val(partials.as_slice()) as u64;
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("dot_readback"),
            });
        encoder.copy_buffer_to_buffer(&self.d_partials, 0, &self.staging, 0, bytes);
        self.ctx.submit_and_wait(encoder)?;
        self.ctx.read_buffer(&self.staging, &mut partials)?;

        let sum: f32 = partials.iter().sum();
        Ok(T::from_f64(f64::from(sum)))
    }

    fn read_arrays(&mut self, a: &mut [T], b: &mut [T], c: &mut [T]) -> Result<()> {
        // Full update-from-device for all three arrays into the host
        // allocations, then host-to-host copies into the caller's storage.
        Self::update_from_device(&self.ctx, &self.staging, &self.d_a, self.h_a.as_mut_slice())?;
        Self::update_from_device(&self.ctx, &self.staging, &self.d_b, self.h_b.as_mut_slice())?;
        Self::update_from_device(&self.ctx, &self.staging, &self.d_c, self.h_c.as_mut_slice())?;

        a.copy_from_slice(self.h_a.as_slice());
        b.copy_from_slice(self.h_b.as_slice());
        c.copy_from_slice(self.h_c.as_slice());
        Ok(())
    }

    fn array_size(&self) -> usize {
        self.array_size
    }

    fn list_devices() -> String {
        let details = enumerate_details();
        if details.is_empty() {
            return "No offload devices found.".to_string();
        }
        details
            .iter()
            .enumerate()
            .map(|(i, d)| format!("{i}: {} ({:?})", d.name, d.backend))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn device_name(index: usize) -> String {
        enumerate_details()
            .get(index)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| "Device name unavailable".to_string())
    }

    fn device_driver(index: usize) -> String {
        enumerate_details()
            .get(index)
            .map(|d| {
                if d.driver.is_empty() {
                    format!("{:?}", d.backend)
                } else {
                    d.driver.clone()
                }
            })
            .unwrap_or_else(|| "Device driver unavailable".to_string())
    }
}
