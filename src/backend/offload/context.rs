//! Offload execution context
//!
//! Owns the wgpu device and queue for one backend instance and provides the
//! transfer and synchronization primitives the stream needs: buffer
//! creation, blocking submission, and mapped staging readback.

use std::sync::Arc;
use std::time::Duration;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

use super::device::query_adapter_blocking;
use crate::error::{Error, Result};

/// How long to wait on device work before declaring the run lost
const POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Device/queue pair for one backend instance
pub(crate) struct OffloadContext {
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
}

impl OffloadContext {
    /// Initialize the device at `device_index`.
    ///
    /// # Errors
    ///
    /// Fails if no adapter exists, the index is out of range, or device
    /// creation is refused - all fatal setup conditions.
    pub fn new(device_index: usize) -> Result<Self> {
        let (adapter, details) = query_adapter_blocking(device_index)?;
        log::info!(
            "offload backend using device {device_index}: {} ({:?})",
            details.name,
            details.backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("bwstream offload device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
            experimental_features: wgpu::ExperimentalFeatures::default(),
        }))
        .map_err(|e| Error::backend(format!("device request failed: {e:?}")))?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Create a device-resident storage buffer (the shadow allocation for
    /// one array). No data is copied at creation.
    pub fn create_storage_buffer(&self, label: &str, size: u64) -> Buffer {
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Create a staging buffer for device-to-host readback.
    pub fn create_staging_buffer(&self, label: &str, size: u64) -> Buffer {
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer for kernel parameters.
    pub fn create_uniform_buffer(&self, label: &str, size: u64) -> Buffer {
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Submit recorded commands and block until the device has executed
    /// them.
    ///
    /// This is the synchronization barrier after every kernel: offload
    /// dispatch is asynchronous with respect to the caller, and timing
    /// measurements depend on the kernel being complete when this returns.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::backend(format!("device poll failed: {e}")))?;
        Ok(())
    }

    /// Map a staging buffer and copy its contents into host storage.
    pub fn read_buffer<T: bytemuck::Pod>(&self, staging: &Buffer, output: &mut [T]) -> Result<()> {
        let slice = staging.slice(..(std::mem::size_of_val(output) as u64));

        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::backend(format!("device poll failed during readback: {e}")))?;

        let map_result = receiver
            .recv()
            .map_err(|_| Error::backend("map_async callback was not invoked during readback"))?;
        map_result.map_err(|e| Error::backend(format!("map_async failed during readback: {e}")))?;

        {
            let data = slice.get_mapped_range();
            let src: &[T] = bytemuck::cast_slice(&data);
            output.copy_from_slice(&src[..output.len()]);
        }

        staging.unmap();
        Ok(())
    }
}
