//! WGSL stream kernels and compute pipeline infrastructure

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, ComputePipeline,
    ComputePipelineDescriptor, Device, PipelineLayoutDescriptor, ShaderModule,
    ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

/// Threads per workgroup for every stream kernel
pub(crate) const WORKGROUP_SIZE: u32 = 256;

/// Fixed workgroup count for the dot reduction; one partial sum per group
pub(crate) const DOT_NUM_GROUPS: u32 = 256;

/// Upper bound on workgroups per dispatch dimension; elementwise kernels
/// grid-stride past this for large arrays
const MAX_GROUPS: u32 = 65_535;

/// Stream kernels, f32 only - WGSL has no f64.
///
/// All entry points share one bind group layout: bindings 0-2 are the
/// storage arrays and binding 3 the parameter uniform. The dot kernel binds
/// its partial-sum buffer at slot 2 in place of array C.
const STREAM_SHADER: &str = r#"
struct StreamParams {
    n: u32,
    scalar: f32,
    init_a: f32,
    init_b: f32,
    init_c: f32,
    pad0: u32,
    pad1: u32,
    pad2: u32,
}

@group(0) @binding(0) var<storage, read_write> array_a: array<f32>;
@group(0) @binding(1) var<storage, read_write> array_b: array<f32>;
@group(0) @binding(2) var<storage, read_write> array_c: array<f32>;
@group(0) @binding(3) var<uniform> params: StreamParams;

const WORKGROUP_SIZE: u32 = 256u;

@compute @workgroup_size(256)
fn init_f32(@builtin(global_invocation_id) gid: vec3<u32>,
            @builtin(num_workgroups) nwg: vec3<u32>) {
    var i = gid.x;
    let stride = nwg.x * WORKGROUP_SIZE;
    while (i < params.n) {
        array_a[i] = params.init_a;
        array_b[i] = params.init_b;
        array_c[i] = params.init_c;
        i = i + stride;
    }
}

@compute @workgroup_size(256)
fn copy_f32(@builtin(global_invocation_id) gid: vec3<u32>,
            @builtin(num_workgroups) nwg: vec3<u32>) {
    var i = gid.x;
    let stride = nwg.x * WORKGROUP_SIZE;
    while (i < params.n) {
        array_c[i] = array_a[i];
        i = i + stride;
    }
}

@compute @workgroup_size(256)
fn mul_f32(@builtin(global_invocation_id) gid: vec3<u32>,
           @builtin(num_workgroups) nwg: vec3<u32>) {
    var i = gid.x;
    let stride = nwg.x * WORKGROUP_SIZE;
    while (i < params.n) {
        array_b[i] = params.scalar * array_c[i];
        i = i + stride;
    }
}

@compute @workgroup_size(256)
fn add_f32(@builtin(global_invocation_id) gid: vec3<u32>,
           @builtin(num_workgroups) nwg: vec3<u32>) {
    var i = gid.x;
    let stride = nwg.x * WORKGROUP_SIZE;
    while (i < params.n) {
        array_c[i] = array_a[i] + array_b[i];
        i = i + stride;
    }
}

@compute @workgroup_size(256)
fn triad_f32(@builtin(global_invocation_id) gid: vec3<u32>,
             @builtin(num_workgroups) nwg: vec3<u32>) {
    var i = gid.x;
    let stride = nwg.x * WORKGROUP_SIZE;
    while (i < params.n) {
        array_a[i] = array_b[i] + params.scalar * array_c[i];
        i = i + stride;
    }
}

var<workgroup> dot_shared: array<f32, 256>;

@compute @workgroup_size(256)
fn dot_f32(@builtin(local_invocation_id) lid: vec3<u32>,
           @builtin(workgroup_id) wid: vec3<u32>,
           @builtin(num_workgroups) nwg: vec3<u32>) {
    let tid = lid.x;
    let stride = nwg.x * WORKGROUP_SIZE;

    var sum = 0.0;
    var i = wid.x * WORKGROUP_SIZE + tid;
    while (i < params.n) {
        sum = sum + array_a[i] * array_b[i];
        i = i + stride;
    }

    dot_shared[tid] = sum;
    workgroupBarrier();

    for (var s = WORKGROUP_SIZE / 2u; s > 0u; s = s >> 1u) {
        if (tid < s) {
            dot_shared[tid] = dot_shared[tid] + dot_shared[tid + s];
        }
        workgroupBarrier();
    }

    if (tid == 0u) {
        array_c[wid.x] = dot_shared[0];
    }
}
"#;

/// Compiled shader module, shared bind group layout, and per-entry-point
/// pipeline cache for the stream kernels
pub(crate) struct KernelPipelines {
    device: Arc<Device>,
    module: ShaderModule,
    layout: BindGroupLayout,
    pipelines: Mutex<HashMap<&'static str, Arc<ComputePipeline>>>,
}

impl KernelPipelines {
    /// Compile the stream shader and build the shared layout.
    pub fn new(device: Arc<Device>) -> Self {
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("stream_kernels"),
            source: ShaderSource::Wgsl(STREAM_SHADER.into()),
        });

        let mut entries = Vec::new();
        for i in 0..3u32 {
            entries.push(BindGroupLayoutEntry {
                binding: i,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        entries.push(BindGroupLayoutEntry {
            binding: 3,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });

        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("stream_layout"),
            entries: &entries,
        });

        Self {
            device,
            module,
            layout,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the compute pipeline for an entry point.
    pub fn pipeline(&self, entry_point: &'static str) -> Arc<ComputePipeline> {
        let mut pipelines = self.pipelines.lock();
        if let Some(pipeline) = pipelines.get(entry_point) {
            return pipeline.clone();
        }

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some("stream_pipeline_layout"),
                bind_group_layouts: &[&self.layout],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &self.module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        let pipeline = Arc::new(pipeline);
        pipelines.insert(entry_point, pipeline.clone());
        pipeline
    }

    /// Create a bind group over the three kernel buffers and the params
    /// uniform.
    pub fn bind_group(&self, buffers: &[&Buffer; 4]) -> BindGroup {
        let entries: Vec<BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("stream_bind_group"),
            layout: &self.layout,
            entries: &entries,
        })
    }
}

/// Workgroup count for an elementwise kernel over `n` elements, capped at
/// the per-dimension dispatch limit (kernels grid-stride past the cap).
#[inline]
pub(crate) fn elementwise_groups(n: usize) -> u32 {
    (n as u64)
        .div_ceil(WORKGROUP_SIZE as u64)
        .min(u64::from(MAX_GROUPS)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_counts_cover_and_cap() {
        assert_eq!(elementwise_groups(1), 1);
        assert_eq!(elementwise_groups(256), 1);
        assert_eq!(elementwise_groups(257), 2);
        assert_eq!(elementwise_groups(1 << 28), MAX_GROUPS);
    }

    #[test]
    fn shader_names_every_kernel() {
        for entry in ["init_f32", "copy_f32", "mul_f32", "add_f32", "triad_f32", "dot_f32"] {
            assert!(STREAM_SHADER.contains(entry));
        }
    }
}
