//! GPU traversal labeling
//!
//! Runs the Advance/Filter pair of the traversal primitive as one WGSL
//! compute pass per level: the frontier is implicit (vertices whose label
//! equals the level), and the pass reports how many vertices it labeled so
//! the host loop can stop on an empty frontier.

use super::GpuDevice;
use crate::storage::GraphTopology;
use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 256;

/// Per-level uniform parameters
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LevelParams {
    num_nodes: u32,
    level: u32,
    _pad0: u32,
    _pad1: u32,
}

/// Labels computed on the GPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuTraversal {
    /// Hop count per vertex, `-1` for unreached vertices
    pub labels: Vec<i32>,
    /// Levels expanded (search depth)
    pub levels: u32,
    /// Vertices labeled, the source included
    pub visited: usize,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Label every vertex reachable from `source` with its hop distance
///
/// # Errors
///
/// Returns error if `source` is out of range, the graph exceeds the 32-bit
/// id space, or a buffer readback fails
///
/// # Example
///
/// ```ignore
/// # use trueno_frontier::gpu::{gpu_traverse, GpuDevice};
/// # use trueno_frontier::GraphTopology;
/// let device = GpuDevice::new().await?;
/// let graph = GraphTopology::<u32, u32>::from_edge_list(3, &[(0, 1), (1, 2)])?;
/// let result = gpu_traverse(&device, &graph, 0).await?;
/// assert_eq!(result.labels, vec![0, 1, 2]);
/// ```
#[allow(clippy::too_many_lines)]
pub async fn gpu_traverse(
    device: &GpuDevice,
    topology: &GraphTopology<u32, u32>,
    source: u32,
) -> Result<GpuTraversal> {
    const SHADER: &str = include_str!("shaders/advance_label.wgsl");

    let num_nodes = u32::try_from(topology.node_count()).context("graph exceeds u32 ids")?;
    if source >= num_nodes {
        anyhow::bail!("source vertex {source} out of range for {num_nodes} vertices");
    }

    let gpu = device.device();
    let module = gpu.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Advance Label Shader"),
        source: wgpu::ShaderSource::Wgsl(SHADER.into()),
    });

    let layout = gpu.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Advance Label Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
            storage_entry(4, false),
        ],
    });

    let pipeline_layout = gpu.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Advance Label Pipeline Layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = gpu.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Advance Label Pipeline"),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: "advance_label",
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    // Zero-sized storage bindings are invalid; an edgeless graph binds one pad word
    let (row_offsets, col_indices) = topology.csr_components();
    let col_indices: &[u32] = if col_indices.is_empty() { &[0] } else { col_indices };

    let params = gpu.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Level Params"),
        contents: bytemuck::bytes_of(&LevelParams {
            num_nodes,
            level: 0,
            _pad0: 0,
            _pad1: 0,
        }),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let offsets_buffer = device.create_buffer_init(
        "Row Offsets",
        bytemuck::cast_slice(row_offsets),
        wgpu::BufferUsages::STORAGE,
    );
    let targets_buffer = device.create_buffer_init(
        "Column Indices",
        bytemuck::cast_slice(col_indices),
        wgpu::BufferUsages::STORAGE,
    );

    let mut initial = vec![u32::MAX; num_nodes as usize];
    initial[source as usize] = 0;
    let labels_buffer = device.create_buffer_init(
        "Labels",
        bytemuck::cast_slice(&initial),
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
    );
    let queued_buffer = device.create_buffer_init(
        "Queued Counter",
        bytemuck::bytes_of(&0_u32),
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
    );

    let bind_group = gpu.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Advance Label Bind Group"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: offsets_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: targets_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: labels_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: queued_buffer.as_entire_binding(),
            },
        ],
    });

    let workgroups = num_nodes.div_ceil(WORKGROUP_SIZE).max(1);
    let mut levels = 0_u32;

    for level in 0..num_nodes {
        device
            .queue()
            .write_buffer(&queued_buffer, 0, bytemuck::bytes_of(&0_u32));
        device.queue().write_buffer(
            &params,
            0,
            bytemuck::bytes_of(&LevelParams {
                num_nodes,
                level,
                _pad0: 0,
                _pad1: 0,
            }),
        );

        let mut encoder = gpu.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Advance Label Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Advance Label Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        device.queue().submit(Some(encoder.finish()));

        levels += 1;
        let queued: Vec<u32> = device.read_buffer(&queued_buffer, 1).await?;
        tracing::debug!(level, queued = queued[0], "gpu level complete");
        if queued[0] == 0 {
            break;
        }
    }

    let raw: Vec<u32> = device.read_buffer(&labels_buffer, num_nodes as usize).await?;
    let labels: Vec<i32> = raw
        .iter()
        .map(|&l| i32::try_from(l).unwrap_or(-1))
        .collect();
    let visited = labels.iter().filter(|&&l| l >= 0).count();

    Ok(GpuTraversal {
        labels,
        levels,
        visited,
    })
}
