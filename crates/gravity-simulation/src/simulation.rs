//! GPU pipeline for the grid-aggregated N-body update.
//!
//! Owns every device buffer and the four compute pipelines (cell index,
//! scatter, resolve, integrate). One `step` encodes all passes into a single
//! command encoder in phase order and submits them to the queue; queue-level
//! in-order execution is what guarantees each phase sees its predecessor's
//! writes.

use gravity_physics::{ParticleSet, SimulationConfig};
use wgpu::util::DeviceExt;

use crate::error::SimulationError;
use crate::interop::SharedBuffers;
use crate::params::{SimParams, WORKGROUP_SIZE};

/// Device resources for the three-phase simulation.
pub struct GridSimulation {
    shared: SharedBuffers,
    masses_buffer: wgpu::Buffer,
    cell_index_buffer: wgpu::Buffer,
    cell_accum_buffer: wgpu::Buffer,
    cell_mass_buffer: wgpu::Buffer,
    cell_com_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,

    index_pipeline: wgpu::ComputePipeline,
    scatter_pipeline: wgpu::ComputePipeline,
    resolve_pipeline: wgpu::ComputePipeline,
    integrate_pipeline: wgpu::ComputePipeline,

    index_bind_group: wgpu::BindGroup,
    aggregate_bind_group: wgpu::BindGroup,
    integrate_bind_group: wgpu::BindGroup,

    capacity: u32,
    total_cells: u32,
}

impl GridSimulation {
    /// Allocate all buffers and build all pipelines for `config`.
    ///
    /// Fails with `BufferAllocation` or `KernelBuild` without leaking device
    /// resources; everything created before the failure drops on return.
    pub fn new(device: &wgpu::Device, config: &SimulationConfig) -> Result<Self, SimulationError> {
        let capacity = config.capacity;
        let total_cells = config.grid().total_cells() as u32;
        let particle_slab = capacity as u64 * 16;
        let cell_slab = total_cells as u64 * 16;

        log::info!(
            "Allocating simulation buffers: capacity {} particles, {} cells",
            capacity,
            total_cells
        );

        // Shared buffers carry VERTEX so the render pipeline binds them
        // without copy once the compute domain releases them.
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let positions_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Positions Buffer"),
            size: particle_slab,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let velocities_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Velocities Buffer"),
            size: particle_slab,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let masses_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Masses Buffer"),
            size: capacity as u64 * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cell_index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cell Index Buffer"),
            size: capacity as u64 * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        // Fixed-point accumulators, zeroed by clear_buffer every frame.
        let cell_accum_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cell Accumulator Buffer"),
            size: cell_slab,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cell_mass_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cell Mass Buffer"),
            size: total_cells as u64 * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let cell_com_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cell COM Buffer"),
            size: cell_slab,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sim Params Buffer"),
            contents: bytemuck::bytes_of(&SimParams::snapshot(
                &config.grid(),
                0,
                config.gravity_constant,
                config.softening,
                0.0,
            )),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(SimulationError::BufferAllocation {
                label: "simulation buffers",
                message: e.to_string(),
            });
        }

        log::info!("Buffers created");

        // Shader and pipeline builds report through the validation scope so a
        // broken kernel surfaces as an error with the device's log instead of
        // a panic.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let index_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cell Index Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/cell_index.wgsl").into()),
        });

        let aggregate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cell Aggregate Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/aggregate.wgsl").into()),
        });

        let integrate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Integration Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/integrate.wgsl").into()),
        });

        let index_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Cell Index Bind Group Layout"),
                entries: &[
                    uniform_entry(0),
                    storage_entry(1, true),
                    storage_entry(2, false),
                ],
            });

        let aggregate_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Cell Aggregate Bind Group Layout"),
                entries: &[
                    uniform_entry(0),
                    storage_entry(1, true),
                    storage_entry(2, true),
                    storage_entry(3, true),
                    storage_entry(4, false),
                    storage_entry(5, false),
                    storage_entry(6, false),
                ],
            });

        let integrate_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Integration Bind Group Layout"),
                entries: &[
                    uniform_entry(0),
                    storage_entry(1, false),
                    storage_entry(2, false),
                    storage_entry(3, true),
                    storage_entry(4, true),
                ],
            });

        let index_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cell Index Pipeline Layout"),
                bind_group_layouts: &[&index_bind_group_layout],
                push_constant_ranges: &[],
            });

        let aggregate_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cell Aggregate Pipeline Layout"),
                bind_group_layouts: &[&aggregate_bind_group_layout],
                push_constant_ranges: &[],
            });

        let integrate_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Integration Pipeline Layout"),
                bind_group_layouts: &[&integrate_bind_group_layout],
                push_constant_ranges: &[],
            });

        let index_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cell Index Pipeline"),
            layout: Some(&index_pipeline_layout),
            module: &index_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let scatter_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cell Scatter Pipeline"),
            layout: Some(&aggregate_pipeline_layout),
            module: &aggregate_shader,
            entry_point: Some("scatter_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let resolve_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cell Resolve Pipeline"),
            layout: Some(&aggregate_pipeline_layout),
            module: &aggregate_shader,
            entry_point: Some("resolve_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let integrate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Integration Pipeline"),
            layout: Some(&integrate_pipeline_layout),
            module: &integrate_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(SimulationError::KernelBuild { log: e.to_string() });
        }

        log::info!("Pipelines created");

        let index_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cell Index Bind Group"),
            layout: &index_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: positions_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: cell_index_buffer.as_entire_binding(),
                },
            ],
        });

        let aggregate_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cell Aggregate Bind Group"),
            layout: &aggregate_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: positions_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: masses_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: cell_index_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: cell_accum_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: cell_mass_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: cell_com_buffer.as_entire_binding(),
                },
            ],
        });

        let integrate_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Integration Bind Group"),
            layout: &integrate_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: positions_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: velocities_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: cell_mass_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: cell_com_buffer.as_entire_binding(),
                },
            ],
        });

        log::info!("Bind groups created");

        Ok(Self {
            shared: SharedBuffers::new(positions_buffer, velocities_buffer),
            masses_buffer,
            cell_index_buffer,
            cell_accum_buffer,
            cell_mass_buffer,
            cell_com_buffer,
            params_buffer,
            index_pipeline,
            scatter_pipeline,
            resolve_pipeline,
            integrate_pipeline,
            index_bind_group,
            aggregate_bind_group,
            integrate_bind_group,
            capacity,
            total_cells,
        })
    }

    /// Upload a freshly seeded particle set into the first `particles.len()`
    /// slots. Entries past the active count keep whatever they held.
    pub fn upload(&self, queue: &wgpu::Queue, particles: &ParticleSet) {
        assert!(particles.len() as u32 <= self.capacity);
        queue.write_buffer(
            &self.shared.positions,
            0,
            bytemuck::cast_slice(&particles.positions),
        );
        queue.write_buffer(
            &self.shared.velocities,
            0,
            bytemuck::cast_slice(&particles.velocities),
        );
        queue.write_buffer(&self.masses_buffer, 0, bytemuck::cast_slice(&particles.masses));
    }

    /// Encode and submit one full update: clear accumulators, then the cell
    /// index, scatter, resolve and integrate passes, in that order.
    ///
    /// The caller must hold compute ownership of the shared buffers; `params`
    /// is written before submission so all passes read one snapshot.
    pub fn step(&self, device: &wgpu::Device, queue: &wgpu::Queue, params: &SimParams) {
        debug_assert!(params.particle_count <= self.capacity);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));

        let particle_groups = (params.particle_count + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        let cell_groups = (self.total_cells + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Simulation Encoder"),
        });

        // Aggregation starts from zero every frame.
        encoder.clear_buffer(&self.cell_accum_buffer, 0, None);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Cell Index Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.index_pipeline);
            pass.set_bind_group(0, &self.index_bind_group, &[]);
            pass.dispatch_workgroups(particle_groups, 1, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Cell Scatter Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.scatter_pipeline);
            pass.set_bind_group(0, &self.aggregate_bind_group, &[]);
            pass.dispatch_workgroups(particle_groups, 1, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Cell Resolve Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.resolve_pipeline);
            pass.set_bind_group(0, &self.aggregate_bind_group, &[]);
            pass.dispatch_workgroups(cell_groups, 1, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Integration Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.integrate_pipeline);
            pass.set_bind_group(0, &self.integrate_bind_group, &[]);
            pass.dispatch_workgroups(particle_groups, 1, 1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Shared position/velocity buffers and their ownership state.
    pub fn shared(&self) -> &SharedBuffers {
        &self.shared
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn total_cells(&self) -> u32 {
        self.total_cells
    }

    /// Vertex layout for binding the position buffer to a point pipeline:
    /// one `vec4<f32>` attribute per instance.
    pub fn position_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: 16,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x4,
            }],
        }
    }

    /// Read back the first `count` positions. Blocking; readback/debug path.
    pub fn read_positions(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        count: u32,
    ) -> Vec<[f32; 4]> {
        let bytes = self.read_buffer(device, queue, &self.shared.positions, count as u64 * 16);
        bytemuck::cast_slice(&bytes).to_vec()
    }

    /// Read back the first `count` velocities. Blocking; readback/debug path.
    pub fn read_velocities(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        count: u32,
    ) -> Vec<[f32; 4]> {
        let bytes = self.read_buffer(device, queue, &self.shared.velocities, count as u64 * 16);
        bytemuck::cast_slice(&bytes).to_vec()
    }

    /// Read back the resolved per-cell masses. Blocking; readback/debug path.
    pub fn read_cell_masses(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Vec<f32> {
        let bytes = self.read_buffer(
            device,
            queue,
            &self.cell_mass_buffer,
            self.total_cells as u64 * 4,
        );
        bytemuck::cast_slice(&bytes).to_vec()
    }

    /// Read back the per-particle cell ids. Blocking; readback/debug path.
    pub fn read_cell_indices(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        count: u32,
    ) -> Vec<u32> {
        let bytes = self.read_buffer(device, queue, &self.cell_index_buffer, count as u64 * 4);
        bytemuck::cast_slice(&bytes).to_vec()
    }

    fn read_buffer(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        src: &wgpu::Buffer,
        bytes: u64,
    ) -> Vec<u8> {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(src, 0, &staging, 0, bytes);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .expect("readback poll failed");
        rx.recv().unwrap().expect("staging buffer map failed");

        let data = slice.get_mapped_range();
        let out = data.to_vec();
        drop(data);
        staging.unmap();
        out
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
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
