//! GPU velocity-Verlet backend
//!
//! The whole run is one compute dispatch: the initial records, the per-particle
//! expiry tick and the run parameters are uploaded once, the kernel writes
//! every snapshot into a trajectory buffer, and that buffer is read back at the
//! end. The kernel works in `f64`, so the adapter must support
//! `Features::SHADER_F64`.

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use particle_physics::{GravityModel, ParticleRecord, PhysicsError, SystemState};
use wgpu::util::DeviceExt;

use crate::error::SimError;
use crate::integrator::{Integrator, Trajectory};
use crate::params::GpuParams;

const RECORD_BYTES: u64 = std::mem::size_of::<ParticleRecord>() as u64;

/// Per-particle a(t) kept between the phases (matches WGSL `vec2<f64>`)
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Acceleration {
    value: [f64; 2],
}

/// Velocity-Verlet executed by a compute kernel
pub struct GpuVerlet {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    limits: wgpu::Limits,
    model: GravityModel,
    adapter_name: String,
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

impl GpuVerlet {
    pub fn new(model: GravityModel) -> Result<Self, SimError> {
        pollster::block_on(Self::new_async(model))
    }

    async fn new_async(model: GravityModel) -> Result<Self, SimError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| SimError::GpuUnavailable(e.to_string()))?;

        let adapter_name = adapter.get_info().name;
        if !adapter.features().contains(wgpu::Features::SHADER_F64) {
            return Err(SimError::GpuUnsupported(adapter_name));
        }
        log::info!("Using GPU: {adapter_name}");

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Verlet Device"),
                required_features: wgpu::Features::SHADER_F64,
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| SimError::Gpu(format!("failed to create device: {e}")))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Verlet Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/verlet.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Verlet Bind Group Layout"),
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
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, false),
                storage_entry(4, true),
                storage_entry(5, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Verlet Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Verlet Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(SimError::Gpu(format!("verlet pipeline: {error}")));
        }
        log::debug!("Verlet pipeline ready");

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            limits,
            model,
            adapter_name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Trajectory buffer size, refused when the device cannot hold it
    fn trajectory_bytes(&self, particles: usize, ticks: usize) -> Result<u64, SimError> {
        let exhausted = |bytes: u64, limit: u64| SimError::ResourceExhausted {
            ticks,
            particles,
            bytes,
            limit,
        };

        let binding_limit = u64::from(self.limits.max_storage_buffer_binding_size)
            .min(self.limits.max_buffer_size);
        let entries = (particles as u64).checked_mul(ticks as u64);
        let bytes = entries.and_then(|e| e.checked_mul(RECORD_BYTES));
        match (entries, bytes) {
            (Some(entries), Some(bytes)) if entries <= u64::from(u32::MAX) => {
                if bytes > binding_limit {
                    Err(exhausted(bytes, binding_limit))
                } else {
                    Ok(bytes)
                }
            }
            _ => Err(exhausted(u64::MAX, binding_limit)),
        }
    }

    /// Run `tick_count` ticks on the device and return all `tick_count × n`
    /// records, tick-major
    fn dispatch(
        &self,
        records: &[ParticleRecord],
        expiry: &[u32],
        dt: f64,
        tick_count: usize,
    ) -> Result<Vec<ParticleRecord>, SimError> {
        let n = records.len();
        let trajectory_bytes = self.trajectory_bytes(n, tick_count)?;
        let params = GpuParams::new(&self.model, n as u32, tick_count as u32, dt);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Verlet Params Buffer"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let particle_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Particle Buffer"),
                contents: bytemuck::cast_slice(records),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let previous_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Previous Particle Buffer"),
            size: n as u64 * RECORD_BYTES,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let accel_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Previous Acceleration Buffer"),
            size: (n * std::mem::size_of::<Acceleration>()) as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let expiry_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Expiry Buffer"),
                contents: bytemuck::cast_slice(expiry),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let trajectory_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Trajectory Buffer"),
            size: trajectory_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Trajectory Staging Buffer"),
            size: trajectory_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Verlet Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: previous_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: accel_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: expiry_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: trajectory_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Verlet Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Verlet Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(1, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&trajectory_buffer, 0, &staging_buffer, 0, trajectory_bytes);
        self.queue.submit(std::iter::once(encoder.finish()));

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SimError::Gpu(error.to_string()));
        }

        let slice = staging_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| SimError::Gpu(e.to_string()))?;
        receiver
            .recv()
            .map_err(|_| SimError::Gpu("trajectory readback was dropped".to_string()))?
            .map_err(|e| SimError::Gpu(e.to_string()))?;

        let trajectory = {
            let data = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec(&data)
        };
        staging_buffer.unmap();
        Ok(trajectory)
    }
}

/// A NaN/Inf record in the readback means an acceleration blew up
fn check_finite(records: &[ParticleRecord], live: impl Iterator<Item = usize>) -> Result<(), SimError> {
    for i in live {
        let r = &records[i];
        if !(r.position().is_finite() && r.velocity().is_finite()) {
            return Err(PhysicsError::NonFiniteAcceleration { index: i }.into());
        }
    }
    Ok(())
}

impl Integrator for GpuVerlet {
    fn name(&self) -> &str {
        "verlet-gpu"
    }

    fn integrate(&mut self, state: &mut SystemState, dt: f64) -> Result<(), SimError> {
        let n = state.len();
        let expiry = vec![u32::MAX; n];
        let trajectory = self.dispatch(state.records(), &expiry, dt, 2)?;
        let next = &trajectory[n..2 * n];
        check_finite(next, 0..n)?;
        state.records_mut().copy_from_slice(next);
        Ok(())
    }

    /// One dispatch for the whole run; snapshots are rebuilt from the
    /// trajectory buffer with expired particles filtered out
    fn run(
        &mut self,
        initial: &SystemState,
        dt: f64,
        tick_count: usize,
    ) -> Result<Trajectory, SimError> {
        if tick_count <= 1 || initial.is_empty() {
            return Ok(vec![initial.clone(); tick_count.max(1)]);
        }

        let n = initial.len();
        let expiry: Vec<u32> = initial
            .life_times()
            .iter()
            .map(|life| life.unwrap_or(u32::MAX))
            .collect();

        let records = self.dispatch(initial.records(), &expiry, dt, tick_count)?;
        log::debug!("{}: read back {} records", self.name(), records.len());

        let mut trajectory = Vec::with_capacity(tick_count);
        trajectory.push(initial.clone());
        for (tick, chunk) in records.chunks_exact(n).enumerate().skip(1) {
            // The size check in dispatch keeps tick below u32::MAX
            let tick = tick as u32;
            let live: Vec<usize> = (0..n).filter(|&i| expiry[i] >= tick).collect();
            check_finite(chunk, live.iter().copied())?;

            let snapshot_records = live.iter().map(|&i| chunk[i]).collect();
            let life_times = live
                .iter()
                .map(|&i| initial.life_times()[i].map(|life| life - tick))
                .collect();
            trajectory.push(SystemState::from_parts(snapshot_records, life_times)?);
        }
        Ok(trajectory)
    }
}
