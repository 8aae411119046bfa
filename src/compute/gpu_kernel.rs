//! WebGPU kernel resolver
//!
//! Each step is a request/response exchange with the device: upload the
//! snapshot, dispatch one invocation per ball, copy the output into a staging
//! buffer, then block until the staging map completes and read it back. Only
//! one step is ever in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::workgroups;
use crate::consts::RECORD_STRIDE;
use crate::error::{SimError, SimResult};
use crate::sim::record::{BallRecord, from_records, to_records};
use crate::sim::{Ball, Resolver, Scene};

// ============================================================================
// GPU DATA STRUCTURES (must match shader)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct Params {
    size: [f32; 2], // offset 0
    dt: f32,        // offset 8
    count: u32,     // offset 12 - 16 bytes total, uniform-sized
}

impl Params {
    fn new(scene: &Scene, dt: f32, count: usize) -> Self {
        Self {
            size: scene.size().to_array(),
            dt,
            count: count as u32,
        }
    }
}

// ============================================================================
// GPU KERNEL
// ============================================================================

pub struct GpuKernel {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,

    params_buffer: wgpu::Buffer,
    input_buffer: wgpu::Buffer,
    output_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,

    bind_group: wgpu::BindGroup,

    /// Ball count the buffers were sized for
    capacity: usize,
    params: Params,
    lost: Arc<AtomicBool>,
    adapter_name: String,
}

impl GpuKernel {
    /// Acquire an adapter and device, build the pipeline and size the buffers
    ///
    /// Fails with `CapabilityUnavailable` when no adapter or device can be had.
    /// The caller decides whether to fall back to another backend.
    pub async fn new(scene: Scene, population: usize, dt: f32) -> SimResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| SimError::CapabilityUnavailable(format!("no compute adapter: {}", e)))?;

        let info = adapter.get_info();
        log::info!("Using adapter: {:?} ({:?})", info.name, info.backend);

        let required_limits = wgpu::Limits::downlevel_defaults();
        let buffer_bytes = (population.max(1) * std::mem::size_of::<BallRecord>()) as u64;
        if buffer_bytes > u64::from(required_limits.max_storage_buffer_binding_size) {
            return Err(SimError::CapabilityUnavailable(format!(
                "{} balls need {} bytes of storage, device binding limit is {}",
                population, buffer_bytes, required_limits.max_storage_buffer_binding_size
            )));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ballpit-device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(|e| SimError::CapabilityUnavailable(format!("device request failed: {}", e)))?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("Compute device lost ({:?}): {}", reason, message);
            lost_flag.store(true, Ordering::SeqCst);
        });

        log::info!("Creating collision shader module...");
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("collide_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("collide.wgsl").into()),
        });

        // Create buffers
        let params = Params::new(&scene, dt, population);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let input_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("balls_in"),
            size: buffer_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("balls_out"),
            size: buffer_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("balls_staging"),
            size: buffer_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Bind group layout
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("collide_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("collide_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("collide_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("collide_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        log::info!(
            "GPU kernel ready: {} balls, {} workgroups per step",
            population,
            workgroups(population)
        );

        Ok(Self {
            device,
            queue,
            pipeline,
            params_buffer,
            input_buffer,
            output_buffer,
            staging_buffer,
            bind_group,
            capacity: population,
            params,
            lost,
            adapter_name: info.name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn ensure_alive(&self) -> SimResult<()> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(SimError::BackendLost("compute device was lost".into()));
        }
        Ok(())
    }

    /// Re-upload the uniform only when scene or timestep changed
    fn update_params(&mut self, scene: &Scene, dt: f32) {
        let params = Params::new(scene, dt, self.capacity);
        if params != self.params {
            self.queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
            self.params = params;
        }
    }

    /// Submit one step and wait for the result
    fn dispatch(&self, records: &[BallRecord]) -> SimResult<Vec<BallRecord>> {
        self.ensure_alive()?;

        let bytes: &[u8] = bytemuck::cast_slice(records);
        let size = bytes.len() as u64;
        self.queue.write_buffer(&self.input_buffer, 0, bytes);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("collide_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("collide_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(workgroups(records.len()), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&self.output_buffer, 0, &self.staging_buffer, 0, size);
        self.queue.submit(Some(encoder.finish()));

        // Await completion: map the staging buffer and block until the callback fires
        let slice = self.staging_buffer.slice(..size);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| SimError::BackendLost(format!("device poll failed: {}", e)))?;

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SimError::BackendLost(format!("readback failed: {}", e))),
            Err(_) => return Err(SimError::BackendLost("readback never completed".into())),
        }

        let output = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, BallRecord>(&data).to_vec()
        };
        self.staging_buffer.unmap();

        self.ensure_alive()?;
        Ok(output)
    }
}

impl Resolver for GpuKernel {
    fn name(&self) -> &'static str {
        "kernel-gpu"
    }

    fn resolve(&mut self, input: &[Ball], output: &mut [Ball], scene: &Scene, dt: f32) -> SimResult<()> {
        crate::sim::check_step_input(input, output)?;
        if input.len() != self.capacity {
            return Err(SimError::InvalidBufferShape {
                expected: self.capacity * RECORD_STRIDE,
                actual: input.len() * RECORD_STRIDE,
            });
        }
        if input.is_empty() {
            return Ok(());
        }

        self.update_params(scene, dt);
        let records = self.dispatch(&to_records(input))?;
        output.copy_from_slice(&from_records(&records));
        log::debug!("GPU step resolved {} balls", records.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::scene::{RadiusRange, populate};
    use crate::sim::{CpuKernel, encode};

    /// Build a kernel, or `None` on machines without a usable adapter
    fn try_kernel(scene: Scene, population: usize) -> Option<GpuKernel> {
        match pollster::block_on(GpuKernel::new(scene, population, SIM_DT)) {
            Ok(kernel) => Some(kernel),
            Err(SimError::CapabilityUnavailable(msg)) => {
                eprintln!("skipping GPU test: {}", msg);
                None
            }
            Err(e) => panic!("unexpected GPU init error: {}", e),
        }
    }

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<Params>(), 16);
    }

    #[test]
    fn test_gpu_matches_cpu_kernel() {
        let scene = Scene::new(400.0, 400.0);
        let input = populate(256, RadiusRange::new(1.0, 10.0), &scene, 8).unwrap();
        let Some(mut gpu) = try_kernel(scene, input.len()) else {
            return;
        };

        let gpu_out = gpu.advance(&input, &scene, SIM_DT).unwrap();
        let cpu_out = CpuKernel.advance(&input, &scene, SIM_DT).unwrap();
        for (g, c) in gpu_out.iter().zip(&cpu_out) {
            assert_eq!(g.radius, c.radius);
            assert_eq!(g.color, c.color);
            assert!((g.pos - c.pos).length() < 1e-2, "gpu {:?} cpu {:?}", g, c);
            assert!((g.vel - c.vel).length() < 1e-1, "gpu {:?} cpu {:?}", g, c);
        }
    }

    #[test]
    fn test_gpu_rejects_wrong_population() {
        let scene = Scene::new(100.0, 100.0);
        let Some(mut gpu) = try_kernel(scene, 4) else {
            return;
        };
        let input = populate(3, RadiusRange::new(1.0, 2.0), &scene, 1).unwrap();
        assert!(matches!(
            gpu.advance(&input, &scene, SIM_DT),
            Err(SimError::InvalidBufferShape { expected: 32, actual: 24 })
        ));
    }

    #[test]
    fn test_gpu_rejects_zero_radius() {
        let scene = Scene::new(200.0, 200.0);
        let Some(mut gpu) = try_kernel(scene, 2) else {
            return;
        };
        let mut input = populate(2, RadiusRange::new(1.0, 2.0), &scene, 5).unwrap();
        input[0].radius = 0.0;
        assert!(matches!(
            gpu.advance(&input, &scene, SIM_DT),
            Err(SimError::InvalidBallState { index: 0, .. })
        ));
    }

    #[test]
    fn test_gpu_long_run_stays_finite() {
        let scene = Scene::new(300.0, 300.0);
        let mut balls = populate(128, RadiusRange::new(1.0, 10.0), &scene, 2024).unwrap();
        let Some(mut gpu) = try_kernel(scene, balls.len()) else {
            return;
        };
        for _ in 0..1_000 {
            balls = gpu.advance(&balls, &scene, SIM_DT).unwrap();
        }
        assert!(encode(&balls).iter().all(|f| f.is_finite()));
        assert!(balls.iter().all(|b| scene.contains(b, 1e-3)));
    }
}
