//! Grid-aggregated gravitational N-body simulation.
//!
//! Headless driver: brings up a compute-capable device, seeds a spiral
//! galaxy, runs the three-phase pipeline for a fixed number of frames and
//! logs conservation statistics. Rendering integrates through
//! `SimulationController::positions_buffer()` and the vertex layout exposed
//! by `GridSimulation`; no window is opened here.

use std::time::Instant;

use gravity_physics::{Distribution, SimulationConfig};
use gravity_simulation::SimulationController;

const FRAMES: u32 = 240;
const FRAME_DT: f32 = 1.0 / 60.0;

async fn request_device() -> Option<(wgpu::Device, wgpu::Queue)> {
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
        .ok()?;

    log::info!("✓ Using GPU: {}", adapter.get_info().name);

    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .ok()
}

fn main() {
    env_logger::init();

    let Some((device, queue)) = pollster::block_on(request_device()) else {
        log::error!("No compute-capable GPU adapter found");
        std::process::exit(1);
    };

    let config = SimulationConfig::default();
    let mut controller = match SimulationController::new(device, queue, config) {
        Ok(controller) => controller,
        Err(e) => {
            log::error!("Simulation initialization failed: {e}");
            std::process::exit(1);
        }
    };

    controller
        .reset(20_000, Distribution::Spiral { arms: 2 })
        .expect("reset with default count");
    let initial_momentum = controller.momentum();
    log::info!(
        "✓ Seeded {} particles, initial momentum {:?}",
        controller.particle_count(),
        initial_momentum
    );

    let start = Instant::now();
    let mut frame_start = Instant::now();
    for frame in 1..=FRAMES {
        controller.update(FRAME_DT);

        if frame % 60 == 0 {
            let elapsed = frame_start.elapsed();
            let drift = (controller.momentum() - initial_momentum).length();
            log::info!(
                "frame {frame:>4}: {:.2} ms/frame, momentum drift {drift:.3e}",
                elapsed.as_secs_f32() * 1000.0 / 60.0
            );
            frame_start = Instant::now();
        }
    }

    let positions = controller.read_positions();
    let finite = positions.iter().all(|p| p.iter().all(|c| c.is_finite()));
    log::info!(
        "✓ {FRAMES} frames in {:.2} s, all positions finite: {finite}",
        start.elapsed().as_secs_f32()
    );
}
