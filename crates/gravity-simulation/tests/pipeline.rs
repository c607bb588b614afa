//! End-to-end tests for the GPU pipeline.
//!
//! Each test skips (with a message) when no adapter is available, so the
//! suite passes on GPU-less machines; the CPU reference in `gravity-physics`
//! covers the exact properties unconditionally.

use glam::Vec3;
use gravity_physics::{constants, CpuSimulation, Distribution, ParticleSet, SimulationConfig};
use gravity_simulation::SimulationController;

fn request_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Test Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::default(),
        experimental_features: wgpu::ExperimentalFeatures::default(),
        trace: wgpu::Trace::Off,
    }))
    .ok()
}

fn controller(config: SimulationConfig) -> Option<SimulationController> {
    let (device, queue) = match request_device() {
        Some(pair) => pair,
        None => {
            eprintln!("no GPU adapter available, skipping");
            return None;
        }
    };
    Some(SimulationController::new(device, queue, config).expect("controller init"))
}

fn small_config() -> SimulationConfig {
    SimulationConfig {
        capacity: 1000,
        grid_dims: [8, 8, 8],
        world_min: Vec3::splat(-1.0),
        world_max: Vec3::splat(1.0),
        gravity_constant: 1.0e-4,
        max_timestep: 0.02,
        orbital_velocities: false,
        initial_particles: 100,
        initial_distribution: Distribution::Uniform,
        ..Default::default()
    }
}

/// Four hand-placed particles every parity test starts from.
fn fixed_particles() -> ParticleSet {
    let mut set = ParticleSet::default();
    set.push(Vec3::new(0.1, 0.2, 0.3), Vec3::new(0.5, -0.25, 0.125), 1.0);
    set.push(Vec3::new(-0.4, 0.0, 0.9), Vec3::new(0.0, 0.0, -1.0), 1.0);
    set.push(Vec3::new(0.7, -0.7, 0.0), Vec3::new(-0.25, 0.25, 0.0), 1.0);
    set.push(Vec3::new(0.0, 0.5, -0.5), Vec3::new(1.0, 1.0, 1.0), 1.0);
    set
}

#[test]
fn end_to_end_run_stays_finite_and_conserves_momentum() {
    let Some(mut sim) = controller(small_config()) else { return };

    let initial = sim.momentum();
    for _ in 0..10 {
        sim.update(0.01);
    }

    for p in sim.read_positions() {
        assert!(p.iter().all(|c| c.is_finite()), "non-finite position {p:?}");
    }
    let drift = (sim.momentum() - initial).length();
    assert!(drift < 1e-2, "momentum drifted by {drift}");
}

#[test]
fn cell_masses_account_for_every_particle() {
    let Some(mut sim) = controller(small_config()) else { return };

    sim.update(0.01);
    let particle_mass: f32 = sim.masses().iter().sum();
    let cell_mass: f64 = sim.read_cell_masses().iter().map(|&m| m as f64).sum();
    // Fixed-point accumulation quantizes each flush to 1/16384.
    assert!(
        (cell_mass as f32 - particle_mass).abs() < particle_mass * 1e-3,
        "cells hold {cell_mass}, particles hold {particle_mass}"
    );
}

#[test]
fn cell_indices_match_the_cpu_indexer() {
    let Some(mut sim) = controller(small_config()) else { return };

    sim.update(0.01);
    let grid = sim.config().grid();
    let positions = sim.read_positions();
    let indices = sim.read_cell_indices();
    // The indices were computed from pre-integration positions; re-derive
    // them by stepping the readback once is not possible, so instead verify
    // that re-binning the current positions on CPU matches a second update.
    sim.update(0.01);
    let rebinned = sim.read_cell_indices();
    for (i, p) in positions.iter().enumerate() {
        let expected = grid.cell_index(Vec3::new(p[0], p[1], p[2]));
        assert_eq!(rebinned[i], expected, "particle {i}");
    }
    assert_eq!(indices.len(), rebinned.len());
}

#[test]
fn pause_leaves_buffers_bit_identical() {
    let Some(mut sim) = controller(small_config()) else { return };

    sim.update(0.01);
    sim.pause();
    let positions = sim.read_positions();
    let velocities = sim.read_velocities();
    for _ in 0..5 {
        sim.update(0.01);
    }
    assert_eq!(sim.read_positions(), positions);
    assert_eq!(sim.read_velocities(), velocities);

    sim.resume();
    sim.update(0.01);
    assert_ne!(sim.read_positions(), positions);
}

#[test]
fn reset_activates_exactly_the_requested_count() {
    let Some(mut sim) = controller(small_config()) else { return };

    sim.reset(250, Distribution::Ring).unwrap();
    assert_eq!(sim.particle_count(), 250);
    assert_eq!(sim.read_positions().len(), 250);

    // Out-of-range requests leave the previous state untouched.
    assert!(sim.reset(1, Distribution::Ring).is_err());
    assert!(sim.reset(1001, Distribution::Ring).is_err());
    assert_eq!(sim.particle_count(), 250);
}

#[test]
fn zero_gravity_update_is_pure_drift() {
    let Some(mut sim) = controller(small_config()) else { return };

    sim.set_gravity_constant(0.0).unwrap();
    sim.reset_from(fixed_particles()).unwrap();

    let before = sim.read_positions();
    let velocities = sim.read_velocities();
    sim.update(0.01);
    let after = sim.read_positions();

    for i in 0..before.len() {
        for axis in 0..3 {
            let expected = before[i][axis] + velocities[i][axis] * 0.01;
            let got = after[i][axis];
            // Allow one ULP-ish slack for devices that contract the
            // multiply-add.
            assert!(
                (got - expected).abs() <= expected.abs() * 1e-6 + 1e-7,
                "particle {i} axis {axis}: {got} != {expected}"
            );
        }
    }
}

#[test]
fn gpu_matches_the_cpu_reference() {
    let Some(mut sim) = controller(small_config()) else { return };

    sim.reset_from(fixed_particles()).unwrap();
    let grid = sim.config().grid();
    let mut reference = CpuSimulation::new(
        fixed_particles(),
        grid,
        sim.gravity_constant(),
        constants::SOFTENING,
    );

    for _ in 0..3 {
        sim.update(0.01);
        reference.step(0.01);
    }

    let gpu_positions = sim.read_positions();
    for i in 0..gpu_positions.len() {
        let cpu = reference.particles().position(i);
        let gpu = Vec3::new(gpu_positions[i][0], gpu_positions[i][1], gpu_positions[i][2]);
        assert!(
            (cpu - gpu).length() < 1e-3,
            "particle {i}: cpu {cpu:?} vs gpu {gpu:?}"
        );
    }
}
