//! Compute/graphics ownership handoff for the shared particle buffers.
//!
//! Positions and velocities are the only buffers both domains touch. Ownership
//! alternates strictly: the compute domain acquires them for one dispatch and
//! releases them back before any render pass may read them. The release blocks
//! until the compute queue has drained, which is the frame's single
//! synchronization point.

use std::cell::Cell;

/// Which domain currently owns the shared buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferDomain {
    Graphics,
    Compute,
}

/// The position/velocity buffers visible to both domains.
///
/// Both carry `VERTEX` usage so a point-sprite pipeline can bind them directly
/// once the compute domain has released them.
pub struct SharedBuffers {
    pub positions: wgpu::Buffer,
    pub velocities: wgpu::Buffer,
    owner: Cell<BufferDomain>,
}

impl SharedBuffers {
    pub(crate) fn new(positions: wgpu::Buffer, velocities: wgpu::Buffer) -> Self {
        Self {
            positions,
            velocities,
            owner: Cell::new(BufferDomain::Graphics),
        }
    }

    pub fn owner(&self) -> BufferDomain {
        self.owner.get()
    }

    /// Transfer ownership to the compute domain for one dispatch.
    ///
    /// The matching release runs when the returned guard drops, even if the
    /// dispatch path errors out in between. Panics if the compute domain
    /// already holds the buffers — acquire/release pairs must alternate.
    pub fn acquire_compute<'a>(&'a self, device: &'a wgpu::Device) -> ComputeAccess<'a> {
        assert_eq!(
            self.owner.get(),
            BufferDomain::Graphics,
            "shared buffers acquired twice without a release"
        );
        self.owner.set(BufferDomain::Compute);
        ComputeAccess { shared: self, device }
    }
}

/// Scoped compute-domain ownership of the shared buffers.
pub struct ComputeAccess<'a> {
    shared: &'a SharedBuffers,
    device: &'a wgpu::Device,
}

impl ComputeAccess<'_> {
    /// Hand the buffers back to the graphics domain, blocking until all
    /// submitted compute work has completed.
    pub fn release(self) {
        // Drop does the work.
    }
}

impl Drop for ComputeAccess<'_> {
    fn drop(&mut self) {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .expect("compute queue drain failed");
        self.shared.owner.set(BufferDomain::Graphics);
    }
}
