//! WebGPU compute module
//!
//! Runs the kernel resolver's per-ball units as a WGSL compute shader.

pub mod gpu_kernel;

pub use gpu_kernel::GpuKernel;

use crate::consts::WORKGROUP_SIZE;

/// Workgroups needed to cover `count` balls
#[inline]
pub fn workgroups(count: usize) -> u32 {
    (count as u32).div_ceil(WORKGROUP_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroups_round_up() {
        assert_eq!(workgroups(0), 0);
        assert_eq!(workgroups(1), 1);
        assert_eq!(workgroups(64), 1);
        assert_eq!(workgroups(65), 2);
        assert_eq!(workgroups(5000), 79);
    }
}
