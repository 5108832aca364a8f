//! Synthetic segmentation-volume generator: test tooling, not part of the
//! compression surface. `#[doc(hidden)]` rather than `cfg(test)`-gated so
//! `benches/` can reuse it for input generation.
//!
//! Grounded on `segmentation_volume_synthesis.cpp`'s box-insertion loop:
//! starting from an all-zero volume, insert axis-aligned boxes of random
//! size, position, and label, each overwriting whatever an earlier box left
//! behind (regions may end up smaller than `min_region_dim`, and two boxes
//! may land on the same label). The original also blends in spherical
//! regions via a `sphere_box_shape` control; that's a rendering-adjacent
//! shape knob with no bearing on this codec's compression behavior, so only
//! the box variant is ported.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::sfc::{cartesian_index, Pos3};

/// Parameters for [`create_dummy_segmentation_volume`].
#[derive(Clone, Debug)]
pub struct SyntheticVolumeConfig {
    pub dim: Pos3,
    pub min_region_dim: Pos3,
    pub max_region_dim: Pos3,
    pub seed: u64,
    /// Smaller values produce more (smaller) label regions.
    pub voxels_per_label: u32,
}

impl Default for SyntheticVolumeConfig {
    fn default() -> Self {
        Self {
            dim: [100, 100, 100],
            min_region_dim: [10, 10, 10],
            max_region_dim: [50, 50, 50],
            seed: 4194968861,
            voxels_per_label: 8192,
        }
    }
}

impl SyntheticVolumeConfig {
    fn validate(&self) -> Result<(), String> {
        for axis in 0..3 {
            if self.min_region_dim[axis] > self.max_region_dim[axis] {
                return Err(
                    "minimum region dimensions must not exceed maximum region dimensions".into(),
                );
            }
            if self.min_region_dim[axis] == 0 || self.dim[axis] == 0 {
                return Err("dimension and region size must be nonzero".into());
            }
        }
        if self.voxels_per_label == 0 {
            return Err("voxels_per_label must be nonzero".into());
        }
        Ok(())
    }
}

/// Inserts `box_count` randomly sized, positioned, and labeled axis-aligned
/// boxes into a zero volume of `dim`, deterministically from `seed`. A box
/// is centered on a uniformly random point and may extend past the volume
/// boundary; the out-of-bounds part is simply clipped, matching the
/// original's per-voxel bounds check.
fn insert_random_boxes(
    dim: Pos3,
    box_count: usize,
    min_region_dim: Pos3,
    max_region_dim: Pos3,
    seed: u64,
) -> Vec<u32> {
    let mut volume = vec![0u32; dim[0] as usize * dim[1] as usize * dim[2] as usize];
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..box_count {
        let label: u32 = rng.gen();
        let w = rng.gen_range(min_region_dim[0]..=max_region_dim[0]);
        let h = rng.gen_range(min_region_dim[1]..=max_region_dim[1]);
        let d = rng.gen_range(min_region_dim[2]..=max_region_dim[2]);
        let x_min = rng.gen_range(0..dim[0]) as i64 - (w / 2) as i64;
        let y_min = rng.gen_range(0..dim[1]) as i64 - (h / 2) as i64;
        let z_min = rng.gen_range(0..dim[2]) as i64 - (d / 2) as i64;

        let z_lo = z_min.max(0);
        let z_hi = (z_min + d as i64).min(dim[2] as i64);
        let y_lo = y_min.max(0);
        let y_hi = (y_min + h as i64).min(dim[1] as i64);
        let x_lo = x_min.max(0);
        let x_hi = (x_min + w as i64).min(dim[0] as i64);

        for z in z_lo..z_hi {
            for y in y_lo..y_hi {
                for x in x_lo..x_hi {
                    let pos = [x as u32, y as u32, z as u32];
                    volume[cartesian_index(pos, dim) as usize] = label;
                }
            }
        }
    }
    volume
}

/// Creates a synthetic segmentation volume the way the original generator
/// does: region count derived from `cfg.voxels_per_label`.
pub fn create_dummy_segmentation_volume(cfg: &SyntheticVolumeConfig) -> (Vec<u32>, Pos3) {
    cfg.validate().expect("invalid SyntheticVolumeConfig");
    let voxel_count = cfg.dim[0] as u64 * cfg.dim[1] as u64 * cfg.dim[2] as u64;
    let box_count = ((voxel_count + cfg.voxels_per_label as u64 - 1) / cfg.voxels_per_label as u64)
        as usize;
    log::info!(
        "synthesizing {}x{}x{} volume, ~{box_count} label regions, {} voxels/label",
        cfg.dim[0],
        cfg.dim[1],
        cfg.dim[2],
        cfg.voxels_per_label
    );
    let volume = insert_random_boxes(
        cfg.dim,
        box_count,
        cfg.min_region_dim,
        cfg.max_region_dim,
        cfg.seed,
    );
    (volume, cfg.dim)
}

/// Creates a synthetic segmentation volume with an explicit box count (e.g.
/// 800 boxes over a 100x80x95 volume at a fixed seed), where the region
/// count is the thing under test's control, not a derived quantity.
pub fn create_dummy_segmentation_volume_with_box_count(
    dim: Pos3,
    box_count: usize,
    min_region_dim: Pos3,
    max_region_dim: Pos3,
    seed: u64,
) -> Vec<u32> {
    insert_random_boxes(dim, box_count, min_region_dim, max_region_dim, seed)
}

/// Creates a volume where every voxel carries a distinct label (its flat
/// Cartesian index) — the worst case for palette growth and run-length
/// exploitation alike.
pub fn create_worst_case_segmentation_volume(dim: Pos3) -> (Vec<u32>, Pos3) {
    let count = dim[0] as usize * dim[1] as usize * dim[2] as usize;
    ((0..count as u32).collect(), dim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_fixed_seed() {
        let cfg = SyntheticVolumeConfig {
            dim: [20, 20, 20],
            seed: 0xABCDE12345,
            ..Default::default()
        };
        let (a, _) = create_dummy_segmentation_volume(&cfg);
        let (b, _) = create_dummy_segmentation_volume(&cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut cfg = SyntheticVolumeConfig {
            dim: [20, 20, 20],
            seed: 1,
            ..Default::default()
        };
        let (a, _) = create_dummy_segmentation_volume(&cfg);
        cfg.seed = 2;
        let (b, _) = create_dummy_segmentation_volume(&cfg);
        assert_ne!(a, b);
    }

    #[test]
    fn worst_case_has_distinct_labels() {
        let (volume, dim) = create_worst_case_segmentation_volume([4, 4, 4]);
        let mut sorted = volume.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), volume.len());
        assert_eq!(dim, [4, 4, 4]);
    }

    #[test]
    fn box_scenario_volume_has_right_shape() {
        let dim = [100u32, 80, 95];
        let volume = create_dummy_segmentation_volume_with_box_count(
            dim,
            800,
            [4, 4, 4],
            [20, 20, 20],
            0xABCDE12345,
        );
        assert_eq!(volume.len(), 100 * 80 * 95);
    }
}
