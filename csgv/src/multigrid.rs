//! Per-brick multigrid LOD hierarchy builder (C7).
//!
//! Grounded on `VolumeCompressionBase::constructMultiGrid`
//! (`VolumeCompressionBase.hpp`): the finest LOD is filled by direct
//! lookup (or the invalid sentinel outside the volume), then each
//! coarser level reduces its eight children to the most frequent
//! non-invalid label. The node array is stored finest-LOD-first, as in
//! the original, so random-access encoders can slice a single
//! contiguous range per LOD without extra bookkeeping.

use crate::sfc::{cartesian_index, morton3_index, morton3_pos, Pos3};

/// Reserved label meaning "outside the volume" / "not yet known".
pub const INVALID_LABEL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MultiGridNode {
    pub label: u32,
    pub constant_subregion: bool,
}

#[derive(Clone, Debug)]
pub struct MultiGrid {
    nodes: Vec<MultiGridNode>,
    /// `offsets[lod]` is the start index of LOD `lod` within `nodes`.
    offsets: Vec<usize>,
    /// `widths[lod]` is the side length, in nodes, of LOD `lod`.
    widths: Vec<u32>,
}

impl MultiGrid {
    pub fn lod_count(&self) -> usize {
        self.widths.len()
    }

    pub fn lod_width(&self, lod: usize) -> u32 {
        self.widths[lod]
    }

    pub fn node(&self, lod: usize, morton_index: usize) -> &MultiGridNode {
        &self.nodes[self.offsets[lod] + morton_index]
    }

    pub fn node_mut(&mut self, lod: usize, morton_index: usize) -> &mut MultiGridNode {
        &mut self.nodes[self.offsets[lod] + morton_index]
    }

    pub fn lod_nodes(&self, lod: usize) -> &[MultiGridNode] {
        let start = self.offsets[lod];
        let len = (self.widths[lod] as usize).pow(3);
        &self.nodes[start..start + len]
    }

    /// Builds a brick's multigrid from `volume`, a `volume_dim`-sized
    /// Cartesian (x-fastest) buffer of labels, reading the brick whose
    /// minimum corner is `brick_origin` and whose side is `brick_side`.
    pub fn build(volume: &[u32], volume_dim: Pos3, brick_origin: Pos3, brick_side: u32) -> Self {
        let lod_count = brick_side.trailing_zeros() as usize + 1;
        let widths: Vec<u32> = (0..lod_count).map(|l| 1u32 << l).collect();
        let total: usize = widths.iter().map(|&w| (w as usize).pow(3)).sum();

        let mut offsets = vec![0usize; lod_count];
        let mut acc = 0usize;
        for lod in (0..lod_count).rev() {
            offsets[lod] = acc;
            acc += (widths[lod] as usize).pow(3);
        }
        debug_assert_eq!(acc, total);

        let mut nodes = vec![
            MultiGridNode {
                label: INVALID_LABEL,
                constant_subregion: false,
            };
            total
        ];

        // Finest LOD: direct lookup.
        let finest = lod_count - 1;
        let finest_width = widths[finest];
        for morton_i in 0..(finest_width as usize).pow(3) {
            let local = morton3_pos(morton_i as u32);
            let global = [
                brick_origin[0] + local[0],
                brick_origin[1] + local[1],
                brick_origin[2] + local[2],
            ];
            let inside = global[0] < volume_dim[0]
                && global[1] < volume_dim[1]
                && global[2] < volume_dim[2];
            let node = if inside {
                let idx = cartesian_index(global, volume_dim) as usize;
                MultiGridNode {
                    label: volume[idx],
                    constant_subregion: false,
                }
            } else {
                MultiGridNode {
                    label: INVALID_LABEL,
                    constant_subregion: true,
                }
            };
            nodes[offsets[finest] + morton_i] = node;
        }

        // Coarser LODs: reduce 2x2x2 children bottom-up.
        for lod in (0..finest).rev() {
            let children_lod = lod + 1;
            let children_is_finest = children_lod == finest;
            let width = widths[lod] as usize;
            for morton_i in 0..width.pow(3) {
                let parent_pos = morton3_pos(morton_i as u32);
                let mut children = [MultiGridNode {
                    label: INVALID_LABEL,
                    constant_subregion: false,
                }; 8];
                for (child_slot, delta) in children.iter_mut().enumerate() {
                    let dz = (child_slot >> 2) & 1;
                    let dy = (child_slot >> 1) & 1;
                    let dx = child_slot & 1;
                    let child_pos = [
                        parent_pos[0] * 2 + dx as u32,
                        parent_pos[1] * 2 + dy as u32,
                        parent_pos[2] * 2 + dz as u32,
                    ];
                    let child_morton = morton3_index(child_pos) as usize;
                    *delta = nodes[offsets[children_lod] + child_morton];
                }
                nodes[offsets[lod] + morton_i] = reduce(&children, children_is_finest);
            }
        }

        Self {
            nodes,
            offsets,
            widths,
        }
    }

    /// Second pass (needed by random-access encoders): every node must
    /// carry a defined label. Propagates each still-invalid node's
    /// parent label downward, coarsest LOD first.
    pub fn resolve_invalid_labels(&mut self) {
        for lod in 1..self.lod_count() {
            let width = self.widths[lod] as usize;
            for morton_i in 0..width.pow(3) {
                if self.node(lod, morton_i).label != INVALID_LABEL {
                    continue;
                }
                let parent_morton = morton_i / 8;
                let parent_label = self.node(lod - 1, parent_morton).label;
                self.node_mut(lod, morton_i).label = parent_label;
            }
        }
    }
}

fn reduce(children: &[MultiGridNode; 8], children_is_finest: bool) -> MultiGridNode {
    let mut counts: Vec<(u32, u32)> = Vec::new();
    for c in children {
        if c.label == INVALID_LABEL {
            continue;
        }
        match counts.iter_mut().find(|(l, _)| *l == c.label) {
            Some(entry) => entry.1 += 1,
            None => counts.push((c.label, 1)),
        }
    }
    let label = counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map(|(l, _)| l)
        .unwrap_or(INVALID_LABEL);

    let constant = if children_is_finest {
        children.iter().all(|c| c.label == INVALID_LABEL || c.label == label)
    } else {
        children
            .iter()
            .all(|c| c.label == INVALID_LABEL || (c.constant_subregion && c.label == label))
    };

    MultiGridNode {
        label,
        constant_subregion: constant,
    }
}
