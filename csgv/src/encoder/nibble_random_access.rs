//! Dense random-access nibble brick encoder (C8).
//!
//! Every multigrid node gets its own opcode nibble — no `STOP_BIT`
//! skipping and no `PALETTE_D` — so a node's opcode sits at the fixed
//! position `header[lod] + morton_i`, giving O(1) positional lookup
//! instead of the serial encoder's skip-and-replay traversal. The price is
//! that locating which reversed-palette entry a `PALETTE_ADV` opcode
//! refers to needs a linear scan of every opcode before it — a dense
//! encoding with no skip logic trades palette-rank speed for positional
//! lookup speed.
//!
//! A `NeighborX/Y/Z` opcode references whichever node is one step back
//! along that axis at the same LOD, same parent octant or not, provided
//! its Morton index is strictly smaller (already resolved in traversal
//! order); otherwise the chosen neighbor falls back to its position one
//! LOD coarser. [`NibbleRandomAccessEncoder::parallel_decode_brick`]
//! resolves a level in two passes to keep this correct under `rayon`
//! octant parallelism: a parallel pass fills everything except
//! `Neighbor*` opcodes (those only need `prev_labels` or within-octant
//! data already written), then a cheap sequential pass resolves the
//! `Neighbor*` opcodes left behind, which by the same ordering guarantee
//! only ever reference already-filled entries.

use rayon::prelude::*;

use super::{verify_common, BrickEncoder};
use crate::config::OpMask;
use crate::error::{Error, Result};
use crate::multigrid::MultiGrid;
use crate::nibble::{push4, read4, words_for_nibbles};
use crate::opcode::Opcode;
use crate::sfc::{morton3_index, morton3_pos, Pos3};

pub struct NibbleRandomAccessEncoder {
    brick_side: u32,
    op_mask: OpMask,
}

impl NibbleRandomAccessEncoder {
    pub fn new(brick_side: u32, op_mask: OpMask) -> Self {
        Self { brick_side, op_mask }
    }
}

impl BrickEncoder for NibbleRandomAccessEncoder {
    fn brick_side(&self) -> u32 {
        self.brick_side
    }

    fn encode(
        &self,
        volume: &[u32],
        volume_dim: Pos3,
        brick_origin: Pos3,
        out: &mut Vec<u32>,
    ) -> Result<usize> {
        let start_word = out.len();
        let lod_count = self.lod_count();
        let header_words = lod_count + 1;
        for _ in 0..header_words {
            out.push(0);
        }

        let mut mg = MultiGrid::build(volume, volume_dim, brick_origin, self.brick_side);
        mg.resolve_invalid_labels();

        let mut nibble_count = header_words * 8;
        let mut palette: Vec<u32> = Vec::new();
        let mut header = vec![0u32; lod_count];

        header[0] = nibble_count as u32;
        palette.push(mg.node(0, 0).label);
        nibble_count = push4(out, nibble_count, Opcode::PaletteAdv.as_nibble());

        for lod in 1..lod_count {
            header[lod] = nibble_count as u32;
            let width = mg.lod_width(lod);
            for morton_i in 0..(width as usize).pow(3) {
                let node = *mg.node(lod, morton_i);
                let pos = morton3_pos(morton_i as u32);
                let opcode = self.choose_opcode(&mg, lod, morton_i, pos, &palette, node.label);
                if opcode == Opcode::PaletteAdv {
                    palette.push(node.label);
                }
                nibble_count = push4(out, nibble_count, opcode.as_nibble());
            }
        }

        for (i, &h) in header.iter().enumerate() {
            out[start_word + i] = h;
        }
        out[start_word + lod_count] = palette.len() as u32;

        let padded_words = words_for_nibbles(nibble_count);
        out.resize(start_word + padded_words, 0);
        for &label in palette.iter().rev() {
            out.push(label);
        }

        Ok(out.len() - start_word)
    }

    fn decode_lod(&self, enc: &[u32], detail: Option<&[u32]>, inv_lod: usize) -> Result<Vec<u32>> {
        let lod_count = self.lod_count();
        if inv_lod >= lod_count {
            return Err(Error::OutOfBounds(format!(
                "inv_lod {inv_lod} >= lod_count {lod_count}"
            )));
        }
        let header: Vec<usize> = (0..lod_count).map(|l| enc[l] as usize).collect();
        let mut labels = vec![self.read_palette_entry(enc, 0)];

        for lod in 1..=inv_lod {
            let width = 1u32 << lod;
            let n = (width as usize).pow(3);
            let (buf, base) = self.level_source(enc, detail, &header, lod);
            let mut next_labels = vec![0u32; n];
            for morton_i in 0..n {
                let nibble = read4(buf, base + morton_i);
                let op = Opcode::from_nibble(nibble).ok_or_else(|| Error::InvariantViolated {
                    brick_index: 0,
                    message: format!("unknown opcode nibble {nibble}"),
                })?;
                let pos = morton3_pos(morton_i as u32);
                next_labels[morton_i] = self.resolve(
                    enc, detail, &header, lod, morton_i, pos, op, &labels, &next_labels,
                );
            }
            labels = next_labels;
        }
        Ok(labels)
    }

    fn verify(&self, enc: &[u32]) -> Result<()> {
        verify_common(enc, self.lod_count())?;
        let first = read4(enc, enc[0] as usize);
        if Opcode::from_nibble(first) != Some(Opcode::PaletteAdv) {
            return Err(Error::InvariantViolated {
                brick_index: 0,
                message: "first opcode is not PALETTE_ADV".into(),
            });
        }
        Ok(())
    }
}

impl NibbleRandomAccessEncoder {
    fn read_palette_entry(&self, enc: &[u32], idx: usize) -> u32 {
        enc[enc.len() - 1 - idx]
    }

    /// Opcode-nibble source `(buf, base)` for `lod`: the finest LOD reads
    /// from `detail` at offset 0 once [`super::BrickEncoder::split_detail`]
    /// has run, otherwise every LOD reads from `enc` at `header[lod]`.
    fn level_source<'a>(
        &self,
        enc: &'a [u32],
        detail: Option<&'a [u32]>,
        header: &[usize],
        lod: usize,
    ) -> (&'a [u32], usize) {
        if lod == header.len() - 1 {
            if let Some(d) = detail {
                return (d, 0);
            }
        }
        (enc, header[lod])
    }

    /// Number of `PALETTE_ADV` opcodes strictly before `(lod, morton_i)`
    /// in brick traversal order, i.e. the index of the palette entry this
    /// node's `PALETTE_ADV` (if any) would read.
    fn palette_rank_before(
        &self,
        enc: &[u32],
        detail: Option<&[u32]>,
        header: &[usize],
        lod: usize,
        morton_i: usize,
    ) -> usize {
        let mut count = 0usize;
        if lod > 0 {
            count += 1; // LOD 0's single node is always PALETTE_ADV
        }
        for l in 1..lod {
            let n = (1usize << l).pow(3);
            let (buf, base) = self.level_source(enc, detail, header, l);
            for j in 0..n {
                if Opcode::from_nibble(read4(buf, base + j)) == Some(Opcode::PaletteAdv) {
                    count += 1;
                }
            }
        }
        if lod > 0 {
            let (buf, base) = self.level_source(enc, detail, header, lod);
            for j in 0..morton_i {
                if Opcode::from_nibble(read4(buf, base + j)) == Some(Opcode::PaletteAdv) {
                    count += 1;
                }
            }
        }
        count
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &self,
        enc: &[u32],
        detail: Option<&[u32]>,
        header: &[usize],
        lod: usize,
        morton_i: usize,
        pos: Pos3,
        op: Opcode,
        labels: &[u32],
        next_labels: &[u32],
    ) -> u32 {
        let parent_morton = morton_i / 8;
        match op {
            Opcode::Parent => labels[parent_morton],
            Opcode::NeighborX | Opcode::NeighborY | Opcode::NeighborZ => {
                let axis = match op {
                    Opcode::NeighborX => 0,
                    Opcode::NeighborY => 1,
                    _ => 2,
                };
                self.neighbor_label(axis, pos, morton_i, next_labels, labels)
            }
            Opcode::PaletteLast => {
                let rank = self.palette_rank_before(enc, detail, header, lod, morton_i);
                self.read_palette_entry(enc, rank - 1)
            }
            Opcode::PaletteAdv => {
                let rank = self.palette_rank_before(enc, detail, header, lod, morton_i);
                self.read_palette_entry(enc, rank)
            }
            Opcode::PaletteD => unreachable!("PALETTE_D is never emitted in random-access mode"),
        }
    }

    /// Resolves a `NeighborX/Y/Z` opcode, mirroring the same-LOD-or-parent
    /// rule [`Self::choose_opcode`] used to pick it: if the neighbor one
    /// step back along `axis` has a strictly smaller Morton index than
    /// `morton_i`, it is already present in `next_labels`; otherwise fall
    /// back to its position one LOD coarser in `parent_labels`.
    fn neighbor_label(
        &self,
        axis: usize,
        pos: Pos3,
        morton_i: usize,
        next_labels: &[u32],
        parent_labels: &[u32],
    ) -> u32 {
        let mut npos = pos;
        npos[axis] -= 1;
        let neighbor_morton = morton3_index(npos) as usize;
        if neighbor_morton < morton_i {
            next_labels[neighbor_morton]
        } else {
            let parent_pos = [npos[0] / 2, npos[1] / 2, npos[2] / 2];
            parent_labels[morton3_index(parent_pos) as usize]
        }
    }

    fn choose_opcode(
        &self,
        mg: &MultiGrid,
        lod: usize,
        morton_i: usize,
        pos: Pos3,
        palette: &[u32],
        target: u32,
    ) -> Opcode {
        let parent_morton = morton_i / 8;
        let parent_label = mg.node(lod - 1, parent_morton).label;

        if self.op_mask.contains(OpMask::PARENT) && target == parent_label {
            return Opcode::Parent;
        }

        // Every node may reference its same-LOD predecessor along any
        // axis; if that neighbor has not been decoded yet at this LOD
        // (its Morton index is not strictly smaller), fall back to the
        // neighbor's position one LOD coarser. See `neighbor_label`.
        for (axis, mask) in [
            (0usize, OpMask::NEIGHBOR_X),
            (1, OpMask::NEIGHBOR_Y),
            (2, OpMask::NEIGHBOR_Z),
        ] {
            if !self.op_mask.contains(mask) || pos[axis] == 0 {
                continue;
            }
            let mut npos = pos;
            npos[axis] -= 1;
            let neighbor_morton = morton3_index(npos) as usize;
            let neighbor_label = if neighbor_morton < morton_i {
                mg.node(lod, neighbor_morton).label
            } else {
                let parent_pos = [npos[0] / 2, npos[1] / 2, npos[2] / 2];
                mg.node(lod - 1, morton3_index(parent_pos) as usize).label
            };
            if neighbor_label == target {
                return match axis {
                    0 => Opcode::NeighborX,
                    1 => Opcode::NeighborY,
                    _ => Opcode::NeighborZ,
                };
            }
        }

        if self.op_mask.contains(OpMask::PALETTE_LAST) && palette.last() == Some(&target) {
            return Opcode::PaletteLast;
        }

        Opcode::PaletteAdv
    }

    /// Decodes every LOD of one brick, resolving each level in two passes.
    /// A `rayon` parallel pass first fills every node whose opcode is
    /// `Parent` or a palette opcode — those depend only on the previous
    /// level, never on a same-LOD sibling — leaving `Neighbor*` nodes
    /// unresolved. A second, sequential pass then walks `0..n` in order
    /// resolving the `Neighbor*` nodes left behind: by the same ordering
    /// guarantee `choose_opcode`/`neighbor_label` rely on, a `Neighbor*`
    /// node's reference always has a strictly smaller Morton index, so it
    /// is already filled by the time the sequential pass reaches it.
    pub fn parallel_decode_brick(&self, enc: &[u32]) -> Result<Vec<u32>> {
        let lod_count = self.lod_count();
        let header: Vec<usize> = (0..lod_count).map(|l| enc[l] as usize).collect();
        let mut labels = vec![self.read_palette_entry(enc, 0)];

        for lod in 1..lod_count {
            let width = 1u32 << lod;
            let n = (width as usize).pow(3);
            let base = header[lod];
            let prev_labels = &labels;

            let mut next_labels: Vec<Option<u32>> = (0..n)
                .into_par_iter()
                .map(|morton_i| {
                    let nibble = read4(enc, base + morton_i);
                    let op = Opcode::from_nibble(nibble).unwrap_or(Opcode::PaletteAdv);
                    match op {
                        Opcode::NeighborX | Opcode::NeighborY | Opcode::NeighborZ => None,
                        Opcode::Parent => Some(prev_labels[morton_i / 8]),
                        _ => {
                            let pos = morton3_pos(morton_i as u32);
                            Some(self.resolve(
                                enc, None, &header, lod, morton_i, pos, op, prev_labels, &[],
                            ))
                        }
                    }
                })
                .collect();

            for morton_i in 0..n {
                if next_labels[morton_i].is_some() {
                    continue;
                }
                let nibble = read4(enc, base + morton_i);
                let op = Opcode::from_nibble(nibble).unwrap_or(Opcode::PaletteAdv);
                let axis = match op {
                    Opcode::NeighborX => 0,
                    Opcode::NeighborY => 1,
                    _ => 2,
                };
                let mut npos = morton3_pos(morton_i as u32);
                npos[axis] -= 1;
                let neighbor_morton = morton3_index(npos) as usize;
                let label = if neighbor_morton < morton_i {
                    next_labels[neighbor_morton].expect("same-LOD neighbor resolved earlier")
                } else {
                    let parent_pos = [npos[0] / 2, npos[1] / 2, npos[2] / 2];
                    prev_labels[morton3_index(parent_pos) as usize]
                };
                next_labels[morton_i] = Some(label);
            }

            labels = next_labels.into_iter().map(|v| v.unwrap()).collect();
        }
        Ok(labels)
    }

    /// Single-voxel random-access decode: every node's opcode sits at the
    /// fixed nibble position `header[lod] + morton_i`, so this follows the
    /// PARENT/NEIGHBOR_* chain upward in place (no intermediate LOD is ever
    /// materialized) until a palette opcode is reached, then resolves the
    /// palette index with the same linear rank scan `decode_lod` uses. A
    /// `NeighborX/Y/Z` step mirrors `neighbor_label`'s same-LOD-or-parent
    /// rule exactly, since it must land on the same value `decode_lod`
    /// would have produced for this voxel.
    pub fn random_access_decode_voxel(
        &self,
        enc: &[u32],
        detail: Option<&[u32]>,
        output_morton_i: usize,
        inv_lod: usize,
    ) -> Result<u32> {
        let lod_count = self.lod_count();
        if inv_lod >= lod_count {
            return Err(Error::OutOfBounds(format!(
                "inv_lod {inv_lod} >= lod_count {lod_count}"
            )));
        }
        let header: Vec<usize> = (0..lod_count).map(|l| enc[l] as usize).collect();
        let mut lod = inv_lod;
        let mut morton_i = output_morton_i;

        loop {
            if lod == 0 {
                return Ok(self.read_palette_entry(enc, 0));
            }
            let (buf, base) = self.level_source(enc, detail, &header, lod);
            let nibble = read4(buf, base + morton_i);
            let op = Opcode::from_nibble(nibble).ok_or_else(|| Error::InvariantViolated {
                brick_index: 0,
                message: format!("unknown opcode nibble {nibble}"),
            })?;
            match op {
                Opcode::Parent => {
                    morton_i /= 8;
                    lod -= 1;
                }
                Opcode::NeighborX | Opcode::NeighborY | Opcode::NeighborZ => {
                    let axis = match op {
                        Opcode::NeighborX => 0,
                        Opcode::NeighborY => 1,
                        _ => 2,
                    };
                    let mut npos = morton3_pos(morton_i as u32);
                    npos[axis] -= 1;
                    let neighbor_morton = morton3_index(npos) as usize;
                    if neighbor_morton < morton_i {
                        morton_i = neighbor_morton;
                    } else {
                        let parent_pos = [npos[0] / 2, npos[1] / 2, npos[2] / 2];
                        morton_i = morton3_index(parent_pos) as usize;
                        lod -= 1;
                    }
                }
                Opcode::PaletteLast => {
                    let rank = self.palette_rank_before(enc, detail, &header, lod, morton_i);
                    return Ok(self.read_palette_entry(enc, rank - 1));
                }
                Opcode::PaletteAdv => {
                    let rank = self.palette_rank_before(enc, detail, &header, lod, morton_i);
                    return Ok(self.read_palette_entry(enc, rank));
                }
                Opcode::PaletteD => {
                    return Err(Error::InvariantViolated {
                        brick_index: 0,
                        message: "PALETTE_D is never emitted in random-access mode".into(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfc::cartesian_index;

    fn round_trip(volume: &[u32], dim: Pos3, brick_side: u32) {
        let enc = NibbleRandomAccessEncoder::new(brick_side, OpMask::default());
        let mut buf = Vec::new();
        enc.encode(volume, dim, [0, 0, 0], &mut buf).unwrap();
        enc.verify(&buf).unwrap();
        let decoded = enc.decode_lod(&buf, None, enc.lod_count() - 1).unwrap();
        for z in 0..brick_side.min(dim[2]) {
            for y in 0..brick_side.min(dim[1]) {
                for x in 0..brick_side.min(dim[0]) {
                    let m = crate::sfc::morton3_index([x, y, z]) as usize;
                    let expected = volume[cartesian_index([x, y, z], dim) as usize];
                    assert_eq!(decoded[m], expected, "mismatch at {x},{y},{z}");
                }
            }
        }
    }

    #[test]
    fn single_label_round_trip() {
        round_trip(&vec![4u32; 4096], [16, 16, 16], 16);
    }

    #[test]
    fn gradient_round_trip() {
        let dim = [16u32, 16, 16];
        let mut volume = vec![0u32; 4096];
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = x / 4 + y / 8;
                }
            }
        }
        round_trip(&volume, dim, 16);
    }

    #[test]
    fn random_access_voxel_matches_full_decode() {
        let dim = [16u32, 16, 16];
        let mut volume = vec![0u32; 4096];
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = (x ^ y ^ z) % 5;
                }
            }
        }
        let enc = NibbleRandomAccessEncoder::new(16, OpMask::default());
        let mut buf = Vec::new();
        enc.encode(&volume, dim, [0, 0, 0], &mut buf).unwrap();
        let full = enc.decode_lod(&buf, None, enc.lod_count() - 1).unwrap();
        for m in 0..full.len() {
            let voxel = enc
                .random_access_decode_voxel(&buf, None, m, enc.lod_count() - 1)
                .unwrap();
            assert_eq!(voxel, full[m], "mismatch at morton {m}");
        }
    }

    #[test]
    fn parallel_decode_matches_serial_decode() {
        let dim = [16u32, 16, 16];
        let mut volume = vec![0u32; 4096];
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = (x / 2 + z) % 7;
                }
            }
        }
        let enc = NibbleRandomAccessEncoder::new(16, OpMask::default());
        let mut buf = Vec::new();
        enc.encode(&volume, dim, [0, 0, 0], &mut buf).unwrap();
        let serial = enc.decode_lod(&buf, None, enc.lod_count() - 1).unwrap();
        let parallel = enc.parallel_decode_brick(&buf).unwrap();
        assert_eq!(serial, parallel);
    }
}
