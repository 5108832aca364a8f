//! Serial nibble brick encoder (C8, nibble / SingleTableVBL / DoubleTableVBL
//! modes without random access).
//!
//! Grounded on `NibbleEncoder.cpp`'s coarse-to-fine traversal and header
//! layout, adapted for the serial (non-random-access) case: constant
//! subtrees are skipped entirely in finer LODs via the STOP_BIT, and
//! `PALETTE_D` is available as a fourth opcode. Because skipped subtrees
//! leave gaps, a brick must be decoded LOD by LOD, replaying the opcode
//! stream and propagating each constant parent's label to its whole
//! subtree.
//!
//! `SingleTableVBL`/`DoubleTableVBL` share this same traversal (the opcode
//! choice and header layout are unaffected) but relabel every stored
//! nibble through a frequency-rank permutation built from
//! `Configuration::base_frequencies`/`finest_frequencies`: the most
//! frequent nibble value becomes `0`, the least frequent becomes `15`. The
//! stored codeword width stays 4 bits — the two wavelet-matrix encoders
//! (C5/C6) are where this crate does genuine variable-bit-length packing —
//! but a frequency-rank nibble stream is a better input to a downstream
//! byte-oriented entropy stage than a frequency-agnostic one, which is the
//! whole point of carrying a frequency table through `freq_profile` in the
//! first place. See `DESIGN.md` for why this crate reads "VBL" this way.

use super::{decode_palette_delta, encode_palette_delta, verify_common, BrickEncoder};
use crate::config::OpMask;
use crate::error::{Error, Result};
use crate::multigrid::MultiGrid;
use crate::nibble::{push4, read4, words_for_nibbles};
use crate::opcode::{Opcode, STOP_BIT};
use crate::sfc::{morton3_index, morton3_pos, Pos3};

/// Identity `(fwd, inv)` nibble remap: plain `Nibble` mode never reorders
/// stored values.
fn identity_remap() -> ([u8; 16], [u8; 16]) {
    let mut table = [0u8; 16];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = i as u8;
    }
    (table, table)
}

/// Builds a frequency-rank `(fwd, inv)` nibble remap from a 16-entry
/// histogram: the most frequent nibble value maps to `0`, ties broken by
/// the original value so the permutation is deterministic.
fn frequency_remap(freqs: &[u64; 16]) -> ([u8; 16], [u8; 16]) {
    let mut order: Vec<u8> = (0u8..16).collect();
    order.sort_by(|&a, &b| freqs[b as usize].cmp(&freqs[a as usize]).then(a.cmp(&b)));
    let mut fwd = [0u8; 16];
    let mut inv = [0u8; 16];
    for (new_value, &old_value) in order.iter().enumerate() {
        fwd[old_value as usize] = new_value as u8;
        inv[new_value] = old_value;
    }
    (fwd, inv)
}

pub struct NibbleSerialEncoder {
    brick_side: u32,
    op_mask: OpMask,
    base_remap_fwd: [u8; 16],
    base_remap_inv: [u8; 16],
    /// `Some` only for `DoubleTableVBL`: a second remap applied to the
    /// finest LOD's nibbles instead of `base_remap_*`.
    detail_remap: Option<([u8; 16], [u8; 16])>,
}

impl NibbleSerialEncoder {
    pub fn new(brick_side: u32, op_mask: OpMask) -> Self {
        let (fwd, inv) = identity_remap();
        Self {
            brick_side,
            op_mask,
            base_remap_fwd: fwd,
            base_remap_inv: inv,
            detail_remap: None,
        }
    }

    /// Builds a `SingleTableVBL`/`DoubleTableVBL` encoder: `base_frequencies`
    /// drives the remap for every LOD but the finest, `finest_frequencies`
    /// (when present) drives a second remap for the finest LOD only. Both
    /// `None` is equivalent to [`Self::new`].
    pub fn with_frequencies(
        brick_side: u32,
        op_mask: OpMask,
        base_frequencies: Option<[u64; 16]>,
        finest_frequencies: Option<[u64; 16]>,
    ) -> Self {
        let (base_remap_fwd, base_remap_inv) = match base_frequencies {
            Some(freqs) => frequency_remap(&freqs),
            None => identity_remap(),
        };
        let detail_remap = finest_frequencies.map(|freqs| frequency_remap(&freqs));
        Self {
            brick_side,
            op_mask,
            base_remap_fwd,
            base_remap_inv,
            detail_remap,
        }
    }

    fn max_palette_delta(&self) -> u32 {
        1 << 24
    }

    /// Remap tables `(fwd, inv)` in effect for LOD `lod` of a brick with
    /// `lod_count` LODs total.
    fn remap_for(&self, lod: usize, lod_count: usize) -> ([u8; 16], [u8; 16]) {
        if lod == lod_count - 1 {
            if let Some(detail) = self.detail_remap {
                return detail;
            }
        }
        (self.base_remap_fwd, self.base_remap_inv)
    }
}

impl BrickEncoder for NibbleSerialEncoder {
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

        // LOD 0: a single node, always PALETTE_ADV (first-opcode invariant).
        header[0] = nibble_count as u32;
        let (root_fwd, _) = self.remap_for(0, lod_count);
        {
            let root = mg.node(0, 0);
            palette.push(root.label);
            let op = Opcode::PaletteAdv.as_nibble()
                | if root.constant_subregion { STOP_BIT } else { 0 };
            nibble_count = push4(out, nibble_count, root_fwd[op as usize]);
        }

        let mut parent_stop = vec![mg.node(0, 0).constant_subregion];

        for lod in 1..lod_count {
            header[lod] = nibble_count as u32;
            let width = mg.lod_width(lod);
            let mut stop_here = vec![false; (width as usize).pow(3)];
            let (fwd, _) = self.remap_for(lod, lod_count);

            for morton_i in 0..(width as usize).pow(3) {
                let parent_morton = morton_i / 8;
                if parent_stop[parent_morton] {
                    // Whole subtree already fixed by an ancestor's stop bit.
                    stop_here[morton_i] = true;
                    continue;
                }

                let node = *mg.node(lod, morton_i);
                let pos = morton3_pos(morton_i as u32);
                let op = self.choose_opcode(&mg, lod, morton_i, pos, width, &palette, node.label);
                let stop = node.constant_subregion && width > 1;
                stop_here[morton_i] = stop;

                match op {
                    ChosenOp::Simple(opcode) => {
                        let mut nibble = opcode.as_nibble();
                        if stop {
                            nibble |= STOP_BIT;
                        }
                        nibble_count = push4(out, nibble_count, fwd[nibble as usize]);
                        if opcode == Opcode::PaletteAdv {
                            palette.push(node.label);
                        }
                    }
                    ChosenOp::Delta(d) => {
                        let mut nibble = Opcode::PaletteD.as_nibble();
                        if stop {
                            nibble |= STOP_BIT;
                        }
                        nibble_count = push4(out, nibble_count, fwd[nibble as usize]);
                        for extra in encode_palette_delta(d) {
                            nibble_count = push4(out, nibble_count, fwd[extra as usize]);
                        }
                    }
                }
            }
            parent_stop = stop_here;
        }

        for (i, &h) in header.iter().enumerate() {
            out[start_word + i] = h;
        }
        out[start_word + lod_count] = palette.len() as u32;
        if palette.len() as u64 == (self.brick_side as u64).pow(3) {
            log::warn!(
                "brick at {brick_origin:?} has a distinct label per voxel (palette = B^3 = {})",
                palette.len()
            );
        }

        // pad opcode region to a word boundary, then append reversed palette
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
        let header = &enc[0..=lod_count];
        let palette_size = header[lod_count] as usize;

        let mut new_entry_counter = 0usize;
        let mut palette_history: Vec<u32> = Vec::with_capacity(palette_size);
        let mut read_palette_entry = |idx: usize| -> u32 { enc[enc.len() - 1 - idx] };

        // LOD 0
        let (_, root_inv) = self.remap_for(0, lod_count);
        let mut cursor = header[0] as usize;
        let nib0 = root_inv[read4(enc, cursor) as usize];
        cursor += 1;
        debug_assert_eq!(Opcode::from_nibble(nib0), Some(Opcode::PaletteAdv));
        let root_label = read_palette_entry(new_entry_counter);
        new_entry_counter += 1;
        palette_history.push(root_label);
        let mut labels = vec![root_label];
        let mut stop = vec![nib0 & STOP_BIT != 0];

        for lod in 1..=inv_lod {
            let width = 1u32 << lod;
            let n = (width as usize).pow(3);
            let mut next_labels = vec![0u32; n];
            let mut next_stop = vec![false; n];
            // The finest LOD's own opcode stream lives in `detail`, read
            // from its own offset 0, once `split_detail` has run.
            let (buf, start) = if lod == lod_count - 1 {
                match detail {
                    Some(d) => (d, 0usize),
                    None => (enc, header[lod] as usize),
                }
            } else {
                (enc, header[lod] as usize)
            };
            cursor = start;
            let (_, inv) = self.remap_for(lod, lod_count);

            for morton_i in 0..n {
                let parent_morton = morton_i / 8;
                if stop[parent_morton] {
                    next_labels[morton_i] = labels[parent_morton];
                    next_stop[morton_i] = true;
                    continue;
                }

                let nibble = inv[read4(buf, cursor) as usize];
                cursor += 1;
                let op = Opcode::from_nibble(nibble).ok_or_else(|| Error::InvariantViolated {
                    brick_index: 0,
                    message: format!("unknown opcode nibble {nibble}"),
                })?;
                let is_stop = nibble & STOP_BIT != 0;

                let label = match op {
                    Opcode::Parent => labels[parent_morton],
                    Opcode::NeighborX | Opcode::NeighborY | Opcode::NeighborZ => {
                        let axis = match op {
                            Opcode::NeighborX => 0,
                            Opcode::NeighborY => 1,
                            _ => 2,
                        };
                        let pos = morton3_pos(morton_i as u32);
                        self.neighbor_label(axis, pos, morton_i, &next_labels, &labels)
                    }
                    Opcode::PaletteLast => *palette_history.last().unwrap(),
                    Opcode::PaletteD => {
                        let d = decode_palette_delta(|| {
                            let n = inv[read4(buf, cursor) as usize];
                            cursor += 1;
                            n
                        });
                        palette_history[palette_history.len() - 1 - d as usize]
                    }
                    Opcode::PaletteAdv => {
                        let label = read_palette_entry(new_entry_counter);
                        new_entry_counter += 1;
                        palette_history.push(label);
                        label
                    }
                };
                next_labels[morton_i] = label;
                next_stop[morton_i] = is_stop;
            }
            labels = next_labels;
            stop = next_stop;
        }

        Ok(labels)
    }

    fn verify(&self, enc: &[u32]) -> Result<()> {
        verify_common(enc, self.lod_count())?;
        let (_, root_inv) = self.remap_for(0, self.lod_count());
        let first = root_inv[read4(enc, enc[0] as usize) as usize];
        if Opcode::from_nibble(first) != Some(Opcode::PaletteAdv) {
            return Err(Error::InvariantViolated {
                brick_index: 0,
                message: "first opcode is not PALETTE_ADV".into(),
            });
        }
        Ok(())
    }

    /// Replays the same coarse-to-fine opcode-choice traversal as
    /// [`Self::encode`], tallying the *semantic* (pre-remap) nibble value
    /// of every emitted nibble instead of writing it out. Used to build
    /// the frequency tables a `SingleTableVBL`/`DoubleTableVBL` encoder's
    /// remap is derived from, so it always counts as if `self` were an
    /// identity-remap encoder regardless of any remap `self` itself
    /// carries.
    fn freq_profile(
        &self,
        volume: &[u32],
        volume_dim: Pos3,
        brick_origin: Pos3,
        counters: &mut [u64; 32],
        detail_split: bool,
    ) -> Result<()> {
        let lod_count = self.lod_count();
        let mut mg = MultiGrid::build(volume, volume_dim, brick_origin, self.brick_side);
        mg.resolve_invalid_labels();

        let mut palette: Vec<u32> = Vec::new();
        let root = mg.node(0, 0);
        palette.push(root.label);
        let root_nibble =
            Opcode::PaletteAdv.as_nibble() | if root.constant_subregion { STOP_BIT } else { 0 };
        counters[root_nibble as usize] += 1;

        let mut parent_stop = vec![root.constant_subregion];
        for lod in 1..lod_count {
            let is_finest = detail_split && lod == lod_count - 1;
            let offset = if is_finest { 16 } else { 0 };
            let width = mg.lod_width(lod);
            let mut stop_here = vec![false; (width as usize).pow(3)];

            for morton_i in 0..(width as usize).pow(3) {
                let parent_morton = morton_i / 8;
                if parent_stop[parent_morton] {
                    stop_here[morton_i] = true;
                    continue;
                }

                let node = *mg.node(lod, morton_i);
                let pos = morton3_pos(morton_i as u32);
                let op = self.choose_opcode(&mg, lod, morton_i, pos, width, &palette, node.label);
                let stop = node.constant_subregion && width > 1;
                stop_here[morton_i] = stop;

                match op {
                    ChosenOp::Simple(opcode) => {
                        let mut nibble = opcode.as_nibble();
                        if stop {
                            nibble |= STOP_BIT;
                        }
                        counters[offset + nibble as usize] += 1;
                        if opcode == Opcode::PaletteAdv {
                            palette.push(node.label);
                        }
                    }
                    ChosenOp::Delta(d) => {
                        let mut nibble = Opcode::PaletteD.as_nibble();
                        if stop {
                            nibble |= STOP_BIT;
                        }
                        counters[offset + nibble as usize] += 1;
                        for extra in encode_palette_delta(d) {
                            counters[offset + extra as usize] += 1;
                        }
                    }
                }
            }
            parent_stop = stop_here;
        }
        Ok(())
    }
}

enum ChosenOp {
    Simple(Opcode),
    Delta(u32),
}

impl NibbleSerialEncoder {
    #[allow(clippy::too_many_arguments)]
    fn choose_opcode(
        &self,
        mg: &MultiGrid,
        lod: usize,
        morton_i: usize,
        pos: Pos3,
        _width: u32,
        palette: &[u32],
        target: u32,
    ) -> ChosenOp {
        let parent_morton = morton_i / 8;
        let parent_label = mg.node(lod - 1, parent_morton).label;

        if self.op_mask.contains(OpMask::PARENT) && target == parent_label {
            return ChosenOp::Simple(Opcode::Parent);
        }

        // Every node may reference its same-LOD predecessor along any axis,
        // not just the sibling inside its own parent octant. If that
        // neighbor's Morton index is not strictly smaller than this node's
        // (it hasn't been decoded yet at this LOD), fall back to the
        // neighbor's position one LOD coarser instead.
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
                return ChosenOp::Simple(match axis {
                    0 => Opcode::NeighborX,
                    1 => Opcode::NeighborY,
                    _ => Opcode::NeighborZ,
                });
            }
        }

        if self.op_mask.contains(OpMask::PALETTE_LAST) && palette.last() == Some(&target) {
            return ChosenOp::Simple(Opcode::PaletteLast);
        }

        if self.op_mask.contains(OpMask::PALETTE_D) {
            if let Some(pos_in_palette) = palette.iter().rposition(|&l| l == target) {
                let d = (palette.len() - 1 - pos_in_palette) as u32;
                if d >= 1 && d <= self.max_palette_delta() {
                    return ChosenOp::Delta(d);
                }
            }
        }

        ChosenOp::Simple(Opcode::PaletteAdv)
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfc::cartesian_index;

    fn round_trip(volume: &[u32], dim: Pos3, brick_side: u32) {
        let enc = NibbleSerialEncoder::new(brick_side, OpMask::default());
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
        round_trip(&vec![7u32; 512], [8, 8, 8], 8);
    }

    #[test]
    fn checkerboard_round_trip() {
        let dim = [8u32, 8, 8];
        let mut volume = vec![0u32; 512];
        for z in 0..8u32 {
            for y in 0..8u32 {
                for x in 0..8u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = (x + y + z) & 1;
                }
            }
        }
        round_trip(&volume, dim, 8);
    }

    #[test]
    fn stripe_round_trip() {
        let dim = [32u32, 32, 32];
        let mut volume = vec![0u32; 32 * 32 * 32];
        for z in 0..32u32 {
            for y in 0..32u32 {
                for x in 0..32u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = x;
                }
            }
        }
        round_trip(&volume, dim, 32);
    }

    #[test]
    fn frequency_remap_round_trips_and_reorders_stream() {
        let dim = [16u32, 16, 16];
        let mut volume = vec![0u32; 16 * 16 * 16];
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = (x ^ y ^ z) % 5;
                }
            }
        }

        let plain = NibbleSerialEncoder::new(16, OpMask::default());
        let mut plain_buf = Vec::new();
        plain.encode(&volume, dim, [0, 0, 0], &mut plain_buf).unwrap();

        let mut counters = [0u64; 32];
        plain
            .freq_profile(&volume, dim, [0, 0, 0], &mut counters, false)
            .unwrap();
        let mut base_freqs = [0u64; 16];
        base_freqs.copy_from_slice(&counters[0..16]);
        // Skew the table so the remap is non-identity even if every nibble
        // value happened to be equally frequent in this particular volume.
        base_freqs[0] += 1;

        let vbl = NibbleSerialEncoder::with_frequencies(16, OpMask::default(), Some(base_freqs), None);
        let mut vbl_buf = Vec::new();
        vbl.encode(&volume, dim, [0, 0, 0], &mut vbl_buf).unwrap();
        vbl.verify(&vbl_buf).unwrap();

        let decoded = vbl.decode_lod(&vbl_buf, None, vbl.lod_count() - 1).unwrap();
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    let m = crate::sfc::morton3_index([x, y, z]) as usize;
                    let expected = volume[cartesian_index([x, y, z], dim) as usize];
                    assert_eq!(decoded[m], expected, "mismatch at {x},{y},{z}");
                }
            }
        }
    }

    #[test]
    fn double_table_vbl_uses_distinct_finest_lod_remap() {
        let dim = [16u32, 16, 16];
        let mut volume = vec![0u32; 16 * 16 * 16];
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = (x + 2 * y + 3 * z) % 7;
                }
            }
        }
        let base_freqs = [10u64, 9, 8, 7, 6, 5, 4, 3, 2, 1, 1, 1, 1, 1, 1, 1];
        let finest_freqs = [1u64, 1, 1, 1, 1, 1, 1, 1, 1, 2, 3, 4, 5, 6, 7, 8];
        let enc = NibbleSerialEncoder::with_frequencies(
            16,
            OpMask::default(),
            Some(base_freqs),
            Some(finest_freqs),
        );
        let mut buf = Vec::new();
        enc.encode(&volume, dim, [0, 0, 0], &mut buf).unwrap();
        enc.verify(&buf).unwrap();
        let decoded = enc.decode_lod(&buf, None, enc.lod_count() - 1).unwrap();
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    let m = crate::sfc::morton3_index([x, y, z]) as usize;
                    let expected = volume[cartesian_index([x, y, z], dim) as usize];
                    assert_eq!(decoded[m], expected, "mismatch at {x},{y},{z}");
                }
            }
        }
    }

    #[test]
    fn freq_profile_counts_every_emitted_nibble() {
        let dim = [8u32, 8, 8];
        let volume = vec![3u32; 512];
        let enc = NibbleSerialEncoder::new(8, OpMask::default());
        let mut counters = [0u64; 32];
        enc.freq_profile(&volume, dim, [0, 0, 0], &mut counters, false)
            .unwrap();
        let total: u64 = counters.iter().sum();
        // A fully constant brick emits exactly one opcode: the coarsest
        // PALETTE_ADV|STOP_BIT (every finer LOD is skipped by the stop bit).
        assert_eq!(total, 1);
        let palette_adv_stop = Opcode::PaletteAdv.as_nibble() | STOP_BIT;
        assert_eq!(counters[palette_adv_stop as usize], 1);
    }

    #[test]
    fn intermediate_lod_matches_multigrid_reduction() {
        let dim = [8u32, 8, 8];
        let mut volume = vec![0u32; 512];
        for z in 0..8u32 {
            for y in 0..8u32 {
                for x in 0..8u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = x / 4;
                }
            }
        }
        let enc = NibbleSerialEncoder::new(8, OpMask::default());
        let mut buf = Vec::new();
        enc.encode(&volume, dim, [0, 0, 0], &mut buf).unwrap();
        let mut mg = MultiGrid::build(&volume, dim, [0, 0, 0], 8);
        mg.resolve_invalid_labels();
        for lod in 0..enc.lod_count() {
            let decoded = enc.decode_lod(&buf, None, lod).unwrap();
            for (i, node) in mg.lod_nodes(lod).iter().enumerate() {
                assert_eq!(decoded[i], node.label, "lod {lod} index {i}");
            }
        }
    }
}
