//! Huffman-wavelet-matrix-backed random-access brick encoder (C8 ×
//! [`crate::huffman_wavelet_matrix::HuffmanWaveletMatrix`]).
//!
//! Structurally identical to [`super::wavelet_matrix::WaveletMatrixEncoder`]
//! — same full-grid stop-bit vector giving O(1) ancestor-skip detection and
//! O(levels) "how many live siblings precede me" rank queries — except the
//! opcode substrate is the 6-symbol Huffman-coded wavelet matrix instead of
//! the 16-symbol uniform one, so `PALETTE_D` (which has no Huffman code) is
//! unavailable here too, and a palette rank query walks only as many levels
//! as `PALETTE_ADV`'s own code length instead of all four.

use crate::bitvector::BitVector;
use crate::config::OpMask;
use crate::error::{Error, Result};
use crate::flatrank::FlatRank;
use crate::huffman_wavelet_matrix::HuffmanWaveletMatrix;
use crate::multigrid::MultiGrid;
use crate::opcode::{HuffmanSymbol, Opcode};
use crate::sfc::{morton3_index, morton3_pos, Pos3};

use super::{push_u64_words, read_u64_words, verify_common, BrickEncoder};

pub struct HuffmanWaveletMatrixEncoder {
    brick_side: u32,
    op_mask: OpMask,
}

impl HuffmanWaveletMatrixEncoder {
    pub fn new(brick_side: u32, op_mask: OpMask) -> Self {
        Self { brick_side, op_mask }
    }

    fn stop_level_offset(level: usize) -> usize {
        (0..level).map(|l| (1usize << l).pow(3)).sum()
    }
}

struct HeaderLayout {
    lod_count: usize,
}

impl HeaderLayout {
    const EXTRA_WORDS: usize = 5;

    fn header_words(&self) -> usize {
        self.lod_count + 1 + Self::EXTRA_WORDS
    }
    fn palette_size_index(&self) -> usize {
        self.lod_count
    }
    fn text_size_index(&self) -> usize {
        self.lod_count + 1
    }
    fn opcode_bits_len_index(&self) -> usize {
        self.lod_count + 2
    }
    fn opcode_l12_count_index(&self) -> usize {
        self.lod_count + 3
    }
    fn stop_bits_len_index(&self) -> usize {
        self.lod_count + 4
    }
    fn stop_l12_count_index(&self) -> usize {
        self.lod_count + 5
    }
}

struct Decoded {
    header: Vec<usize>,
    hwm: HuffmanWaveletMatrix,
    stop_fr: FlatRank,
    stop_bv: BitVector,
}

impl HuffmanWaveletMatrixEncoder {
    fn layout(&self) -> HeaderLayout {
        HeaderLayout {
            lod_count: self.lod_count(),
        }
    }

    fn open(&self, enc: &[u32]) -> Decoded {
        let layout = self.layout();
        let lod_count = layout.lod_count;
        let header: Vec<usize> = (0..lod_count).map(|l| enc[l] as usize).collect();
        let text_size = enc[layout.text_size_index()] as usize;
        let opcode_bits_len = enc[layout.opcode_bits_len_index()] as usize;
        let opcode_l12_count = enc[layout.opcode_l12_count_index()] as usize;
        let stop_bits_len = enc[layout.stop_bits_len_index()] as usize;
        let stop_l12_count = enc[layout.stop_l12_count_index()] as usize;

        let mut cursor = layout.header_words();
        let opcode_l12 = read_u64_words(enc, cursor, opcode_l12_count);
        cursor += 2 * opcode_l12_count;
        let opcode_words = (opcode_bits_len + 63) / 64;
        let opcode_bv_words = read_u64_words(enc, cursor, opcode_words);
        cursor += 2 * opcode_words;
        let stop_l12 = read_u64_words(enc, cursor, stop_l12_count);
        cursor += 2 * stop_l12_count;
        let stop_words = (stop_bits_len + 63) / 64;
        let stop_bv_words = read_u64_words(enc, cursor, stop_words);

        let hwm = HuffmanWaveletMatrix::from_serialized(
            opcode_bv_words,
            opcode_bits_len,
            opcode_l12,
            text_size,
        );
        let stop_bv = BitVector::from_words(stop_bv_words, stop_bits_len);
        let stop_fr = FlatRank::from_raw(stop_l12, stop_bits_len);

        Decoded {
            header,
            hwm,
            stop_fr,
            stop_bv,
        }
    }

    fn stop_ones_before(&self, d: &Decoded, level: usize, idx: usize) -> u64 {
        let base = Self::stop_level_offset(level);
        d.stop_fr.rank1(&d.stop_bv, base + idx) - d.stop_fr.rank1(&d.stop_bv, base)
    }

    fn is_stop(&self, d: &Decoded, level: usize, idx: usize) -> bool {
        d.stop_bv.access(Self::stop_level_offset(level) + idx)
    }

    fn read_palette_entry(&self, enc: &[u32], idx: usize) -> u32 {
        enc[enc.len() - 1 - idx]
    }

    #[allow(clippy::too_many_arguments)]
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
}

impl BrickEncoder for HuffmanWaveletMatrixEncoder {
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
        let layout = self.layout();
        let lod_count = layout.lod_count;
        for _ in 0..layout.header_words() {
            out.push(0);
        }

        let mut mg = MultiGrid::build(volume, volume_dim, brick_origin, self.brick_side);
        mg.resolve_invalid_labels();

        let mut symbols: Vec<HuffmanSymbol> = Vec::new();
        let mut palette: Vec<u32> = Vec::new();
        let mut header = vec![0u32; lod_count];

        header[0] = 0;
        palette.push(mg.node(0, 0).label);
        symbols.push(HuffmanSymbol::PaletteAdv);

        for lod in 1..lod_count {
            header[lod] = symbols.len() as u32;
            let width = mg.lod_width(lod);
            for morton_i in 0..(width as usize).pow(3) {
                let parent_morton = morton_i / 8;
                if mg.node(lod - 1, parent_morton).constant_subregion {
                    continue;
                }
                let node = *mg.node(lod, morton_i);
                let pos = morton3_pos(morton_i as u32);
                let opcode = self.choose_opcode(&mg, lod, morton_i, pos, &palette, node.label);
                if opcode == Opcode::PaletteAdv {
                    palette.push(node.label);
                }
                symbols.push(HuffmanSymbol::from_opcode(opcode).expect(
                    "choose_opcode never selects PALETTE_D, which has no Huffman code",
                ));
            }
        }

        let total_stop_bits: usize = (0..lod_count - 1).map(|l| (1usize << l).pow(3)).sum();
        let mut stop_bv = BitVector::new(total_stop_bits);
        let mut stop_bit_i = 0usize;
        for lod in 0..lod_count - 1 {
            let width = mg.lod_width(lod);
            for morton_i in 0..(width as usize).pow(3) {
                stop_bv.set(stop_bit_i, mg.node(lod, morton_i).constant_subregion);
                stop_bit_i += 1;
            }
        }
        let stop_fr = FlatRank::build(&stop_bv);

        let hwm = HuffmanWaveletMatrix::build(&symbols);

        for (i, &h) in header.iter().enumerate() {
            out[start_word + i] = h;
        }
        out[start_word + layout.palette_size_index()] = palette.len() as u32;
        out[start_word + layout.text_size_index()] = symbols.len() as u32;
        out[start_word + layout.opcode_bits_len_index()] = hwm.bit_vector().len() as u32;
        out[start_word + layout.opcode_l12_count_index()] = hwm.flat_rank().raw_l12().len() as u32;
        out[start_word + layout.stop_bits_len_index()] = stop_bv.len() as u32;
        out[start_word + layout.stop_l12_count_index()] = stop_fr.raw_l12().len() as u32;

        push_u64_words(out, hwm.flat_rank().raw_l12());
        push_u64_words(out, hwm.bit_vector().raw_words());
        push_u64_words(out, stop_fr.raw_l12());
        push_u64_words(out, stop_bv.raw_words());

        for &label in palette.iter().rev() {
            out.push(label);
        }

        Ok(out.len() - start_word)
    }

    fn decode_lod(&self, enc: &[u32], _detail: Option<&[u32]>, inv_lod: usize) -> Result<Vec<u32>> {
        let lod_count = self.lod_count();
        if inv_lod >= lod_count {
            return Err(Error::OutOfBounds(format!(
                "inv_lod {inv_lod} >= lod_count {lod_count}"
            )));
        }
        let d = self.open(enc);

        let mut palette_counter = 0usize;
        let root_label = self.read_palette_entry(enc, palette_counter);
        palette_counter += 1;
        let mut labels = vec![root_label];
        let mut stop = vec![self.is_stop(&d, 0, 0)];

        for lod in 1..=inv_lod {
            let width = 1u32 << lod;
            let n = (width as usize).pow(3);
            let mut next_labels = vec![0u32; n];
            let mut next_stop = vec![false; n];
            let base = d.header[lod];
            let mut local = 0usize;

            for morton_i in 0..n {
                let parent_morton = morton_i / 8;
                if stop[parent_morton] {
                    next_labels[morton_i] = labels[parent_morton];
                    next_stop[morton_i] = true;
                    continue;
                }
                let sym = d.hwm.access(base + local);
                local += 1;
                let op = sym.to_opcode();
                let label = match op {
                    Opcode::Parent => labels[parent_morton],
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
                            next_labels[neighbor_morton]
                        } else {
                            let parent_pos = [npos[0] / 2, npos[1] / 2, npos[2] / 2];
                            labels[morton3_index(parent_pos) as usize]
                        }
                    }
                    Opcode::PaletteLast => self.read_palette_entry(enc, palette_counter - 1),
                    Opcode::PaletteAdv => {
                        let label = self.read_palette_entry(enc, palette_counter);
                        palette_counter += 1;
                        label
                    }
                    Opcode::PaletteD => unreachable!("PALETTE_D has no Huffman code"),
                };
                next_labels[morton_i] = label;
                if lod < lod_count - 1 {
                    next_stop[morton_i] = self.is_stop(&d, lod, morton_i);
                }
            }
            labels = next_labels;
            stop = next_stop;
        }
        Ok(labels)
    }

    fn verify(&self, enc: &[u32]) -> Result<()> {
        verify_common(enc, self.lod_count())?;
        let d = self.open(enc);
        if d.hwm.access(0) != HuffmanSymbol::PaletteAdv {
            return Err(Error::InvariantViolated {
                brick_index: 0,
                message: "first opcode is not PALETTE_ADV".into(),
            });
        }
        Ok(())
    }
}

impl HuffmanWaveletMatrixEncoder {
    pub fn random_access_decode_voxel(
        &self,
        enc: &[u32],
        output_morton_i: usize,
        inv_lod: usize,
    ) -> Result<u32> {
        let lod_count = self.lod_count();
        if inv_lod >= lod_count {
            return Err(Error::OutOfBounds(format!(
                "inv_lod {inv_lod} >= lod_count {lod_count}"
            )));
        }
        let d = self.open(enc);
        let mut level = inv_lod;
        let mut idx = output_morton_i;

        loop {
            if level == 0 {
                return Ok(self.read_palette_entry(enc, 0));
            }
            let parent_idx = idx >> 3;
            if self.is_stop(&d, level - 1, parent_idx) {
                level -= 1;
                idx = parent_idx;
                continue;
            }
            let pos_in_array = idx - 8 * self.stop_ones_before(&d, level - 1, parent_idx) as usize;
            let encoded_pos = d.header[level] + pos_in_array;
            let sym = d.hwm.access(encoded_pos);
            let op = sym.to_opcode();
            match op {
                Opcode::Parent => {
                    level -= 1;
                    idx = parent_idx;
                }
                Opcode::NeighborX | Opcode::NeighborY | Opcode::NeighborZ => {
                    let axis = match op {
                        Opcode::NeighborX => 0,
                        Opcode::NeighborY => 1,
                        _ => 2,
                    };
                    let mut npos = morton3_pos(idx as u32);
                    npos[axis] -= 1;
                    let neighbor_morton = morton3_index(npos) as usize;
                    if neighbor_morton < idx {
                        idx = neighbor_morton;
                    } else {
                        let parent_pos = [npos[0] / 2, npos[1] / 2, npos[2] / 2];
                        idx = morton3_index(parent_pos) as usize;
                        level -= 1;
                    }
                }
                Opcode::PaletteAdv => {
                    let count = d.hwm.rank(encoded_pos + 1, HuffmanSymbol::PaletteAdv);
                    return Ok(self.read_palette_entry(enc, count as usize - 1));
                }
                Opcode::PaletteLast => {
                    let count = d.hwm.rank(encoded_pos, HuffmanSymbol::PaletteAdv);
                    return Ok(self.read_palette_entry(enc, count as usize - 1));
                }
                Opcode::PaletteD => unreachable!("PALETTE_D has no Huffman code"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfc::cartesian_index;

    fn round_trip(volume: &[u32], dim: Pos3, brick_side: u32) {
        let enc = HuffmanWaveletMatrixEncoder::new(brick_side, OpMask::default());
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
        round_trip(&vec![9u32; 4096], [16, 16, 16], 16);
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
    fn random_access_voxel_matches_full_decode_without_palette_d() {
        let dim = [16u32, 16, 16];
        let mut volume = vec![0u32; 4096];
        for z in 0..16u32 {
            for y in 0..16u32 {
                for x in 0..16u32 {
                    volume[cartesian_index([x, y, z], dim) as usize] = (x ^ y ^ z) % 5;
                }
            }
        }
        let mask = OpMask::default() & !OpMask::PALETTE_D & !OpMask::PALETTE_D_LEGACY;
        let enc = HuffmanWaveletMatrixEncoder::new(16, mask);
        let mut buf = Vec::new();
        enc.encode(&volume, dim, [0, 0, 0], &mut buf).unwrap();
        let full = enc.decode_lod(&buf, None, enc.lod_count() - 1).unwrap();
        for m in 0..full.len() {
            let voxel = enc
                .random_access_decode_voxel(&buf, m, enc.lod_count() - 1)
                .unwrap();
            assert_eq!(voxel, full[m], "mismatch at morton {m}");
        }
    }

    #[test]
    fn synthetic_boxes_round_trip() {
        let dim = [40u32, 32, 24];
        let mut volume = vec![0u32; (40 * 32 * 24) as usize];
        let boxes: [([u32; 3], [u32; 3], u32); 4] = [
            ([0, 0, 0], [10, 10, 10], 1),
            ([5, 5, 5], [20, 15, 12], 2),
            ([20, 0, 0], [40, 32, 24], 3),
            ([0, 20, 10], [15, 32, 24], 4),
        ];
        for (min, max, label) in boxes {
            for z in min[2]..max[2] {
                for y in min[1]..max[1] {
                    for x in min[0]..max[0] {
                        volume[cartesian_index([x, y, z], dim) as usize] = label;
                    }
                }
            }
        }
        round_trip(&volume, dim, 16);
    }
}
