//! Fixed-wavelet-matrix-backed random-access brick encoder (C8 ×
//! [`crate::wavelet_matrix::WaveletMatrix`]).
//!
//! Unlike [`super::nibble_random_access`], which must forgo stop bits to
//! keep every node's opcode at a fixed nibble position, this encoder still
//! gets constant-subtree compression: a second, full-grid bit vector (one
//! bit per multigrid node below the finest LOD, taken verbatim from
//! [`crate::multigrid::MultiGrid::node`]'s `constant_subregion` flag) lets
//! a lookup decide in O(1) whether a node's label was inherited from an
//! ancestor instead of encoded at this LOD at all, and — if it was encoded
//! — how many earlier same-LOD siblings were skipped, via a flat-rank over
//! that bit vector. The opcode stream itself (`PARENT`/`NEIGHBOR_*`/
//! `PALETTE_ADV`/`PALETTE_LAST`, no `PALETTE_D`: see `DESIGN.md`) is only
//! as long as the number of *emitted* opcodes, same as the serial nibble
//! encoder, but is stored through the wavelet matrix instead of packed
//! nibbles so `PALETTE_ADV` occurrences can be ranked in O(levels) instead
//! of scanned linearly.

use crate::config::OpMask;
use crate::error::{Error, Result};
use crate::flatrank::FlatRank;
use crate::multigrid::MultiGrid;
use crate::opcode::Opcode;
use crate::sfc::{morton3_index, morton3_pos, Pos3};
use crate::wavelet_matrix::WaveletMatrix;
use crate::bitvector::BitVector;

use super::{push_u64_words, read_u64_words, verify_common, BrickEncoder};

const PALETTE_ADV_SYMBOL: u8 = Opcode::PaletteAdv as u8;

pub struct WaveletMatrixEncoder {
    brick_side: u32,
    op_mask: OpMask,
}

impl WaveletMatrixEncoder {
    pub fn new(brick_side: u32, op_mask: OpMask) -> Self {
        Self { brick_side, op_mask }
    }

    /// Node count of every LOD strictly coarser than `level`, i.e. the
    /// start offset of `level`'s slice within the concatenated
    /// full-grid stop-bit vector.
    fn stop_level_offset(level: usize) -> usize {
        (0..level).map(|l| (1usize << l).pow(3)).sum()
    }
}

struct HeaderLayout {
    lod_count: usize,
}

impl HeaderLayout {
    const EXTRA_WORDS: usize = 5; // text_size, opcode_bits_len, opcode_l12_count, stop_bits_len, stop_l12_count

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

/// Everything needed to query a decoded brick's opcode/stop substrates,
/// rebuilt from the header and body on every decode entry point.
struct Decoded {
    header: Vec<usize>,
    wm: WaveletMatrix,
    stop_fr: FlatRank,
    stop_bv: BitVector,
}

impl WaveletMatrixEncoder {
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

        let wm = WaveletMatrix::from_serialized(opcode_bv_words, opcode_l12, text_size);
        let stop_bv = BitVector::from_words(stop_bv_words, stop_bits_len);
        let stop_fr = FlatRank::from_raw(stop_l12, stop_bits_len);

        Decoded {
            header,
            wm,
            stop_fr,
            stop_bv,
        }
    }

    /// Count of `true` bits in `stop_bv[level_offset(level) .. level_offset(level)+idx)`.
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

impl BrickEncoder for WaveletMatrixEncoder {
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

        let mut symbols: Vec<u8> = Vec::new();
        let mut palette: Vec<u32> = Vec::new();
        let mut header = vec![0u32; lod_count];

        header[0] = 0;
        palette.push(mg.node(0, 0).label);
        symbols.push(Opcode::PaletteAdv.as_nibble());

        for lod in 1..lod_count {
            header[lod] = symbols.len() as u32;
            let width = mg.lod_width(lod);
            for morton_i in 0..(width as usize).pow(3) {
                let parent_morton = morton_i / 8;
                if mg.node(lod - 1, parent_morton).constant_subregion {
                    continue; // inherited; no opcode is emitted for this node
                }
                let node = *mg.node(lod, morton_i);
                let pos = morton3_pos(morton_i as u32);
                let opcode = self.choose_opcode(&mg, lod, morton_i, pos, &palette, node.label);
                if opcode == Opcode::PaletteAdv {
                    palette.push(node.label);
                }
                symbols.push(opcode.as_nibble());
            }
        }

        // Full-grid stop-bit vector: one bit per node of every LOD below
        // the finest (which never needs to signal a further skip).
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

        let wm = WaveletMatrix::build(&symbols);

        for (i, &h) in header.iter().enumerate() {
            out[start_word + i] = h;
        }
        out[start_word + layout.palette_size_index()] = palette.len() as u32;
        out[start_word + layout.text_size_index()] = symbols.len() as u32;
        out[start_word + layout.opcode_bits_len_index()] = wm.bit_vector().len() as u32;
        out[start_word + layout.opcode_l12_count_index()] = wm.flat_rank().raw_l12().len() as u32;
        out[start_word + layout.stop_bits_len_index()] = stop_bv.len() as u32;
        out[start_word + layout.stop_l12_count_index()] = stop_fr.raw_l12().len() as u32;

        push_u64_words(out, wm.flat_rank().raw_l12());
        push_u64_words(out, wm.bit_vector().raw_words());
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
                let sym = d.wm.access(base + local);
                local += 1;
                let op = Opcode::from_nibble(sym).ok_or_else(|| Error::InvariantViolated {
                    brick_index: 0,
                    message: format!("unknown opcode symbol {sym}"),
                })?;
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
                    Opcode::PaletteD => {
                        return Err(Error::InvariantViolated {
                            brick_index: 0,
                            message: "PALETTE_D is never emitted by the wavelet-matrix encoder"
                                .into(),
                        })
                    }
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
        if d.wm.access(0) != Opcode::PaletteAdv.as_nibble() {
            return Err(Error::InvariantViolated {
                brick_index: 0,
                message: "first opcode is not PALETTE_ADV".into(),
            });
        }
        Ok(())
    }
}

impl WaveletMatrixEncoder {
    /// Single-voxel random-access decode. Climbs the stop-bit chain in
    /// O(levels) to find the node whose opcode is actually stored (an
    /// ancestor may have pre-empted it), resolves `NEIGHBOR_*`/`PARENT`
    /// hops the same way, then answers a palette op with a wavelet-matrix
    /// rank query instead of a linear scan.
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
            let sym = d.wm.access(encoded_pos);
            let op = Opcode::from_nibble(sym).ok_or_else(|| Error::InvariantViolated {
                brick_index: 0,
                message: format!("unknown opcode symbol {sym}"),
            })?;
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
                    let count = d.wm.rank(encoded_pos + 1, PALETTE_ADV_SYMBOL);
                    return Ok(self.read_palette_entry(enc, count as usize - 1));
                }
                Opcode::PaletteLast => {
                    let count = d.wm.rank(encoded_pos, PALETTE_ADV_SYMBOL);
                    return Ok(self.read_palette_entry(enc, count as usize - 1));
                }
                Opcode::PaletteD => {
                    return Err(Error::InvariantViolated {
                        brick_index: 0,
                        message: "PALETTE_D is never emitted by the wavelet-matrix encoder".into(),
                    })
                }
            }
        }
    }
}
