//! Huffman-shaped wavelet matrix over the 6-symbol opcode alphabet (C6).
//!
//! Grounded on `HuffmanWaveletMatrix.hpp`/`.cpp` and
//! `prefix_counting_huffman` in `prefix_counting.cpp`. Unlike the uniform
//! [`crate::wavelet_matrix::WaveletMatrix`], an item that reads a 1-bit at
//! some level is fully decoded and drops out of the matrix instead of
//! continuing to another sub-block — a direct consequence of the fixed
//! inverted canonical code where any 1-bit terminates a codeword. Levels
//! therefore shrink monotonically and there are at most
//! [`crate::opcode::HWM_MAX_CODE_LENGTH`] of them.

use crate::bitvector::BitVector;
use crate::flatrank::FlatRank;
use crate::opcode::{HuffmanSymbol, HWM_MAX_CODE_LENGTH};

pub const HWM_LEVELS: usize = HWM_MAX_CODE_LENGTH as usize;

/// The symbol whose code is exactly `level+1` bits long and ends in a 1
/// — i.e. the symbol `access`/`rank` resolve to when they see a 1-bit at
/// `level`.
const SYMBOL_TERMINATING_AT_LEVEL: [HuffmanSymbol; HWM_LEVELS] = [
    HuffmanSymbol::Parent,
    HuffmanSymbol::NeighborX,
    HuffmanSymbol::NeighborY,
    HuffmanSymbol::NeighborZ,
    HuffmanSymbol::PaletteAdv,
];

#[derive(Clone, Debug)]
pub struct HuffmanWaveletMatrix {
    bv: BitVector,
    fr: FlatRank,
    level_starts: [usize; HWM_LEVELS + 1],
    ones_before_level: [u64; HWM_LEVELS],
}

impl HuffmanWaveletMatrix {
    pub fn build(symbols: &[HuffmanSymbol]) -> Self {
        let mut bv = BitVector::new(0);
        let mut level_starts = [0usize; HWM_LEVELS + 1];
        let mut current: Vec<HuffmanSymbol> = symbols.to_vec();

        for level in 0..HWM_LEVELS {
            level_starts[level] = bv.len();
            let mut next = Vec::with_capacity(current.len());
            for &sym in &current {
                let code = sym.code();
                debug_assert!(
                    code.length as usize > level,
                    "symbol reached a level past its own code length"
                );
                let bit = code.bit(level as u8);
                bv.push_back(bit);
                if !bit {
                    next.push(sym);
                }
            }
            current = next;
        }
        level_starts[HWM_LEVELS] = bv.len();

        let fr = FlatRank::build(&bv);
        let mut ones_before_level = [0u64; HWM_LEVELS];
        for level in 0..HWM_LEVELS {
            ones_before_level[level] = fr.rank1(&bv, level_starts[level]);
        }

        Self {
            bv,
            fr,
            level_starts,
            ones_before_level,
        }
    }

    pub fn levels(&self) -> usize {
        HWM_LEVELS
    }

    pub fn level_start(&self, level: usize) -> usize {
        self.level_starts[level]
    }

    pub fn bit_vector(&self) -> &BitVector {
        &self.bv
    }

    pub fn flat_rank(&self) -> &FlatRank {
        &self.fr
    }

    pub fn ones_before_level(&self, level: usize) -> u64 {
        self.ones_before_level[level]
    }

    /// Decodes the symbol at position `i` of the level-0 (i.e. original
    /// text) ordering.
    pub fn access(&self, i: usize) -> HuffmanSymbol {
        let mut pos = i;
        for level in 0..HWM_LEVELS {
            let abs = self.level_starts[level] + pos;
            let bit = self.bv.access(abs);
            if bit {
                return SYMBOL_TERMINATING_AT_LEVEL[level];
            }
            let ones_before_pos = self.fr.rank1(&self.bv, abs) - self.ones_before_level[level];
            pos -= ones_before_pos as usize;
        }
        HuffmanSymbol::PaletteLast
    }

    /// Number of occurrences of `symbol` in the original text's
    /// `[0, i)` prefix.
    pub fn rank(&self, i: usize, symbol: HuffmanSymbol) -> u64 {
        let code = symbol.code();
        let mut pos = i;
        for level in 0..code.length as usize {
            let abs = self.level_starts[level] + pos;
            let ones_before_pos = self.fr.rank1(&self.bv, abs) - self.ones_before_level[level];
            if level + 1 == code.length as usize && code.terminates_with_one {
                return ones_before_pos;
            }
            pos -= ones_before_pos as usize;
        }
        pos as u64
    }

    pub fn byte_size(&self) -> usize {
        self.bv.raw_words().len() * 8 + self.fr.overhead_bytes()
    }

    /// Reconstructs a Huffman wavelet matrix from serialized parts: the
    /// opcode bit vector's raw words, its bit length, the flat-rank's raw
    /// L12 words, and the original symbol count. Level-start offsets are
    /// not stored; they are re-derived here by walking the levels forward
    /// and asking the flat-rank how many symbols survived each one (the
    /// zero-count of the previous level), mirroring the forward sweep
    /// [`Self::build`] performs at construction time.
    pub fn from_serialized(bv_words: Vec<u64>, bits_len: usize, l12: Vec<u64>, text_size: usize) -> Self {
        let bv = BitVector::from_words(bv_words, bits_len);
        let fr = FlatRank::from_raw(l12, bits_len);

        let mut level_starts = [0usize; HWM_LEVELS + 1];
        let mut remaining = text_size;
        let mut pos = 0usize;
        for level in 0..HWM_LEVELS {
            level_starts[level] = pos;
            let zeros = fr.rank0(&bv, pos + remaining) - fr.rank0(&bv, pos);
            pos += remaining;
            remaining = zeros as usize;
        }
        level_starts[HWM_LEVELS] = pos;
        debug_assert_eq!(pos, bits_len);

        let mut ones_before_level = [0u64; HWM_LEVELS];
        for level in 0..HWM_LEVELS {
            ones_before_level[level] = fr.rank1(&bv, level_starts[level]);
        }

        Self {
            bv,
            fr,
            level_starts,
            ones_before_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn random_symbols(n: usize, seed: u64) -> Vec<HuffmanSymbol> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| HuffmanSymbol::ALL[rng.gen_range(0..HuffmanSymbol::ALL.len())])
            .collect()
    }

    #[test]
    fn access_recovers_original_symbols() {
        let symbols = random_symbols(400, 3);
        let hwm = HuffmanWaveletMatrix::build(&symbols);
        for (i, &s) in symbols.iter().enumerate() {
            assert_eq!(hwm.access(i), s, "mismatch at {i}");
        }
    }

    #[test]
    fn rank_matches_linear_count() {
        let symbols = random_symbols(250, 9);
        let hwm = HuffmanWaveletMatrix::build(&symbols);
        for &sym in &HuffmanSymbol::ALL {
            let mut running = 0u64;
            for i in 0..=symbols.len() {
                assert_eq!(hwm.rank(i, sym), running, "{sym:?} at {i}");
                if i < symbols.len() && symbols[i] == sym {
                    running += 1;
                }
            }
        }
    }

    #[test]
    fn all_palette_last_is_handled_without_any_one_bit() {
        let symbols = vec![HuffmanSymbol::PaletteLast; 10];
        let hwm = HuffmanWaveletMatrix::build(&symbols);
        for i in 0..10 {
            assert_eq!(hwm.access(i), HuffmanSymbol::PaletteLast);
        }
        assert_eq!(hwm.rank(10, HuffmanSymbol::PaletteLast), 10);
    }

    #[test]
    fn level_lengths_are_non_increasing() {
        let symbols = random_symbols(500, 77);
        let hwm = HuffmanWaveletMatrix::build(&symbols);
        let lens: Vec<usize> = (0..HWM_LEVELS)
            .map(|l| hwm.level_starts[l + 1] - hwm.level_starts[l])
            .collect();
        for w in lens.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn from_serialized_matches_build() {
        let symbols = random_symbols(300, 123);
        let hwm = HuffmanWaveletMatrix::build(&symbols);
        let bits_len = hwm.bit_vector().len();
        let rebuilt = HuffmanWaveletMatrix::from_serialized(
            hwm.bit_vector().raw_words().to_vec(),
            bits_len,
            hwm.flat_rank().raw_l12().to_vec(),
            symbols.len(),
        );
        assert_eq!(rebuilt.level_starts, hwm.level_starts);
        for (i, &s) in symbols.iter().enumerate() {
            assert_eq!(rebuilt.access(i), s, "mismatch at {i}");
        }
    }
}
