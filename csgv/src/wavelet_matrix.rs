//! Fixed 4-level wavelet matrix over a 16-symbol alphabet (C5).
//!
//! Grounded on `WaveletMatrix.hpp`/`.cpp` and `prefix_counting.cpp`: the
//! matrix is built level by level, most-significant bit first, stably
//! partitioning the (conceptually reordered) text into a "zeros" run
//! followed by an "ones" run at every level — the defining property that
//! lets `access`/`rank` descend in O(levels) using only a flat-rank over
//! the concatenated per-level bit vectors. This module performs that
//! partitioning directly (rather than the original's histogram-folding
//! borders-array optimization) for the same asymptotic behavior at brick
//! scale and an easier-to-audit implementation; `zeros_in_level` and
//! `ones_before_level` are then read back off the built flat-rank exactly
//! as the original derives them (`rank0`/`rank1` at level boundaries).

use crate::bitvector::BitVector;
use crate::flatrank::FlatRank;

pub const WM_LEVELS: usize = 4;
pub const WM_ALPHABET_SIZE: u8 = 16;

#[derive(Clone, Debug)]
pub struct WaveletMatrix {
    bv: BitVector,
    fr: FlatRank,
    text_size: usize,
    zeros_in_level: [u64; WM_LEVELS],
    ones_before_level: [u64; WM_LEVELS],
}

impl WaveletMatrix {
    /// Builds a wavelet matrix over `text`, a sequence of 4-bit symbols
    /// (values `0..16`).
    pub fn build(text: &[u8]) -> Self {
        debug_assert!(text.iter().all(|&s| s < WM_ALPHABET_SIZE));
        let n = text.len();
        let mut bv = BitVector::new(WM_LEVELS * n);
        let mut current: Vec<u8> = text.to_vec();

        for level in 0..WM_LEVELS {
            let bit_pos = WM_LEVELS - 1 - level;
            for (i, &sym) in current.iter().enumerate() {
                let bit = (sym >> bit_pos) & 1 != 0;
                bv.set(level * n + i, bit);
            }
            if level + 1 < WM_LEVELS {
                let mut next = Vec::with_capacity(n);
                next.extend(current.iter().filter(|&&s| (s >> bit_pos) & 1 == 0));
                next.extend(current.iter().filter(|&&s| (s >> bit_pos) & 1 == 1));
                current = next;
            }
        }

        Self::from_raw(bv, n)
    }

    /// Reconstructs a wavelet matrix from a previously built bit vector
    /// (e.g. read back from a brick encoding) plus the original text
    /// length. `ones_before_level`/`zeros_in_level` are re-derived from the
    /// bit vector's own flat-rank rather than stored, since every level
    /// here spans exactly `text_size` bits (see module docs).
    pub fn from_raw(bv: BitVector, text_size: usize) -> Self {
        let n = text_size;
        let fr = FlatRank::build(&bv);
        let mut zeros_in_level = [0u64; WM_LEVELS];
        let mut ones_before_level = [0u64; WM_LEVELS];
        let mut prev_zeros = 0u64;
        for level in 0..WM_LEVELS {
            let zeros_up_to_here = fr.rank0(&bv, (level + 1) * n);
            zeros_in_level[level] = zeros_up_to_here - prev_zeros;
            prev_zeros = zeros_up_to_here;
            ones_before_level[level] = fr.rank1(&bv, level * n);
        }

        Self {
            bv,
            fr,
            text_size: n,
            zeros_in_level,
            ones_before_level,
        }
    }

    /// Reconstructs a wavelet matrix from serialized parts: the bit
    /// vector's raw words, its flat-rank's raw L12 words, and the text
    /// size. Skips re-deriving the flat-rank from scratch.
    pub fn from_serialized(bv_words: Vec<u64>, l12: Vec<u64>, text_size: usize) -> Self {
        let n_bits = WM_LEVELS * text_size;
        let bv = BitVector::from_words(bv_words, n_bits);
        let fr = FlatRank::from_raw(l12, n_bits);
        let mut zeros_in_level = [0u64; WM_LEVELS];
        let mut ones_before_level = [0u64; WM_LEVELS];
        let mut prev_zeros = 0u64;
        for level in 0..WM_LEVELS {
            let zeros_up_to_here = fr.rank0(&bv, (level + 1) * text_size);
            zeros_in_level[level] = zeros_up_to_here - prev_zeros;
            prev_zeros = zeros_up_to_here;
            ones_before_level[level] = fr.rank1(&bv, level * text_size);
        }
        Self {
            bv,
            fr,
            text_size,
            zeros_in_level,
            ones_before_level,
        }
    }

    pub fn text_size(&self) -> usize {
        self.text_size
    }

    pub fn levels(&self) -> usize {
        WM_LEVELS
    }

    pub fn zeros_in_level(&self, level: usize) -> u64 {
        self.zeros_in_level[level]
    }

    pub fn ones_before_level(&self, level: usize) -> u64 {
        self.ones_before_level[level]
    }

    pub fn bit_vector(&self) -> &BitVector {
        &self.bv
    }

    pub fn flat_rank(&self) -> &FlatRank {
        &self.fr
    }

    /// Decodes the symbol at text position `i`.
    pub fn access(&self, i: usize) -> u8 {
        debug_assert!(i < self.text_size);
        let mut pos = i;
        let mut symbol = 0u8;
        for level in 0..WM_LEVELS {
            let abs = level * self.text_size + pos;
            let bit = self.bv.access(abs);
            symbol = (symbol << 1) | bit as u8;
            let ones_before_pos = self.fr.rank1(&self.bv, abs) - self.ones_before_level[level];
            pos = if bit {
                (self.zeros_in_level[level] + ones_before_pos) as usize
            } else {
                pos - ones_before_pos as usize
            };
        }
        symbol
    }

    /// Number of occurrences of `symbol` in `text[0..i)`.
    pub fn rank(&self, i: usize, symbol: u8) -> u64 {
        debug_assert!(symbol < WM_ALPHABET_SIZE);
        debug_assert!(i <= self.text_size);
        let mut pos = i;
        for level in 0..WM_LEVELS {
            let bit_pos = WM_LEVELS - 1 - level;
            let bit = (symbol >> bit_pos) & 1 != 0;
            let abs = level * self.text_size + pos;
            let level_rank = self.fr.rank1(&self.bv, abs) - self.ones_before_level[level];
            pos = if bit {
                (self.zeros_in_level[level] + level_rank) as usize
            } else {
                pos - level_rank as usize
            };
        }
        pos as u64
    }

    pub fn byte_size(&self) -> usize {
        self.bv.raw_words().len() * 8 + self.fr.overhead_bytes()
    }
}
