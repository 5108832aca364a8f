//! Two-level rank acceleration structure over a [`BitVector`] (C4).
//!
//! Grounded on the `FlatRank` class in `BitVector.hpp`: one 64-bit "L12"
//! word per L1 block packs the L1 block's running one-count in its low
//! `BITS1` bits, followed by `P` stored L2 sub-block counts of `BITS2`
//! bits each (the first L2 sub-block's count is implicitly zero and not
//! stored). `(BITS1=20, BITS2=11, W2=4, P=4)` is the canonical choice: an L1
//! block covers `(P+1)*W2*64 = 1280` bits, and a single L12 word addresses
//! up to `(1<<BITS1) + (P+1)*(1<<BITS2)` bits of running count — sized for a
//! 64³ brick's opcode stream, not for arbitrarily large standalone texts.

use crate::bitvector::BitVector;

pub const BITS1: u32 = 20;
pub const BITS2: u32 = 11;
pub const W2: usize = 4;
pub const P: usize = 4;

const L2_BIT_SIZE: usize = W2 * 64;
const L1_BIT_SIZE: usize = (P + 1) * L2_BIT_SIZE;
const L1_WORD_SIZE: usize = (P + 1) * W2;

const L1_MASK: u64 = (1u64 << BITS1) - 1;
const L2_MASK: u64 = (1u64 << BITS2) - 1;

#[derive(Clone, Debug)]
pub struct FlatRank {
    /// One L12 word per L1 block, plus one trailing dummy entry so that
    /// `rank1(text_size)` (one-past-the-end) is always a valid query.
    l12: Vec<u64>,
    n_bits: usize,
}

#[inline]
fn rank1_word(word: u64, bits: usize) -> u32 {
    if bits == 0 {
        0
    } else if bits >= 64 {
        word.count_ones()
    } else {
        (word & ((1u64 << bits) - 1)).count_ones()
    }
}

impl FlatRank {
    /// Builds the rank structure for `bv`. `bv` must not change
    /// afterwards — the structure caches aggregate counts derived from
    /// its current contents.
    pub fn build(bv: &BitVector) -> Self {
        let n_bits = bv.len();
        let words = bv.raw_words();
        let num_l1_blocks = (n_bits + L1_BIT_SIZE - 1) / L1_BIT_SIZE;
        let mut l12 = vec![0u64; num_l1_blocks + 1];
        let mut total_ones: u64 = 0;

        for block in 0..num_l1_blocks {
            let l1_count = total_ones;
            let mut l2_running = [0u32; P];
            let mut running = 0u32;
            let word_start = block * L1_WORD_SIZE;
            for l2 in 0..=P {
                if l2 > 0 {
                    l2_running[l2 - 1] = running;
                }
                for w in 0..W2 {
                    let idx = word_start + l2 * W2 + w;
                    running += words.get(idx).copied().unwrap_or(0).count_ones();
                }
            }
            total_ones += running as u64;

            let mut packed = l1_count & L1_MASK;
            for (j, &count) in l2_running.iter().enumerate() {
                packed |= (count as u64 & L2_MASK) << (BITS1 + j as u32 * BITS2);
            }
            l12[block] = packed;
        }
        l12[num_l1_blocks] = total_ones & L1_MASK;

        Self { l12, n_bits }
    }

    pub fn len(&self) -> usize {
        self.n_bits
    }

    /// Number of ones in `bv[0..i)`. `i` may equal `bv.len()`.
    pub fn rank1(&self, bv: &BitVector, i: usize) -> u64 {
        debug_assert!(i <= self.n_bits);
        if i == 0 {
            return 0;
        }
        let block = (i - 1) / L1_BIT_SIZE;
        let packed = self.l12[block];
        let l1 = packed & L1_MASK;

        let within_block = i - block * L1_BIT_SIZE;
        let l2_block = (within_block - 1) / L2_BIT_SIZE;
        let l2 = if l2_block == 0 {
            0
        } else {
            (packed >> (BITS1 + (l2_block - 1) as u32 * BITS2)) & L2_MASK
        };

        let words = bv.raw_words();
        let word_start = block * L1_WORD_SIZE + l2_block * W2;
        let bit_in_l2 = within_block - l2_block * L2_BIT_SIZE;
        let whole_words = bit_in_l2 / 64;
        let rem_bits = bit_in_l2 % 64;

        let mut count = l1 + l2;
        for w in 0..whole_words {
            count += words.get(word_start + w).copied().unwrap_or(0).count_ones() as u64;
        }
        if rem_bits > 0 {
            let word = words.get(word_start + whole_words).copied().unwrap_or(0);
            count += rank1_word(word, rem_bits) as u64;
        }
        count
    }

    /// Number of zeros in `bv[0..i)`.
    pub fn rank0(&self, bv: &BitVector, i: usize) -> u64 {
        i as u64 - self.rank1(bv, i)
    }

    /// Size, in bytes, of the L12 array alone (the structure's overhead
    /// over the raw bit vector).
    pub fn overhead_bytes(&self) -> usize {
        self.l12.len() * std::mem::size_of::<u64>()
    }

    /// Largest bit-vector length a single L1 block's L12 word can
    /// faithfully describe before the running one-count could overflow
    /// `BITS1` bits within that block — `(1<<BITS1) + (P+1)*(1<<BITS2)`.
    pub fn maximum_bit_vector_size() -> u64 {
        (1u64 << BITS1) + (P as u64 + 1) * (1u64 << BITS2)
    }

    pub fn raw_l12(&self) -> &[u64] {
        &self.l12
    }

    /// Reconstructs a flat-rank structure from its previously serialized
    /// L12 words and the original bit vector's length, without re-deriving
    /// them from a bit vector. Used when reading a brick encoding back:
    /// the L12 words are stored verbatim in the header/body, so rebuilding
    /// them via [`Self::build`] would be redundant work.
    pub fn from_raw(l12: Vec<u64>, n_bits: usize) -> Self {
        Self { l12, n_bits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng};
    use rand::rngs::StdRng;

    fn linear_rank1(bv: &BitVector, i: usize) -> u64 {
        (0..i).filter(|&j| bv.access(j)).count() as u64
    }

    #[test]
    fn rank_matches_linear_scan_small() {
        let mut bv = BitVector::new(0);
        for k in 0..500usize {
            bv.push_back(k % 7 == 0 || k % 5 == 0);
        }
        let fr = FlatRank::build(&bv);
        for i in 0..=bv.len() {
            assert_eq!(fr.rank1(&bv, i), linear_rank1(&bv, i), "mismatch at {i}");
            assert_eq!(fr.rank0(&bv, i) + fr.rank1(&bv, i), i as u64);
        }
    }

    #[test]
    fn rank_matches_linear_scan_crossing_l1_boundary() {
        let n = L1_BIT_SIZE * 3 + 17;
        let mut rng = StdRng::seed_from_u64(42);
        let mut bv = BitVector::new(0);
        for _ in 0..n {
            bv.push_back(rng.next_u32() & 1 == 0);
        }
        let fr = FlatRank::build(&bv);
        for i in (0..=n).step_by(31) {
            assert_eq!(fr.rank1(&bv, i), linear_rank1(&bv, i), "mismatch at {i}");
        }
        assert_eq!(fr.rank1(&bv, n), linear_rank1(&bv, n));
    }

    #[test]
    fn all_zero_vector_has_zero_rank() {
        let bv = BitVector::new(1000);
        let fr = FlatRank::build(&bv);
        assert_eq!(fr.rank1(&bv, 1000), 0);
        assert_eq!(fr.rank0(&bv, 1000), 1000);
    }
}
