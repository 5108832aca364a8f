//! Codec configuration: brick geometry, encoding mode, operation mask.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flatrank::{BITS1, BITS2, P, W2};
use crate::wavelet_matrix::WM_LEVELS;
use crate::huffman_wavelet_matrix::HWM_LEVELS;

/// Which concrete brick codec produces/consumes the opcode stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingMode {
    /// Plain 4-bit nibble stream, STOP_BIT inline, PALETTE_D allowed.
    Nibble,
    /// Nibble stream with a single shared frequency table driving a
    /// variable-bit-length remap (frequency profiling, no random access).
    SingleTableVBL,
    /// Like `SingleTableVBL` but with distinct tables for the base and
    /// finest-LOD opcode streams.
    DoubleTableVBL,
    /// Fixed 4-level wavelet matrix over a 16-symbol alphabet.
    WaveletMatrix,
    /// Huffman-shaped wavelet matrix over the 6-symbol opcode alphabet.
    HuffmanWaveletMatrix,
}

bitflags::bitflags! {
    /// Which opcodes the encoder is permitted to emit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct OpMask: u16 {
        const PARENT          = 1 << 0;
        const NEIGHBOR_X       = 1 << 1;
        const NEIGHBOR_Y       = 1 << 2;
        const NEIGHBOR_Z       = 1 << 3;
        const PALETTE_LAST     = 1 << 4;
        const PALETTE_D        = 1 << 5;
        const PALETTE_D_LEGACY = 1 << 6;
        const STOP_BIT         = 1 << 7;

        const ALL = Self::PARENT.bits()
            | Self::NEIGHBOR_X.bits()
            | Self::NEIGHBOR_Y.bits()
            | Self::NEIGHBOR_Z.bits()
            | Self::PALETTE_LAST.bits()
            | Self::PALETTE_D.bits()
            | Self::PALETTE_D_LEGACY.bits()
            | Self::STOP_BIT.bits();
    }
}

impl Default for OpMask {
    fn default() -> Self {
        // Legacy delta is opt-in only (see DESIGN.md, open question #2).
        Self::ALL & !Self::PALETTE_D_LEGACY
    }
}

/// Top-level codec configuration. Plain struct, `Default` impl, validated
/// explicitly via `validate()` rather than at construction — mirrors the
/// plain-struct-plus-separate-check style of configuration objects
/// elsewhere in this codebase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    /// Side length of a brick in voxels. Must be a power of two in
    /// `{8, 16, 32, 64, 128}`.
    pub brick_side: u32,
    pub encoding_mode: EncodingMode,
    pub op_mask: OpMask,
    /// When set, the encoder produces a constant-stride opcode layout
    /// enabling O(1)/O(levels) positional lookup instead of a purely
    /// serial stream.
    pub random_access: bool,
    /// 16-entry frequency tables for `SingleTableVBL`/`DoubleTableVBL`.
    /// `base` covers all but the finest LOD; `finest` (when present)
    /// covers the finest LOD only (`DoubleTableVBL`).
    pub base_frequencies: Option<[u64; 16]>,
    pub finest_frequencies: Option<[u64; 16]>,
    /// Soft cap, in bytes, on one split arena's size.
    pub target_split_bytes: u64,
    /// Number of worker threads for data-parallel sections; 0 means "use
    /// `std::thread::available_parallelism()`".
    pub worker_count: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            brick_side: 32,
            encoding_mode: EncodingMode::Nibble,
            op_mask: OpMask::default(),
            random_access: false,
            base_frequencies: None,
            finest_frequencies: None,
            target_split_bytes: 2 * 1024 * 1024 * 1024,
            worker_count: 0,
        }
    }
}

impl Configuration {
    /// Number of LODs a brick of `brick_side` has: `log2(brick_side) + 1`.
    pub fn lod_count(&self) -> u32 {
        self.brick_side.trailing_zeros() + 1
    }

    pub fn validate(&self) -> Result<()> {
        if !self.brick_side.is_power_of_two()
            || !(8..=128).contains(&self.brick_side)
        {
            return Err(Error::ConfigError(format!(
                "brick_side must be a power of two in 8..=128, got {}",
                self.brick_side
            )));
        }

        if self.random_access
            && self.encoding_mode == EncodingMode::Nibble
            && self.op_mask.intersects(OpMask::PALETTE_D | OpMask::PALETTE_D_LEGACY)
        {
            return Err(Error::ConfigError(
                "PALETTE_D is incompatible with random access in the nibble encoder \
                 (it breaks the constant-stride opcode layout)"
                    .into(),
            ));
        }

        if self.random_access
            && !matches!(
                self.encoding_mode,
                EncodingMode::Nibble
                    | EncodingMode::WaveletMatrix
                    | EncodingMode::HuffmanWaveletMatrix
            )
        {
            return Err(Error::ConfigError(format!(
                "random_access is not supported for encoding mode {:?}",
                self.encoding_mode
            )));
        }

        if matches!(
            self.encoding_mode,
            EncodingMode::SingleTableVBL | EncodingMode::DoubleTableVBL
        ) && self.base_frequencies.is_none()
        {
            return Err(Error::ConfigError(
                "SingleTableVBL/DoubleTableVBL require base_frequencies".into(),
            ));
        }

        if self.encoding_mode == EncodingMode::DoubleTableVBL && self.finest_frequencies.is_none() {
            return Err(Error::ConfigError(
                "DoubleTableVBL requires finest_frequencies in addition to base_frequencies".into(),
            ));
        }

        Ok(())
    }

    /// Fingerprint of the compile-time rank-table and wavelet-matrix
    /// constants. Two builds with different fingerprints must not share
    /// compressed-volume artifacts (see `Error::IncompatibleArtifact`).
    pub fn rank_table_fingerprint(&self) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325; // FNV-1a offset basis
        for word in [
            BITS1 as u64,
            BITS2 as u64,
            W2 as u64,
            P as u64,
            WM_LEVELS as u64,
            HWM_LEVELS as u64,
        ] {
            h ^= word;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_brick_side() {
        let mut cfg = Configuration::default();
        cfg.brick_side = 24;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_palette_d_with_nibble_random_access() {
        let mut cfg = Configuration::default();
        cfg.random_access = true;
        cfg.op_mask = OpMask::ALL;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_random_access_with_vbl_modes() {
        let mut cfg = Configuration::default();
        cfg.random_access = true;
        cfg.encoding_mode = EncodingMode::SingleTableVBL;
        cfg.base_frequencies = Some([1; 16]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn double_table_vbl_requires_finest_frequencies() {
        let mut cfg = Configuration::default();
        cfg.encoding_mode = EncodingMode::DoubleTableVBL;
        cfg.base_frequencies = Some([1; 16]);
        assert!(cfg.validate().is_err());
        cfg.finest_frequencies = Some([1; 16]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn lod_count_matches_log2_plus_one() {
        let mut cfg = Configuration::default();
        cfg.brick_side = 64;
        assert_eq!(cfg.lod_count(), 7);
    }

    #[test]
    fn fingerprint_is_stable() {
        let cfg = Configuration::default();
        assert_eq!(cfg.rank_table_fingerprint(), cfg.rank_table_fingerprint());
    }
}
