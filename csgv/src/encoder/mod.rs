//! Brick encoder interface and the four concrete policies (C8).
//!
//! Grounded on `CSGVBrickEncoder.hpp`'s abstract base class: one shared
//! capability set, four concrete bodies. Rather than the original's virtual
//! dispatch, [`Encoder`] is a plain enum over the concrete encoder types,
//! each of which implements the [`BrickEncoder`] trait so call sites stay
//! uniform — no runtime inheritance chain.

pub mod huffman_wavelet_matrix;
pub mod nibble_random_access;
pub mod nibble_serial;
pub mod wavelet_matrix;

use crate::config::{Configuration, EncodingMode, OpMask};
use crate::error::{Error, Result};
use crate::sfc::Pos3;

/// Capability set shared by all three brick-encoder policies.
pub trait BrickEncoder {
    fn brick_side(&self) -> u32;

    fn lod_count(&self) -> usize {
        self.brick_side().trailing_zeros() as usize + 1
    }

    /// Encodes one brick, appending its words to `out` and returning how
    /// many words were written.
    fn encode(
        &self,
        volume: &[u32],
        volume_dim: Pos3,
        brick_origin: Pos3,
        out: &mut Vec<u32>,
    ) -> Result<usize>;

    /// Decodes LOD `inv_lod` (0 = coarsest) of one brick, returning its
    /// labels in Morton order (`width(inv_lod)^3` entries, `width(l) =
    /// 2^l`). `detail`, when `Some`, is the finest-LOD opcode nibbles moved
    /// out by [`Self::split_detail`]; it is consulted only when `inv_lod`
    /// is the finest level.
    fn decode_lod(&self, enc: &[u32], detail: Option<&[u32]>, inv_lod: usize) -> Result<Vec<u32>>;

    fn palette_size_header_index(&self) -> usize {
        self.lod_count()
    }

    /// Moves a brick's finest-LOD opcode nibbles out of `enc` into a
    /// second buffer, shrinking the base encoding in place. The shared
    /// nibble-packed header layout (per-LOD nibble offset, then palette
    /// size, then the packed opcode stream, then the reversed palette) is
    /// generic enough that this default applies to both nibble encoders;
    /// the wavelet-matrix ones are never routed here (rejected earlier by
    /// configuration).
    ///
    /// Returns `(shrunk_base, detail)`: `shrunk_base` keeps the header and
    /// palette intact but its final-LOD header entry is repurposed to mean
    /// "offset 0 within the detail buffer" rather than an offset into the
    /// (now absent) base opcode tail.
    fn split_detail(&self, enc: &[u32]) -> (Vec<u32>, Vec<u32>) {
        let lod_count = self.lod_count();
        let header_words = lod_count + 1;
        let finest_start_nibble = enc[lod_count - 1] as usize;
        let palette_len = enc[self.palette_size_header_index()] as usize;
        let end_nibble = (enc.len() - palette_len) * 8;

        let detail_nibble_count = end_nibble - finest_start_nibble;
        let mut detail = vec![0u32; crate::nibble::words_for_nibbles(detail_nibble_count)];
        for i in 0..detail_nibble_count {
            crate::nibble::write4(&mut detail, i, crate::nibble::read4(enc, finest_start_nibble + i));
        }

        let coarse_nibble_count = finest_start_nibble - header_words * 8;
        let kept_words = header_words + crate::nibble::words_for_nibbles(coarse_nibble_count);
        let mut shrunk = enc[..kept_words].to_vec();
        shrunk[lod_count - 1] = 0;
        shrunk.extend_from_slice(&enc[enc.len() - palette_len..]);

        (shrunk, detail)
    }

    /// Checks one brick's encoding against the structural invariants: a
    /// monotone header, a non-empty palette, a first opcode of
    /// PALETTE_ADV.
    fn verify(&self, enc: &[u32]) -> Result<()> {
        verify_common(enc, self.lod_count())
    }

    /// Tallies one brick's opcode-nibble histogram into `counters[0..16]`
    /// (all LODs, or all-but-finest when `detail_split` is set) and
    /// `counters[16..32]` (the finest LOD only, when `detail_split` is
    /// set). Only the nibble-packed serial encoder supports this — it is
    /// how `SingleTableVBL`/`DoubleTableVBL` build their frequency-rank
    /// remap tables ahead of a real encode pass.
    fn freq_profile(
        &self,
        _volume: &[u32],
        _volume_dim: Pos3,
        _brick_origin: Pos3,
        _counters: &mut [u64; 32],
        _detail_split: bool,
    ) -> Result<()> {
        Err(Error::ConfigError(
            "frequency profiling is only supported by the serial nibble encoder".into(),
        ))
    }
}

/// Checks the invariants common to every encoding mode: header
/// monotonicity, a non-empty palette, and a first opcode of PALETTE_ADV.
pub(crate) fn verify_common(enc: &[u32], lod_count: usize) -> Result<()> {
    if enc.len() <= lod_count {
        return Err(Error::InvariantViolated {
            brick_index: 0,
            message: "encoding too short to hold a header".into(),
        });
    }
    let header = &enc[0..=lod_count];
    // A finest-LOD offset of exactly 0 can only mean `split_detail` moved
    // that LOD's opcodes out: no real brick has data starting at nibble 0,
    // since the header itself occupies the first `(lod_count+1)*8` nibbles.
    // Skip the pair that would otherwise compare a real offset against that
    // repurposed marker.
    let finest_separated = lod_count >= 1 && header[lod_count - 1] == 0;
    let monotone_prefix = if finest_separated { lod_count - 1 } else { lod_count };
    for w in header[..monotone_prefix].windows(2) {
        if w[1] < w[0] {
            return Err(Error::InvariantViolated {
                brick_index: 0,
                message: format!("header not monotone: {} then {}", w[0], w[1]),
            });
        }
    }
    let palette_size = header[lod_count];
    if palette_size == 0 {
        return Err(Error::InvariantViolated {
            brick_index: 0,
            message: "palette is empty".into(),
        });
    }
    Ok(())
}

/// Encodes `d - 1` (`d >= 1`) into 3-bit-per-nibble continuation groups:
/// the high bit of each nibble is a continuation flag, the low 3 bits
/// carry the next base-8 digit (least significant first). Built the way
/// `write_varint` in `map/src/io.rs` builds a continuation-bit varint, one
/// nibble-equivalent chunk at a time.
pub(crate) fn encode_palette_delta(d: u32) -> Vec<u8> {
    debug_assert!(d >= 1);
    let mut value = d - 1;
    let mut nibbles = Vec::new();
    loop {
        let chunk = (value & 0x7) as u8;
        value >>= 3;
        let cont = value != 0;
        nibbles.push((if cont { 0x8 } else { 0 }) | chunk);
        if !cont {
            break;
        }
    }
    nibbles
}

/// Inverse of [`encode_palette_delta`]; `read` pulls the next nibble
/// value each call.
pub(crate) fn decode_palette_delta(mut read: impl FnMut() -> u8) -> u32 {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    loop {
        let nibble = read();
        value |= ((nibble & 0x7) as u32) << shift;
        shift += 3;
        if nibble & 0x8 == 0 {
            break;
        }
    }
    value + 1
}

/// Appends each 64-bit word of `words` to `out` as a little-endian pair of
/// `u32`s. Shared by the two wavelet-matrix-backed encoders, whose
/// `BitVector`/`FlatRank` substrates are 64-bit-word-native while the
/// brick encoding arena is a plain `u32` array.
pub(crate) fn push_u64_words(out: &mut Vec<u32>, words: &[u64]) {
    for &w in words {
        out.push((w & 0xffff_ffff) as u32);
        out.push((w >> 32) as u32);
    }
}

/// Inverse of [`push_u64_words`]: reads `count` 64-bit words starting at
/// `buf[start]` (i.e. `2*count` `u32` entries).
pub(crate) fn read_u64_words(buf: &[u32], start: usize, count: usize) -> Vec<u64> {
    (0..count)
        .map(|i| {
            let lo = buf[start + 2 * i] as u64;
            let hi = buf[start + 2 * i + 1] as u64;
            lo | (hi << 32)
        })
        .collect()
}

/// Builds the concrete encoder selected by `cfg.encoding_mode`.
pub fn build_encoder(cfg: &Configuration) -> Result<Encoder> {
    cfg.validate()?;
    Ok(match cfg.encoding_mode {
        EncodingMode::Nibble if cfg.random_access => {
            Encoder::NibbleRandomAccess(nibble_random_access::NibbleRandomAccessEncoder::new(
                cfg.brick_side,
                cfg.op_mask,
            ))
        }
        EncodingMode::Nibble => Encoder::NibbleSerial(nibble_serial::NibbleSerialEncoder::new(
            cfg.brick_side,
            cfg.op_mask,
        )),
        EncodingMode::SingleTableVBL => {
            Encoder::NibbleSerial(nibble_serial::NibbleSerialEncoder::with_frequencies(
                cfg.brick_side,
                cfg.op_mask,
                cfg.base_frequencies,
                None,
            ))
        }
        EncodingMode::DoubleTableVBL => {
            Encoder::NibbleSerial(nibble_serial::NibbleSerialEncoder::with_frequencies(
                cfg.brick_side,
                cfg.op_mask,
                cfg.base_frequencies,
                cfg.finest_frequencies,
            ))
        }
        EncodingMode::WaveletMatrix => Encoder::WaveletMatrix(
            wavelet_matrix::WaveletMatrixEncoder::new(cfg.brick_side, cfg.op_mask),
        ),
        EncodingMode::HuffmanWaveletMatrix => Encoder::HuffmanWaveletMatrix(
            huffman_wavelet_matrix::HuffmanWaveletMatrixEncoder::new(cfg.brick_side, cfg.op_mask),
        ),
    })
}

/// Tagged variant over the concrete encoder policies (see module docs).
pub enum Encoder {
    NibbleSerial(nibble_serial::NibbleSerialEncoder),
    NibbleRandomAccess(nibble_random_access::NibbleRandomAccessEncoder),
    WaveletMatrix(wavelet_matrix::WaveletMatrixEncoder),
    HuffmanWaveletMatrix(huffman_wavelet_matrix::HuffmanWaveletMatrixEncoder),
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            Encoder::NibbleSerial(e) => e.$method($($arg),*),
            Encoder::NibbleRandomAccess(e) => e.$method($($arg),*),
            Encoder::WaveletMatrix(e) => e.$method($($arg),*),
            Encoder::HuffmanWaveletMatrix(e) => e.$method($($arg),*),
        }
    };
}

impl Encoder {
    pub fn brick_side(&self) -> u32 {
        dispatch!(self.brick_side())
    }

    pub fn lod_count(&self) -> usize {
        dispatch!(self.lod_count())
    }

    pub fn encode(
        &self,
        volume: &[u32],
        volume_dim: Pos3,
        brick_origin: Pos3,
        out: &mut Vec<u32>,
    ) -> Result<usize> {
        dispatch!(self.encode(volume, volume_dim, brick_origin, out))
    }

    pub fn decode_lod(&self, enc: &[u32], detail: Option<&[u32]>, inv_lod: usize) -> Result<Vec<u32>> {
        dispatch!(self.decode_lod(enc, detail, inv_lod))
    }

    pub fn palette_size_header_index(&self) -> usize {
        dispatch!(self.palette_size_header_index())
    }

    /// Splits off a brick's finest-LOD opcodes; see
    /// [`BrickEncoder::split_detail`]. `ConfigError` for encoders that
    /// don't support it.
    pub fn split_detail(&self, enc: &[u32]) -> Result<(Vec<u32>, Vec<u32>)> {
        match self {
            Encoder::NibbleSerial(e) => Ok(e.split_detail(enc)),
            Encoder::NibbleRandomAccess(e) => Ok(e.split_detail(enc)),
            Encoder::WaveletMatrix(_) | Encoder::HuffmanWaveletMatrix(_) => Err(Error::ConfigError(
                "detail separation is only supported for nibble-packed encoding modes".into(),
            )),
        }
    }

    pub fn verify(&self, enc: &[u32]) -> Result<()> {
        dispatch!(self.verify(enc))
    }

    pub fn freq_profile(
        &self,
        volume: &[u32],
        volume_dim: Pos3,
        brick_origin: Pos3,
        counters: &mut [u64; 32],
        detail_split: bool,
    ) -> Result<()> {
        dispatch!(self.freq_profile(volume, volume_dim, brick_origin, counters, detail_split))
    }

    /// Random-access decode of a single voxel. Only meaningful for
    /// encoders built with `random_access: true`; nibble-serial encoders
    /// return `ConfigError`. `detail` is the finest-LOD buffer produced by
    /// [`Self::split_detail`], if the brick has been separated.
    pub fn random_access_decode_voxel(
        &self,
        enc: &[u32],
        detail: Option<&[u32]>,
        output_morton_i: usize,
        inv_lod: usize,
    ) -> Result<u32> {
        match self {
            Encoder::NibbleSerial(_) => Err(Error::ConfigError(
                "random-access decode is not available for the serial nibble encoder".into(),
            )),
            Encoder::NibbleRandomAccess(e) => {
                e.random_access_decode_voxel(enc, detail, output_morton_i, inv_lod)
            }
            Encoder::WaveletMatrix(e) => {
                e.random_access_decode_voxel(enc, output_morton_i, inv_lod)
            }
            Encoder::HuffmanWaveletMatrix(e) => {
                e.random_access_decode_voxel(enc, output_morton_i, inv_lod)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_delta_round_trips() {
        for d in [1u32, 2, 7, 8, 9, 63, 64, 65, 1000, 1 << 20] {
            let nibbles = encode_palette_delta(d);
            let mut iter = nibbles.into_iter();
            let decoded = decode_palette_delta(|| iter.next().unwrap());
            assert_eq!(decoded, d);
        }
    }
}
