//! The shared 6(+1)-symbol opcode alphabet and its two on-the-wire shapes: a plain 4-bit nibble (C5's 16-symbol alphabet
//! is just "nibble value", stop bit included) and a fixed inverted
//! canonical Huffman code over the 6 navigation/palette symbols used by
//! the Huffman wavelet matrix (C6).
//!
//! Grounded on `CSGVBrickEncoder.hpp`'s op-code constants and
//! `HuffmanWaveletMatrix.hpp`'s `SYMBOL2CHC` table.

use crate::config::OpMask;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Parent = 0,
    NeighborX = 1,
    NeighborY = 2,
    NeighborZ = 3,
    PaletteD = 4,
    PaletteAdv = 5,
    PaletteLast = 6,
}

/// OR-ed into a nibble opcode to mark "this subtree is constant, stop
/// descending further in finer LODs".
pub const STOP_BIT: u8 = 8;

impl Opcode {
    pub const ALL: [Opcode; 7] = [
        Opcode::Parent,
        Opcode::NeighborX,
        Opcode::NeighborY,
        Opcode::NeighborZ,
        Opcode::PaletteD,
        Opcode::PaletteAdv,
        Opcode::PaletteLast,
    ];

    #[inline]
    pub fn as_nibble(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_nibble(n: u8) -> Option<Self> {
        match n & !STOP_BIT {
            0 => Some(Opcode::Parent),
            1 => Some(Opcode::NeighborX),
            2 => Some(Opcode::NeighborY),
            3 => Some(Opcode::NeighborZ),
            4 => Some(Opcode::PaletteD),
            5 => Some(Opcode::PaletteAdv),
            6 => Some(Opcode::PaletteLast),
            _ => None,
        }
    }

    #[inline]
    pub fn mask_bit(self) -> OpMask {
        match self {
            Opcode::Parent => OpMask::PARENT,
            Opcode::NeighborX => OpMask::NEIGHBOR_X,
            Opcode::NeighborY => OpMask::NEIGHBOR_Y,
            Opcode::NeighborZ => OpMask::NEIGHBOR_Z,
            Opcode::PaletteD => OpMask::PALETTE_D,
            Opcode::PaletteAdv => OpMask::empty(), // always allowed, the fallback opcode
            Opcode::PaletteLast => OpMask::PALETTE_LAST,
        }
    }

    #[inline]
    pub fn is_navigation(self) -> bool {
        matches!(
            self,
            Opcode::Parent | Opcode::NeighborX | Opcode::NeighborY | Opcode::NeighborZ
        )
    }
}

/// The 6 symbols representable by the Huffman wavelet matrix. `PaletteD`
/// has no code in this alphabet: the legacy/delta palette opcode is only
/// ever emitted by nibble-mode encoders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HuffmanSymbol {
    Parent,
    NeighborX,
    NeighborY,
    NeighborZ,
    PaletteAdv,
    PaletteLast,
}

/// A fixed inverted canonical Huffman code: every codeword is all zero
/// bits except possibly its last bit, which is one unless the codeword is
/// `PaletteLast`'s code (all zero, length `HWM_MAX_CODE_LENGTH`). Any
/// 1-bit seen while reading therefore terminates the codeword.
#[derive(Clone, Copy, Debug)]
pub struct HuffmanCode {
    pub length: u8,
    pub terminates_with_one: bool,
}

impl HuffmanCode {
    /// Bit `i` (0 = first bit read) of this codeword.
    #[inline]
    pub fn bit(self, i: u8) -> bool {
        debug_assert!(i < self.length);
        i + 1 == self.length && self.terminates_with_one
    }
}

pub const HWM_MAX_CODE_LENGTH: u8 = 5;

/// `symbol -> code` table, grounded verbatim on `SYMBOL2CHC`:
/// `{1,1} {2,1} {3,1} {4,1} {5,1} {5,0}`.
pub const SYMBOL_TO_CODE: [HuffmanCode; 6] = [
    HuffmanCode { length: 1, terminates_with_one: true },  // Parent
    HuffmanCode { length: 2, terminates_with_one: true },  // NeighborX
    HuffmanCode { length: 3, terminates_with_one: true },  // NeighborY
    HuffmanCode { length: 4, terminates_with_one: true },  // NeighborZ
    HuffmanCode { length: 5, terminates_with_one: true },  // PaletteAdv
    HuffmanCode { length: 5, terminates_with_one: false }, // PaletteLast
];

impl HuffmanSymbol {
    pub const ALL: [HuffmanSymbol; 6] = [
        HuffmanSymbol::Parent,
        HuffmanSymbol::NeighborX,
        HuffmanSymbol::NeighborY,
        HuffmanSymbol::NeighborZ,
        HuffmanSymbol::PaletteAdv,
        HuffmanSymbol::PaletteLast,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn code(self) -> HuffmanCode {
        SYMBOL_TO_CODE[self.index()]
    }

    pub fn from_opcode(op: Opcode) -> Option<Self> {
        match op {
            Opcode::Parent => Some(HuffmanSymbol::Parent),
            Opcode::NeighborX => Some(HuffmanSymbol::NeighborX),
            Opcode::NeighborY => Some(HuffmanSymbol::NeighborY),
            Opcode::NeighborZ => Some(HuffmanSymbol::NeighborZ),
            Opcode::PaletteAdv => Some(HuffmanSymbol::PaletteAdv),
            Opcode::PaletteLast => Some(HuffmanSymbol::PaletteLast),
            Opcode::PaletteD => None,
        }
    }

    pub fn to_opcode(self) -> Opcode {
        match self {
            HuffmanSymbol::Parent => Opcode::Parent,
            HuffmanSymbol::NeighborX => Opcode::NeighborX,
            HuffmanSymbol::NeighborY => Opcode::NeighborY,
            HuffmanSymbol::NeighborZ => Opcode::NeighborZ,
            HuffmanSymbol::PaletteAdv => Opcode::PaletteAdv,
            HuffmanSymbol::PaletteLast => Opcode::PaletteLast,
        }
    }
}
