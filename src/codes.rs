//! Code table for the CM11A-style power-line interface.
//!
//! Everything the wire dictionary defines lives here: the scrambled 4-bit
//! house/unit encoding, the function-code nibbles, the unsolicited poll
//! markers, and the handshake constants. The transaction layer consumes
//! this table read-only; no protocol logic belongs in this module.

use serde::{Deserialize, Serialize};

/// Fixed baud rate for this device family.
pub const BAUD_RATE: u32 = 4_800;

/// Maximum dim amount carried in a function header (bits 3..7).
pub const MAX_DIMS: u8 = 22;

/// Header byte for an address-selection frame.
pub const HEADER_ADDRESS: u8 = 0x04;

/// Header byte for a function-selection frame (dims are OR-ed into bits 3..7).
pub const HEADER_FUNCTION: u8 = 0x06;

/// Host acknowledgement after a correct checksum echo.
pub const ACK_OK: u8 = 0x00;

/// Interface-ready byte, ends every handshake.
pub const READY: u8 = 0x55;

/// Host reply to a data-ready poll; asks for the buffered events.
pub const POLL_ACK: u8 = 0xC3;

/// Opcode requesting the interface's 14-byte status buffer.
pub const STATUS_REQUEST: u8 = 0x8B;

/// Length of the status buffer the interface returns.
pub const STATUS_REPLY_LEN: usize = 14;

/// Header byte of the clock-set frame sent after a power-fail poll.
pub const CLOCK_HEADER: u8 = 0x9B;

/// Largest event buffer the interface reports (length byte bound).
pub const MAX_POLL_BUFFER: u8 = 9;

/// Unsolicited poll markers the interface asserts on the wire.
pub mod marker {
    /// The interface has buffered unit events to report.
    pub const DATA_READY: u8 = 0x5A;
    /// The interface lost its clock (power failure).
    pub const POWER_FAIL: u8 = 0xA5;
    /// The interface needs an address for programmed events.
    pub const EEPROM_ADDRESS: u8 = 0x5B;
}

/// Check whether a leading byte is one of the unsolicited poll markers.
#[inline]
pub fn is_poll_marker(byte: u8) -> bool {
    matches!(
        byte,
        marker::DATA_READY | marker::POWER_FAIL | marker::EEPROM_ADDRESS
    )
}

/// The shared 4-bit encoding table. House A and unit 1 map to index 0,
/// house P and unit 16 to index 15. The scrambling is historical; the
/// table is a bijection on 0..16.
const CODE_TABLE: [u8; 16] = [
    0x6, 0xE, 0x2, 0xA, 0x1, 0x9, 0x5, 0xD, 0x7, 0xF, 0x3, 0xB, 0x0, 0x8, 0x4, 0xC,
];

/// House code A..P.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum House {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
}

impl House {
    /// All house codes in alphabetical order.
    pub const ALL: [House; 16] = [
        House::A,
        House::B,
        House::C,
        House::D,
        House::E,
        House::F,
        House::G,
        House::H,
        House::I,
        House::J,
        House::K,
        House::L,
        House::M,
        House::N,
        House::O,
        House::P,
    ];

    /// The 4-bit wire encoding of this house code.
    #[inline]
    pub fn code(self) -> u8 {
        CODE_TABLE[self as usize]
    }

    /// Decode a 4-bit wire value back into a house code.
    ///
    /// Returns `None` if the value does not fit in a nibble.
    pub fn from_code(code: u8) -> Option<House> {
        CODE_TABLE
            .iter()
            .position(|&c| c == code)
            .map(|i| House::ALL[i])
    }
}

/// Unit code 1..=16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit(u8);

impl Unit {
    /// Create a new unit, checking the 1..=16 range.
    pub fn new(number: u8) -> Option<Unit> {
        if (1..=16).contains(&number) {
            Some(Unit(number))
        } else {
            None
        }
    }

    /// The unit number (1..=16).
    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }

    /// The 4-bit wire encoding of this unit.
    #[inline]
    pub fn code(self) -> u8 {
        CODE_TABLE[(self.0 - 1) as usize]
    }

    /// Decode a 4-bit wire value back into a unit.
    pub fn from_code(code: u8) -> Option<Unit> {
        CODE_TABLE
            .iter()
            .position(|&c| c == code)
            .map(|i| Unit(i as u8 + 1))
    }
}

/// Function codes, low nibble of a function frame's code byte.
///
/// The full 16-entry table is enumerated even though only a subset has
/// caller-facing entry points; the poll decoder can report any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    AllUnitsOff = 0x0,
    AllLightsOn = 0x1,
    On = 0x2,
    Off = 0x3,
    Dim = 0x4,
    Bright = 0x5,
    AllLightsOff = 0x6,
    ExtendedCode = 0x7,
    HailRequest = 0x8,
    HailAck = 0x9,
    PresetDim1 = 0xA,
    PresetDim2 = 0xB,
    ExtendedData = 0xC,
    StatusOn = 0xD,
    StatusOff = 0xE,
    StatusRequest = 0xF,
}

impl Function {
    /// The 4-bit wire encoding of this function.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a 4-bit wire value back into a function code.
    pub fn from_code(code: u8) -> Option<Function> {
        use Function::*;
        Some(match code {
            0x0 => AllUnitsOff,
            0x1 => AllLightsOn,
            0x2 => On,
            0x3 => Off,
            0x4 => Dim,
            0x5 => Bright,
            0x6 => AllLightsOff,
            0x7 => ExtendedCode,
            0x8 => HailRequest,
            0x9 => HailAck,
            0xA => PresetDim1,
            0xB => PresetDim2,
            0xC => ExtendedData,
            0xD => StatusOn,
            0xE => StatusOff,
            0xF => StatusRequest,
            _ => return None,
        })
    }

    /// Whether a dim amount byte follows this function in a poll buffer.
    #[inline]
    pub fn has_dim_amount(self) -> bool {
        matches!(self, Function::Dim | Function::Bright)
    }
}
