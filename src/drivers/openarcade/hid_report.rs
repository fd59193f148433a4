//! Wire layouts exchanged with OpenArcade controller peripherals.
use packed_struct::prelude::*;
use serde::{Serialize, Serializer};

/// Size of the state notification in bytes
pub const STATE_REPORT_SIZE: usize = 4;

/// Size of the body of a control descriptor record
pub const CONTROL_RECORD_SIZE: usize = 7;

/// Record types found in the capability descriptor TLV stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    ProtocolVersion = 0x01,
    ReportFormat = 0x02,
    ReportBytes = 0x03,
    ControlCount = 0x04,
    UniqueId = 0x05,
    FirmwareVersion = 0x06,
    Control = 0x10,
    Label = 0x11,
}

impl RecordType {
    pub fn to_u8(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for RecordType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::ProtocolVersion),
            0x02 => Ok(Self::ReportFormat),
            0x03 => Ok(Self::ReportBytes),
            0x04 => Ok(Self::ControlCount),
            0x05 => Ok(Self::UniqueId),
            0x06 => Ok(Self::FirmwareVersion),
            0x10 => Ok(Self::Control),
            0x11 => Ok(Self::Label),
            _ => Err(value),
        }
    }
}

/// How a control's value is laid out in the state report
#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ReportFormat {
    #[default]
    Bitfield = 0,
    Packed = 1,
    Axis = 2,
}

impl Serialize for ReportFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.to_primitive())
    }
}

/// Kind of physical control
#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ControlType {
    Button = 1,
    Axis = 2,
    Hat = 3,
}

impl Serialize for ControlType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.to_primitive())
    }
}

// Control descriptor record body
//
// id | type | flags | format | p1 | p2 | p3
// 01   01     00      00       00   01   00   -> button 1 at bit 0, width 1
//
// For bitfield controls p1/p2 are the bit index and bit width. All other
// formats use p1/p2/p3 as byte offset, bit offset and bit width.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "7")]
pub struct ControlRecord {
    // BYTE 0
    #[packed_field(bytes = "0")]
    pub id: u8,
    // BYTE 1
    #[packed_field(bytes = "1", ty = "enum")]
    pub control_type: ControlType,
    // BYTE 2
    #[packed_field(bytes = "2")]
    pub flags: u8,
    // BYTE 3
    #[packed_field(bytes = "3", ty = "enum")]
    pub format: ReportFormat,
    // BYTE 4-6
    #[packed_field(bytes = "4")]
    pub p1: u8,
    #[packed_field(bytes = "5")]
    pub p2: u8,
    #[packed_field(bytes = "6")]
    pub p3: u8,
}

impl Default for ControlRecord {
    fn default() -> Self {
        Self {
            id: Default::default(),
            control_type: ControlType::Button,
            flags: Default::default(),
            format: ReportFormat::Bitfield,
            p1: Default::default(),
            p2: 1,
            p3: Default::default(),
        }
    }
}
