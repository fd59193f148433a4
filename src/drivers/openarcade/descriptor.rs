//! Capability descriptor codec.
//!
//! Peripherals describe their controls with a stream of `(type, length, value)`
//! records. Decoding is lenient: malformed records are skipped and a record
//! running past the end of the buffer stops the walk, keeping everything
//! decoded up to that point.
use packed_struct::prelude::*;
use serde::Serialize;

use super::{
    event::Button,
    hid_report::{ControlRecord, ControlType, RecordType, ReportFormat, CONTROL_RECORD_SIZE},
};

/// Protocol version assumed when the descriptor does not report one
pub const DEFAULT_PROTOCOL_VERSION: u8 = 1;
/// Report size assumed when the descriptor does not report one
pub const DEFAULT_REPORT_BYTES: u16 = 4;

/// A single control reported by a peripheral
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlDescriptor {
    pub id: u8,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub format: ReportFormat,
    pub flags: u8,
    pub bit_index: Option<u8>,
    pub bit_width: Option<u8>,
    pub byte_offset: Option<u8>,
    pub bit_offset: Option<u8>,
    pub label: Option<String>,
}

impl ControlDescriptor {
    /// Create a single-bit control located in the state bitmask
    pub fn bitfield(id: u8, control_type: ControlType, bit_index: u8, label: &str) -> Self {
        Self {
            id,
            control_type,
            format: ReportFormat::Bitfield,
            flags: 0,
            bit_index: Some(bit_index),
            bit_width: Some(1),
            byte_offset: None,
            bit_offset: None,
            label: Some(label.to_string()),
        }
    }

    /// Build a control from a decoded record body
    pub fn from_record(record: ControlRecord) -> Self {
        let mut control = Self {
            id: record.id,
            control_type: record.control_type,
            format: record.format,
            flags: record.flags,
            bit_index: None,
            bit_width: None,
            byte_offset: None,
            bit_offset: None,
            label: None,
        };
        if record.format == ReportFormat::Bitfield {
            control.bit_index = Some(record.p1);
            control.bit_width = Some(record.p2);
        } else {
            control.byte_offset = Some(record.p1);
            control.bit_offset = Some(record.p2);
            control.bit_width = Some(record.p3);
        }
        control
    }

    /// Returns the record body describing this control
    pub fn to_record(&self) -> ControlRecord {
        let width = self.bit_width.unwrap_or(1);
        let (p1, p2, p3) = match self.format {
            ReportFormat::Bitfield => (self.bit_index.unwrap_or_default(), width, 0),
            _ => (
                self.byte_offset.unwrap_or_default(),
                self.bit_offset.unwrap_or_default(),
                width,
            ),
        };
        ControlRecord {
            id: self.id,
            control_type: self.control_type,
            flags: self.flags,
            format: self.format,
            p1,
            p2,
            p3,
        }
    }
}

/// Everything a peripheral reports about itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    pub protocol_version: u8,
    pub report_format: ReportFormat,
    pub report_bytes: u16,
    pub control_count: u8,
    pub unique_id: Option<u32>,
    pub fw_ver: Option<u16>,
    pub controls: Vec<ControlDescriptor>,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            report_format: ReportFormat::Bitfield,
            report_bytes: DEFAULT_REPORT_BYTES,
            control_count: 0,
            unique_id: None,
            fw_ver: None,
            controls: Vec::new(),
        }
    }
}

impl DeviceDescriptor {
    /// Encode the descriptor as a TLV stream
    pub fn to_tlv(&self) -> Vec<u8> {
        let mut data = Vec::new();
        push_record(&mut data, RecordType::ProtocolVersion, &[self.protocol_version]);
        push_record(
            &mut data,
            RecordType::ReportFormat,
            &[self.report_format.to_primitive()],
        );
        push_record(
            &mut data,
            RecordType::ReportBytes,
            &self.report_bytes.to_le_bytes(),
        );
        push_record(&mut data, RecordType::ControlCount, &[self.control_count]);
        if let Some(unique_id) = self.unique_id {
            push_record(&mut data, RecordType::UniqueId, &unique_id.to_le_bytes());
        }
        if let Some(fw_ver) = self.fw_ver {
            push_record(&mut data, RecordType::FirmwareVersion, &fw_ver.to_le_bytes());
        }

        for control in self.controls.iter() {
            let Ok(body) = control.to_record().pack() else {
                log::warn!("Unable to pack control {}", control.id);
                continue;
            };
            push_record(&mut data, RecordType::Control, &body);
        }

        // Labels are written after all controls so they always have a target
        for control in self.controls.iter() {
            let Some(label) = control.label.as_ref() else {
                continue;
            };
            let text: Vec<u8> = label.bytes().filter(|b| b.is_ascii()).collect();
            if text.is_empty() || text.len() > u8::MAX as usize - 1 {
                continue;
            }
            let mut value = vec![control.id];
            value.extend(text);
            push_record(&mut data, RecordType::Label, &value);
        }

        data
    }

    /// The controls of a peripheral that did not report its own
    pub fn default_controls() -> Vec<ControlDescriptor> {
        Button::ALL
            .iter()
            .map(|button| {
                // Control ids are 1-based
                let bit = button.bit_index();
                ControlDescriptor::bitfield(bit + 1, button.control_type(), bit, button.label())
            })
            .collect()
    }
}

fn push_record(data: &mut Vec<u8>, kind: RecordType, value: &[u8]) {
    data.push(kind.to_u8());
    data.push(value.len() as u8);
    data.extend_from_slice(value);
}

/// Iterator over the `(type, value)` records of a TLV stream
pub struct TlvRecords<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> TlvRecords<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }
}

impl<'a> Iterator for TlvRecords<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index + 2 > self.data.len() {
            return None;
        }
        let kind = self.data[self.index];
        let length = self.data[self.index + 1] as usize;
        let start = self.index + 2;
        let end = start + length;
        if end > self.data.len() {
            log::debug!(
                "Truncated descriptor record 0x{kind:02x}: needs {length} bytes, {} available",
                self.data.len() - start
            );
            self.index = self.data.len();
            return None;
        }
        self.index = end;
        Some((kind, &self.data[start..end]))
    }
}

/// Decode a capability descriptor. Returns `None` for empty input.
pub fn parse_info_tlv(data: &[u8]) -> Option<DeviceDescriptor> {
    if data.is_empty() {
        return None;
    }

    let mut descriptor = DeviceDescriptor::default();
    let mut labels: Vec<(u8, String)> = Vec::new();
    for (kind, value) in TlvRecords::new(data) {
        let Ok(record_type) = RecordType::try_from(kind) else {
            log::trace!("Skipping unknown descriptor record 0x{kind:02x}");
            continue;
        };
        match record_type {
            RecordType::ProtocolVersion => {
                if let Some(version) = value.first() {
                    descriptor.protocol_version = *version;
                }
            }
            RecordType::ReportFormat => {
                if let Some(format) = value.first().and_then(|v| ReportFormat::from_primitive(*v))
                {
                    descriptor.report_format = format;
                }
            }
            RecordType::ReportBytes => {
                if value.len() >= 2 {
                    descriptor.report_bytes = u16::from_le_bytes([value[0], value[1]]);
                }
            }
            RecordType::ControlCount => {
                if let Some(count) = value.first() {
                    descriptor.control_count = *count;
                }
            }
            RecordType::UniqueId => {
                if value.len() >= 4 {
                    descriptor.unique_id =
                        Some(u32::from_le_bytes([value[0], value[1], value[2], value[3]]));
                }
            }
            RecordType::FirmwareVersion => {
                if value.len() >= 2 {
                    descriptor.fw_ver = Some(u16::from_le_bytes([value[0], value[1]]));
                }
            }
            RecordType::Control => {
                if value.len() < CONTROL_RECORD_SIZE {
                    continue;
                }
                match ControlRecord::unpack_from_slice(&value[..CONTROL_RECORD_SIZE]) {
                    Ok(record) => descriptor.controls.push(ControlDescriptor::from_record(record)),
                    Err(e) => log::debug!("Dropping control descriptor {value:02x?}: {e:?}"),
                }
            }
            RecordType::Label => {
                if value.len() < 2 {
                    continue;
                }
                let text: String = value[1..]
                    .iter()
                    .filter(|b| b.is_ascii())
                    .map(|b| *b as char)
                    .collect();
                let text = text.trim();
                if !text.is_empty() {
                    labels.push((value[0], text.to_string()));
                }
            }
        }
    }

    for (control_id, label) in labels {
        for control in descriptor.controls.iter_mut() {
            if control.id == control_id {
                control.label = Some(label.clone());
            }
        }
    }

    if descriptor.control_count == 0 {
        descriptor.control_count = descriptor.controls.len().min(u8::MAX as usize) as u8;
    }

    Some(descriptor)
}
