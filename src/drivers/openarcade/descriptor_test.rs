use std::error::Error;

use crate::drivers::openarcade::{
    descriptor::{parse_info_tlv, ControlDescriptor, DeviceDescriptor},
    hid_report::{ControlType, ReportFormat},
};

fn sample_descriptor() -> Vec<u8> {
    vec![
        0x01, 0x01, 0x02, // protocol version 2
        0x02, 0x01, 0x00, // bitfield
        0x03, 0x02, 0x04, 0x00, // 4 report bytes
        0x04, 0x01, 0x02, // 2 controls
        0x05, 0x04, 0x78, 0x56, 0x34, 0x12, // unique id
        0x06, 0x02, 0x03, 0x01, // firmware 0x0103
        0x10, 0x07, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, // button at bit 0
        0x10, 0x07, 0x09, 0x02, 0x04, 0x02, 0x01, 0x03, 0x08, // axis at byte 1
        0x11, 0x04, 0x01, b'A', b'B', b' ', // label for control 1
    ]
}

#[tokio::test]
async fn test_parse_descriptor() -> Result<(), Box<dyn Error>> {
    let descriptor = parse_info_tlv(&sample_descriptor()).expect("should decode descriptor");
    println!("{descriptor:?}");

    assert_eq!(descriptor.protocol_version, 2);
    assert_eq!(descriptor.report_format, ReportFormat::Bitfield);
    assert_eq!(descriptor.report_bytes, 4);
    assert_eq!(descriptor.control_count, 2);
    assert_eq!(descriptor.unique_id, Some(0x12345678));
    assert_eq!(descriptor.fw_ver, Some(0x0103));
    assert_eq!(descriptor.controls.len(), 2);

    let button = &descriptor.controls[0];
    assert_eq!(button.id, 1);
    assert_eq!(button.control_type, ControlType::Button);
    assert_eq!(button.bit_index, Some(0));
    assert_eq!(button.bit_width, Some(1));
    assert_eq!(button.byte_offset, None);
    assert_eq!(button.label.as_deref(), Some("AB"));

    let axis = &descriptor.controls[1];
    assert_eq!(axis.id, 9);
    assert_eq!(axis.control_type, ControlType::Axis);
    assert_eq!(axis.format, ReportFormat::Axis);
    assert_eq!(axis.flags, 4);
    assert_eq!(axis.bit_index, None);
    assert_eq!(axis.byte_offset, Some(1));
    assert_eq!(axis.bit_offset, Some(3));
    assert_eq!(axis.bit_width, Some(8));
    assert_eq!(axis.label, None);

    Ok(())
}

#[tokio::test]
async fn test_parse_empty() -> Result<(), Box<dyn Error>> {
    assert!(parse_info_tlv(&[]).is_none());
    Ok(())
}

#[tokio::test]
async fn test_parse_truncated() -> Result<(), Box<dyn Error>> {
    let data = sample_descriptor();

    // Cut inside the second control descriptor
    let descriptor = parse_info_tlv(&data[..36]).expect("should decode prefix");
    assert_eq!(descriptor.fw_ver, Some(0x0103));
    assert_eq!(descriptor.controls.len(), 1);
    assert_eq!(descriptor.controls[0].label, None);

    // Every prefix decodes without panicking
    for end in 1..data.len() {
        let descriptor = parse_info_tlv(&data[..end]).expect("should decode non-empty input");
        assert!(descriptor.controls.len() <= 2);
    }

    Ok(())
}

#[tokio::test]
async fn test_parse_skips_unknown_records() -> Result<(), Box<dyn Error>> {
    let data = vec![
        0x7f, 0x03, 0xaa, 0xbb, 0xcc, // unknown record
        0x02, 0x01, 0x09, // unknown report format
        0x10, 0x07, 0x01, 0x07, 0x00, 0x00, 0x00, 0x01, 0x00, // unknown control type
        0x10, 0x07, 0x02, 0x01, 0x00, 0x05, 0x00, 0x01, 0x00, // unknown control format
        0x10, 0x03, 0x03, 0x01, 0x00, // short control
        0x11, 0x01, 0x04, // short label
        0x10, 0x07, 0x04, 0x03, 0x00, 0x00, 0x0b, 0x01, 0x00, // hat at bit 11
        0x11, 0x03, 0x04, b' ', b' ', // blank label
    ];
    let descriptor = parse_info_tlv(&data).expect("should decode descriptor");

    assert_eq!(descriptor.report_format, ReportFormat::Bitfield);
    assert_eq!(descriptor.controls.len(), 1);
    assert_eq!(descriptor.controls[0].id, 4);
    assert_eq!(descriptor.controls[0].control_type, ControlType::Hat);
    assert_eq!(descriptor.controls[0].bit_index, Some(11));
    assert_eq!(descriptor.controls[0].label, None);

    // Control count falls back to the number of decoded controls
    assert_eq!(descriptor.control_count, 1);

    Ok(())
}

#[tokio::test]
async fn test_encode_preserves_controls() -> Result<(), Box<dyn Error>> {
    let mut descriptor = DeviceDescriptor {
        unique_id: Some(42),
        fw_ver: Some(7),
        controls: DeviceDescriptor::default_controls(),
        ..Default::default()
    };
    descriptor.controls.push(ControlDescriptor {
        id: 20,
        control_type: ControlType::Axis,
        format: ReportFormat::Packed,
        flags: 1,
        bit_index: None,
        bit_width: Some(12),
        byte_offset: Some(2),
        bit_offset: Some(4),
        label: Some("Slider".to_string()),
    });
    descriptor.control_count = descriptor.controls.len() as u8;

    let decoded = parse_info_tlv(&descriptor.to_tlv()).expect("should decode encoded descriptor");
    assert_eq!(decoded, descriptor);

    Ok(())
}

#[tokio::test]
async fn test_descriptor_to_json() -> Result<(), Box<dyn Error>> {
    let descriptor = parse_info_tlv(&sample_descriptor()).expect("should decode descriptor");
    let value = serde_json::to_value(&descriptor)?;
    println!("{value}");

    assert_eq!(value["protocol_version"], 2);
    assert_eq!(value["report_format"], 0);
    assert_eq!(value["unique_id"], 0x12345678);
    assert_eq!(value["controls"][0]["id"], 1);
    assert_eq!(value["controls"][0]["type"], 1);
    assert_eq!(value["controls"][0]["bit_index"], 0);
    assert!(value["controls"][0]["byte_offset"].is_null());
    assert_eq!(value["controls"][1]["format"], 2);
    assert_eq!(value["controls"][1]["label"], serde_json::Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_default_controls() -> Result<(), Box<dyn Error>> {
    let controls = DeviceDescriptor::default_controls();
    assert_eq!(controls.len(), 15);
    for (bit, control) in controls.iter().enumerate() {
        assert_eq!(control.id as usize, bit + 1);
        assert_eq!(control.bit_index, Some(bit as u8));
        assert_eq!(control.bit_width, Some(1));
    }
    assert_eq!(controls[8].control_type, ControlType::Hat);
    assert_eq!(controls[13].label.as_deref(), Some("Start"));

    Ok(())
}
