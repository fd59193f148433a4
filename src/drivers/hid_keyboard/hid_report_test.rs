use std::error::Error;

use packed_struct::prelude::*;

use crate::drivers::hid_keyboard::hid_report::KeyboardReport;

#[tokio::test]
async fn test_keyboard_report() -> Result<(), Box<dyn Error>> {
    let mut report = KeyboardReport::default();
    println!("Before Report: {}", report);
    assert_eq!(report.pack()?, [0; 8]);

    report.modifiers = 0x02;
    report.keys[0] = 0x05;
    report.keys[1] = 0x28;
    println!("After Report: {}", report);

    assert_eq!(report.pack()?, [0x02, 0x00, 0x05, 0x28, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(report.pressed_keys().collect::<Vec<u8>>(), vec![0x05, 0x28]);

    let unpacked = KeyboardReport::unpack(&[0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00])?;
    assert_eq!(unpacked.keys, [0x04, 0, 0, 0, 0, 0]);

    Ok(())
}
