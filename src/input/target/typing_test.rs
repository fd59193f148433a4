use std::{error::Error, fs, sync::Arc, time::Duration};

use crate::input::{
    keycode::{KeycodeTable, KEY_LEFT_SHIFT},
    target::{
        keyboard::KeyboardDevice,
        typing::{char_to_key, press_report, type_text},
    },
};

#[tokio::test]
async fn test_char_to_key() -> Result<(), Box<dyn Error>> {
    assert_eq!(char_to_key('a'), Some((0x04, None)));
    assert_eq!(char_to_key('z'), Some((0x1D, None)));
    assert_eq!(char_to_key('A'), Some((0x04, Some(KEY_LEFT_SHIFT))));
    assert_eq!(char_to_key('1'), Some((0x1E, None)));
    assert_eq!(char_to_key('0'), Some((0x27, None)));
    assert_eq!(char_to_key('!'), Some((0x1E, Some(KEY_LEFT_SHIFT))));
    assert_eq!(char_to_key('\n'), Some((0x28, None)));
    assert_eq!(char_to_key(' '), Some((0x2C, None)));
    assert_eq!(char_to_key('?'), Some((0x38, Some(KEY_LEFT_SHIFT))));
    assert_eq!(char_to_key('é'), None);

    Ok(())
}

#[tokio::test]
async fn test_press_report() -> Result<(), Box<dyn Error>> {
    let keycodes = KeycodeTable::new();
    let report = press_report('H', &keycodes).expect("should map 'H'");
    assert_eq!(report.modifiers, 0x02);
    assert_eq!(report.keys, [0x0B, 0, 0, 0, 0, 0]);

    let report = press_report('h', &keycodes).expect("should map 'h'");
    assert_eq!(report.modifiers, 0);

    Ok(())
}

#[tokio::test]
async fn test_type_text() -> Result<(), Box<dyn Error>> {
    let file = tempfile::NamedTempFile::new()?;
    let keycodes = Arc::new(KeycodeTable::new());
    let mut device = KeyboardDevice::open(file.path(), keycodes.clone());

    let typed = type_text(&mut device, &keycodes, "Hi\u{2603}!", Duration::ZERO).await?;
    assert_eq!(typed, 3);

    let bytes = fs::read(file.path())?;
    let reports: Vec<&[u8]> = bytes.chunks(8).collect();
    println!("{reports:02x?}");
    assert_eq!(
        reports,
        vec![
            &[0x02, 0x00, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00][..],
            &[0x00; 8][..],
            &[0x00, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00][..],
            &[0x00; 8][..],
            &[0x02, 0x00, 0x1E, 0x00, 0x00, 0x00, 0x00, 0x00][..],
            &[0x00; 8][..],
        ]
    );

    Ok(())
}
