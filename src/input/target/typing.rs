//! Types text through the keyboard gadget one key press at a time.
use std::time::Duration;

use crate::{
    drivers::hid_keyboard::hid_report::KeyboardReport,
    input::keycode::{KeycodeTable, KEY_LEFT_SHIFT},
};

use super::keyboard::{KeyboardDevice, OutputError};

/// Returns the `(key code, modifier key code)` needed to type a character
/// on a US layout.
pub fn char_to_key(c: char) -> Option<(u8, Option<u8>)> {
    let shift = Some(KEY_LEFT_SHIFT);
    let key = match c {
        'a'..='z' => (0x04 + (c as u8 - b'a'), None),
        'A'..='Z' => (0x04 + (c as u8 - b'A'), shift),
        '1'..='9' => (0x1E + (c as u8 - b'1'), None),
        '0' => (0x27, None),
        '!' => (0x1E, shift),
        '@' => (0x1F, shift),
        '#' => (0x20, shift),
        '$' => (0x21, shift),
        '%' => (0x22, shift),
        '^' => (0x23, shift),
        '&' => (0x24, shift),
        '*' => (0x25, shift),
        '(' => (0x26, shift),
        ')' => (0x27, shift),
        '\n' => (0x28, None),
        '\u{8}' => (0x2A, None),
        '\t' => (0x2B, None),
        ' ' => (0x2C, None),
        '-' => (0x2D, None),
        '=' => (0x2E, None),
        '[' => (0x2F, None),
        ']' => (0x30, None),
        '\\' => (0x31, None),
        ';' => (0x33, None),
        '\'' => (0x34, None),
        '`' => (0x35, None),
        ',' => (0x36, None),
        '.' => (0x37, None),
        '/' => (0x38, None),
        '_' => (0x2D, shift),
        '+' => (0x2E, shift),
        '{' => (0x2F, shift),
        '}' => (0x30, shift),
        '|' => (0x31, shift),
        ':' => (0x33, shift),
        '"' => (0x34, shift),
        '~' => (0x35, shift),
        '<' => (0x36, shift),
        '>' => (0x37, shift),
        '?' => (0x38, shift),
        _ => return None,
    };
    Some(key)
}

/// The press report for a single character
pub fn press_report(c: char, keycodes: &KeycodeTable) -> Option<KeyboardReport> {
    let (code, modifier) = char_to_key(c)?;
    let mut report = KeyboardReport::default();
    if let Some(bit) = modifier.and_then(|m| keycodes.modifier_bit(m)) {
        report.modifiers = bit;
    }
    report.keys[0] = code;
    Some(report)
}

/// Type the given text, writing a press and a release report for every
/// supported character. Returns the number of characters typed.
pub async fn type_text(
    device: &mut KeyboardDevice,
    keycodes: &KeycodeTable,
    text: &str,
    delay: Duration,
) -> Result<usize, OutputError> {
    let release = KeyboardReport::default();
    let mut typed = 0;
    for c in text.chars() {
        let Some(report) = press_report(c, keycodes) else {
            log::debug!("Skipping unsupported character {c:?}");
            continue;
        };
        device.write_report(&report)?;
        tokio::time::sleep(delay).await;
        device.write_report(&release)?;
        tokio::time::sleep(delay).await;
        typed += 1;
    }
    Ok(typed)
}
