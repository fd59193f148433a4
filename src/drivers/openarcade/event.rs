use super::hid_report::ControlType;

/// Inputs reported in the 32-bit state bitmask
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Button1,
    Button2,
    Button3,
    Button4,
    Button5,
    Button6,
    Button7,
    Button8,
    JoyLeft,
    JoyRight,
    JoyUp,
    JoyDown,
    Select,
    Start,
    Pair,
}

impl Button {
    /// All inputs in bit order
    pub const ALL: [Button; 15] = [
        Button::Button1,
        Button::Button2,
        Button::Button3,
        Button::Button4,
        Button::Button5,
        Button::Button6,
        Button::Button7,
        Button::Button8,
        Button::JoyLeft,
        Button::JoyRight,
        Button::JoyUp,
        Button::JoyDown,
        Button::Select,
        Button::Start,
        Button::Pair,
    ];

    /// Bit position of this input in the state bitmask
    pub fn bit_index(&self) -> u8 {
        *self as u8
    }

    /// Human readable name shown in configuration tools
    pub fn label(&self) -> &'static str {
        match self {
            Button::Button1 => "Button 1",
            Button::Button2 => "Button 2",
            Button::Button3 => "Button 3",
            Button::Button4 => "Button 4",
            Button::Button5 => "Button 5",
            Button::Button6 => "Button 6",
            Button::Button7 => "Button 7",
            Button::Button8 => "Button 8",
            Button::JoyLeft => "Joy Left",
            Button::JoyRight => "Joy Right",
            Button::JoyUp => "Joy Up",
            Button::JoyDown => "Joy Down",
            Button::Select => "Select",
            Button::Start => "Start",
            Button::Pair => "Pair",
        }
    }

    pub fn control_type(&self) -> ControlType {
        match self {
            Button::JoyLeft | Button::JoyRight | Button::JoyUp | Button::JoyDown => {
                ControlType::Hat
            }
            _ => ControlType::Button,
        }
    }
}
