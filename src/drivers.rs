pub mod hid_keyboard;
pub mod openarcade;
