pub mod keyboard;
pub mod typing;
#[cfg(test)]
pub mod typing_test;
