pub mod aggregator;
pub mod discovery;
#[cfg(test)]
pub mod discovery_test;
pub mod keycode;
pub mod manager;
pub mod mapping;
pub mod pipeline;
pub mod session;
pub mod target;
