pub mod descriptor;
#[cfg(test)]
pub mod descriptor_test;
pub mod driver;
pub mod event;
pub mod hid_report;
