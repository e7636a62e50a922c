//! Helpers shared by every test module.

pub mod logging;
pub mod test_tools;
