// Common test utilities

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
#[allow(unused_imports)]
pub use harness::*;
