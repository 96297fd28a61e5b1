//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem against mock
//! adapters.  No serial devices or GPIO are required.

mod controller_tests;
mod mock_hw;
mod polling_tests;
