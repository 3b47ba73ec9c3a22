//! Test infrastructure for falsification testing.
//!
//! Backends run against a [`mocks::ScriptedRunner`] inside a
//! [`harness::TestHarness`] temp directory, so every platform is exercised
//! on every host.
//!
//! | Category | ID Range | Description |
//! |----------|----------|-------------|
//! | A | F001-F020 | Install / uninstall lifecycle |
//! | B | F021-F035 | Runtime status and loaded state |
//! | C | F041-F050 | Backend selection and naming |


pub use harness::TestHarness;
pub use mocks::ScriptedRunner;
