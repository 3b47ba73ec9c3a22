//! Popperian Falsification Tests for Velador
//!
//! | Category | ID Range | Description |
//! |----------|----------|-------------|
//! | A | F001-F015 | Install / uninstall lifecycle |
//! | B | F016-F030 | Runtime status totality |
//! | C | F031-F040 | Persisted command round trips |
//! | D | F041-F050 | Backend selection and Termux environment |

// Allow test-specific patterns that are denied in production code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod lifecycle;
mod roundtrip;
mod selector;
mod status;
