//! Deterministic, pure logic shared by the pacemaker.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod budget;
pub mod complexity;
pub mod consultation;
pub mod degradation;
pub mod tick;
pub mod types;
pub mod urgency;
