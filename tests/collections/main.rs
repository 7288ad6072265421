//! Collection Integration Tests
//!
//! Add, get, update and remove through the public store surface, plus the
//! secondary index invariants and logging side effects.

#[path = "../common/mod.rs"]
mod common;

mod remove;
