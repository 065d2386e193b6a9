//! Host-based integration tests for the cell-balancing link
//!
//! The line simulator from `shuffler_core::test_utils` drives a real
//! `LineDecoder` with transmissions produced by `LineEncoder`, so every
//! test here exercises the same code the firmware runs.

pub mod link_tests;
pub mod control_tests;
pub mod encoder_pin_tests;
