//! Integration test crate for VideoOverlay.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives the compositor the way a host pipeline does and runs whole
//! exports through the media crate.

#[cfg(test)]
mod engine;

#[cfg(test)]
mod export;
