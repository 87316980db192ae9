#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Downstream crates reach the domain types via `todohash_tonic_core::todohash`.
pub use todohash;
