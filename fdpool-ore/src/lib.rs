//! Odds and ends shared by every `fdpool` crate.

pub mod assert;
pub mod cast;
pub mod id_gen;
