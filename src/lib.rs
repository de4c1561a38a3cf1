//! Ready-to-use pointer-generator network for abstractive summarization
//! ([Get To The Point: Summarization with Pointer-Generator Networks](https://arxiv.org/abs/1704.04368) See, Liu, Manning, 2017),
//! implemented on top of the [tch-rs](https://github.com/LaurentMazare/tch-rs) bindings to libtorch.
//!
//! The forward computational core (encoder, coverage attention, decoder step) is
//! implemented in the `pointer_gen` module. Training utilities and beam search are
//! not part of this crate.

pub mod common;
pub mod pointer_gen;

pub use common::config::Config;
pub use common::error::RustPointerGenError;
