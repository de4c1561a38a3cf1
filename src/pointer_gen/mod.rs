//! # Pointer-Generator Network (See et al.)
//!
//! Implementation of the pointer-generator summarization model ([Get To The Point: Summarization with Pointer-Generator Networks](https://arxiv.org/abs/1704.04368) See, Liu, Manning, 2017).
//! The encoder (`PointerGenEncoder`) embeds a source token sequence and runs it through an LSTM,
//! the decoder (`PointerGenDecoder`) generates one output token per step using Bahdanau additive
//! attention with coverage tracking (`BahdanauAttention`) and a copy/generate gate. The blending of
//! the generation distribution with the copy distribution is implemented in
//! `PointerGenModel::final_distribution`.
//!
//! All decoding state (recurrent state, cached context vector, coverage accumulator) lives in a
//! caller-owned `DecoderState`, threaded explicitly through every decode step. Independent input
//! sequences must each start from a fresh `DecoderState`; concurrent sequences must each own their
//! state.
//!
//! # Model set-up
//!
//! ```no_run
//! use rust_pointer_gen::pointer_gen::{PointerGenConfig, PointerGenModel, PointerGenVocab};
//! use tch::{nn, Device, Tensor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let device = Device::cuda_if_available();
//! let vs = nn::VarStore::new(device);
//! let vocab = PointerGenVocab::from_file("path/to/vocab.txt")?;
//! let config = PointerGenConfig {
//!     input_vocab_size: vocab.len() as i64,
//!     output_vocab_size: vocab.len() as i64,
//!     batch_size: 1,
//!     ..Default::default()
//! };
//! let model = PointerGenModel::new(vs.root(), &config)?;
//!
//! let source_ids = Tensor::of_slice(&vocab.convert_tokens_to_ids(&["the", "cat", "sat"])?)
//!     .view((1, -1))
//!     .to(device);
//! let encoder_output = model.encode(&source_ids)?;
//! let state = model.begin_decode(&encoder_output)?;
//! let first_token = Tensor::of_slice(&[0i64]).to(device);
//! let decoder_output = model.decode_step(&first_token, &encoder_output.hidden_states, state)?;
//! let final_distribution = model.final_distribution(&source_ids, &decoder_output)?;
//! # Ok(())
//! # }
//! ```

mod attention;
mod decoder;
mod encoder;
mod pointer_gen_model;
mod vocab;

pub use attention::BahdanauAttention;
pub use decoder::{DecoderState, PointerGenDecoder, PointerGenDecoderOutput};
pub use encoder::{PointerGenEncoder, PointerGenEncoderOutput};
pub use pointer_gen_model::{PointerGenConfig, PointerGenModel};
pub use vocab::PointerGenVocab;
