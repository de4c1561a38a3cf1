// Copyright 2017 Abigail See, Stanford NLP
// Copyright 2020 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::common::config::Config;
use crate::common::error::RustPointerGenError;
use crate::pointer_gen::decoder::{DecoderState, PointerGenDecoder, PointerGenDecoderOutput};
use crate::pointer_gen::encoder::{PointerGenEncoder, PointerGenEncoderOutput};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # Pointer-generator model configuration
/// Defines the model architecture (vocabulary sizes, embedding and hidden
/// dimensions, batch size) and the special token ids used for generation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PointerGenConfig {
    pub input_vocab_size: i64,
    pub output_vocab_size: i64,
    pub embedding_dim: i64,
    pub hidden_units: i64,
    pub batch_size: i64,
    pub bos_token_id: Option<i64>,
    pub eos_token_id: Option<i64>,
}

impl Config for PointerGenConfig {}

impl Default for PointerGenConfig {
    fn default() -> Self {
        PointerGenConfig {
            input_vocab_size: 50000,
            output_vocab_size: 50000,
            embedding_dim: 128,
            hidden_units: 128,
            batch_size: 1,
            bos_token_id: Some(0),
            eos_token_id: Some(1),
        }
    }
}

impl PointerGenConfig {
    pub fn validate(&self) -> Result<(), RustPointerGenError> {
        if self.input_vocab_size <= 0
            || self.output_vocab_size <= 0
            || self.embedding_dim <= 0
            || self.hidden_units <= 0
            || self.batch_size <= 0
        {
            return Err(RustPointerGenError::InvalidConfigurationError(format!(
                "All model dimensions must be strictly positive, got {:?}",
                self
            )));
        }
        if self.embedding_dim != self.hidden_units {
            return Err(RustPointerGenError::InvalidConfigurationError(format!(
                "The decoder fuses token embeddings and context vectors as timesteps of a \
                 single sequence, which requires embedding_dim == hidden_units (got {} and {})",
                self.embedding_dim, self.hidden_units
            )));
        }
        Ok(())
    }
}

/// # Pointer-generator network (See et al., 2017)
/// Encoder-decoder summarization model with coverage attention and a copy
/// mechanism. The model owns the forward computational core only: loss
/// computation, optimization and beam search are left to the caller.
#[derive(Debug)]
pub struct PointerGenModel {
    encoder: PointerGenEncoder,
    decoder: PointerGenDecoder,
    output_vocab_size: i64,
    bos_token_id: Option<i64>,
    eos_token_id: Option<i64>,
}

impl PointerGenModel {
    /// Builds a new `PointerGenModel` under the given variable store path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_pointer_gen::pointer_gen::{PointerGenConfig, PointerGenModel};
    /// use tch::{nn, Device};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let device = Device::cuda_if_available();
    /// let vs = nn::VarStore::new(device);
    /// let config = PointerGenConfig::default();
    /// let model = PointerGenModel::new(vs.root(), &config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<'p, P>(p: P, config: &PointerGenConfig) -> Result<PointerGenModel, RustPointerGenError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        config.validate()?;
        let p = p.borrow();

        let encoder = PointerGenEncoder::new(p / "encoder", config);
        let decoder = PointerGenDecoder::new(p / "decoder", config);

        Ok(PointerGenModel {
            encoder,
            decoder,
            output_vocab_size: config.output_vocab_size,
            bos_token_id: config.bos_token_id,
            eos_token_id: config.eos_token_id,
        })
    }

    /// Encodes a batch of source sequences, shape `[batch, src_len]`.
    pub fn encode(
        &self,
        input_ids: &Tensor,
    ) -> Result<PointerGenEncoderOutput, RustPointerGenError> {
        self.encoder.forward(input_ids)
    }

    /// Starts a decoding session for an encoded sequence. Call again to reset
    /// before decoding an unrelated sequence.
    pub fn begin_decode(
        &self,
        encoder_output: &PointerGenEncoderOutput,
    ) -> Result<DecoderState, RustPointerGenError> {
        DecoderState::new(&encoder_output.cell_state)
    }

    /// Runs one decode step; see `PointerGenDecoder::forward`.
    pub fn decode_step(
        &self,
        input_ids: &Tensor,
        encoder_hidden_states: &Tensor,
        state: DecoderState,
    ) -> Result<PointerGenDecoderOutput, RustPointerGenError> {
        self.decoder.forward(input_ids, encoder_hidden_states, state)
    }

    /// Blends the generation and copy distributions of a decode step into the
    /// final distribution over the output vocabulary:
    /// `p_gen * vocab_distribution[w] + (1 - p_gen) * sum of attention mass on
    /// source positions holding token w`.
    ///
    /// # Arguments
    ///
    /// * `source_ids` - Source token indices the model may copy from, shape
    ///   `[batch, src_len]`. Must be valid output-vocabulary indices.
    /// * `decoder_output` - Output of the decode step to blend.
    ///
    /// # Returns
    ///
    /// Final distribution, shape `[batch, output_vocab_size]`; rows sum to 1.
    pub fn final_distribution(
        &self,
        source_ids: &Tensor,
        decoder_output: &PointerGenDecoderOutput,
    ) -> Result<Tensor, RustPointerGenError> {
        let source_shape = source_ids.size();
        let attention_shape = decoder_output.attention_weights.size();
        if source_shape != attention_shape {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Source ids shape {:?} does not match attention distribution shape {:?}",
                source_shape, attention_shape
            )));
        }
        let max_id = i64::from(source_ids.max());
        let min_id = i64::from(source_ids.min());
        if min_id < 0 || max_id >= self.output_vocab_size {
            return Err(RustPointerGenError::VocabularyLookupError(format!(
                "Source token index out of bounds: found range [{}, {}], output vocabulary size is {}",
                min_id, max_id, self.output_vocab_size
            )));
        }

        let p_gen = &decoder_output.p_gen;
        let generation_scores = &decoder_output.vocab_distribution * p_gen;
        let copy_scores = &decoder_output.attention_weights * (p_gen.ones_like() - p_gen);

        Ok(generation_scores.scatter_add(-1, source_ids, &copy_scores))
    }

    /// Greedy generation: repeatedly decodes the argmax of the blended final
    /// distribution, starting from `bos_token_id` and stopping per batch element
    /// at `eos_token_id` or after `max_length` steps.
    ///
    /// Returns the generated indices per batch element, end token excluded.
    pub fn generate(
        &self,
        source_ids: &Tensor,
        max_length: i64,
    ) -> Result<Vec<Vec<i64>>, RustPointerGenError> {
        let bos_token_id = self.bos_token_id.ok_or_else(|| {
            RustPointerGenError::InvalidConfigurationError(
                "Generation requires a bos_token_id in the model configuration".into(),
            )
        })?;
        let eos_token_id = self.eos_token_id.ok_or_else(|| {
            RustPointerGenError::InvalidConfigurationError(
                "Generation requires an eos_token_id in the model configuration".into(),
            )
        })?;

        tch::no_grad(|| {
            let encoder_output = self.encode(source_ids)?;
            let mut state = self.begin_decode(&encoder_output)?;

            let batch_size = source_ids.size()[0] as usize;
            let mut prev_tokens =
                Tensor::of_slice(&vec![bos_token_id; batch_size]).to(source_ids.device());
            let mut finished = vec![false; batch_size];
            let mut generated: Vec<Vec<i64>> = vec![Vec::new(); batch_size];

            for _ in 0..max_length {
                let decoder_output =
                    self.decoder
                        .forward(&prev_tokens, &encoder_output.hidden_states, state)?;
                let final_distribution =
                    self.final_distribution(source_ids, &decoder_output)?;
                let next_tokens = final_distribution.argmax(-1, false);

                for (index, is_finished) in finished.iter_mut().enumerate() {
                    let token = next_tokens.int64_value(&[index as i64]);
                    if !*is_finished {
                        if token == eos_token_id {
                            *is_finished = true;
                        } else {
                            generated[index].push(token);
                        }
                    }
                }

                state = decoder_output.state;
                prev_tokens = next_tokens;
                if finished.iter().all(|is_finished| *is_finished) {
                    break;
                }
            }

            Ok(generated)
        })
    }
}
