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

use crate::common::error::RustPointerGenError;
use crate::pointer_gen::pointer_gen_model::PointerGenConfig;
use std::borrow::Borrow;
use tch::{nn, Kind, Tensor};

/// # Bahdanau additive attention with coverage
/// Scores every encoder position against the current decoder cell state through a
/// learned `tanh` projection, and keeps a running sum of past attention
/// distributions (the coverage accumulator) that feeds back into the scores.
#[derive(Debug)]
pub struct BahdanauAttention {
    w_h: nn::Linear,
    w_s: nn::Linear,
    w_c: nn::Linear,
    v: nn::Linear,
    attention_dim: i64,
    batch_size: i64,
}

impl BahdanauAttention {
    pub fn new<'p, P>(p: P, config: &PointerGenConfig) -> BahdanauAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let attention_dim = config.hidden_units;
        let w_h = nn::linear(p / "w_h", attention_dim, attention_dim, Default::default());
        let w_s = nn::linear(p / "w_s", attention_dim, attention_dim, Default::default());
        let w_c = nn::linear(p / "w_c", 1, attention_dim, Default::default());
        let v = nn::linear(
            p / "v",
            attention_dim,
            1,
            nn::LinearConfig {
                bias: false,
                ..Default::default()
            },
        );

        BahdanauAttention {
            w_h,
            w_s,
            w_c,
            v,
            attention_dim,
            batch_size: config.batch_size,
        }
    }

    /// Computes one attention pass.
    ///
    /// # Arguments
    ///
    /// * `encoder_hidden_states` - Contextual encoder vectors, shape `[batch, src_len, hidden_units]`.
    /// * `cell_state` - Current decoder cell state, shape `[batch, hidden_units]`.
    /// * `coverage` - Running coverage accumulator, shape `[batch, src_len]`. `None` on
    ///   the first call of a sequence; the accumulator is created from that call's
    ///   attention distribution and must be threaded into every subsequent call.
    ///
    /// # Returns
    ///
    /// Tuple of:
    /// * context vector, shape `[batch, hidden_units]` - attention-weighted sum of encoder states
    /// * attention distribution over source positions, shape `[batch, src_len]`
    /// * updated coverage accumulator, shape `[batch, src_len]`
    pub fn forward(
        &self,
        encoder_hidden_states: &Tensor,
        cell_state: &Tensor,
        coverage: Option<&Tensor>,
    ) -> Result<(Tensor, Tensor, Tensor), RustPointerGenError> {
        self.validate_inputs(encoder_hidden_states, cell_state, coverage)?;

        let enc_features = encoder_hidden_states.apply(&self.w_h);
        let dec_features = cell_state.apply(&self.w_s).unsqueeze(1);

        let features = match coverage {
            Some(coverage) => {
                let cov_features = coverage.unsqueeze(-1).apply(&self.w_c);
                enc_features + dec_features + cov_features
            }
            None => enc_features + dec_features,
        };

        let scores = features.tanh().apply(&self.v).squeeze_dim(-1);
        let attention_weights = scores.softmax(-1, Kind::Float);

        let updated_coverage = match coverage {
            Some(coverage) => coverage + &attention_weights,
            None => attention_weights.copy(),
        };

        let context_vector = attention_weights
            .unsqueeze(1)
            .bmm(encoder_hidden_states)
            .squeeze_dim(1);

        Ok((context_vector, attention_weights, updated_coverage))
    }

    fn validate_inputs(
        &self,
        encoder_hidden_states: &Tensor,
        cell_state: &Tensor,
        coverage: Option<&Tensor>,
    ) -> Result<(), RustPointerGenError> {
        let encoder_shape = encoder_hidden_states.size();
        if encoder_shape.len() != 3 {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder hidden states must have shape [batch, src_len, hidden], got {:?}",
                encoder_shape
            )));
        }
        if encoder_shape[0] != self.batch_size {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder hidden states batch size {} does not match configured batch size {}",
                encoder_shape[0], self.batch_size
            )));
        }
        if encoder_shape[2] != self.attention_dim {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder hidden states dimension {} does not match attention dimension {}",
                encoder_shape[2], self.attention_dim
            )));
        }
        let cell_shape = cell_state.size();
        if cell_shape != [self.batch_size, self.attention_dim] {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Decoder cell state must have shape [{}, {}], got {:?}",
                self.batch_size, self.attention_dim, cell_shape
            )));
        }
        if let Some(coverage) = coverage {
            let expected = [encoder_shape[0], encoder_shape[1]];
            if coverage.size() != expected {
                return Err(RustPointerGenError::ShapeMismatchError(format!(
                    "Coverage accumulator must have shape {:?}, got {:?}",
                    expected,
                    coverage.size()
                )));
            }
        }
        Ok(())
    }
}
