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
use crate::pointer_gen::attention::BahdanauAttention;
use crate::pointer_gen::pointer_gen_model::PointerGenConfig;
use std::borrow::Borrow;
use tch::nn::{LSTMState, RNN};
use tch::{nn, Kind, Tensor};

/// # Decoding session state
/// Caller-owned state for decoding one input sequence: the decoder LSTM state, the
/// context vector cached from the previous step and the coverage accumulator.
/// Constructing a new `DecoderState` is the reset operation separating independent
/// sequences; the decoder itself holds weights only and never retains per-call
/// state.
#[derive(Debug)]
pub struct DecoderState {
    pub(crate) hidden: LSTMState,
    pub(crate) context_vector: Option<Tensor>,
    pub(crate) coverage: Option<Tensor>,
}

impl DecoderState {
    /// Starts a fresh decoding session from the encoder's final cell state
    /// (shape `[batch, hidden_units]`). The LSTM hidden output starts at zero,
    /// the context vector cache and the coverage accumulator start empty.
    pub fn new(encoder_cell_state: &Tensor) -> Result<DecoderState, RustPointerGenError> {
        let cell_shape = encoder_cell_state.size();
        if cell_shape.len() != 2 {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder cell state must have shape [batch, hidden], got {:?}",
                cell_shape
            )));
        }
        let h = encoder_cell_state.zeros_like().unsqueeze(0);
        let c = encoder_cell_state.unsqueeze(0);
        Ok(DecoderState {
            hidden: LSTMState((h, c)),
            context_vector: None,
            coverage: None,
        })
    }

    /// Cell state of the decoder LSTM, shape `[batch, hidden_units]`.
    pub fn cell_state(&self) -> Tensor {
        self.hidden.c().squeeze_dim(0)
    }

    /// Context vector cached from the last decode step.
    ///
    /// Errors with `UninitializedStateError` if no decode step has run in this
    /// session yet.
    pub fn context_vector(&self) -> Result<&Tensor, RustPointerGenError> {
        self.context_vector.as_ref().ok_or_else(|| {
            RustPointerGenError::UninitializedStateError(
                "Context vector requested before the first decode step of the session".into(),
            )
        })
    }

    /// Coverage accumulator, shape `[batch, src_len]`.
    ///
    /// Errors with `UninitializedStateError` if no decode step has run in this
    /// session yet: the accumulator is created lazily from the first attention
    /// distribution.
    pub fn coverage(&self) -> Result<&Tensor, RustPointerGenError> {
        self.coverage.as_ref().ok_or_else(|| {
            RustPointerGenError::UninitializedStateError(
                "Coverage accumulator requested before the first decode step of the session".into(),
            )
        })
    }

    pub(crate) fn batch_size(&self) -> i64 {
        self.hidden.c().size()[1]
    }
}

/// Output of a single decode step.
pub struct PointerGenDecoderOutput {
    /// Generation distribution over the output vocabulary, shape
    /// `[batch, output_vocab_size]`. Rows sum to 1.
    pub vocab_distribution: Tensor,
    /// Generation probability gate in (0, 1), shape `[batch, 1]`.
    pub p_gen: Tensor,
    /// Attention distribution over source positions, shape `[batch, src_len]`.
    pub attention_weights: Tensor,
    /// Updated session state: new LSTM state, this step's context vector and the
    /// accumulated coverage. Thread it into the next decode step.
    pub state: DecoderState,
}

/// # Pointer-generator decoder
/// Advances the output sequence by one token: fuses the previous token embedding
/// with the last context vector, runs one LSTM advance, re-attends over the
/// encoder states with coverage, and produces the vocabulary distribution together
/// with the copy/generate gate.
///
/// The blending of the vocabulary distribution with the copy distribution is not
/// done here; see `PointerGenModel::final_distribution`.
#[derive(Debug)]
pub struct PointerGenDecoder {
    embedding: nn::Embedding,
    lstm: nn::LSTM,
    attention: BahdanauAttention,
    w1: nn::Linear,
    w2: nn::Linear,
    v1: nn::Linear,
    v2: nn::Linear,
    input_vocab_size: i64,
    hidden_units: i64,
}

impl PointerGenDecoder {
    pub fn new<'p, P>(p: P, config: &PointerGenConfig) -> PointerGenDecoder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let embedding = nn::embedding(
            p / "embedding",
            config.input_vocab_size,
            config.embedding_dim,
            Default::default(),
        );
        let lstm = nn::lstm(
            p / "lstm",
            config.hidden_units,
            config.hidden_units,
            Default::default(),
        );
        let attention = BahdanauAttention::new(p / "attention", config);

        // The fused input holds two timesteps of hidden_units features once
        // flattened for the p_gen projection.
        let w1 = nn::linear(p / "w1", 4 * config.hidden_units, 1, Default::default());
        let w2 = nn::linear(
            p / "w2",
            config.embedding_dim,
            config.hidden_units,
            Default::default(),
        );
        let v1 = nn::linear(
            p / "v1",
            2 * config.hidden_units,
            config.hidden_units,
            Default::default(),
        );
        let v2 = nn::linear(
            p / "v2",
            config.hidden_units,
            config.output_vocab_size,
            Default::default(),
        );

        PointerGenDecoder {
            embedding,
            lstm,
            attention,
            w1,
            w2,
            v1,
            v2,
            input_vocab_size: config.input_vocab_size,
            hidden_units: config.hidden_units,
        }
    }

    /// Runs one decode step.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Previous output token per batch element, shape `[batch]`, kind `Int64`.
    /// * `encoder_hidden_states` - Contextual encoder vectors, shape `[batch, src_len, hidden_units]`.
    /// * `state` - Session state returned by the previous step, or a fresh
    ///   `DecoderState` at the start of a sequence.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        encoder_hidden_states: &Tensor,
        state: DecoderState,
    ) -> Result<PointerGenDecoderOutput, RustPointerGenError> {
        self.validate_inputs(input_ids, encoder_hidden_states, &state)?;

        let cell_state = state.cell_state();
        let prev_context_vector = match &state.context_vector {
            Some(context_vector) => context_vector.shallow_clone(),
            None => {
                let (context_vector, _, _) =
                    self.attention
                        .forward(encoder_hidden_states, &cell_state, None)?;
                context_vector
            }
        };

        let embedded = input_ids.apply(&self.embedding).unsqueeze(1);
        let fused_input =
            Tensor::cat(&[embedded, prev_context_vector.unsqueeze(1)], 1).apply(&self.w2);

        let (_, new_hidden) = self.lstm.seq_init(&fused_input, &state.hidden);
        let new_cell_state = new_hidden.c().squeeze_dim(0);

        let (context_vector, attention_weights, coverage) = self.attention.forward(
            encoder_hidden_states,
            &new_cell_state,
            state.coverage.as_ref(),
        )?;

        let vocab_distribution = Tensor::cat(&[&context_vector, &new_cell_state], -1)
            .apply(&self.v1)
            .apply(&self.v2)
            .softmax(-1, Kind::Float);

        let flat_fused_input = fused_input.view((input_ids.size()[0], -1));
        let p_gen = Tensor::cat(&[&context_vector, &new_cell_state, &flat_fused_input], -1)
            .apply(&self.w1)
            .sigmoid();

        let state = DecoderState {
            hidden: new_hidden,
            context_vector: Some(context_vector),
            coverage: Some(coverage),
        };

        Ok(PointerGenDecoderOutput {
            vocab_distribution,
            p_gen,
            attention_weights,
            state,
        })
    }

    fn validate_inputs(
        &self,
        input_ids: &Tensor,
        encoder_hidden_states: &Tensor,
        state: &DecoderState,
    ) -> Result<(), RustPointerGenError> {
        let input_shape = input_ids.size();
        if input_shape.len() != 1 || input_shape[0] == 0 {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Decoder input ids must have shape [batch] with batch > 0, got {:?}",
                input_shape
            )));
        }
        if input_ids.kind() != Kind::Int64 {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Decoder input ids must be of kind Int64, got {:?}",
                input_ids.kind()
            )));
        }
        let max_id = i64::from(input_ids.max());
        let min_id = i64::from(input_ids.min());
        if min_id < 0 || max_id >= self.input_vocab_size {
            return Err(RustPointerGenError::VocabularyLookupError(format!(
                "Decoder token index out of bounds: found range [{}, {}], vocabulary size is {}",
                min_id, max_id, self.input_vocab_size
            )));
        }
        let encoder_shape = encoder_hidden_states.size();
        if encoder_shape.len() != 3 {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder hidden states must have shape [batch, src_len, hidden], got {:?}",
                encoder_shape
            )));
        }
        if encoder_shape[0] != input_shape[0] {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Decoder input batch size {} does not match encoder batch size {}",
                input_shape[0], encoder_shape[0]
            )));
        }
        if state.batch_size() != input_shape[0] {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Session state batch size {} does not match input batch size {}",
                state.batch_size(),
                input_shape[0]
            )));
        }
        if encoder_shape[2] != self.hidden_units {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder hidden states dimension {} does not match decoder hidden dimension {}",
                encoder_shape[2], self.hidden_units
            )));
        }
        Ok(())
    }
}
