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
use tch::nn::RNN;
use tch::{nn, Kind, Tensor};

/// # Pointer-generator encoder
/// Embeds an input token sequence and runs it through a single-layer
/// unidirectional LSTM, producing one contextual vector per source position and
/// the final cell state of the recurrent unit.
#[derive(Debug)]
pub struct PointerGenEncoder {
    embedding: nn::Embedding,
    lstm: nn::LSTM,
    input_vocab_size: i64,
    batch_size: i64,
}

/// Contextual encoder representation for one input sequence.
pub struct PointerGenEncoderOutput {
    /// Contextual vectors, shape `[batch, src_len, hidden_units]`. Read-only for
    /// the rest of the sequence: every decode step attends over the same tensor.
    pub hidden_states: Tensor,
    /// Final LSTM cell state, shape `[batch, hidden_units]`.
    pub cell_state: Tensor,
}

impl PointerGenEncoder {
    pub fn new<'p, P>(p: P, config: &PointerGenConfig) -> PointerGenEncoder
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
            config.embedding_dim,
            config.hidden_units,
            Default::default(),
        );

        PointerGenEncoder {
            embedding,
            lstm,
            input_vocab_size: config.input_vocab_size,
            batch_size: config.batch_size,
        }
    }

    /// Encodes a batch of token index sequences.
    ///
    /// The recurrent unit is run from a zero initial state on every call: no state
    /// is carried over between input sequences.
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Token indices, shape `[batch, src_len]`, kind `Int64`.
    pub fn forward(
        &self,
        input_ids: &Tensor,
    ) -> Result<PointerGenEncoderOutput, RustPointerGenError> {
        self.validate_inputs(input_ids)?;

        let embedded = input_ids.apply(&self.embedding);
        let (hidden_states, state) = self.lstm.seq(&embedded);

        Ok(PointerGenEncoderOutput {
            hidden_states,
            cell_state: state.c().squeeze_dim(0),
        })
    }

    fn validate_inputs(&self, input_ids: &Tensor) -> Result<(), RustPointerGenError> {
        let input_shape = input_ids.size();
        if input_shape.len() != 2 {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder input ids must have shape [batch, src_len], got {:?}",
                input_shape
            )));
        }
        if input_shape[0] != self.batch_size {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder input batch size {} does not match configured batch size {}",
                input_shape[0], self.batch_size
            )));
        }
        if input_shape[1] == 0 {
            return Err(RustPointerGenError::ShapeMismatchError(
                "Encoder input sequence must contain at least one position".into(),
            ));
        }
        if input_ids.kind() != Kind::Int64 {
            return Err(RustPointerGenError::ShapeMismatchError(format!(
                "Encoder input ids must be of kind Int64, got {:?}",
                input_ids.kind()
            )));
        }
        let max_id = i64::from(input_ids.max());
        let min_id = i64::from(input_ids.min());
        if min_id < 0 || max_id >= self.input_vocab_size {
            return Err(RustPointerGenError::VocabularyLookupError(format!(
                "Input token index out of bounds: found range [{}, {}], vocabulary size is {}",
                min_id, max_id, self.input_vocab_size
            )));
        }
        Ok(())
    }
}
