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
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// # Token vocabulary for the pointer-generator model
/// Bidirectional token <-> index mapping, loaded from a newline-delimited UTF-8
/// text file where the token on line N (0-based) is assigned index N.
#[derive(Debug, Clone)]
pub struct PointerGenVocab {
    /// Token to index mapping
    values: HashMap<String, i64>,
    /// Index to token mapping
    indices: HashMap<i64, String>,
}

impl PointerGenVocab {
    /// Reads a vocabulary from a newline-delimited file.
    ///
    /// A trailing newline does not register an empty token at the final index:
    /// the file is read line by line and the end-of-file marker is not a line.
    /// Empty lines *before* the end of the file are kept as-is.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<PointerGenVocab, RustPointerGenError> {
        let f = File::open(&path).map_err(|e| {
            RustPointerGenError::IOError(format!(
                "{} vocabulary file not found :{}",
                path.as_ref().display(),
                e
            ))
        })?;
        let br = BufReader::new(f);
        let mut values = HashMap::new();
        let mut indices = HashMap::new();

        for (index, line) in br.lines().enumerate() {
            let token = line?;
            values.insert(token.clone(), index as i64);
            indices.insert(index as i64, token);
        }

        Ok(PointerGenVocab { values, indices })
    }

    /// Number of tokens in the vocabulary.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Token to index mapping.
    pub fn values(&self) -> &HashMap<String, i64> {
        &self.values
    }

    /// Index to token mapping.
    pub fn indices(&self) -> &HashMap<i64, String> {
        &self.indices
    }

    pub fn token_to_id(&self, token: &str) -> Result<i64, RustPointerGenError> {
        self.values.get(token).copied().ok_or_else(|| {
            RustPointerGenError::VocabularyLookupError(format!(
                "Token {} not found in vocabulary",
                token
            ))
        })
    }

    pub fn id_to_token(&self, id: i64) -> Result<&str, RustPointerGenError> {
        self.indices.get(&id).map(String::as_str).ok_or_else(|| {
            RustPointerGenError::VocabularyLookupError(format!(
                "Index {} out of vocabulary bounds (size {})",
                id,
                self.indices.len()
            ))
        })
    }

    pub fn convert_tokens_to_ids(&self, tokens: &[&str]) -> Result<Vec<i64>, RustPointerGenError> {
        tokens.iter().map(|token| self.token_to_id(token)).collect()
    }
}
